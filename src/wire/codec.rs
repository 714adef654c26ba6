//! Primitive readers and writers shared by the message encoders.

use bytes::{Buf, BufMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error_handling::types::WireError;

/// Upper bound accepted for a single length-prefixed frame.
pub const MAX_FRAME_LEN: i32 = 50 * 1024 * 1024;

/// Narrows a length or count to the integer width it is written with.
pub fn checked_len<T: TryFrom<usize>>(field: &'static str, len: usize) -> Result<T, WireError> {
    T::try_from(len).map_err(|_| WireError::Oversized { field, len })
}

pub fn string_size(s: &str) -> usize {
    4 + s.len()
}

pub fn put_string(buf: &mut impl BufMut, s: &str) {
    buf.put_i32(s.len() as i32);
    buf.put_slice(s.as_bytes());
}

pub fn put_bytes(buf: &mut impl BufMut, bytes: &[u8]) {
    buf.put_i32(bytes.len() as i32);
    buf.put_slice(bytes);
}

fn need(buf: &&[u8], n: usize) -> Result<(), WireError> {
    if buf.remaining() < n {
        return Err(WireError::Truncated {
            needed: n,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_i8(buf: &mut &[u8]) -> Result<i8, WireError> {
    need(buf, 1)?;
    Ok(buf.get_i8())
}

pub fn get_i16(buf: &mut &[u8]) -> Result<i16, WireError> {
    need(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn get_i32(buf: &mut &[u8]) -> Result<i32, WireError> {
    need(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn get_i64(buf: &mut &[u8]) -> Result<i64, WireError> {
    need(buf, 8)?;
    Ok(buf.get_i64())
}

pub fn get_i128(buf: &mut &[u8]) -> Result<i128, WireError> {
    need(buf, 16)?;
    Ok(buf.get_i128())
}

pub fn get_f64(buf: &mut &[u8]) -> Result<f64, WireError> {
    need(buf, 8)?;
    Ok(buf.get_f64())
}

/// Reads a length-prefixed byte array; `None` when the length is `-1`.
pub fn get_bytes(buf: &mut &[u8]) -> Result<Option<Vec<u8>>, WireError> {
    let len = get_i32(buf)?;
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(WireError::FrameLength(len));
    }
    let len = len as usize;
    need(buf, len)?;
    let out = buf[..len].to_vec();
    buf.advance(len);
    Ok(Some(out))
}

pub fn get_string(buf: &mut &[u8]) -> Result<Option<String>, WireError> {
    match get_bytes(buf)? {
        Some(raw) => String::from_utf8(raw)
            .map(Some)
            .map_err(|_| WireError::InvalidString),
        None => Ok(None),
    }
}

/// Returns the payload of a framed message after checking that its length
/// prefix matches the bytes available.
pub fn frame_body(frame: &[u8]) -> Result<&[u8], WireError> {
    let mut buf = frame;
    let len = get_i32(&mut buf)?;
    if len < 0 || len as usize != buf.len() {
        return Err(WireError::FrameLength(len));
    }
    Ok(buf)
}

/// Reads one complete length-prefixed frame, prefix included.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let len = i32::from_be_bytes(prefix);
    if !(0..=MAX_FRAME_LEN).contains(&len) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            WireError::FrameLength(len),
        ));
    }
    let mut frame = vec![0u8; 4 + len as usize];
    frame[..4].copy_from_slice(&prefix);
    reader.read_exact(&mut frame[4..]).await?;
    Ok(frame)
}

/// Short, printable preview of captured bytes for trace logs.
pub fn preview(bytes: &[u8]) -> String {
    let shown = &bytes[..std::cmp::min(bytes.len(), 64)];
    format!(
        "{}{}",
        String::from_utf8_lossy(shown),
        if bytes.len() > 64 { " ..." } else { "" }
    )
}
