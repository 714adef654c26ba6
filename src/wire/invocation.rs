//! Stored procedure invocation requests and response headers.

use bytes::{BufMut, Bytes, BytesMut};

use super::codec;
use super::decimal::Decimal;
use super::types::{Value, WireType};
use crate::error_handling::types::WireError;

/// Response status codes.
pub mod status {
    pub const SUCCESS: i8 = 1;
    pub const USER_ABORT: i8 = -1;
    pub const GRACEFUL_FAILURE: i8 = -2;
    pub const UNEXPECTED_FAILURE: i8 = -3;
    pub const CONNECTION_LOST: i8 = -4;
}

/// Offset of the client data field inside a framed response.
pub const RESPONSE_CLIENT_DATA_OFFSET: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    TinyInt(Vec<i8>),
    SmallInt(Vec<i16>),
    Integer(Vec<i32>),
    BigInt(Vec<i64>),
    Float(Vec<f64>),
    String(Vec<String>),
    Timestamp(Vec<i64>),
    Decimal(Vec<Decimal>),
}

impl ArrayValue {
    fn element_type(&self) -> WireType {
        match self {
            ArrayValue::TinyInt(_) => WireType::TinyInt,
            ArrayValue::SmallInt(_) => WireType::SmallInt,
            ArrayValue::Integer(_) => WireType::Integer,
            ArrayValue::BigInt(_) => WireType::BigInt,
            ArrayValue::Float(_) => WireType::Float,
            ArrayValue::String(_) => WireType::String,
            ArrayValue::Timestamp(_) => WireType::Timestamp,
            ArrayValue::Decimal(_) => WireType::Decimal,
        }
    }

    fn len(&self) -> usize {
        match self {
            ArrayValue::TinyInt(v) => v.len(),
            ArrayValue::SmallInt(v) => v.len(),
            ArrayValue::Integer(v) => v.len(),
            ArrayValue::BigInt(v) => v.len(),
            ArrayValue::Float(v) => v.len(),
            ArrayValue::String(v) => v.len(),
            ArrayValue::Timestamp(v) => v.len(),
            ArrayValue::Decimal(v) => v.len(),
        }
    }

    // Byte arrays carry an i32 count, every other array an i16 count.
    fn count_width(&self) -> usize {
        match self {
            ArrayValue::TinyInt(_) => 4,
            _ => 2,
        }
    }

    fn serialized_size(&self) -> usize {
        let values = match self {
            ArrayValue::String(v) => v.iter().map(|s| codec::string_size(s)).sum::<usize>(),
            other => {
                other.len() * other.element_type().fixed_width().unwrap_or_default()
            }
        };
        2 + self.count_width() + values
    }

    fn encode(&self, buf: &mut impl BufMut) -> Result<(), WireError> {
        if self.count_width() == 4 {
            let count: i32 = codec::checked_len("array length", self.len())?;
            buf.put_i8(WireType::Array.code());
            buf.put_i8(self.element_type().code());
            buf.put_i32(count);
        } else {
            let count: i16 = codec::checked_len("array length", self.len())?;
            buf.put_i8(WireType::Array.code());
            buf.put_i8(self.element_type().code());
            buf.put_i16(count);
        }
        match self {
            ArrayValue::TinyInt(v) => v.iter().for_each(|x| buf.put_i8(*x)),
            ArrayValue::SmallInt(v) => v.iter().for_each(|x| buf.put_i16(*x)),
            ArrayValue::Integer(v) => v.iter().for_each(|x| buf.put_i32(*x)),
            ArrayValue::BigInt(v) | ArrayValue::Timestamp(v) => {
                v.iter().for_each(|x| buf.put_i64(*x))
            }
            ArrayValue::Float(v) => v.iter().for_each(|x| buf.put_f64(*x)),
            ArrayValue::String(v) => v.iter().for_each(|s| codec::put_string(buf, s)),
            ArrayValue::Decimal(v) => v.iter().for_each(|d| d.encode(buf)),
        }
        Ok(())
    }
}

/// One positional procedure argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Scalar(Value),
    Array(ArrayValue),
}

impl Parameter {
    pub fn serialized_size(&self) -> usize {
        match self {
            Parameter::Array(array) => array.serialized_size(),
            Parameter::Scalar(value) => {
                1 + match value {
                    Value::Null => 0,
                    Value::String(s) => codec::string_size(s),
                    Value::Varbinary(b) => 4 + b.len(),
                    other => other.wire_type().fixed_width().unwrap_or_default(),
                }
            }
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), WireError> {
        let value = match self {
            Parameter::Array(array) => return array.encode(buf),
            Parameter::Scalar(value) => value,
        };
        buf.put_i8(value.wire_type().code());
        match value {
            Value::Null => {}
            Value::TinyInt(x) => buf.put_i8(*x),
            Value::SmallInt(x) => buf.put_i16(*x),
            Value::Integer(x) => buf.put_i32(*x),
            Value::BigInt(x) | Value::Timestamp(x) => buf.put_i64(*x),
            Value::Float(x) => buf.put_f64(*x),
            Value::String(s) => codec::put_string(buf, s),
            Value::Decimal(d) => d.encode(buf),
            Value::Varbinary(b) => codec::put_bytes(buf, b),
        }
        Ok(())
    }
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Parameter::Scalar(value)
    }
}

impl From<ArrayValue> for Parameter {
    fn from(array: ArrayValue) -> Self {
        Parameter::Array(array)
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Parameter::Scalar(Value::string(s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub procedure: String,
    pub client_data: i64,
    pub params: Vec<Parameter>,
}

impl Invocation {
    pub fn new(procedure: impl Into<String>, client_data: i64, params: Vec<Parameter>) -> Self {
        Self {
            procedure: procedure.into(),
            client_data,
            params,
        }
    }

    pub fn serialized_size(&self) -> usize {
        4 + 1
            + codec::string_size(&self.procedure)
            + 8
            + 2
            + self.params.iter().map(Parameter::serialized_size).sum::<usize>()
    }

    pub fn encode(&self) -> Result<Bytes, WireError> {
        if self.params.len() > i16::MAX as usize {
            return Err(WireError::TooManyParameters(self.params.len()));
        }
        let size = self.serialized_size();
        let frame_len: i32 = codec::checked_len("invocation length", size - 4)?;
        let mut buf = BytesMut::with_capacity(size);
        buf.put_i32(frame_len);
        buf.put_i8(0);
        codec::put_string(&mut buf, &self.procedure);
        buf.put_i64(self.client_data);
        buf.put_i16(self.params.len() as i16);
        for param in &self.params {
            param.encode(&mut buf)?;
        }
        if buf.len() != size {
            return Err(WireError::SizeMismatch {
                expected: size,
                actual: buf.len(),
            });
        }
        Ok(buf.freeze())
    }

    /// Reads the procedure name and client data from a framed request.
    pub fn peek_header(frame: &[u8]) -> Result<(String, i64), WireError> {
        let mut buf = codec::frame_body(frame)?;
        let version = codec::get_i8(&mut buf)?;
        if version != 0 {
            return Err(WireError::UnexpectedVersion(version));
        }
        let procedure = codec::get_string(&mut buf)?.unwrap_or_default();
        let client_data = codec::get_i64(&mut buf)?;
        Ok((procedure, client_data))
    }
}

/// Header fields of an invocation response. Result tables are counted, not
/// decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    pub client_data: i64,
    pub status: i8,
    pub status_string: Option<String>,
    pub app_status: i8,
    pub app_status_string: Option<String>,
    pub round_trip: i32,
    pub result_count: i16,
}

impl InvocationResponse {
    const STATUS_STRING_PRESENT: i8 = 1 << 5;
    const EXCEPTION_PRESENT: i8 = 1 << 6;
    const APP_STATUS_STRING_PRESENT: i8 = i8::MIN;

    pub fn success(&self) -> bool {
        self.status == status::SUCCESS
    }

    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        let mut buf = codec::frame_body(frame)?;
        let version = codec::get_i8(&mut buf)?;
        if version != 0 {
            return Err(WireError::UnexpectedVersion(version));
        }
        let client_data = codec::get_i64(&mut buf)?;
        let present = codec::get_i8(&mut buf)?;
        let status = codec::get_i8(&mut buf)?;
        let status_string = if present & Self::STATUS_STRING_PRESENT != 0 {
            codec::get_string(&mut buf)?
        } else {
            None
        };
        let app_status = codec::get_i8(&mut buf)?;
        let app_status_string = if present & Self::APP_STATUS_STRING_PRESENT != 0 {
            codec::get_string(&mut buf)?
        } else {
            None
        };
        let round_trip = codec::get_i32(&mut buf)?;
        if present & Self::EXCEPTION_PRESENT != 0 {
            codec::get_bytes(&mut buf)?;
        }
        let result_count = codec::get_i16(&mut buf)?;
        Ok(Self {
            client_data,
            status,
            status_string,
            app_status,
            app_status_string,
            round_trip,
            result_count,
        })
    }

    /// Minimal framed response carrying only a status, used by tests and the
    /// replay server when no fixture is available.
    pub fn encode_status_only(client_data: i64, status: i8, status_string: Option<&str>) -> Bytes {
        let mut body = BytesMut::new();
        body.put_i8(0);
        body.put_i64(client_data);
        body.put_i8(if status_string.is_some() {
            Self::STATUS_STRING_PRESENT
        } else {
            0
        });
        body.put_i8(status);
        if let Some(s) = status_string {
            codec::put_string(&mut body, s);
        }
        body.put_i8(i8::MIN);
        body.put_i32(0);
        body.put_i16(0);

        let mut framed = BytesMut::with_capacity(4 + body.len());
        framed.put_i32(body.len() as i32);
        framed.put_slice(&body);
        framed.freeze()
    }

    /// Overwrites the client data of a framed response in place.
    pub fn patch_client_data(frame: &mut [u8], client_data: i64) -> Result<(), WireError> {
        let end = RESPONSE_CLIENT_DATA_OFFSET + 8;
        if frame.len() < end {
            return Err(WireError::Truncated {
                needed: end,
                remaining: frame.len(),
            });
        }
        frame[RESPONSE_CLIENT_DATA_OFFSET..end].copy_from_slice(&client_data.to_be_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_invocation_layout() {
        let call = Invocation::new("Select", i64::MIN, vec!["English".into()]);
        let bytes = call.encode().unwrap();

        assert_eq!(bytes.len(), call.serialized_size());
        assert_eq!(&bytes[..4], &((bytes.len() - 4) as i32).to_be_bytes());
        assert_eq!(bytes[4], 0);
        assert_eq!(&bytes[9..15], b"Select");
        assert_eq!(&bytes[15..23], &i64::MIN.to_be_bytes());
        assert_eq!(&bytes[23..25], &1i16.to_be_bytes());
        assert_eq!(bytes[25] as i8, WireType::String.code());
        assert_eq!(
            Invocation::peek_header(&bytes).unwrap(),
            ("Select".to_string(), i64::MIN)
        );
    }

    #[test]
    fn test_byte_arrays_use_wide_count() {
        let param = Parameter::Array(ArrayValue::TinyInt(vec![22, 33, 44]));
        let mut out = BytesMut::new();
        param.encode(&mut out).unwrap();
        assert_eq!(out.len(), param.serialized_size());
        assert_eq!(&out[..], &[0x9d, 3, 0, 0, 0, 3, 22, 33, 44]);

        let param = Parameter::Array(ArrayValue::SmallInt(vec![22, 33]));
        let mut out = BytesMut::new();
        param.encode(&mut out).unwrap();
        assert_eq!(&out[..], &[0x9d, 4, 0, 2, 0, 22, 0, 33]);
    }

    #[test]
    fn test_oversized_array_is_rejected() {
        let fits = Invocation::new("foo", 0, vec![ArrayValue::SmallInt(vec![0; 32_767]).into()]);
        assert!(fits.encode().is_ok());

        let call = Invocation::new("foo", 0, vec![ArrayValue::SmallInt(vec![0; 40_000]).into()]);
        assert_eq!(
            call.encode(),
            Err(WireError::Oversized {
                field: "array length",
                len: 40_000
            })
        );
    }

    #[test]
    fn test_null_parameter_is_type_byte_only() {
        let param = Parameter::Scalar(Value::Null);
        let mut out = BytesMut::new();
        param.encode(&mut out).unwrap();
        assert_eq!(&out[..], &[1]);
        assert_eq!(param.serialized_size(), 1);
    }

    #[test]
    fn test_response_header_decode() {
        let frame = InvocationResponse::encode_status_only(
            i64::MIN + 1,
            status::GRACEFUL_FAILURE,
            Some("VOLTDB ERROR: CONSTRAINT VIOLATION"),
        );
        let response = InvocationResponse::decode(&frame).unwrap();
        assert!(!response.success());
        assert_eq!(response.client_data, i64::MIN + 1);
        assert_eq!(response.app_status, -128);
        assert!(response
            .status_string
            .unwrap()
            .contains("CONSTRAINT VIOLATION"));
        assert_eq!(response.result_count, 0);
    }

    #[test]
    fn test_patch_client_data() {
        let mut frame = InvocationResponse::encode_status_only(1, status::SUCCESS, None).to_vec();
        InvocationResponse::patch_client_data(&mut frame, 99).unwrap();
        assert_eq!(InvocationResponse::decode(&frame).unwrap().client_data, 99);
        assert!(InvocationResponse::patch_client_data(&mut [0u8; 6], 1).is_err());
    }
}
