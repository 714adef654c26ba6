//! One-shot capture of the first message sent by a client.
//!
//! The harness owns the single capture buffer. Every read clears it first and
//! only the bytes that read returned are kept or written out.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use uuid::Uuid;

use super::types::{CapturedMessage, Direction};
use crate::configuration::types::Endpoint;
use crate::error_handling::types::{CaptureError, NetworkError};
use crate::network::bind_listener_with_retry;
use crate::storage::FixtureStorage;
use crate::wire::codec;

/// A client connection accepted by [`CaptureHarness::capture_one_exchange`],
/// together with the first message it sent.
#[derive(Debug)]
pub struct InterceptedConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub first_message: CapturedMessage,
}

pub struct CaptureHarness {
    run_id: Uuid,
    storage: Arc<dyn FixtureStorage>,
    buffer: Vec<u8>,
    rebind_timeout: Duration,
}

impl CaptureHarness {
    pub fn new(run_id: Uuid, storage: Arc<dyn FixtureStorage>, buffer_size: usize) -> Self {
        Self {
            run_id,
            storage,
            buffer: vec![0u8; buffer_size],
            rebind_timeout: Duration::ZERO,
        }
    }

    /// How long a bind keeps retrying while the listen address is in use.
    pub fn with_rebind_timeout(mut self, timeout: Duration) -> Self {
        self.rebind_timeout = timeout;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Binds `endpoint`, accepts exactly one connection and captures the first
    /// message read from it into `fixture`.
    ///
    /// `launch` is called once the listener is bound, with the address it is
    /// actually bound to, and is where the caller starts its client. Its
    /// result is handed back untouched. The listener is closed before this
    /// returns, so the next phase can bind the same endpoint again.
    ///
    /// # Errors
    ///
    /// - `CaptureError::NetworkError` if the endpoint cannot be bound within
    ///   the rebind timeout or the accept fails
    /// - `CaptureError::PeerClosed` if the client hangs up before sending
    ///   anything
    /// - `CaptureError::StorageError` if the fixture cannot be written
    pub async fn capture_one_exchange<F, T>(
        &mut self,
        endpoint: &Endpoint,
        fixture: Option<&str>,
        launch: F,
    ) -> Result<(InterceptedConnection, T), CaptureError>
    where
        F: FnOnce(SocketAddr) -> T,
    {
        let listener = bind_listener_with_retry(endpoint, self.rebind_timeout).await?;
        let local = listener.local_addr().map_err(NetworkError::SockError)?;
        debug!("[{}] waiting for one client on {}", self.run_id, local);

        let launched = launch(local);

        let (mut stream, peer) = listener.accept().await.map_err(|e| {
            error!("[{}] accept on {} failed: {}", self.run_id, local, e);
            NetworkError::AcceptFailed(e)
        })?;
        drop(listener);
        stream.set_nodelay(true).map_err(NetworkError::SockError)?;
        debug!("[{}] accepted {} on {}", self.run_id, peer, local);

        let first_message = self
            .read_message(&mut stream, Direction::ClientToServer, fixture)
            .await?;

        Ok((
            InterceptedConnection {
                stream,
                peer,
                first_message,
            },
            launched,
        ))
    }

    /// Clears the buffer, performs a single read and records what it returned.
    pub async fn read_message<R>(
        &mut self,
        reader: &mut R,
        direction: Direction,
        fixture: Option<&str>,
    ) -> Result<CapturedMessage, CaptureError>
    where
        R: AsyncRead + Unpin,
    {
        self.buffer.fill(0);
        let n = reader
            .read(&mut self.buffer)
            .await
            .map_err(CaptureError::TcpStreamError)?;
        if n == 0 {
            return Err(CaptureError::PeerClosed(direction));
        }

        let bytes = &self.buffer[..n];
        trace!(
            "[{}] captured {} {} bytes: {}",
            self.run_id,
            direction,
            n,
            codec::preview(bytes)
        );
        self.record(fixture, bytes)?;
        Ok(CapturedMessage::new(fixture, direction, bytes))
    }

    /// Writes `bytes` to `fixture` when one is named.
    pub fn record(&self, fixture: Option<&str>, bytes: &[u8]) -> Result<(), CaptureError> {
        if let Some(name) = fixture {
            let path = self.storage.save_fixture(name, bytes)?;
            info!(
                "[{}] wrote {} ({} bytes)",
                self.run_id,
                path.display(),
                bytes.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::bind_listener;
    use crate::storage::FileStorage;
    use std::fs;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    fn harness(dir: &TempDir, buffer_size: usize) -> CaptureHarness {
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        CaptureHarness::new(Uuid::new_v4(), storage, buffer_size)
    }

    fn ephemeral() -> Endpoint {
        Endpoint::new("127.0.0.1", 0)
    }

    #[tokio::test]
    async fn test_only_bytes_read_are_written() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir, 8096);

        let (intercepted, client) = harness
            .capture_one_exchange(&ephemeral(), Some("first.msg"), |addr| {
                tokio::spawn(async move {
                    let mut stream = TcpStream::connect(addr).await?;
                    stream.write_all(b"hello").await?;
                    stream.flush().await?;
                    Ok::<_, std::io::Error>(stream)
                })
            })
            .await
            .unwrap();

        assert_eq!(intercepted.first_message.bytes, b"hello");
        assert_eq!(
            intercepted.first_message.fixture.as_deref(),
            Some("first.msg")
        );
        assert_eq!(fs::read(dir.path().join("first.msg")).unwrap(), b"hello");
        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_listener_is_released() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir, 64);

        let (intercepted, _) = harness
            .capture_one_exchange(&ephemeral(), None, |addr| {
                tokio::spawn(async move {
                    let mut stream = TcpStream::connect(addr).await.unwrap();
                    stream.write_all(b"x").await.unwrap();
                    stream
                })
            })
            .await
            .unwrap();

        let port = intercepted.stream.local_addr().unwrap().port();
        assert!(bind_listener(&Endpoint::new("127.0.0.1", port)).await.is_ok());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_hang_up_before_sending() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir, 64);

        let err = harness
            .capture_one_exchange(&ephemeral(), Some("never.msg"), |addr| {
                tokio::spawn(async move {
                    drop(TcpStream::connect(addr).await);
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CaptureError::PeerClosed(Direction::ClientToServer)
        ));
        assert!(!dir.path().join("never.msg").exists());
    }

    #[tokio::test]
    async fn test_read_clears_buffer_between_messages() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir, 64);
        let mut reader = tokio_test::io::Builder::new()
            .read(b"a longer message")
            .read(b"tiny")
            .build();

        let first = harness
            .read_message(&mut reader, Direction::ServerToClient, Some("one.msg"))
            .await
            .unwrap();
        let second = harness
            .read_message(&mut reader, Direction::ServerToClient, Some("two.msg"))
            .await
            .unwrap();

        assert_eq!(first.len(), 16);
        assert_eq!(second.bytes, b"tiny");
        assert_eq!(fs::read(dir.path().join("two.msg")).unwrap(), b"tiny");
    }
}
