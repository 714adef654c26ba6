//! Message-at-a-time relay between an intercepted client and a real server.
//!
//! Each step reads once from one side, optionally records the bytes, and
//! writes them unchanged to the other side. Steps are strictly sequential and
//! every read is taken to be one whole message.

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::capture::CaptureHarness;
use super::types::{CapturedMessage, Direction};
use crate::configuration::types::Exchange;
use crate::error_handling::types::CaptureError;

pub struct Relay<'h, C, S> {
    harness: &'h mut CaptureHarness,
    client: C,
    server: S,
}

impl<'h, C, S> Relay<'h, C, S>
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(harness: &'h mut CaptureHarness, client: C, server: S) -> Self {
        Self {
            harness,
            client,
            server,
        }
    }

    async fn write_to(&mut self, direction: Direction, bytes: &[u8]) -> Result<(), CaptureError> {
        let result = match direction {
            Direction::ClientToServer => self.server.write_all(bytes).await,
            Direction::ServerToClient => self.client.write_all(bytes).await,
        };
        result.map_err(CaptureError::TcpStreamError)
    }

    /// Sends bytes read earlier, such as the captured login, in `direction`,
    /// recording them into `fixture` when one is named.
    pub async fn forward(
        &mut self,
        bytes: &[u8],
        direction: Direction,
        fixture: Option<&str>,
    ) -> Result<CapturedMessage, CaptureError> {
        self.harness.record(fixture, bytes)?;
        self.write_to(direction, bytes).await?;
        debug!(
            "[{}] forwarded {} bytes {}",
            self.harness.run_id(),
            bytes.len(),
            direction
        );
        Ok(CapturedMessage::new(fixture, direction, bytes))
    }

    /// Reads one message flowing in `direction`, records it, and passes it on.
    pub async fn relay_step(
        &mut self,
        direction: Direction,
        fixture: Option<&str>,
    ) -> Result<CapturedMessage, CaptureError> {
        let message = match direction {
            Direction::ClientToServer => {
                self.harness
                    .read_message(&mut self.client, direction, fixture)
                    .await?
            }
            Direction::ServerToClient => {
                self.harness
                    .read_message(&mut self.server, direction, fixture)
                    .await?
            }
        };
        self.write_to(direction, &message.bytes).await?;
        debug!(
            "[{}] relayed {} bytes {}",
            self.harness.run_id(),
            message.len(),
            direction
        );
        Ok(message)
    }

    /// Walks the exchange list in order: the client's request goes to the
    /// server, then, unless the exchange is one-way, the server's answer goes
    /// back to the client.
    pub async fn run_exchanges(
        &mut self,
        exchanges: &[Exchange],
    ) -> Result<Vec<CapturedMessage>, CaptureError> {
        let mut messages = Vec::new();
        for exchange in exchanges {
            info!("[{}] relaying {}", self.harness.run_id(), exchange.name);
            messages.push(
                self.relay_step(Direction::ClientToServer, exchange.request.as_deref())
                    .await?,
            );
            if !exchange.one_way {
                messages.push(
                    self.relay_step(Direction::ServerToClient, exchange.response.as_deref())
                        .await?,
                );
            }
        }
        Ok(messages)
    }

    /// Shuts both sockets down and releases them.
    pub async fn close(mut self) {
        if let Err(e) = self.client.shutdown().await {
            debug!("[{}] client shutdown: {}", self.harness.run_id(), e);
        }
        if let Err(e) = self.server.shutdown().await {
            debug!("[{}] server shutdown: {}", self.harness.run_id(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::types::Endpoint;
    use crate::storage::FileStorage;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::net::{TcpListener, TcpStream};
    use uuid::Uuid;

    fn harness(dir: &TempDir) -> CaptureHarness {
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        CaptureHarness::new(Uuid::new_v4(), storage, 8096)
    }

    #[tokio::test]
    async fn test_login_relay_records_request_and_response() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir);

        // Upstream answers R1 only to exactly P1.
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = upstream.accept().await.unwrap();
            let mut request = [0u8; 2];
            stream.read_exact(&mut request).await.unwrap();
            if &request == b"P1" {
                stream.write_all(b"R1").await.unwrap();
            }
            stream
        });

        let (intercepted, client) = harness
            .capture_one_exchange(
                &Endpoint::new("127.0.0.1", 0),
                Some("authentication_request.msg"),
                |addr| {
                    tokio::spawn(async move {
                        let mut stream = TcpStream::connect(addr).await.unwrap();
                        stream.write_all(b"P1").await.unwrap();
                        let mut reply = [0u8; 2];
                        stream.read_exact(&mut reply).await.unwrap();
                        reply
                    })
                },
            )
            .await
            .unwrap();

        let upstream_stream = TcpStream::connect(upstream_addr).await.unwrap();
        let login = intercepted.first_message.bytes.clone();
        let mut relay = Relay::new(&mut harness, intercepted.stream, upstream_stream);
        relay
            .forward(&login, Direction::ClientToServer, None)
            .await
            .unwrap();
        let response = relay
            .relay_step(Direction::ServerToClient, Some("authentication_response.msg"))
            .await
            .unwrap();
        relay.close().await;

        assert_eq!(response.bytes, b"R1");
        assert_eq!(&client.await.unwrap(), b"R1");
        server.await.unwrap();
        assert_eq!(
            fs::read(dir.path().join("authentication_request.msg")).unwrap(),
            b"P1"
        );
        assert_eq!(
            fs::read(dir.path().join("authentication_response.msg")).unwrap(),
            b"R1"
        );
    }

    #[tokio::test]
    async fn test_exchanges_pass_bytes_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir);
        let (mut client, relay_client) = duplex(1024);
        let (relay_server, mut server) = duplex(1024);

        let exchanges = vec![
            Exchange::round_trip("insert", "req.msg", "resp.msg"),
            Exchange::one_way("shutdown", None),
        ];

        let peers = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            client.write_all(&[1, 2, 3]).await.unwrap();
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &[1, 2, 3]);
            server.write_all(&[9, 8]).await.unwrap();
            let n = client.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &[9, 8]);
            client.write_all(b"bye").await.unwrap();
            let n = server.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"bye");
        });

        let mut relay = Relay::new(&mut harness, relay_client, relay_server);
        let messages = relay.run_exchanges(&exchanges).await.unwrap();
        relay.close().await;
        peers.await.unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].fixture, None);
        assert_eq!(fs::read(dir.path().join("req.msg")).unwrap(), vec![1, 2, 3]);
        assert_eq!(fs::read(dir.path().join("resp.msg")).unwrap(), vec![9, 8]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_server_hang_up_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut harness = harness(&dir);
        let (mut client, relay_client) = duplex(64);
        let (relay_server, server) = duplex(64);
        drop(server);

        client.write_all(b"req").await.unwrap();
        let mut relay = Relay::new(&mut harness, relay_client, relay_server);
        let err = relay
            .run_exchanges(&[Exchange::round_trip("insert", "req.msg", "resp.msg")])
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::TcpStreamError(_)));
    }
}
