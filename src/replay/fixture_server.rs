use std::io;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error_handling::types::ReplayError;
use crate::fixtures;
use crate::storage::FixtureStorage;
use crate::wire::codec;
use crate::wire::invocation::status;
use crate::wire::{Invocation, InvocationResponse};

/// Procedure after which the server stops answering and hangs up.
const SHUTDOWN_PROCEDURE: &str = "@Shutdown";

/// Serves captured responses back to clients.
///
/// The first frame of every connection is taken as the login and answered
/// with the authentication response. Each following frame is an invocation,
/// answered with the next response of the plan, the last one repeating. The
/// client data of every reply is patched to echo the request's.
#[derive(Debug, Clone)]
pub struct FixtureServer {
    auth_response: Vec<u8>,
    responses: Vec<Vec<u8>>,
}

impl FixtureServer {
    pub fn new(auth_response: Vec<u8>, responses: Vec<Vec<u8>>) -> Self {
        Self {
            auth_response,
            responses,
        }
    }

    /// Loads the authentication response and the named response fixtures.
    pub fn from_storage<S: AsRef<str>>(
        storage: &dyn FixtureStorage,
        responses: &[S],
    ) -> Result<Self, ReplayError> {
        let auth_response = storage
            .load_fixture(fixtures::AUTH_RESPONSE)
            .map_err(ReplayError::StorageError)?;
        let responses = responses
            .iter()
            .map(|name| storage.load_fixture(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(ReplayError::StorageError)?;
        Ok(Self::new(auth_response, responses))
    }

    /// Accepts connections until the listener fails, serving each one on its
    /// own task.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), ReplayError> {
        info!(
            "Replaying {} response fixture(s) on {}",
            self.responses.len(),
            listener.local_addr()?
        );
        loop {
            let (mut stream, peer) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                match server.handle_connection(&mut stream).await {
                    Ok(answered) => debug!("{} done after {} answer(s)", peer, answered),
                    Err(e) => warn!("{}: {}", peer, e),
                }
            });
        }
    }

    fn response_for(&self, index: usize, client_data: i64) -> Result<Vec<u8>, ReplayError> {
        let mut response = match self.responses.get(index).or_else(|| self.responses.last()) {
            Some(frame) => frame.clone(),
            None => InvocationResponse::encode_status_only(
                client_data,
                status::UNEXPECTED_FAILURE,
                Some("no response fixture to replay"),
            )
            .to_vec(),
        };
        InvocationResponse::patch_client_data(&mut response, client_data)?;
        Ok(response)
    }

    /// Serves one connection until the client hangs up. Returns the number of
    /// frames answered.
    pub async fn handle_connection<S>(&self, stream: &mut S) -> Result<usize, ReplayError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut answered = 0;
        let mut invocations = 0;
        loop {
            let frame = match codec::read_frame(stream).await {
                Ok(frame) => frame,
                Err(e) if is_hang_up(&e) => return Ok(answered),
                Err(e) => return Err(e.into()),
            };

            let reply = if answered == 0 {
                trace!("login: {}", codec::preview(&frame));
                self.auth_response.clone()
            } else {
                let (procedure, client_data) = Invocation::peek_header(&frame)?;
                debug!("{} with client data {}", procedure, client_data);
                if procedure == SHUTDOWN_PROCEDURE {
                    return Ok(answered);
                }
                let reply = self.response_for(invocations, client_data)?;
                invocations += 1;
                reply
            };
            stream.write_all(&reply).await?;
            answered += 1;
        }
    }
}

fn is_hang_up(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
    )
}
