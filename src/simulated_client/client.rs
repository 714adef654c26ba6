use std::net::SocketAddr;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use super::script::{ClientScript, Expectation};
use crate::error_handling::types::ClientError;
use crate::wire::codec;
use crate::wire::{AuthenticationRequest, AuthenticationResponse, Invocation, InvocationResponse};

/// First client data handle of every connection.
pub const FIRST_CLIENT_DATA: i64 = i64::MIN;

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Succeeded,
    Failed {
        status: i8,
        status_string: Option<String>,
    },
    /// Written without waiting for a response.
    Sent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub procedure: String,
    pub client_data: i64,
    pub expect: Expectation,
    pub outcome: CallOutcome,
}

impl CallRecord {
    pub fn as_expected(&self) -> bool {
        matches!(
            (self.expect, &self.outcome),
            (Expectation::Success, CallOutcome::Succeeded)
                | (Expectation::Failure, CallOutcome::Failed { .. })
                | (Expectation::NoResponse, CallOutcome::Sent)
        )
    }
}

/// Everything a client observed before its script ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientReport {
    pub name: String,
    pub login: AuthenticationResponse,
    pub calls: Vec<CallRecord>,
}

impl ClientReport {
    pub fn unexpected(&self) -> impl Iterator<Item = &CallRecord> {
        self.calls.iter().filter(|c| !c.as_expected())
    }
}

/// Runs a script over an already established stream.
///
/// The login is written first and its response must report success. Each
/// call then gets the next client data handle, starting at
/// [`FIRST_CLIENT_DATA`], and every response must echo that handle back.
pub async fn run_script<S>(stream: &mut S, script: &ClientScript) -> Result<ClientReport, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let login = AuthenticationRequest::new(&script.credentials, script.scheme).encode();
    trace!("[{}] login {} bytes: {}", script.name, login.len(), codec::preview(&login));
    stream.write_all(&login).await?;

    let frame = codec::read_frame(stream).await?;
    let login = AuthenticationResponse::decode(&frame)?;
    if !login.success() {
        return Err(ClientError::AuthenticationRejected(login.result_code));
    }
    debug!("[{}] logged in, connection id {}", script.name, login.connection_id);

    let mut calls = Vec::with_capacity(script.calls.len());
    let mut client_data = FIRST_CLIENT_DATA;
    for call in &script.calls {
        let request = Invocation::new(call.procedure.as_str(), client_data, call.params.clone()).encode()?;
        stream.write_all(&request).await?;
        debug!(
            "[{}] sent {} ({} bytes, client data {})",
            script.name,
            call.procedure,
            request.len(),
            client_data
        );

        let outcome = if call.expect == Expectation::NoResponse {
            CallOutcome::Sent
        } else {
            let frame = codec::read_frame(stream).await?;
            let response = InvocationResponse::decode(&frame)?;
            if response.client_data != client_data {
                return Err(ClientError::ClientDataMismatch {
                    expected: client_data,
                    actual: response.client_data,
                });
            }
            if response.success() {
                CallOutcome::Succeeded
            } else {
                CallOutcome::Failed {
                    status: response.status,
                    status_string: response.status_string,
                }
            }
        };

        calls.push(CallRecord {
            procedure: call.procedure.clone(),
            client_data,
            expect: call.expect,
            outcome,
        });
        client_data = client_data.wrapping_add(1);
    }
    stream.flush().await?;

    Ok(ClientReport {
        name: script.name.clone(),
        login,
        calls,
    })
}

async fn connect_and_run(addr: SocketAddr, script: ClientScript) -> Result<ClientReport, ClientError> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    debug!("[{}] connected to {}", script.name, addr);
    run_script(&mut stream, &script).await
}

/// Spawns a client task against `addr`. The caller owns the handle and is
/// expected to await it.
pub fn spawn_client(addr: SocketAddr, script: ClientScript) -> JoinHandle<Result<ClientReport, ClientError>> {
    tokio::spawn(connect_and_run(addr, script))
}
