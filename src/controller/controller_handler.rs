use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::operator::OperatorPrompt;
use crate::configuration::config::Config;
use crate::configuration::types::Phase;
use crate::data_capture::{CaptureHarness, CapturedMessage, Direction, InterceptedConnection, Relay};
use crate::error_handling::types::{CaptureError, ClientError, ControllerError};
use crate::fixtures;
use crate::network;
use crate::simulated_client::{spawn_client, ClientReport, ClientScript};
use crate::storage::{CaptureManifest, CaptureRecord, FixtureStorage, RecordKind};
use crate::wire::{AuthenticationResponse, HashScheme};

type ClientHandle = JoinHandle<Result<ClientReport, ClientError>>;

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub fixtures: Vec<CaptureRecord>,
    pub reports: Vec<ClientReport>,
}

pub struct Controller {
    config: Config,
    storage: Arc<dyn FixtureStorage>,
    prompt: Arc<dyn OperatorPrompt>,
    harness: CaptureHarness,
    records: Vec<CaptureRecord>,
    clients: Vec<(Phase, ClientHandle)>,
    /// SHA-1 client connection kept open for the relay.
    pending_login: Option<InterceptedConnection>,
    /// Raw authentication response captured by the relay.
    auth_reply: Option<Vec<u8>>,
}

impl Controller {
    /// Creates a controller for one run.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated again here, since it may have been built by hand
    /// * `storage` - Where fixtures and the manifest are written
    /// * `prompt` - Asked for confirmation before the relay connects upstream
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::ConfigurationError` if `config` is invalid.
    pub fn new(
        config: Config,
        storage: Arc<dyn FixtureStorage>,
        prompt: Arc<dyn OperatorPrompt>,
    ) -> Result<Self, ControllerError> {
        config.validate().map_err(|e| {
            error!("[!] Invalid configuration: {}", e);
            e
        })?;
        let run_id = Uuid::new_v4();
        let harness = CaptureHarness::new(run_id, Arc::clone(&storage), config.buffer_size)
            .with_rebind_timeout(config.rebind_timeout());
        info!("[{}] controller ready, fixtures go to {}", run_id, storage.root().display());

        Ok(Self {
            config,
            storage,
            prompt,
            harness,
            records: Vec::new(),
            clients: Vec::new(),
            pending_login: None,
            auth_reply: None,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.harness.run_id()
    }

    /// Runs every enabled phase in order, joins the simulated clients and
    /// writes the manifest.
    pub async fn run(mut self) -> Result<RunSummary, ControllerError> {
        let started_at = Utc::now();
        for phase in self.config.ordered_phases() {
            info!("[{}] phase {}", self.run_id(), phase);
            match phase {
                Phase::AuthSha256 => self.capture_login(phase, HashScheme::Sha256).await?,
                Phase::AuthSha1 => self.capture_login(phase, HashScheme::Sha1).await?,
                Phase::Relay => self.relay().await?,
                Phase::AllParams => self.capture_all_params().await?,
                Phase::Table => self.write_table()?,
            }
        }
        // A login kept for a relay that never ran is simply dropped here.
        self.pending_login = None;

        let reports = self.join_clients().await;
        if self.config.write_manifest {
            self.write_manifest(started_at)?;
        }
        info!(
            "[{}] run complete, {} fixture(s) written",
            self.run_id(),
            self.records.len()
        );

        Ok(RunSummary {
            run_id: self.run_id(),
            fixtures: self.records,
            reports,
        })
    }

    fn note(&mut self, message: &CapturedMessage) {
        if let Some(file) = &message.fixture {
            self.records.push(CaptureRecord {
                file: file.clone(),
                kind: message.direction.into(),
                bytes: message.len(),
                captured_at: message.captured_at,
            });
        }
    }

    /// Captures the login of a hello-world client using `scheme`. The
    /// connection is dropped right away unless the relay needs it.
    async fn capture_login(&mut self, phase: Phase, scheme: HashScheme) -> Result<(), ControllerError> {
        let fixture = match scheme {
            HashScheme::Sha256 => fixtures::AUTH_REQUEST_SHA256,
            HashScheme::Sha1 => fixtures::AUTH_REQUEST,
        };
        let script = ClientScript::hello_world(phase.as_str(), self.config.client.clone(), scheme);
        let (intercepted, handle) = self
            .harness
            .capture_one_exchange(&self.config.listen, Some(fixture), |addr| {
                spawn_client(addr, script)
            })
            .await?;
        self.note(&intercepted.first_message);
        self.clients.push((phase, handle));

        if phase == Phase::AuthSha1 && self.config.is_enabled(Phase::Relay) {
            debug!("[{}] keeping {} for the relay", self.run_id(), intercepted.peer);
            self.pending_login = Some(intercepted);
        }
        Ok(())
    }

    async fn confirm(&self, message: String) -> Result<(), ControllerError> {
        let prompt = Arc::clone(&self.prompt);
        tokio::task::spawn_blocking(move || prompt.confirm(&message))
            .await
            .map_err(|e| ControllerError::PromptFailed(io::Error::new(io::ErrorKind::Other, e)))?
            .map_err(ControllerError::PromptFailed)
    }

    /// Forwards the kept SHA-1 login upstream, then relays the exchange
    /// script between that client and the real server.
    async fn relay(&mut self) -> Result<(), ControllerError> {
        let intercepted = self.pending_login.take().ok_or_else(|| {
            ControllerError::PhaseDependency("relay ran without an auth_sha1 connection".to_string())
        })?;

        self.confirm(format!(
            "Start a fresh database server on {} with the HelloWorld schema loaded \
             and authentication disabled, then press Enter. The relay logs in, \
             runs a few procedure invocations and finally shuts the server down.",
            self.config.upstream
        ))
        .await?;
        let upstream = network::connect(&self.config.upstream).await?;

        let login = intercepted.first_message.bytes;
        let mut relay = Relay::new(&mut self.harness, intercepted.stream, upstream);
        relay.forward(&login, Direction::ClientToServer, None).await?;
        let response = relay
            .relay_step(Direction::ServerToClient, Some(fixtures::AUTH_RESPONSE))
            .await?;
        let messages = relay.run_exchanges(&self.config.relay.exchanges).await?;
        relay.close().await;

        match AuthenticationResponse::decode(&response.bytes) {
            Ok(decoded) if decoded.success() => {}
            Ok(decoded) => warn!(
                "[{}] upstream rejected the login with code {}",
                self.run_id(),
                decoded.result_code
            ),
            Err(e) => warn!("[{}] captured authentication response: {}", self.run_id(), e),
        }
        self.auth_reply = Some(response.bytes.clone());
        self.note(&response);
        for message in &messages {
            self.note(message);
        }
        Ok(())
    }

    /// Logs in the all-params client, records its only invocation and hangs
    /// up without answering it.
    async fn capture_all_params(&mut self) -> Result<(), ControllerError> {
        let script = ClientScript::all_params()?;
        let (mut intercepted, handle) = self
            .harness
            .capture_one_exchange(&self.config.listen, None, |addr| spawn_client(addr, script))
            .await?;
        self.clients.push((Phase::AllParams, handle));

        let reply = match &self.auth_reply {
            Some(bytes) => bytes.clone(),
            None => {
                debug!("[{}] no captured login response, answering a synthetic one", self.run_id());
                AuthenticationResponse::synthetic().encode().to_vec()
            }
        };
        intercepted
            .stream
            .write_all(&reply)
            .await
            .map_err(CaptureError::TcpStreamError)?;

        let message = self
            .harness
            .read_message(
                &mut intercepted.stream,
                Direction::ClientToServer,
                Some(fixtures::INVOCATION_REQUEST_ALL_PARAMS),
            )
            .await?;
        self.note(&message);
        Ok(())
    }

    fn write_table(&mut self) -> Result<(), ControllerError> {
        let bytes = fixtures::canonical_table()?.serialize()?;
        let path = self.storage.save_fixture(fixtures::SERIALIZED_TABLE, &bytes)?;
        info!("[{}] wrote {} ({} bytes)", self.run_id(), path.display(), bytes.len());
        self.records.push(CaptureRecord {
            file: fixtures::SERIALIZED_TABLE.to_string(),
            kind: RecordKind::Table,
            bytes: bytes.len(),
            captured_at: Utc::now(),
        });
        Ok(())
    }

    /// Awaits every simulated client. Failures are logged and never fail the
    /// run.
    async fn join_clients(&mut self) -> Vec<ClientReport> {
        let mut reports = Vec::new();
        for (phase, handle) in self.clients.drain(..) {
            match handle.await {
                Ok(Ok(report)) => {
                    for call in report.unexpected() {
                        warn!(
                            "[{}] {} client: {} ended {:?}, expected {:?}",
                            self.harness.run_id(),
                            phase,
                            call.procedure,
                            call.outcome,
                            call.expect
                        );
                    }
                    debug!(
                        "[{}] {} client finished {} call(s)",
                        self.harness.run_id(),
                        phase,
                        report.calls.len()
                    );
                    reports.push(report);
                }
                Ok(Err(ClientError::ConnectionClosed)) => {
                    debug!("[{}] {} client was hung up on", self.harness.run_id(), phase)
                }
                Ok(Err(e)) => warn!("[{}] {} client failed: {}", self.harness.run_id(), phase, e),
                Err(e) => warn!("[{}] {} client task: {}", self.harness.run_id(), phase, e),
            }
        }
        reports
    }

    fn write_manifest(&self, started_at: DateTime<Utc>) -> Result<(), ControllerError> {
        let manifest = CaptureManifest {
            run_id: self.run_id(),
            started_at,
            finished_at: Utc::now(),
            buffer_size: self.config.buffer_size,
            records: self.records.clone(),
        };
        let path = self.storage.save_manifest(&manifest)?;
        info!("[{}] manifest written to {}", self.run_id(), path.display());
        Ok(())
    }
}
