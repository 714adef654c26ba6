use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::fixtures;
use crate::wire::Credentials;

/// Smallest capture buffer accepted. A login message alone is close to this.
pub const MIN_BUFFER_SIZE: usize = 64;
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

fn default_buffer_size() -> usize {
    8096
}

fn default_rebind_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_phases() -> Vec<Phase> {
    Phase::ALL.to_vec()
}

/// Runtime configuration of a capture run.
///
/// Every field has a default, so an empty TOML file is a valid configuration
/// describing a full run against `localhost:21212`. Command-line flags are
/// applied on top with [`Config::apply_cli`].
///
/// # Fields Overview
///
/// - `output_dir`: where fixtures are written. When unset, the
///   `VOLTCAP_OUTPUT_DIR` environment variable is used, then the current
///   directory
/// - `buffer_size`: size of the single capture buffer, which bounds the size
///   of any captured message
/// - `phases`: enabled phases; they always run in their fixed order
/// - `write_manifest`: write `capture_manifest.json` at the end of the run
/// - `prompt`: wait for the operator before relaying to the real server
/// - `listen`: where the harness accepts simulated clients
/// - `rebind_timeout_ms`: how long binding `listen` keeps retrying while the
///   port is still held, typically by a real server sharing it that is
///   shutting down after the relay
/// - `upstream`: the real server used by the relay phase
/// - `client`: credentials used by the simulated login clients
/// - `relay`: the exchange script relayed after the login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default = "default_phases")]
    pub phases: Vec<Phase>,

    #[serde(default = "default_true")]
    pub write_manifest: bool,

    #[serde(default = "default_true")]
    pub prompt: bool,

    #[serde(default)]
    pub listen: Endpoint,

    #[serde(default = "default_rebind_timeout_ms")]
    pub rebind_timeout_ms: u64,

    #[serde(default)]
    pub upstream: Endpoint,

    #[serde(default)]
    pub client: Credentials,

    #[serde(default)]
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            buffer_size: default_buffer_size(),
            phases: default_phases(),
            write_manifest: true,
            prompt: true,
            listen: Endpoint::default(),
            rebind_timeout_ms: default_rebind_timeout_ms(),
            upstream: Endpoint::default(),
            client: Credentials::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            error!("[!] Unable to read configuration file {}: {}", path.display(), e);
            ConfigError::IoError(e)
        })?;
        let config = Self::from_toml(&content)?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn rebind_timeout(&self) -> Duration {
        Duration::from_millis(self.rebind_timeout_ms)
    }

    pub fn is_enabled(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    /// Enabled phases in run order, without duplicates.
    pub fn ordered_phases(&self) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|p| self.is_enabled(*p))
            .collect()
    }

    /// Checks the configuration for anything that would only fail halfway
    /// through a run.
    ///
    /// # Errors
    ///
    /// - `NoPhases` if nothing is enabled
    /// - `NotInRange` for a buffer size outside
    ///   `MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE` or a relay towards port 0
    /// - `PhaseDependency` when `relay` is enabled without `auth_sha1`, since
    ///   the relay forwards the login captured by that phase
    /// - `InvalidExchange` for an unnamed exchange or a one-way exchange that
    ///   names a response file
    /// - `DuplicateFixture` when two captures would write the same file
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phases.is_empty() {
            return Err(ConfigError::NoPhases);
        }
        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(ConfigError::NotInRange(format!(
                "buffer_size {} not in {}..={}",
                self.buffer_size, MIN_BUFFER_SIZE, MAX_BUFFER_SIZE
            )));
        }

        if self.is_enabled(Phase::Relay) {
            if !self.is_enabled(Phase::AuthSha1) {
                return Err(ConfigError::PhaseDependency(
                    "relay needs the login captured by auth_sha1".to_string(),
                ));
            }
            if self.upstream.port == 0 {
                return Err(ConfigError::NotInRange(
                    "upstream port must not be 0".to_string(),
                ));
            }
            for exchange in &self.relay.exchanges {
                if exchange.name.is_empty() {
                    return Err(ConfigError::InvalidExchange(
                        "exchange without a name".to_string(),
                    ));
                }
                if exchange.one_way && exchange.response.is_some() {
                    return Err(ConfigError::InvalidExchange(format!(
                        "{} is one-way but names a response file",
                        exchange.name
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for name in self.expected_fixtures() {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateFixture(name));
            }
        }
        Ok(())
    }

    /// Fixture files a run with this configuration writes, in write order.
    pub fn expected_fixtures(&self) -> Vec<String> {
        let mut names = Vec::new();
        for phase in self.ordered_phases() {
            match phase {
                Phase::AuthSha256 => names.push(fixtures::AUTH_REQUEST_SHA256.to_string()),
                Phase::AuthSha1 => names.push(fixtures::AUTH_REQUEST.to_string()),
                Phase::Relay => {
                    names.push(fixtures::AUTH_RESPONSE.to_string());
                    names.extend(
                        self.relay
                            .exchanges
                            .iter()
                            .flat_map(|e| e.fixtures().map(str::to_string)),
                    );
                }
                Phase::AllParams => names.push(fixtures::INVOCATION_REQUEST_ALL_PARAMS.to_string()),
                Phase::Table => names.push(fixtures::SERIALIZED_TABLE.to_string()),
            }
        }
        names
    }

    /// Applies command-line overrides, then validates the result.
    pub fn apply_cli(&mut self, args: &CliArgs) -> Result<(), ConfigError> {
        if let Some(dir) = &args.output_dir {
            self.output_dir = Some(dir.clone());
        }
        if let Some(port) = args.listen_port {
            self.listen.port = port;
        }
        if let Some(upstream) = &args.upstream {
            self.upstream = upstream.clone();
        }
        if !args.phases.is_empty() {
            self.phases = args.phases.clone();
        }
        if args.no_prompt {
            self.prompt = false;
        }
        self.validate()
    }
}

/// Capture fixtures of a database wire protocol from simulated clients.
///
/// Every flag overrides the matching configuration file entry.
#[derive(Parser, Debug, Clone)]
#[command(name = "voltcap")]
#[command(version)]
#[command(about = "Capture database wire protocol fixtures from simulated clients")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    ///
    /// # Command Line
    /// Use `--config <FILE>` or the `VOLTCAP_CONFIG` environment variable
    #[arg(long, short = 'c', env = "VOLTCAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory the fixtures are written to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Port the harness listens on for simulated clients
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Real server used by the relay phase, as `host:port`
    #[arg(long, value_name = "HOST:PORT")]
    pub upstream: Option<Endpoint>,

    /// Phase to run. Repeat to enable several; all phases run by default
    #[arg(long = "phase", value_name = "PHASE")]
    pub phases: Vec<Phase>,

    /// Do not wait for the operator before relaying to the real server
    ///
    /// # Command Line
    /// This is a boolean flag that doesn't take a value
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_prompt: bool,

    /// Log level filter: off, error, warn, info, debug or trace
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: log::LevelFilter,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the enabled capture phases (default)
    Capture,
    /// Check the fixtures already present in the output directory
    Verify,
    /// Serve captured fixtures to clients on the listen port
    Replay {
        /// Response fixture answered to successive calls, in order
        #[arg(long = "response", value_name = "FILE")]
        responses: Vec<String>,
    },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Capture)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level
    }

    /// Loads the configuration file if one was given, or the defaults, then
    /// applies the flags on top.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_cli(self)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn from_args_under_test(extra: &[&str]) -> Result<CliArgs, clap::Error> {
        let mut args = vec!["voltcap"];
        args.extend_from_slice(extra);
        CliArgs::try_parse_from(args)
    }

    #[test]
    fn test_empty_file_is_full_run() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ordered_phases(), Phase::ALL.to_vec());
        assert_eq!(config.expected_fixtures().len(), fixtures::ALL.len());
        assert_eq!(config.buffer_size, 8096);
        assert_eq!(config.rebind_timeout_ms, 5000);
    }

    #[test]
    fn test_expected_fixtures_match_canonical_order() {
        let config = Config::default();
        let expected: Vec<String> = fixtures::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(config.expected_fixtures(), expected);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
output_dir = "/tmp/fixtures"
phases = ["table", "auth_sha256"]
prompt = false

[listen]
host = "127.0.0.1"
port = 31313

[client]
username = "alice"
password = "secret"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/fixtures")));
        assert_eq!(
            config.ordered_phases(),
            vec![Phase::AuthSha256, Phase::Table]
        );
        assert_eq!(config.listen, Endpoint::new("127.0.0.1", 31313));
        assert_eq!(config.client.username, "alice");
        assert_eq!(config.client.service, "database");
        assert!(!config.prompt);
        assert!(config.write_manifest);
    }

    #[test]
    fn test_relay_exchanges_from_file() {
        let config = Config::from_toml(
            r#"
[[relay.exchanges]]
name = "ping"
request = "ping_request.msg"
response = "ping_response.msg"

[[relay.exchanges]]
name = "bye"
one_way = true
"#,
        )
        .unwrap();
        assert_eq!(config.relay.exchanges.len(), 2);
        assert!(config.relay.exchanges[1].one_way);
        assert!(config
            .expected_fixtures()
            .contains(&"ping_response.msg".to_string()));
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            Config::from_toml("phases = []"),
            Err(ConfigError::NoPhases)
        ));
        assert!(matches!(
            Config::from_toml(r#"phases = ["relay"]"#),
            Err(ConfigError::PhaseDependency(_))
        ));
        assert!(matches!(
            Config::from_toml("buffer_size = 3"),
            Err(ConfigError::NotInRange(_))
        ));
        assert!(matches!(
            Config::from_toml(r#"phases = ["teleport"]"#),
            Err(ConfigError::TomlError(_))
        ));
        assert!(matches!(
            Config::from_toml(
                r#"
[[relay.exchanges]]
name = "again"
request = "authentication_request.msg"
"#
            ),
            Err(ConfigError::DuplicateFixture(_))
        ));
        assert!(matches!(
            Config::from_toml(
                r#"
[[relay.exchanges]]
name = "bye"
response = "bye.msg"
one_way = true
"#
            ),
            Err(ConfigError::InvalidExchange(_))
        ));
    }

    #[test]
    fn test_from_args() {
        let args = from_args_under_test(&[
            "--output-dir",
            "/tmp",
            "--listen-port",
            "0",
            "--upstream",
            "db.internal:21211",
            "--phase",
            "auth_sha1",
            "--phase",
            "relay",
            "--no-prompt",
            "verify",
        ])
        .unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(args.command(), Command::Verify);
        assert_eq!(args.level_filter(), log::LevelFilter::Info);

        let mut config = Config::default();
        config.apply_cli(&args).unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(config.listen.port, 0);
        assert_eq!(config.upstream, Endpoint::new("db.internal", 21211));
        assert_eq!(config.ordered_phases(), vec![Phase::AuthSha1, Phase::Relay]);
        assert!(!config.prompt);
    }

    #[test]
    fn test_from_args_defaults_and_replay() {
        let args = from_args_under_test(&[]).unwrap();
        assert_eq!(args.command(), Command::Capture);
        assert!(args.phases.is_empty());

        let args = from_args_under_test(&[
            "--log-level",
            "trace",
            "replay",
            "--response",
            "a.msg",
            "--response",
            "b.msg",
        ])
        .unwrap();
        assert_eq!(args.level_filter(), log::LevelFilter::Trace);
        assert_eq!(
            args.command(),
            Command::Replay {
                responses: vec!["a.msg".to_string(), "b.msg".to_string()]
            }
        );
    }

    #[test]
    fn test_bad_arguments() {
        assert!(from_args_under_test(&["--phase", "nope"]).is_err());
        assert!(from_args_under_test(&["--upstream", "nohost"]).is_err());
        assert!(from_args_under_test(&["--listen-port", "70000"]).is_err());
        assert!(from_args_under_test(&["--log-level", "loud"]).is_err());
    }
}
