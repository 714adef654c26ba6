use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error_handling::types::ConfigError;
use crate::fixtures;

/// A host and port pair, resolved when a socket is opened.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost", 21212)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    /// Parses `host:port`, with IPv6 hosts written as `[addr]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::BadEndpoint(format!("{} is not host:port", s)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ConfigError::BadEndpoint(format!("{} has no host", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| ConfigError::BadEndpoint(format!("{}: {}", s, e)))?;
        Ok(Self::new(host, port))
    }
}

/// One step of a capture run. Enabled phases always run in declaration order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AuthSha256,
    AuthSha1,
    Relay,
    AllParams,
    Table,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::AuthSha256,
        Phase::AuthSha1,
        Phase::Relay,
        Phase::AllParams,
        Phase::Table,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::AuthSha256 => "auth_sha256",
            Phase::AuthSha1 => "auth_sha1",
            Phase::Relay => "relay",
            Phase::AllParams => "all_params",
            Phase::Table => "table",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownPhase(s.to_string()))
    }
}

/// A single request, and usually its response, passed through the relay.
///
/// A `None` file relays without recording. One-way exchanges relay the
/// request and do not wait for an answer.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub name: String,
    #[serde(default)]
    pub request: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub one_way: bool,
}

impl Exchange {
    pub fn round_trip(name: &str, request: &str, response: &str) -> Self {
        Self {
            name: name.to_string(),
            request: Some(request.to_string()),
            response: Some(response.to_string()),
            one_way: false,
        }
    }

    pub fn one_way(name: &str, request: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            request: request.map(str::to_string),
            response: None,
            one_way: true,
        }
    }

    /// Fixture files this exchange writes.
    pub fn fixtures(&self) -> impl Iterator<Item = &str> {
        self.request.iter().chain(self.response.iter()).map(String::as_str)
    }
}

/// Relay settings: the script replayed against the upstream server after the
/// captured login.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub exchanges: Vec<Exchange>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            exchanges: vec![
                Exchange::round_trip(
                    "insert",
                    fixtures::INVOCATION_REQUEST_SUCCESS,
                    fixtures::INVOCATION_RESPONSE_SUCCESS,
                ),
                Exchange::round_trip(
                    "duplicate_insert",
                    fixtures::INVOCATION_REQUEST_FAIL_CV,
                    fixtures::INVOCATION_RESPONSE_FAIL_CV,
                ),
                Exchange::round_trip(
                    "select",
                    fixtures::INVOCATION_REQUEST_SELECT,
                    fixtures::INVOCATION_RESPONSE_SELECT,
                ),
                Exchange::one_way("shutdown", None),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!(
            "localhost:21212".parse::<Endpoint>().unwrap(),
            Endpoint::default()
        );
        assert_eq!(
            "[::1]:9000".parse::<Endpoint>().unwrap(),
            Endpoint::new("::1", 9000)
        );
        assert_eq!(Endpoint::new("::1", 9000).to_string(), "[::1]:9000");
        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":80".parse::<Endpoint>().is_err());
        assert!("host:99999".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_phase_names() {
        for phase in Phase::ALL {
            assert_eq!(phase.to_string().parse::<Phase>().unwrap(), phase);
        }
        assert!(matches!(
            "handshake".parse::<Phase>(),
            Err(ConfigError::UnknownPhase(_))
        ));
    }

    #[test]
    fn test_default_relay_script() {
        let relay = RelayConfig::default();
        assert_eq!(relay.exchanges.len(), 4);
        assert!(relay.exchanges[3].one_way);
        assert_eq!(relay.exchanges[3].fixtures().count(), 0);
        assert_eq!(
            relay.exchanges[0].fixtures().collect::<Vec<_>>(),
            vec![
                fixtures::INVOCATION_REQUEST_SUCCESS,
                fixtures::INVOCATION_RESPONSE_SUCCESS
            ]
        );
    }
}
