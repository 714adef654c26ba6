//! Common data types used across the data_capture subsystem.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of TCP flow for captured bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Bytes flowing from the simulated client to the server.
    ClientToServer,
    /// Bytes flowing from the server back to the client.
    ServerToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToServer => write!(f, "C->S"),
            Direction::ServerToClient => write!(f, "S->C"),
        }
    }
}

/// One message as read off the wire.
///
/// `bytes` holds exactly what a single read returned, never the whole capture
/// buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedMessage {
    /// Fixture the bytes were written to, if they were recorded.
    pub fixture: Option<String>,
    pub direction: Direction,
    pub bytes: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl CapturedMessage {
    pub fn new(fixture: Option<&str>, direction: Direction, bytes: &[u8]) -> Self {
        Self {
            fixture: fixture.map(str::to_string),
            direction,
            bytes: bytes.to_vec(),
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
