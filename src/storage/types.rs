use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data_capture::types::Direction;

/// What a fixture file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ClientToServer,
    ServerToClient,
    Table,
}

impl From<Direction> for RecordKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::ClientToServer => RecordKind::ClientToServer,
            Direction::ServerToClient => RecordKind::ServerToClient,
        }
    }
}

/// One fixture written during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub file: String,
    pub kind: RecordKind,
    pub bytes: usize,
    pub captured_at: DateTime<Utc>,
}

/// Summary of a capture run, written next to the fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub buffer_size: usize,
    pub records: Vec<CaptureRecord>,
}
