//! Storage subsystem
//!
//! Persistence of captured fixtures and of the capture manifest, plus the
//! checks run over an existing fixture directory.
//!
//! Components:
//! - `storage_trait`: the `FixtureStorage` trait the harness writes through.
//! - `types`: manifest records shared by the backends.
//! - `file_storage`: one file per fixture in an output directory.
//! - `verification`: shape checks over fixtures already on disk.

pub mod file_storage;
pub mod storage_trait;
pub mod types;
pub mod verification;

pub use file_storage::FileStorage;
pub use storage_trait::FixtureStorage;
pub use types::{CaptureManifest, CaptureRecord, RecordKind};
pub use verification::{verify_fixtures, FixtureCheck, FixtureStatus};
