//! Storage Trait
//!
//! This module defines the `FixtureStorage` trait, the interface between the
//! capture harness and wherever fixtures end up.
//!
//! Implementors of this trait are responsible for:
//! - Writing each fixture whole, replacing any previous content
//! - Rejecting fixture names that would escape the output location
//! - Persisting the capture manifest
//!
//! All methods return a `Result` to handle potential storage errors.

use std::path::{Path, PathBuf};

use crate::error_handling::types::StorageError;
use crate::storage::types::CaptureManifest;

pub trait FixtureStorage: Send + Sync {
    /// Location fixtures are written under.
    fn root(&self) -> &Path;

    /// Writes `bytes` as the whole content of fixture `name`.
    ///
    /// - `name` - A bare file name, without directory components.
    fn save_fixture(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError>;

    /// Reads a fixture back. Used by replay and verification, never by the
    /// capture phases.
    fn load_fixture(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Saves the manifest describing a finished run.
    fn save_manifest(&self, manifest: &CaptureManifest) -> Result<PathBuf, StorageError>;
}
