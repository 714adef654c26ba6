use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::configuration::Config;
use crate::error_handling::types::StorageError;
use crate::fixtures;
use crate::storage::storage_trait::FixtureStorage;
use crate::storage::types::CaptureManifest;

/// Environment variable naming the default output directory.
pub const OUTPUT_DIR_ENV: &str = "VOLTCAP_OUTPUT_DIR";

/// Writes every fixture as its own file directly under `base_path`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create output dir {}: {}", base_path.display(), e);
            StorageError::DirectoryUnavailable(format!("{}: {}", base_path.display(), e))
        })?;
        info!("FileStorage initialized at {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Construct FileStorage using env var VOLTCAP_OUTPUT_DIR if set, otherwise current directory.
    pub fn new_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            info!("Using FileStorage from {}: {}", OUTPUT_DIR_ENV, dir);
            return Self::new(PathBuf::from(dir));
        }
        let cwd = std::env::current_dir().map_err(|e| {
            error!("Failed to get current dir: {}", e);
            StorageError::DirectoryUnavailable(e.to_string())
        })?;
        info!("Using FileStorage at current directory: {}", cwd.display());
        Self::new(cwd)
    }

    /// The configured output directory wins over the environment.
    pub fn for_config(config: &Config) -> Result<Self, StorageError> {
        match &config.output_dir {
            Some(dir) => Self::new(dir),
            None => Self::new_default(),
        }
    }

    fn fixture_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let bare = Path::new(name)
            .file_name()
            .map_or(false, |file| file == name);
        if name.is_empty() || !bare || name == "." || name == ".." {
            error!("Refusing fixture name {:?}", name);
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.base_path.join(name))
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let write_failed = |e: std::io::Error| {
            error!("Failed to write {}: {}", path.display(), e);
            StorageError::WriteFailed(format!("{}: {}", path.display(), e))
        };
        let mut f = File::create(path).map_err(write_failed)?;
        f.write_all(bytes).map_err(write_failed)?;
        f.flush().map_err(write_failed)?;
        Ok(())
    }
}

impl FixtureStorage for FileStorage {
    fn root(&self) -> &Path {
        &self.base_path
    }

    fn save_fixture(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.fixture_path(name)?;
        self.write_file(&path, bytes)?;
        debug!("Saved {} byte(s) to {}", bytes.len(), path.display());
        Ok(path)
    }

    fn load_fixture(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.fixture_path(name)?;
        fs::read(&path).map_err(|e| {
            error!("Failed to read {}: {}", path.display(), e);
            StorageError::ReadFailed(format!("{}: {}", path.display(), e))
        })
    }

    fn save_manifest(&self, manifest: &CaptureManifest) -> Result<PathBuf, StorageError> {
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| StorageError::WriteFailed(format!("manifest: {}", e)))?;
        let path = self.fixture_path(fixtures::MANIFEST)?;
        self.write_file(&path, &json)?;
        info!(
            "Saved manifest with {} record(s) to {}",
            manifest.records.len(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{CaptureRecord, RecordKind};
    use chrono::Utc;
    use serial_test::serial;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[test]
    fn test_save_truncates_previous_content() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        storage.save_fixture("a.msg", b"a much longer first capture").unwrap();
        let path = storage.save_fixture("a.msg", b"short").unwrap();

        assert_eq!(path, dir.path().join("a.msg"));
        assert_eq!(fs::read(&path).unwrap(), b"short");
        assert_eq!(storage.load_fixture("a.msg").unwrap(), b"short");
    }

    #[test]
    fn test_rejects_names_with_directories() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        for name in ["", ".", "..", "../escape.msg", "nested/file.msg"] {
            assert!(
                matches!(
                    storage.save_fixture(name, b"x"),
                    Err(StorageError::InvalidName(_))
                ),
                "{:?} was accepted",
                name
            );
        }
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("out").join("fixtures");
        let storage = FileStorage::new(&nested).unwrap();
        storage.save_fixture("x.bin", &[1, 2, 3]).unwrap();
        assert!(nested.join("x.bin").exists());
    }

    #[test]
    fn test_manifest_is_json() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let now = Utc::now();
        let manifest = CaptureManifest {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            buffer_size: 8096,
            records: vec![CaptureRecord {
                file: fixtures::SERIALIZED_TABLE.to_string(),
                kind: RecordKind::Table,
                bytes: 293,
                captured_at: now,
            }],
        };

        let path = storage.save_manifest(&manifest).unwrap();
        let read: CaptureManifest = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(read, manifest);

        let raw: serde_json::Value =
            serde_json::from_slice(&storage.load_fixture(fixtures::MANIFEST).unwrap()).unwrap();
        assert_eq!(raw["records"][0]["kind"], "table");
    }

    #[test]
    #[serial]
    fn test_new_default_uses_env() {
        let dir = TempDir::new().unwrap();
        std::env::set_var(OUTPUT_DIR_ENV, dir.path());
        let storage = FileStorage::new_default();
        std::env::remove_var(OUTPUT_DIR_ENV);

        assert_eq!(storage.unwrap().root(), dir.path());
    }

    #[test]
    #[serial]
    fn test_config_dir_wins_over_env() {
        let env_dir = TempDir::new().unwrap();
        let config_dir = TempDir::new().unwrap();
        std::env::set_var(OUTPUT_DIR_ENV, env_dir.path());
        let config = Config {
            output_dir: Some(config_dir.path().to_path_buf()),
            ..Config::default()
        };
        let storage = FileStorage::for_config(&config);
        std::env::remove_var(OUTPUT_DIR_ENV);

        assert_eq!(storage.unwrap().root(), config_dir.path());
    }
}
