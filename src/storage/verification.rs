//! Shape checks over fixtures already written to disk.
//!
//! Captured messages stay opaque: only their framing is checked. The table
//! fixture is decoded in full since its exact size is known.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::{debug, warn};

use crate::fixtures;
use crate::wire::Table;

#[derive(Debug, Clone, PartialEq)]
pub enum FixtureStatus {
    Ok,
    Missing,
    Unreadable(String),
    Empty,
    /// Larger than the capture buffer, so it cannot come from a single read.
    TooLarge { limit: usize },
    /// The leading `i32` does not count the bytes that follow it.
    BadLengthPrefix { declared: i64 },
    BadTable(String),
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStatus::Ok => write!(f, "ok"),
            FixtureStatus::Missing => write!(f, "missing"),
            FixtureStatus::Unreadable(e) => write!(f, "unreadable: {}", e),
            FixtureStatus::Empty => write!(f, "empty"),
            FixtureStatus::TooLarge { limit } => {
                write!(f, "larger than the {} byte capture buffer", limit)
            }
            FixtureStatus::BadLengthPrefix { declared } => {
                write!(f, "length prefix says {} byte(s) follow", declared)
            }
            FixtureStatus::BadTable(e) => write!(f, "not a valid table: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureCheck {
    pub name: String,
    pub len: usize,
    pub status: FixtureStatus,
}

impl FixtureCheck {
    pub fn is_ok(&self) -> bool {
        self.status == FixtureStatus::Ok
    }
}

fn check_message(bytes: &[u8], buffer_size: usize) -> FixtureStatus {
    if bytes.len() > buffer_size {
        return FixtureStatus::TooLarge { limit: buffer_size };
    }
    if bytes.len() < 4 {
        return FixtureStatus::BadLengthPrefix { declared: -1 };
    }
    let declared = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if declared < 0 || declared as usize != bytes.len() - 4 {
        return FixtureStatus::BadLengthPrefix {
            declared: declared as i64,
        };
    }
    FixtureStatus::Ok
}

fn check_table(bytes: &[u8]) -> FixtureStatus {
    match Table::decode(bytes) {
        Ok(table) if table.serialized_size() == bytes.len() => FixtureStatus::Ok,
        Ok(table) => FixtureStatus::BadTable(format!(
            "{} byte(s) on disk, {} expected",
            bytes.len(),
            table.serialized_size()
        )),
        Err(e) => FixtureStatus::BadTable(e.to_string()),
    }
}

/// Checks one fixture file.
pub fn verify_fixture(dir: &Path, name: &str, buffer_size: usize) -> FixtureCheck {
    let path = dir.join(name);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            let status = if e.kind() == io::ErrorKind::NotFound {
                FixtureStatus::Missing
            } else {
                FixtureStatus::Unreadable(e.to_string())
            };
            return FixtureCheck {
                name: name.to_string(),
                len: 0,
                status,
            };
        }
    };

    let status = if bytes.is_empty() {
        FixtureStatus::Empty
    } else if name == fixtures::SERIALIZED_TABLE {
        check_table(&bytes)
    } else if name.ends_with(".msg") {
        check_message(&bytes, buffer_size)
    } else {
        FixtureStatus::Ok
    };

    FixtureCheck {
        name: name.to_string(),
        len: bytes.len(),
        status,
    }
}

/// Checks every named fixture under `dir`, logging each failure.
pub fn verify_fixtures<S: AsRef<str>>(dir: &Path, names: &[S], buffer_size: usize) -> Vec<FixtureCheck> {
    names
        .iter()
        .map(|name| {
            let check = verify_fixture(dir, name.as_ref(), buffer_size);
            if check.is_ok() {
                debug!("{}: {} byte(s), ok", check.name, check.len);
            } else {
                warn!("{}: {}", check.name, check.status);
            }
            check
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_message_checks() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.msg"), [0u8, 0, 0, 2, 9, 9]).unwrap();
        fs::write(dir.path().join("short.msg"), [0u8, 0, 0, 5, 9]).unwrap();
        fs::write(dir.path().join("empty.msg"), b"").unwrap();
        fs::write(dir.path().join("big.msg"), vec![0u8; 100]).unwrap();

        let checks = verify_fixtures(
            dir.path(),
            &["good.msg", "short.msg", "empty.msg", "big.msg", "gone.msg"],
            64,
        );
        assert_eq!(checks[0].status, FixtureStatus::Ok);
        assert_eq!(checks[0].len, 6);
        assert_eq!(
            checks[1].status,
            FixtureStatus::BadLengthPrefix { declared: 5 }
        );
        assert_eq!(checks[2].status, FixtureStatus::Empty);
        assert_eq!(checks[3].status, FixtureStatus::TooLarge { limit: 64 });
        assert_eq!(checks[4].status, FixtureStatus::Missing);
    }

    #[test]
    fn test_table_check() {
        let dir = TempDir::new().unwrap();
        let table = fixtures::canonical_table().unwrap().serialize().unwrap();
        fs::write(dir.path().join(fixtures::SERIALIZED_TABLE), &table).unwrap();
        let check = verify_fixture(dir.path(), fixtures::SERIALIZED_TABLE, 8096);
        assert!(check.is_ok());
        assert_eq!(check.len, 293);

        fs::write(dir.path().join(fixtures::SERIALIZED_TABLE), &table[..200]).unwrap();
        let check = verify_fixture(dir.path(), fixtures::SERIALIZED_TABLE, 8096);
        assert!(matches!(check.status, FixtureStatus::BadTable(_)));
    }
}
