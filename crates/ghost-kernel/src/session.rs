//! Persisted session snapshots.
//!
//! The kernel writes a small JSON record of each session (boot time, which
//! engines loaded, known command names) so the next boot and external tools
//! can inspect the last run. Writes are atomic: temp file then rename.

use crate::error::KernelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One session snapshot, serialized to `session.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub boot_time: DateTime<Utc>,
    pub engines_loaded: Vec<String>,
    pub engines_failed: Vec<String>,
    pub commands: Vec<String>,
    pub os: String,
    pub arch: String,
    pub saved_at: DateTime<Utc>,
}

impl SessionRecord {
    /// New record stamped with the current host and time.
    #[must_use]
    pub fn new(boot_time: DateTime<Utc>) -> Self {
        Self {
            boot_time,
            engines_loaded: Vec::new(),
            engines_failed: Vec::new(),
            commands: Vec::new(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            saved_at: Utc::now(),
        }
    }

    /// Loads a record from `path`.
    pub fn load(path: &Path) -> Result<Self, KernelError> {
        let raw = fs::read_to_string(path).map_err(|e| KernelError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the record atomically, creating parent directories as needed.
    pub fn write_atomic(&self, path: &Path) -> Result<(), KernelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| KernelError::io(parent, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, body).map_err(|e| KernelError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| KernelError::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state").join("session.json");

        let mut record = SessionRecord::new(Utc::now());
        record.engines_loaded = vec!["core".into(), "security".into()];
        record.engines_failed = vec!["pulse".into()];
        record.commands = vec!["help".into(), "status".into()];

        record.write_atomic(&path).expect("write");
        let loaded = SessionRecord::load(&path).expect("load");
        assert_eq!(loaded, record);
    }

    #[test]
    fn write_replaces_previous_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let first = SessionRecord::new(Utc::now());
        first.write_atomic(&path).expect("first write");

        let mut second = SessionRecord::new(Utc::now());
        second.commands = vec!["reload".into()];
        second.write_atomic(&path).expect("second write");

        let loaded = SessionRecord::load(&path).expect("load");
        assert_eq!(loaded.commands, vec!["reload".to_string()]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(SessionRecord::load(&dir.path().join("absent.json")).is_err());
    }
}
