//! Keyring persistence.
//!
//! The keyring (`keyring.json`) tracks metadata for every issued key. The
//! secret material itself lives in the standalone `.key` files next to it.

use crate::error::AuthError;
use crate::key::KeyRecord;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const KEYRING_FILE: &str = "keyring.json";

/// Persisted keyId → [`KeyRecord`] map.
#[derive(Debug)]
pub struct Keyring {
    path: PathBuf,
    entries: BTreeMap<String, KeyRecord>,
}

impl Keyring {
    /// Loads the keyring from `keys_dir`, or starts empty if the file does
    /// not exist yet.
    pub fn load(keys_dir: &Path) -> Result<Self, AuthError> {
        let path = keys_dir.join(KEYRING_FILE);
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| AuthError::io(&path, e))?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Persists the keyring atomically (write to temp, then rename).
    pub fn save(&self) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| AuthError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| AuthError::io(&self.path, e))?;
        Ok(())
    }

    pub fn insert(&mut self, record: KeyRecord) {
        self.entries.insert(record.key_id.clone(), record);
    }

    #[must_use]
    pub fn get(&self, key_id: &str) -> Option<&KeyRecord> {
        self.entries.get(key_id)
    }

    pub fn get_mut(&mut self, key_id: &str) -> Option<&mut KeyRecord> {
        self.entries.get_mut(key_id)
    }

    #[must_use]
    pub fn contains(&self, key_id: &str) -> bool {
        self.entries.contains_key(key_id)
    }

    /// Records in key-id order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
