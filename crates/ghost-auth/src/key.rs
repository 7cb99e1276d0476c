//! Key records and secret material.
//!
//! Two shapes exist on disk:
//!
//! - [`KeyFile`]: the standalone `<key-id>.key` file holding the secret and
//!   the salted passphrase hash. Possession of this file is what
//!   authenticates.
//! - [`KeyRecord`]: the metadata row tracked in `keyring.json`. It never
//!   contains secret material.

use crate::role::Role;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Metadata for an issued key, as tracked in the keyring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Unique key identifier, e.g. `guest-3f2a9c`.
    pub key_id: String,
    /// Role granted by this key.
    pub role: Role,
    /// Human-readable label ("Dad's laptop", "Lab PC #3").
    pub label: String,
    /// Issue timestamp.
    pub created: DateTime<Utc>,
    /// Expiry timestamp, or `None` for a permanent key.
    pub expires: Option<DateTime<Utc>>,
    /// `false` once revoked.
    pub active: bool,
    /// Key id of the issuer (`system` for the first-boot god key).
    pub creator: String,
}

impl KeyRecord {
    /// Returns `true` if the key has an expiry in the past.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|exp| now > exp)
    }

    /// Returns `true` if the key is active and not expired.
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }
}

/// Full key material, stored as a standalone `.key` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    pub key_id: String,
    pub role: Role,
    /// High-entropy secret (32 random bytes, hex encoded).
    pub secret: String,
    /// Salted SHA-256 of the passphrase, if one was set.
    pub passphrase_hash: Option<String>,
    /// Salt used for the passphrase hash.
    pub salt: Option<String>,
    pub created: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
    pub label: String,
    pub creator: String,
    pub active: bool,
}

impl KeyFile {
    /// Generates a new key.
    ///
    /// When `key_id` is `None` an id of the form `<role>-<12 hex chars>` is
    /// derived from a fresh UUID.
    #[must_use]
    pub fn generate(
        key_id: Option<String>,
        role: Role,
        passphrase: Option<&str>,
        expires_hours: Option<i64>,
        label: Option<String>,
        creator: &str,
    ) -> Self {
        let key_id = key_id.unwrap_or_else(|| {
            let tail = Uuid::new_v4().simple().to_string();
            format!("{}-{}", role.to_string().to_lowercase(), &tail[..12])
        });

        let (passphrase_hash, salt) = match passphrase {
            Some(p) => {
                let salt = random_hex(16);
                (Some(hash_passphrase(p, &salt)), Some(salt))
            }
            None => (None, None),
        };

        let created = Utc::now();
        let expires = expires_hours.map(|h| created + Duration::hours(h));

        Self {
            label: label.unwrap_or_else(|| key_id.clone()),
            key_id,
            role,
            secret: random_hex(32),
            passphrase_hash,
            salt,
            created,
            expires,
            creator: creator.to_string(),
            active: true,
        }
    }

    /// Validates a candidate passphrase against the stored hash.
    ///
    /// Keys with no passphrase set always validate.
    #[must_use]
    pub fn validate_passphrase(&self, candidate: &str) -> bool {
        match &self.passphrase_hash {
            None => true,
            Some(expected) => {
                let salt = self.salt.as_deref().unwrap_or("");
                hash_passphrase(candidate, salt) == *expected
            }
        }
    }

    /// Projects the keyring metadata row for this key.
    #[must_use]
    pub fn record(&self) -> KeyRecord {
        KeyRecord {
            key_id: self.key_id.clone(),
            role: self.role,
            label: self.label.clone(),
            created: self.created,
            expires: self.expires,
            active: self.active,
            creator: self.creator.clone(),
        }
    }
}

/// Salted SHA-256, hex encoded.
fn hash_passphrase(passphrase: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// `n` random bytes from the OS RNG, hex encoded.
fn random_hex(n: usize) -> String {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
