//! The security gate: silent authentication and key lifecycle.

use crate::error::AuthError;
use crate::key::{KeyFile, KeyRecord};
use crate::keyring::Keyring;
use crate::role::Role;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Key id reserved for the master key.
pub const GOD_KEY_ID: &str = "god-master";

/// Minimum accepted passphrase length during first boot.
pub const MIN_PASSPHRASE_LEN: usize = 4;

/// File name of the master key.
const GOD_KEY_FILE: &str = "god.key";

/// First-boot attempts before giving up.
const MAX_PROMPT_ATTEMPTS: usize = 5;

/// Interactive passphrase source.
///
/// The gate itself never touches a terminal. The binary injects a real
/// prompt; tests and headless runs inject stubs. `notify` carries user
/// feedback during the retry loop (too short, mismatch).
pub trait PassphrasePrompt: Send + Sync {
    /// Reads a passphrase without echoing it.
    fn read_passphrase(&self, prompt: &str) -> Result<String, AuthError>;

    /// Shows a short message to the user. Default: log only.
    fn notify(&self, message: &str) {
        info!("{message}");
    }
}

/// The Gatekeeper.
///
/// Owns the keyring and the current session identity. Construction loads
/// persisted state but does not authenticate; call
/// [`authenticate`](SecurityGate::authenticate) once at startup.
#[derive(Debug)]
pub struct SecurityGate {
    keys_dir: PathBuf,
    keyring: Keyring,
    current_role: Role,
    current_key_id: Option<String>,
    authenticated: bool,
}

impl SecurityGate {
    /// Opens the gate over `keys_dir`, creating the directory if needed.
    pub fn new(keys_dir: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let keys_dir = keys_dir.into();
        fs::create_dir_all(&keys_dir).map_err(|e| AuthError::io(&keys_dir, e))?;
        let keyring = Keyring::load(&keys_dir)?;
        Ok(Self {
            keys_dir,
            keyring,
            current_role: Role::Guest,
            current_key_id: None,
            authenticated: false,
        })
    }

    /// Runs the silent authentication chain, falling back to the first-boot
    /// flow when no credential is present.
    ///
    /// Returns the authenticated role.
    pub fn authenticate(&mut self, prompt: &dyn PassphrasePrompt) -> Result<Role, AuthError> {
        if let Some(role) = self.silent_auth() {
            debug!(role = %role, key = ?self.current_key_id, "silent authentication");
            return Ok(role);
        }
        self.first_boot(prompt)
    }

    /// Non-interactive credential check: god key file, then any valid
    /// keyring entry whose key file still exists.
    ///
    /// Pure with respect to user interaction; only reads the filesystem.
    pub fn silent_auth(&mut self) -> Option<Role> {
        let god_path = self.keys_dir.join(GOD_KEY_FILE);
        if god_path.exists() {
            match fs::read_to_string(&god_path)
                .ok()
                .and_then(|raw| serde_json::from_str::<KeyFile>(&raw).ok())
            {
                Some(key) => {
                    self.current_role = Role::God;
                    self.current_key_id = Some(key.key_id);
                    self.authenticated = true;
                    return Some(Role::God);
                }
                None => warn!(path = %god_path.display(), "unreadable god key file, ignoring"),
            }
        }

        let now = Utc::now();
        let found = self.keyring.iter().find(|record| {
            record.is_valid(now) && self.keys_dir.join(format!("{}.key", record.key_id)).exists()
        });
        if let Some(record) = found {
            self.current_role = record.role;
            self.current_key_id = Some(record.key_id.clone());
            self.authenticated = true;
            return Some(record.role);
        }
        None
    }

    /// First-boot flow: collect and confirm a passphrase, mint the god key,
    /// persist it, authenticate as God.
    fn first_boot(&mut self, prompt: &dyn PassphrasePrompt) -> Result<Role, AuthError> {
        info!("no credential found, entering first-boot setup");
        prompt.notify("No god key detected. Generating your master key now.");

        let mut passphrase = None;
        for _ in 0..MAX_PROMPT_ATTEMPTS {
            let candidate = prompt.read_passphrase("Set your god key passphrase: ")?;
            if candidate.len() < MIN_PASSPHRASE_LEN {
                prompt.notify(&format!(
                    "Passphrase must be at least {MIN_PASSPHRASE_LEN} characters."
                ));
                continue;
            }
            let confirm = prompt.read_passphrase("Confirm passphrase: ")?;
            if candidate != confirm {
                prompt.notify("Passphrases don't match. Try again.");
                continue;
            }
            passphrase = Some(candidate);
            break;
        }
        let passphrase = passphrase.ok_or(AuthError::TooManyAttempts)?;

        let key = KeyFile::generate(
            Some(GOD_KEY_ID.to_string()),
            Role::God,
            Some(&passphrase),
            None,
            None,
            "system",
        );

        let god_path = self.keys_dir.join(GOD_KEY_FILE);
        write_key_file(&god_path, &key)?;
        self.keyring.insert(key.record());
        self.keyring.save()?;

        self.current_role = Role::God;
        self.current_key_id = Some(key.key_id.clone());
        self.authenticated = true;

        info!(key_id = %key.key_id, "god key generated");
        prompt.notify("God key generated. You are now authenticated.");
        Ok(Role::God)
    }

    /// Issues a new key. God only; refuses to mint a second god key.
    ///
    /// Persists the keyring entry and the standalone key file, and returns
    /// the new record.
    pub fn issue_key(
        &mut self,
        role: Role,
        label: Option<String>,
        expires_hours: Option<i64>,
    ) -> Result<KeyRecord, AuthError> {
        self.require(Role::God)?;
        if role == Role::God {
            return Err(AuthError::GodKeyExists);
        }

        let creator = self.current_key_id.as_deref().unwrap_or("system");
        let key = KeyFile::generate(None, role, None, expires_hours, label, creator);

        let key_path = self.keys_dir.join(format!("{}.key", key.key_id));
        write_key_file(&key_path, &key)?;
        let record = key.record();
        self.keyring.insert(record.clone());
        self.keyring.save()?;

        info!(key_id = %record.key_id, role = %record.role, "key issued");
        Ok(record)
    }

    /// Revokes a key: marks the keyring entry inactive and removes its key
    /// file. God only; the god key itself cannot be revoked.
    pub fn revoke_key(&mut self, key_id: &str) -> Result<(), AuthError> {
        self.require(Role::God)?;
        if key_id == GOD_KEY_ID {
            return Err(AuthError::CannotRevokeGodKey);
        }
        let record = self
            .keyring
            .get_mut(key_id)
            .ok_or_else(|| AuthError::KeyNotFound(key_id.to_string()))?;
        record.active = false;
        self.keyring.save()?;

        let key_path = self.keys_dir.join(format!("{key_id}.key"));
        if key_path.exists() {
            fs::remove_file(&key_path).map_err(|e| AuthError::io(&key_path, e))?;
        }

        info!(key_id, "key revoked");
        Ok(())
    }

    /// All keyring records, with `active` reflecting expiry.
    #[must_use]
    pub fn list_keys(&self) -> Vec<KeyRecord> {
        let now = Utc::now();
        self.keyring
            .iter()
            .map(|r| {
                let mut record = r.clone();
                record.active = r.is_valid(now);
                record
            })
            .collect()
    }

    /// Returns `true` if the authenticated session meets `required`.
    ///
    /// Unauthenticated sessions never pass, regardless of role.
    #[must_use]
    pub fn has_permission(&self, required: Role) -> bool {
        self.authenticated && self.current_role.has_permission(required)
    }

    #[must_use]
    pub fn current_role(&self) -> Role {
        self.current_role
    }

    #[must_use]
    pub fn current_key_id(&self) -> Option<&str> {
        self.current_key_id.as_deref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    #[must_use]
    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    fn require(&self, required: Role) -> Result<(), AuthError> {
        if self.has_permission(required) {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied {
                required,
                current: self.current_role,
            })
        }
    }
}

fn write_key_file(path: &Path, key: &KeyFile) -> Result<(), AuthError> {
    let json = serde_json::to_string_pretty(key)?;
    fs::write(path, json).map_err(|e| AuthError::io(path, e))?;
    Ok(())
}
