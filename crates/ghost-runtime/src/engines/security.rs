//! Security engine: the RBAC gate behind an engine facade.
//!
//! Thin wrapper around [`ghost_auth::SecurityGate`]. Authentication runs
//! during bootstrap, after boot but before the first dispatch; the engine
//! refuses permission checks until then.

use ghost_auth::{AuthError, PassphrasePrompt, Role, SecurityGate};
use ghost_kernel::{Engine, EngineError};
use parking_lot::Mutex;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Key-based authentication and role checks.
pub struct SecurityEngine {
    gate: Mutex<SecurityGate>,
}

impl SecurityEngine {
    pub fn open(keys_dir: impl Into<PathBuf>) -> Result<Self, AuthError> {
        Ok(Self {
            gate: Mutex::new(SecurityGate::new(keys_dir.into())?),
        })
    }

    /// Runs the silent auth chain, falling back to first-boot provisioning.
    pub fn authenticate(&self, prompt: &dyn PassphrasePrompt) -> Result<Role, AuthError> {
        let mut gate = self.gate.lock();
        let role = gate.authenticate(prompt)?;
        info!(role = %role, "authenticated");
        Ok(role)
    }

    /// Pure permission check; no prompting, no side effects.
    #[must_use]
    pub fn has_permission(&self, required: Role) -> bool {
        self.gate.lock().has_permission(required)
    }

    #[must_use]
    pub fn current_role(&self) -> Role {
        self.gate.lock().current_role()
    }

    #[must_use]
    pub fn current_key_id(&self) -> Option<String> {
        self.gate.lock().current_key_id().map(str::to_string)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.gate.lock().is_authenticated()
    }

    pub fn issue_key(
        &self,
        role: Role,
        label: Option<String>,
        expires_hours: Option<i64>,
    ) -> Result<ghost_auth::KeyRecord, AuthError> {
        self.gate.lock().issue_key(role, label, expires_hours)
    }

    pub fn revoke_key(&self, key_id: &str) -> Result<(), AuthError> {
        self.gate.lock().revoke_key(key_id)
    }

    /// Key records with liveness already resolved against expiry.
    #[must_use]
    pub fn list_keys(&self) -> Vec<ghost_auth::KeyRecord> {
        self.gate.lock().list_keys()
    }
}

impl Engine for SecurityEngine {
    fn name(&self) -> &str {
        "security"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPrompt(String);

    impl PassphrasePrompt for FixedPrompt {
        fn read_passphrase(&self, _prompt: &str) -> Result<String, AuthError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn first_boot_grants_god() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SecurityEngine::open(dir.path()).expect("open");
        let role = engine.authenticate(&FixedPrompt("ghost".into())).expect("auth");
        assert_eq!(role, Role::God);
        assert!(engine.has_permission(Role::Admin));
    }

    #[test]
    fn unauthenticated_denies_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SecurityEngine::open(dir.path()).expect("open");
        assert!(!engine.has_permission(Role::Guest));
        assert!(!engine.is_authenticated());
    }

    #[test]
    fn issue_and_revoke_through_facade() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SecurityEngine::open(dir.path()).expect("open");
        engine.authenticate(&FixedPrompt("ghost".into())).expect("auth");

        let issued = engine
            .issue_key(Role::Admin, Some("ops".into()), Some(24))
            .expect("issue");
        assert!(engine.list_keys().iter().any(|k| k.key_id == issued.key_id));

        engine.revoke_key(&issued.key_id).expect("revoke");
        let record = engine
            .list_keys()
            .into_iter()
            .find(|k| k.key_id == issued.key_id)
            .expect("still listed");
        assert!(!record.active);
    }
}
