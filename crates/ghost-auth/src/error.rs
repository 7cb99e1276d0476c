//! Auth layer errors.

use crate::role::Role;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for authentication and key management.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Filesystem operation failed.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Keyring or key file could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The current role is insufficient for the operation.
    #[error("access denied: requires {required}, current role is {current}")]
    PermissionDenied { required: Role, current: Role },

    /// A second god key was requested.
    #[error("cannot issue additional god keys; there can be only one")]
    GodKeyExists,

    /// Revocation targeted the god key.
    #[error("cannot revoke the god key")]
    CannotRevokeGodKey,

    /// Key id not present in the keyring.
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    /// First-boot flow gave up after repeated invalid input.
    #[error("too many invalid passphrase attempts")]
    TooManyAttempts,

    /// The interactive prompt failed (e.g. headless session, closed stdin).
    #[error("passphrase prompt failed: {0}")]
    PromptFailed(String),
}

impl AuthError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
