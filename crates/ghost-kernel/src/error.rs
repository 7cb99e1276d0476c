//! Kernel layer errors.
//!
//! Only [`KernelError::CriticalEngine`] is allowed to escalate out of the
//! kernel; every other failure is recorded, logged, and surfaced as a short
//! message.

use crate::state::EngineState;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Construction or init hook failed.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Shutdown hook failed. Always swallowed by the kernel walk.
    #[error("shutdown hook failed: {0}")]
    Shutdown(String),

    /// The descriptor names a loader key with no registered factory.
    #[error("no engine factory registered for '{0}'")]
    UnknownFactory(String),

    /// Restart attempts exhausted; the engine is permanently failed.
    #[error("restart limit reached ({attempts}/{max})")]
    RestartLimit { attempts: u32, max: u32 },

    /// Operation illegal in the current state.
    #[error("cannot {op} from state '{state}'")]
    InvalidTransition {
        op: &'static str,
        state: EngineState,
    },
}

impl EngineError {
    /// Shorthand for wrapping an arbitrary init failure.
    pub fn init(err: impl std::fmt::Display) -> Self {
        Self::Init(err.to_string())
    }
}

/// Kernel-level failures.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A critical engine failed during boot. The kernel has already run an
    /// emergency reverse shutdown by the time this escapes.
    #[error("critical engine '{name}' failed to boot: {source}")]
    CriticalEngine {
        name: String,
        #[source]
        source: EngineError,
    },

    /// Boot sequence declared the same engine name twice.
    #[error("duplicate engine name in boot sequence: '{0}'")]
    DuplicateEngine(String),

    /// Lookup or restart targeted a name the kernel does not track.
    #[error("unknown engine: '{0}'")]
    UnknownEngine(String),

    /// Non-boot engine operation failed (e.g. restart).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Reading or writing a kernel-owned file failed.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted kernel state could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl KernelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
