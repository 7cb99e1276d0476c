//! Runtime layer errors.

use ghost_auth::{AuthError, Role};
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by command dispatch and the engines.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Input named neither a command nor an alias and no fallback was
    /// available.
    #[error("unknown command: '{0}'")]
    UnknownCommand(String),

    /// The RBAC gate rejected the invocation. The command body never ran.
    #[error("permission denied: '{command}' requires {required}, current role is {current}")]
    CommandDenied {
        command: String,
        required: Role,
        current: Role,
    },

    /// Invalid arguments; the message carries the usage line.
    #[error("usage: {0}")]
    Usage(String),

    /// Auth subsystem failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Kernel failure.
    #[error(transparent)]
    Kernel(#[from] ghost_kernel::KernelError),

    /// A script command failed to load or execute.
    #[error("script error in {path}: {message}")]
    Script { path: PathBuf, message: String },

    /// Embedded interpreter failure outside any one script.
    #[error("lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// A required engine is not running (degraded boot or mid-restart).
    #[error("engine '{0}' is not available")]
    EngineUnavailable(&'static str),

    /// Reading or writing a runtime-owned file failed.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config or alias file could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RuntimeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn script(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Script {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
