//! Engine lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a managed engine.
///
/// # Transitions
///
/// ```text
/// Unloaded ──load──▶ Initializing ──▶ Running ──shutdown──▶ Shutdown
///                         │              ▲
///                         ▼              │
///                       Failed ──restart─┘  (bounded by max_restarts)
///
/// Disabled: parked before load when the descriptor or the override file
/// disables the engine; never transitions during a session.
/// ```
///
/// | State | Instance held | Can restart |
/// |-------|---------------|-------------|
/// | `Unloaded`, `Initializing` | no | no |
/// | `Running` | yes | no |
/// | `Degraded` | yes | no |
/// | `Failed` | no | yes (until limit) |
/// | `Disabled`, `Shutdown` | no | no |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Declared but not yet loaded.
    #[default]
    Unloaded,
    /// Constructor/init hook in progress.
    Initializing,
    /// Fully operational; the only state in which lookups succeed.
    Running,
    /// Loaded but self-reporting partial capability. Reserved for engines
    /// that degrade without failing outright; lookups do not succeed.
    Degraded,
    /// Load or init failed; errors recorded on the wrapper.
    Failed,
    /// Disabled by descriptor or override file; never attempted.
    Disabled,
    /// Stopped during kernel shutdown.
    Shutdown,
}

impl EngineState {
    /// Returns `true` if the engine instance may be handed to consumers.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if `restart()` is a legal operation.
    #[must_use]
    pub fn can_restart(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns `true` for states that end a session for this engine.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disabled | Self::Shutdown)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
            Self::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}
