//! The command handler trait and execution context.

use crate::alias::AliasTable;
use crate::command::registry::CommandRegistry;
use crate::config::GhostConfig;
use crate::engines::{CoreEngine, RootEngine, SecurityEngine};
use crate::error::RuntimeError;
use async_trait::async_trait;
use ghost_auth::Role;
use ghost_kernel::Kernel;
use parking_lot::RwLock;
use std::sync::Arc;

/// Everything a command body may touch.
///
/// Handed by reference to every execution; handlers reach engines through
/// the kernel and must tolerate `None` for engines lost to a degraded boot.
pub struct CommandContext {
    pub kernel: Arc<Kernel>,
    pub config: GhostConfig,
    pub registry: Arc<CommandRegistry>,
    pub aliases: Arc<RwLock<AliasTable>>,
}

impl CommandContext {
    /// The security engine, which is critical and therefore present
    /// whenever the kernel booted at all.
    pub fn security(&self) -> Result<Arc<SecurityEngine>, RuntimeError> {
        self.kernel
            .engine("security")
            .ok_or(RuntimeError::EngineUnavailable("security"))
    }

    pub fn core(&self) -> Result<Arc<CoreEngine>, RuntimeError> {
        self.kernel
            .engine("core")
            .ok_or(RuntimeError::EngineUnavailable("core"))
    }

    pub fn root_engine(&self) -> Result<Arc<RootEngine>, RuntimeError> {
        self.kernel
            .engine("root")
            .ok_or(RuntimeError::EngineUnavailable("root"))
    }
}

/// Text produced by a command execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    pub text: String,
}

impl CommandOutcome {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

impl From<String> for CommandOutcome {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// One dispatchable command.
///
/// The dispatch chain checks `required_role` against the RBAC gate before
/// `execute` is ever called; a denied invocation runs no command code.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn usage(&self) -> &str;

    fn required_role(&self) -> Role;

    async fn execute(
        &self,
        ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError>;
}
