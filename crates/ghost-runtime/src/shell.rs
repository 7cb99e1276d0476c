//! Shell bootstrap and the dispatch chain.
//!
//! [`Shell::bootstrap`] brings the whole stack up: kernel boot, silent
//! authentication, command registry, alias table. [`Shell::dispatch`] then
//! resolves one input line at a time:
//!
//! 1. registered command (builtin or script), RBAC-gated
//! 2. alias, expanded once into a host-shell line and executed silently
//! 3. fallthrough to silent shell execution
//!
//! The permission gate applies to registered commands only; passthrough
//! forwards input unconditionally, like any login shell would.
//!
//! Dispatch is sequential by construction; nothing here queues or
//! interleaves command executions.

use crate::alias::AliasTable;
use crate::command::handler::{CommandContext, CommandHandler, CommandOutcome};
use crate::command::registry::CommandRegistry;
use crate::config::GhostConfig;
use crate::engines::{CoreEngine, PulseEngine, RootEngine, SecurityEngine};
use crate::error::RuntimeError;
use ghost_auth::{PassphrasePrompt, Role};
use ghost_kernel::{
    BootReport, Engine, EngineDescriptor, EngineError, EngineOverrides, Kernel,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// The canonical boot sequence. Order matters: `security` may assume the
/// data directories `core` creates, and both background engines may look
/// up anything before them.
#[must_use]
pub fn boot_sequence() -> Vec<EngineDescriptor> {
    vec![
        EngineDescriptor::new("core", "CoreEngine", true),
        EngineDescriptor::new("security", "SecurityEngine", true),
        EngineDescriptor::new("root", "RootEngine", false),
        EngineDescriptor::new("pulse", "PulseEngine", false),
    ]
}

/// A booted, authenticated shell.
pub struct Shell {
    context: CommandContext,
    boot_report: BootReport,
}

impl Shell {
    /// Boots the kernel, authenticates, and builds the command registry.
    ///
    /// `prompt` is only consulted on first boot, when no key material
    /// exists yet.
    pub async fn bootstrap(
        config: GhostConfig,
        prompt: &dyn PassphrasePrompt,
    ) -> Result<Self, RuntimeError> {
        let kernel = build_kernel(&config);

        let mut sequence = boot_sequence();
        let overrides = EngineOverrides::load(&config.engines_file())?;
        overrides.apply(&mut sequence);

        let boot_report = kernel.boot(&sequence)?;
        if boot_report.degraded {
            info!(failed = ?boot_report.failed, "running degraded");
        }

        let security: Arc<SecurityEngine> = kernel
            .engine("security")
            .ok_or(RuntimeError::EngineUnavailable("security"))?;
        security.authenticate(prompt)?;

        let registry = Arc::new(CommandRegistry::new());
        registry.rebuild(&config)?;
        kernel.set_session_commands(registry.names());

        let aliases = Arc::new(RwLock::new(AliasTable::load(config.aliases_file())?));

        kernel.events().on(ghost_kernel::EVENT_SHUTDOWN, |payload| {
            info!(?payload, "session closing");
            Ok(())
        });

        Ok(Self {
            context: CommandContext {
                kernel,
                config,
                registry,
                aliases,
            },
            boot_report,
        })
    }

    /// Resolves and executes one line of input.
    pub async fn dispatch(&self, line: &str) -> Result<CommandOutcome, RuntimeError> {
        let tokens = tokenize(line);
        let Some((name, args)) = tokens.split_first() else {
            return Ok(CommandOutcome::none());
        };

        // 1. Registered command wins over everything.
        if let Some(handler) = self.context.registry.get(name) {
            return self.run_gated(handler, args).await;
        }

        // 2. Alias templates are host-shell commands; expansion goes
        // straight to passthrough.
        let expansion = self.context.aliases.read().expand(name, args);
        if let Some(expanded) = expansion {
            debug!(alias = %name, %expanded, "alias expanded");
            return self.fallthrough(&expanded).await;
        }

        // 3. Raw shell fallthrough.
        self.fallthrough(line.trim()).await
    }

    async fn run_gated(
        &self,
        handler: Arc<dyn CommandHandler>,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        let required = handler.required_role();
        let security = self.context.security()?;
        if !security.has_permission(required) {
            return Err(RuntimeError::CommandDenied {
                command: handler.name().to_string(),
                required,
                current: security.current_role(),
            });
        }
        handler.execute(&self.context, args).await
    }

    /// Unrecognized input goes to the OS shell. When the root engine is
    /// down a direct bounded subprocess with the same contract stands in
    /// for it.
    async fn fallthrough(&self, line: &str) -> Result<CommandOutcome, RuntimeError> {
        let result = match self.context.kernel.engine::<RootEngine>("root") {
            Some(root) => root.exec_silent(line).await,
            None => {
                RootEngine::new(self.context.config.exec_timeout())
                    .exec_silent(line)
                    .await
            }
        };
        let mut text = result.stdout;
        if !result.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&result.stderr);
        }
        Ok(CommandOutcome::text(text.trim_end().to_string()))
    }

    /// Stops the kernel. Idempotent.
    pub fn shutdown(&self) {
        self.context.kernel.shutdown();
    }

    #[must_use]
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.context.kernel
    }

    #[must_use]
    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    #[must_use]
    pub fn boot_report(&self) -> &BootReport {
        &self.boot_report
    }

    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        self.context
            .security()
            .ok()
            .filter(|s| s.is_authenticated())
            .map(|s| s.current_role())
    }
}

fn build_kernel(config: &GhostConfig) -> Arc<Kernel> {
    let root = config.root().to_path_buf();
    let keys_dir = config.keys_dir();
    let exec_timeout = config.exec_timeout();
    let autosave = config.autosave_interval();

    Kernel::builder(config.root())
        .factory("core", move |_| {
            let engine = CoreEngine::open(&root).map_err(EngineError::init)?;
            Ok(Box::new(engine) as Box<dyn Engine>)
        })
        .factory("security", move |_| {
            let engine = SecurityEngine::open(&keys_dir).map_err(EngineError::init)?;
            Ok(Box::new(engine) as Box<dyn Engine>)
        })
        .factory("root", move |_| {
            Ok(Box::new(RootEngine::new(exec_timeout)) as Box<dyn Engine>)
        })
        .factory("pulse", move |_| {
            Ok(Box::new(PulseEngine::new(autosave)) as Box<dyn Engine>)
        })
        .build()
}

/// Whitespace tokenizer. Quoting is deliberately not interpreted here;
/// fallthrough lines reach the OS shell verbatim.
fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
