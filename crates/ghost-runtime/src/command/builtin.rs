//! Builtin commands.
//!
//! Registered from a static table in [`builtin_commands`]; the registry
//! lists builtins before scripts, so a script can never shadow one.
//! `exit` and `quit` are deliberately absent: the interactive loop owns
//! them.

use crate::command::handler::{CommandContext, CommandHandler, CommandOutcome};
use crate::error::RuntimeError;
use async_trait::async_trait;
use ghost_auth::Role;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

/// The builtin registration table.
#[must_use]
pub fn builtin_commands() -> Vec<Arc<dyn CommandHandler>> {
    vec![
        Arc::new(HelpCommand),
        Arc::new(VersionCommand),
        Arc::new(StatusCommand),
        Arc::new(SysinfoCommand),
        Arc::new(WhoamiCommand),
        Arc::new(ExecCommand),
        Arc::new(EngineCommand),
        Arc::new(KeysCommand),
        Arc::new(AliasCommand),
        Arc::new(ReloadCommand),
    ]
}

struct VersionCommand;

#[async_trait]
impl CommandHandler for VersionCommand {
    fn name(&self) -> &str {
        "version"
    }
    fn description(&self) -> &str {
        "shell version"
    }
    fn usage(&self) -> &str {
        "version"
    }
    fn required_role(&self) -> Role {
        Role::Guest
    }

    async fn execute(
        &self,
        _ctx: &CommandContext,
        _args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        Ok(CommandOutcome::text(format!(
            "ghost {}",
            env!("CARGO_PKG_VERSION")
        )))
    }
}

struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }
    fn description(&self) -> &str {
        "list commands, or show usage for one"
    }
    fn usage(&self) -> &str {
        "help [command]"
    }
    fn required_role(&self) -> Role {
        Role::Guest
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        if let Some(name) = args.first() {
            let handler = ctx
                .registry
                .get(name)
                .ok_or_else(|| RuntimeError::UnknownCommand(name.clone()))?;
            return Ok(CommandOutcome::text(format!(
                "{}\n  usage: {}\n  role:  {}",
                handler.description(),
                handler.usage(),
                handler.required_role()
            )));
        }

        let snapshot = ctx.registry.snapshot();
        let mut names: Vec<&String> = snapshot.keys().collect();
        names.sort();

        let mut out = String::from("commands:\n");
        for name in names {
            let handler = &snapshot[name];
            let _ = writeln!(
                out,
                "  {:<12} [{}] {}",
                name,
                handler.required_role(),
                handler.description()
            );
        }
        out.push_str("  exit | quit  leave the shell");
        Ok(CommandOutcome::text(out))
    }
}

struct StatusCommand;

#[async_trait]
impl CommandHandler for StatusCommand {
    fn name(&self) -> &str {
        "status"
    }
    fn description(&self) -> &str {
        "kernel and engine health"
    }
    fn usage(&self) -> &str {
        "status"
    }
    fn required_role(&self) -> Role {
        Role::Guest
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        let mode = if ctx.kernel.is_degraded() {
            "DEGRADED"
        } else {
            "nominal"
        };
        let mut out = format!("kernel: {mode}\n");
        for health in ctx.kernel.health_report() {
            let marker = if health.critical { "*" } else { " " };
            let _ = writeln!(
                out,
                " {marker}{:<10} {:<12} restarts={} errors={}",
                health.name, health.state, health.restarts, health.error_count
            );
        }
        Ok(CommandOutcome::text(out.trim_end().to_string()))
    }
}

struct SysinfoCommand;

#[async_trait]
impl CommandHandler for SysinfoCommand {
    fn name(&self) -> &str {
        "sysinfo"
    }
    fn description(&self) -> &str {
        "host and node identity"
    }
    fn usage(&self) -> &str {
        "sysinfo"
    }
    fn required_role(&self) -> Role {
        Role::Guest
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        let mut out = ctx.core()?.summary();
        if let Ok(root) = ctx.root_engine() {
            out.push('\n');
            out.push_str(&root.system_info());
        }
        Ok(CommandOutcome::text(out))
    }
}

struct WhoamiCommand;

#[async_trait]
impl CommandHandler for WhoamiCommand {
    fn name(&self) -> &str {
        "whoami"
    }
    fn description(&self) -> &str {
        "current role and key"
    }
    fn usage(&self) -> &str {
        "whoami"
    }
    fn required_role(&self) -> Role {
        Role::Guest
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        _args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        let security = ctx.security()?;
        let key = security.current_key_id().unwrap_or_else(|| "-".into());
        Ok(CommandOutcome::text(format!(
            "role: {}  key: {key}",
            security.current_role()
        )))
    }
}

struct ExecCommand;

#[async_trait]
impl CommandHandler for ExecCommand {
    fn name(&self) -> &str {
        "exec"
    }
    fn description(&self) -> &str {
        "run a shell command silently"
    }
    fn usage(&self) -> &str {
        "exec <command...>"
    }
    fn required_role(&self) -> Role {
        Role::Admin
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        if args.is_empty() {
            return Err(RuntimeError::Usage(self.usage().to_string()));
        }
        let result = ctx.root_engine()?.exec_silent(&args.join(" ")).await;

        let mut out = result.stdout;
        if !result.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&result.stderr);
        }
        if !result.ok {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            let _ = write!(out, "(exit code {})", result.code);
        }
        Ok(CommandOutcome::text(out.trim_end().to_string()))
    }
}

struct EngineCommand;

#[async_trait]
impl CommandHandler for EngineCommand {
    fn name(&self) -> &str {
        "engine"
    }
    fn description(&self) -> &str {
        "inspect or restart engines"
    }
    fn usage(&self) -> &str {
        "engine list | engine restart <name>"
    }
    fn required_role(&self) -> Role {
        Role::Admin
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        match args.first().map(String::as_str) {
            Some("list") | None => {
                let mut out = String::new();
                for health in ctx.kernel.health_report() {
                    let _ = writeln!(
                        out,
                        "{:<10} {:<12} critical={} enabled={}",
                        health.name, health.state, health.critical, health.enabled
                    );
                }
                Ok(CommandOutcome::text(out.trim_end().to_string()))
            }
            Some("restart") => {
                let name = args
                    .get(1)
                    .ok_or_else(|| RuntimeError::Usage(self.usage().to_string()))?;
                ctx.kernel.restart_engine(name)?;
                Ok(CommandOutcome::text(format!("engine '{name}' restarted")))
            }
            Some(other) => Err(RuntimeError::Usage(format!(
                "{} (got '{other}')",
                self.usage()
            ))),
        }
    }
}

struct KeysCommand;

#[async_trait]
impl CommandHandler for KeysCommand {
    fn name(&self) -> &str {
        "keys"
    }
    fn description(&self) -> &str {
        "list, issue, or revoke access keys"
    }
    fn usage(&self) -> &str {
        "keys list | keys issue <role> [hours] [label] | keys revoke <key-id>"
    }
    fn required_role(&self) -> Role {
        Role::Admin
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        let security = ctx.security()?;
        match args.first().map(String::as_str) {
            Some("list") | None => {
                let keys = security.list_keys();
                if keys.is_empty() {
                    return Ok(CommandOutcome::text("keyring is empty"));
                }
                let mut out = String::new();
                for key in keys {
                    let liveness = if key.active { "active" } else { "inactive" };
                    let _ = writeln!(
                        out,
                        "{:<20} {:<6} {} {}",
                        key.key_id, key.role, liveness, key.label
                    );
                }
                Ok(CommandOutcome::text(out.trim_end().to_string()))
            }
            Some("issue") => {
                let role_raw = args
                    .get(1)
                    .ok_or_else(|| RuntimeError::Usage(self.usage().to_string()))?;
                let role = Role::from_str(role_raw)
                    .map_err(RuntimeError::Usage)?;
                let hours = args.get(2).and_then(|h| h.parse::<i64>().ok());
                let label = args.get(3).cloned();

                let record = security.issue_key(role, label, hours)?;
                Ok(CommandOutcome::text(format!(
                    "issued {} ({})",
                    record.key_id, record.role
                )))
            }
            Some("revoke") => {
                let key_id = args
                    .get(1)
                    .ok_or_else(|| RuntimeError::Usage(self.usage().to_string()))?;
                security.revoke_key(key_id)?;
                Ok(CommandOutcome::text(format!("revoked {key_id}")))
            }
            Some(other) => Err(RuntimeError::Usage(format!(
                "{} (got '{other}')",
                self.usage()
            ))),
        }
    }
}

struct AliasCommand;

#[async_trait]
impl CommandHandler for AliasCommand {
    fn name(&self) -> &str {
        "alias"
    }
    fn description(&self) -> &str {
        "manage command aliases"
    }
    fn usage(&self) -> &str {
        "alias list | alias set <name> <expansion...> | alias rm <name>"
    }
    fn required_role(&self) -> Role {
        Role::Admin
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        match args.first().map(String::as_str) {
            Some("list") | None => {
                let aliases = ctx.aliases.read();
                if aliases.is_empty() {
                    return Ok(CommandOutcome::text("no aliases defined"));
                }
                let mut out = String::new();
                for (name, expansion) in aliases.iter() {
                    let _ = writeln!(out, "{name} = {expansion}");
                }
                Ok(CommandOutcome::text(out.trim_end().to_string()))
            }
            Some("set") => {
                let name = args
                    .get(1)
                    .ok_or_else(|| RuntimeError::Usage(self.usage().to_string()))?;
                let expansion = args.get(2..).filter(|rest| !rest.is_empty()).ok_or_else(
                    || RuntimeError::Usage(self.usage().to_string()),
                )?;
                if ctx.registry.get(name).is_some() {
                    return Ok(CommandOutcome::text(format!(
                        "'{name}' is a registered command; the alias would never fire"
                    )));
                }
                let mut aliases = ctx.aliases.write();
                aliases.set(name.clone(), expansion.join(" "));
                aliases.save()?;
                Ok(CommandOutcome::text(format!("alias '{name}' saved")))
            }
            Some("rm") => {
                let name = args
                    .get(1)
                    .ok_or_else(|| RuntimeError::Usage(self.usage().to_string()))?;
                let mut aliases = ctx.aliases.write();
                if aliases.remove(name) {
                    aliases.save()?;
                    Ok(CommandOutcome::text(format!("alias '{name}' removed")))
                } else {
                    Ok(CommandOutcome::text(format!("no alias '{name}'")))
                }
            }
            Some(other) => Err(RuntimeError::Usage(format!(
                "{} (got '{other}')",
                self.usage()
            ))),
        }
    }
}

struct ReloadCommand;

#[async_trait]
impl CommandHandler for ReloadCommand {
    fn name(&self) -> &str {
        "reload"
    }
    fn description(&self) -> &str {
        "rebuild the command registry, or rebind one command"
    }
    fn usage(&self) -> &str {
        "reload [command]"
    }
    fn required_role(&self) -> Role {
        Role::Admin
    }

    async fn execute(
        &self,
        ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        if let Some(name) = args.first() {
            ctx.registry.reload_one(name, &ctx.config)?;
            return Ok(CommandOutcome::text(format!("rebound '{name}'")));
        }

        let report = ctx.registry.rebuild(&ctx.config)?;
        ctx.kernel.set_session_commands(ctx.registry.names());

        let mut out = format!(
            "reloaded: {} builtins, {} scripts",
            report.builtins, report.scripts
        );
        for warning in &report.warnings {
            let _ = write!(out, "\n  warning: {warning}");
        }
        Ok(CommandOutcome::text(out))
    }
}
