//! Hot-swappable command registry.
//!
//! The registry publishes an immutable snapshot behind `Arc`. Lookups
//! clone the snapshot pointer; a reload builds a complete replacement map
//! offline and swaps it in one write. In-flight dispatches keep executing
//! against the snapshot they resolved from, so a reload never observes a
//! half-built registry.
//!
//! Single-entry reloads follow the same rule: the new binding is built
//! first, and only on success replaces the old one. A failed rebind
//! leaves the previous handler active.

use crate::command::builtin;
use crate::command::handler::CommandHandler;
use crate::command::script::{self, ScriptCommand};
use crate::config::GhostConfig;
use crate::error::RuntimeError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

type HandlerMap = HashMap<String, Arc<dyn CommandHandler>>;

/// Where a registered command came from, for single-entry rebinds.
#[derive(Debug, Clone)]
enum Origin {
    Builtin,
    Script(PathBuf),
}

/// Result of a full registry rebuild.
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub builtins: usize,
    pub scripts: usize,
    /// One line per script that failed to load. Never fatal.
    pub warnings: Vec<String>,
}

impl ReloadReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.builtins + self.scripts
    }
}

/// Name to handler map with snapshot-and-swap reload.
#[derive(Default)]
pub struct CommandRegistry {
    snapshot: RwLock<Arc<HandlerMap>>,
    origins: RwLock<HashMap<String, Origin>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a command by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.snapshot.read().get(name).cloned()
    }

    /// The current snapshot, for iteration without holding the lock.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HandlerMap> {
        Arc::clone(&self.snapshot.read())
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.read().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    /// Replaces the snapshot with builtin handlers only. Test seam; the
    /// production path is [`CommandRegistry::rebuild`].
    pub fn replace(&self, handlers: Vec<Arc<dyn CommandHandler>>) {
        let mut map: HandlerMap = HashMap::with_capacity(handlers.len());
        let mut origins = HashMap::with_capacity(handlers.len());
        for handler in handlers {
            let name = handler.name().to_string();
            if map.contains_key(&name) {
                warn!(command = %name, "duplicate command name, keeping earlier registration");
                continue;
            }
            origins.insert(name.clone(), Origin::Builtin);
            map.insert(name, handler);
        }
        *self.origins.write() = origins;
        *self.snapshot.write() = Arc::new(map);
    }

    /// Full rebuild: the builtin table plus every loadable script under
    /// the scripts directory, swapped in atomically. Builtins are listed
    /// first, so a script can never shadow one.
    pub fn rebuild(&self, config: &GhostConfig) -> Result<ReloadReport, RuntimeError> {
        let builtins = builtin::builtin_commands();
        let scan = script::load_dir(&config.scripts_dir(), config.exec_timeout());

        let mut map: HandlerMap = HashMap::new();
        let mut origins = HashMap::new();
        let mut report = ReloadReport {
            builtins: builtins.len(),
            scripts: 0,
            warnings: scan.warnings,
        };

        for handler in builtins {
            let name = handler.name().to_string();
            origins.insert(name.clone(), Origin::Builtin);
            map.insert(name, handler);
        }
        for command in scan.loaded {
            let name = command.name().to_string();
            if map.contains_key(&name) {
                report
                    .warnings
                    .push(format!("script '{name}' shadows a builtin, skipped"));
                continue;
            }
            origins.insert(name.clone(), Origin::Script(command.path().to_path_buf()));
            map.insert(name, command);
            report.scripts += 1;
        }

        *self.origins.write() = origins;
        *self.snapshot.write() = Arc::new(map);

        for warning in &report.warnings {
            warn!(%warning, "script skipped");
        }
        info!(
            builtins = report.builtins,
            scripts = report.scripts,
            "command registry rebuilt"
        );
        Ok(report)
    }

    /// Rebinds one entry from its origin.
    ///
    /// Unknown names fail with zero side effects. A script that no longer
    /// evaluates fails and leaves the previous binding active.
    pub fn reload_one(&self, name: &str, config: &GhostConfig) -> Result<(), RuntimeError> {
        let origin = self
            .origins
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownCommand(name.to_string()))?;

        let fresh: Arc<dyn CommandHandler> = match origin {
            Origin::Builtin => builtin::builtin_commands()
                .into_iter()
                .find(|h| h.name() == name)
                .ok_or_else(|| RuntimeError::UnknownCommand(name.to_string()))?,
            Origin::Script(path) => Arc::new(ScriptCommand::load(&path, config.exec_timeout())?),
        };

        let mut guard = self.snapshot.write();
        let mut map: HandlerMap = (**guard).clone();
        map.insert(name.to_string(), fresh);
        *guard = Arc::new(map);
        info!(command = name, "command rebound");
        Ok(())
    }

    /// Rebinds every entry, one at a time. Per-name outcomes; failures do
    /// not stop the walk.
    pub fn reload_all(&self, config: &GhostConfig) -> BTreeMap<String, Result<(), String>> {
        let names: Vec<String> = self.origins.read().keys().cloned().collect();
        names
            .into_iter()
            .map(|name| {
                let outcome = self.reload_one(&name, config).map_err(|e| e.to_string());
                (name, outcome)
            })
            .collect()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::handler::{CommandContext, CommandOutcome};
    use async_trait::async_trait;
    use ghost_auth::Role;
    use std::fs;

    struct FakeCommand {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl CommandHandler for FakeCommand {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            self.reply
        }
        fn usage(&self) -> &str {
            self.name
        }
        fn required_role(&self) -> Role {
            Role::Guest
        }
        async fn execute(
            &self,
            _ctx: &CommandContext,
            _args: &[String],
        ) -> Result<CommandOutcome, RuntimeError> {
            Ok(CommandOutcome::text(self.reply))
        }
    }

    fn fake(name: &'static str, reply: &'static str) -> Arc<dyn CommandHandler> {
        Arc::new(FakeCommand { name, reply })
    }

    fn config(dir: &std::path::Path) -> GhostConfig {
        GhostConfig::load(dir).expect("config")
    }

    #[test]
    fn lookup_hits_and_misses() {
        let registry = CommandRegistry::new();
        registry.replace(vec![fake("status", "ok")]);
        assert!(registry.get("status").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn earlier_registration_wins_on_collision() {
        let registry = CommandRegistry::new();
        registry.replace(vec![fake("status", "builtin"), fake("status", "script")]);
        assert_eq!(registry.len(), 1);
        let kept = registry.get("status").expect("kept");
        assert_eq!(kept.description(), "builtin");
    }

    #[test]
    fn old_snapshot_survives_a_swap() {
        let registry = CommandRegistry::new();
        registry.replace(vec![fake("status", "v1")]);
        let held = registry.snapshot();

        registry.replace(vec![fake("reload", "v2")]);
        assert!(held.contains_key("status"), "held snapshot is immutable");
        assert!(registry.get("status").is_none());
        assert!(registry.get("reload").is_some());
    }

    #[test]
    fn names_are_sorted() {
        let registry = CommandRegistry::new();
        registry.replace(vec![fake("zeta", ""), fake("alpha", "")]);
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn rebuild_installs_builtin_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = CommandRegistry::new();
        let report = registry.rebuild(&config(dir.path())).expect("rebuild");

        assert!(report.builtins > 0);
        assert_eq!(report.scripts, 0);
        assert!(registry.get("help").is_some());
        assert!(registry.get("status").is_some());
    }

    #[test]
    fn script_shadowing_a_builtin_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&scripts).expect("scripts dir");
        fs::write(
            scripts.join("help.lua"),
            r#"return { execute = function() return "impostor" end }"#,
        )
        .expect("write");

        let registry = CommandRegistry::new();
        let report = registry.rebuild(&config(dir.path())).expect("rebuild");
        assert_eq!(report.scripts, 0);
        assert!(report.warnings.iter().any(|w| w.contains("shadows")));
        assert_eq!(
            registry.get("help").expect("help").description(),
            "list commands, or show usage for one"
        );
    }

    #[test]
    fn reload_one_unknown_name_fails_without_side_effects() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path());
        let registry = CommandRegistry::new();
        registry.rebuild(&config).expect("rebuild");
        let before = registry.len();

        let err = registry.reload_one("phantom", &config).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownCommand(_)));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn reload_one_failure_keeps_previous_binding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&scripts).expect("scripts dir");
        let path = scripts.join("greet.lua");
        fs::write(
            &path,
            r#"return { description = "v1", execute = function() return "v1" end }"#,
        )
        .expect("write v1");

        let config = config(dir.path());
        let registry = CommandRegistry::new();
        registry.rebuild(&config).expect("rebuild");
        assert_eq!(registry.get("greet").expect("greet").description(), "v1");

        // Break the script on disk; the live binding must survive.
        fs::write(&path, "not lua ((").expect("break it");
        assert!(registry.reload_one("greet", &config).is_err());
        assert_eq!(registry.get("greet").expect("greet").description(), "v1");
    }

    #[test]
    fn reload_one_picks_up_an_edit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&scripts).expect("scripts dir");
        let path = scripts.join("greet.lua");
        fs::write(
            &path,
            r#"return { description = "v1", execute = function() return "v1" end }"#,
        )
        .expect("write v1");

        let config = config(dir.path());
        let registry = CommandRegistry::new();
        registry.rebuild(&config).expect("rebuild");

        fs::write(
            &path,
            r#"return { description = "v2", execute = function() return "v2" end }"#,
        )
        .expect("write v2");
        registry.reload_one("greet", &config).expect("rebind");
        assert_eq!(registry.get("greet").expect("greet").description(), "v2");
    }

    #[test]
    fn reload_all_reports_per_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scripts = dir.path().join("scripts");
        fs::create_dir_all(&scripts).expect("scripts dir");
        fs::write(
            scripts.join("good.lua"),
            r#"return { execute = function() return "ok" end }"#,
        )
        .expect("write");

        let config = config(dir.path());
        let registry = CommandRegistry::new();
        registry.rebuild(&config).expect("rebuild");

        fs::write(scripts.join("good.lua"), "broken ((").expect("break");
        let results = registry.reload_all(&config);
        assert!(results["good"].is_err());
        assert!(results["help"].is_ok());
    }
}
