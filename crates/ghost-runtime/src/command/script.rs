//! Lua script commands.
//!
//! A script file under `<root>/scripts/*.lua` evaluates to a table:
//!
//! ```lua
//! return {
//!     description = "greet someone",
//!     usage = "greet <name>",
//!     required_role = "GUEST",
//!     execute = function(args)
//!         return "hello " .. (args[1] or "ghost")
//!     end,
//! }
//! ```
//!
//! The command name is the file stem. Scripts run in their own Lua state
//! with a small `ghost` helper table (`ghost.log`, `ghost.exec`). A
//! registry rebuild re-evaluates every file from disk, so editing a script
//! and running `reload` changes behavior without restarting the shell.

use crate::command::handler::{CommandContext, CommandHandler, CommandOutcome};
use crate::error::RuntimeError;
use async_trait::async_trait;
use ghost_auth::Role;
use mlua::{Function, Lua, RegistryKey, Table};
use parking_lot::Mutex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of scanning a scripts directory.
#[derive(Default)]
pub struct ScanResult {
    pub loaded: Vec<Arc<ScriptCommand>>,
    pub warnings: Vec<String>,
}

/// One command backed by a Lua script.
///
/// The Lua state is exclusive to this command and guarded by a mutex; the
/// `send` build of the interpreter makes the wrapper `Send + Sync`.
#[derive(Debug)]
pub struct ScriptCommand {
    lua: Mutex<Lua>,
    execute_key: RegistryKey,
    name: String,
    description: String,
    usage: String,
    required_role: Role,
    path: PathBuf,
}

impl ScriptCommand {
    /// Evaluates `path` and binds its command table. `exec_timeout` bounds
    /// every `ghost.exec` call the script makes.
    pub fn load(path: &Path, exec_timeout: Duration) -> Result<Self, RuntimeError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| RuntimeError::script(path, "invalid file name"))?
            .to_string();

        let source =
            std::fs::read_to_string(path).map_err(|e| RuntimeError::io(path, e))?;

        let lua = Lua::new();
        register_ghost_helpers(&lua, exec_timeout).map_err(|e| RuntimeError::script(path, e))?;

        let table: Table = lua
            .load(&source)
            .set_name(format!("@{}", path.display()))
            .eval()
            .map_err(|e| RuntimeError::script(path, e))?;

        let description: Option<String> = table
            .get("description")
            .map_err(|e: mlua::Error| RuntimeError::script(path, e))?;
        let usage: Option<String> = table
            .get("usage")
            .map_err(|e: mlua::Error| RuntimeError::script(path, e))?;
        let role_name: Option<String> = table
            .get("required_role")
            .map_err(|e: mlua::Error| RuntimeError::script(path, e))?;

        let required_role = match role_name {
            Some(raw) => Role::from_str(&raw.to_uppercase())
                .map_err(|e| RuntimeError::script(path, e))?,
            None => Role::Guest,
        };

        let execute: Function = table
            .get("execute")
            .map_err(|_: mlua::Error| RuntimeError::script(path, "missing 'execute' function"))?;
        let execute_key = lua
            .create_registry_value(execute)
            .map_err(|e| RuntimeError::script(path, e))?;

        debug!(command = %name, path = %path.display(), "script command loaded");
        Ok(Self {
            lua: Mutex::new(lua),
            execute_key,
            description: description.unwrap_or_default(),
            usage: usage.unwrap_or_else(|| name.clone()),
            name,
            required_role,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CommandHandler for ScriptCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn usage(&self) -> &str {
        &self.usage
    }

    fn required_role(&self) -> Role {
        self.required_role
    }

    async fn execute(
        &self,
        _ctx: &CommandContext,
        args: &[String],
    ) -> Result<CommandOutcome, RuntimeError> {
        let lua = self.lua.lock();
        let func: Function = lua
            .registry_value(&self.execute_key)
            .map_err(|e| RuntimeError::script(&self.path, e))?;

        let arg_table = lua
            .create_sequence_from(args.iter().cloned())
            .map_err(|e| RuntimeError::script(&self.path, e))?;
        let result: Option<String> = func
            .call(arg_table)
            .map_err(|e| RuntimeError::script(&self.path, e))?;

        Ok(CommandOutcome::text(result.unwrap_or_default()))
    }
}

/// Loads every `*.lua` file in `dir`. Failures become warnings, never
/// errors; one broken script must not take the registry down with it.
#[must_use]
pub fn load_dir(dir: &Path, exec_timeout: Duration) -> ScanResult {
    let mut result = ScanResult::default();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return result,
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "lua"))
        .collect();
    paths.sort();

    for path in paths {
        match ScriptCommand::load(&path, exec_timeout) {
            Ok(command) => result.loaded.push(Arc::new(command)),
            Err(e) => result.warnings.push(e.to_string()),
        }
    }
    result
}

/// Installs the `ghost` helper table: `ghost.log(level, msg)` and
/// `ghost.exec(cmd)` returning `{ok, stdout, stderr, code}`.
fn register_ghost_helpers(lua: &Lua, exec_timeout: Duration) -> Result<(), mlua::Error> {
    let ghost = lua.create_table()?;

    let log_fn = lua.create_function(|_, (level, msg): (String, String)| {
        match level.to_lowercase().as_str() {
            "debug" => tracing::debug!("[script] {}", msg),
            "warn" => tracing::warn!("[script] {}", msg),
            "error" => tracing::error!("[script] {}", msg),
            _ => tracing::info!("[script] {}", msg),
        }
        Ok(())
    })?;
    ghost.set("log", log_fn)?;

    let exec_fn = lua.create_function(move |lua, cmd: String| {
        let output = exec_bounded(&cmd, exec_timeout);
        let result = lua.create_table()?;
        result.set("ok", output.ok)?;
        result.set("stdout", output.stdout)?;
        result.set("stderr", output.stderr)?;
        result.set("code", output.code)?;
        Ok(result)
    })?;
    ghost.set("exec", exec_fn)?;

    lua.globals().set("ghost", ghost)?;
    Ok(())
}

struct BoundedOutput {
    ok: bool,
    stdout: String,
    stderr: String,
    code: i32,
}

/// Synchronous shell execution with the same deadline contract as the
/// root engine: expiry kills the child and comes back as a failed result,
/// never a Lua error.
fn exec_bounded(cmd: &str, timeout: Duration) -> BoundedOutput {
    let mut child = match std::process::Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return BoundedOutput {
                ok: false,
                stdout: String::new(),
                stderr: format!("failed to spawn: {e}"),
                code: -1,
            }
        }
    };

    // Pipes drain on their own threads so a chatty child cannot deadlock
    // against a full pipe buffer while we poll for exit.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || drain(stdout_pipe));
    let stderr_reader = std::thread::spawn(move || drain(stderr_pipe));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(20)),
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    match status {
        Some(status) => BoundedOutput {
            ok: status.success(),
            stdout,
            stderr,
            code: status.code().unwrap_or(-1),
        },
        None => BoundedOutput {
            ok: false,
            stdout,
            stderr: format!("command timed out after {}s", timeout.as_secs()),
            code: -1,
        },
    }
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buf = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasTable;
    use crate::command::registry::CommandRegistry;
    use crate::config::GhostConfig;
    use ghost_kernel::Kernel;
    use parking_lot::RwLock;

    const EXEC_TIMEOUT: Duration = Duration::from_secs(5);

    fn ctx(dir: &Path) -> CommandContext {
        CommandContext {
            kernel: Kernel::builder(dir).build(),
            config: GhostConfig::load(dir).expect("config"),
            registry: Arc::new(CommandRegistry::new()),
            aliases: Arc::new(RwLock::new(AliasTable::default())),
        }
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(format!("{name}.lua"));
        std::fs::write(&path, body).expect("write script");
        path
    }

    const GREET: &str = r#"
return {
    description = "greet someone",
    usage = "greet <name>",
    required_role = "GUEST",
    execute = function(args)
        return "hello " .. (args[1] or "ghost")
    end,
}
"#;

    #[tokio::test]
    async fn loads_and_executes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(dir.path(), "greet", GREET);

        let command = ScriptCommand::load(&path, EXEC_TIMEOUT).expect("load");
        assert_eq!(command.name(), "greet");
        assert_eq!(command.description(), "greet someone");
        assert_eq!(command.required_role(), Role::Guest);

        let ctx = ctx(dir.path());
        let out = command.execute(&ctx, &["operator".into()]).await.expect("execute");
        assert_eq!(out.text, "hello operator");
    }

    #[tokio::test]
    async fn reload_picks_up_edited_script() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(dir.path(), "greet", GREET);
        let ctx = ctx(dir.path());

        let v1 = ScriptCommand::load(&path, EXEC_TIMEOUT).expect("load v1");
        assert_eq!(v1.execute(&ctx, &[]).await.expect("v1").text, "hello ghost");

        write_script(
            dir.path(),
            "greet",
            r#"return { execute = function(args) return "goodbye" end }"#,
        );
        let v2 = ScriptCommand::load(&path, EXEC_TIMEOUT).expect("load v2");
        assert_eq!(v2.execute(&ctx, &[]).await.expect("v2").text, "goodbye");
    }

    #[test]
    fn missing_execute_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(dir.path(), "broken", "return { description = 'no body' }");
        let err = ScriptCommand::load(&path, EXEC_TIMEOUT).unwrap_err();
        assert!(err.to_string().contains("execute"));
    }

    #[test]
    fn bad_role_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(
            dir.path(),
            "odd",
            r#"return { required_role = "WIZARD", execute = function() return "" end }"#,
        );
        assert!(ScriptCommand::load(&path, EXEC_TIMEOUT).is_err());
    }

    #[test]
    fn scan_collects_warnings_without_failing() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_script(dir.path(), "good", GREET);
        write_script(dir.path(), "bad", "this is not lua at all ((");

        let scan = load_dir(dir.path(), EXEC_TIMEOUT);
        assert_eq!(scan.loaded.len(), 1);
        assert_eq!(scan.warnings.len(), 1);
    }

    #[test]
    fn scan_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scan = load_dir(&dir.path().join("absent"), EXEC_TIMEOUT);
        assert!(scan.loaded.is_empty());
        assert!(scan.warnings.is_empty());
    }

    #[tokio::test]
    async fn ghost_exec_helper_is_available() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(
            dir.path(),
            "shellout",
            r#"
return {
    required_role = "ADMIN",
    execute = function(args)
        local r = ghost.exec("echo from-lua")
        if r.ok then return r.stdout else return r.stderr end
    end,
}
"#,
        );
        let command = ScriptCommand::load(&path, EXEC_TIMEOUT).expect("load");
        let ctx = ctx(dir.path());
        let out = command.execute(&ctx, &[]).await.expect("execute");
        assert_eq!(out.text.trim(), "from-lua");
    }

    #[tokio::test]
    async fn ghost_exec_enforces_the_deadline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_script(
            dir.path(),
            "slow",
            r#"
return {
    execute = function(args)
        local r = ghost.exec("sleep 5")
        if r.ok then return "finished" else return r.stderr end
    end,
}
"#,
        );
        let command =
            ScriptCommand::load(&path, Duration::from_millis(300)).expect("load");
        let ctx = ctx(dir.path());
        let out = command.execute(&ctx, &[]).await.expect("execute");
        assert!(out.text.contains("timed out"), "got: {}", out.text);
    }
}
