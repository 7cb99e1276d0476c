//! Shell configuration.
//!
//! Settings come from `<root>/settings.json` with `GHOST_*` environment
//! variables taking precedence. Every field has a default so a fresh
//! install boots with no config file at all.

use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const SETTINGS_FILE: &str = "settings.json";

fn default_exec_timeout() -> u64 {
    30
}

fn default_autosave_interval() -> u64 {
    300
}

/// Runtime settings for one shell installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostConfig {
    /// Installation root. Not persisted; always supplied by the caller.
    #[serde(skip)]
    pub root: PathBuf,

    /// Seconds before a silent shell execution is cut off.
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,

    /// Seconds between background session autosaves.
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,

    /// Skip interactive prompts. First boot fails instead of prompting.
    #[serde(default)]
    pub headless: bool,

    /// Overrides the script command directory. Relative paths resolve
    /// against the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts_dir: Option<PathBuf>,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            exec_timeout_secs: default_exec_timeout(),
            autosave_interval_secs: default_autosave_interval(),
            headless: false,
            scripts_dir: None,
        }
    }
}

impl GhostConfig {
    /// Loads settings for `root`, applying environment overrides.
    ///
    /// A missing settings file yields defaults.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let root = root.into();
        let path = root.join(SETTINGS_FILE);

        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| RuntimeError::io(&path, e))?;
            serde_json::from_str::<Self>(&raw)?
        } else {
            debug!(path = %path.display(), "no settings file, using defaults");
            Self::default()
        };
        config.root = root;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_u64("GHOST_EXEC_TIMEOUT") {
            self.exec_timeout_secs = v;
        }
        if let Some(v) = env_u64("GHOST_AUTOSAVE_INTERVAL") {
            self.autosave_interval_secs = v;
        }
        if std::env::var("GHOST_HEADLESS").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        {
            self.headless = true;
        }
        if let Ok(dir) = std::env::var("GHOST_SCRIPTS_DIR") {
            self.scripts_dir = Some(PathBuf::from(dir));
        }
    }

    /// Persists the settings (minus the root) to `<root>/settings.json`.
    pub fn save(&self) -> Result<(), RuntimeError> {
        let path = self.root.join(SETTINGS_FILE);
        let body = serde_json::to_string_pretty(self)?;
        fs::write(&path, body).map_err(|e| RuntimeError::io(&path, e))?;
        Ok(())
    }

    #[must_use]
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    #[must_use]
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    /// `<root>/keys`, home of the keyring and key files.
    #[must_use]
    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    /// Script command directory, `<root>/scripts` unless overridden.
    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        match &self.scripts_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.root.join(dir),
            None => self.root.join("scripts"),
        }
    }

    /// `<root>/state`, kernel session and identity records.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    /// `<root>/engines.json`, the engine enable-override file.
    #[must_use]
    pub fn engines_file(&self) -> PathBuf {
        self.root.join("engines.json")
    }

    /// `<root>/commands.json`, the alias table.
    #[must_use]
    pub fn aliases_file(&self) -> PathBuf {
        self.root.join("commands.json")
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
