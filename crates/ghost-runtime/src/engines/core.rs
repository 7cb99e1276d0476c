//! Core engine: host facts, node identity, and data directories.
//!
//! Boots first and critically. Every other engine may assume the data
//! directories exist once `core` is running.

use crate::error::RuntimeError;
use chrono::{DateTime, Utc};
use ghost_kernel::{BootContext, Engine, EngineError};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const NODE_FILE: &str = "node.json";

/// Persistent identity of this installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_id: Uuid,
    pub created: DateTime<Utc>,
}

impl NodeIdentity {
    fn fresh() -> Self {
        Self {
            node_id: Uuid::new_v4(),
            created: Utc::now(),
        }
    }
}

/// Host facts and installation identity.
pub struct CoreEngine {
    root: PathBuf,
    identity: NodeIdentity,
    started: DateTime<Utc>,
}

impl CoreEngine {
    /// Loads or mints the node identity under `<root>/state/node.json`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let root = root.into();
        let state_dir = root.join("state");
        fs::create_dir_all(&state_dir).map_err(|e| RuntimeError::io(&state_dir, e))?;

        let node_path = state_dir.join(NODE_FILE);
        let identity = if node_path.exists() {
            let raw = fs::read_to_string(&node_path).map_err(|e| RuntimeError::io(&node_path, e))?;
            serde_json::from_str(&raw)?
        } else {
            let identity = NodeIdentity::fresh();
            let body = serde_json::to_string_pretty(&identity)?;
            fs::write(&node_path, body).map_err(|e| RuntimeError::io(&node_path, e))?;
            info!(node_id = %identity.node_id, "minted new node identity");
            identity
        };

        Ok(Self {
            root,
            identity,
            started: Utc::now(),
        })
    }

    #[must_use]
    pub fn node_id(&self) -> Uuid {
        self.identity.node_id
    }

    #[must_use]
    pub fn os(&self) -> &'static str {
        std::env::consts::OS
    }

    #[must_use]
    pub fn arch(&self) -> &'static str {
        std::env::consts::ARCH
    }

    #[must_use]
    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Seconds since this engine came up.
    #[must_use]
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started).num_seconds()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a data file or directory under the installation root.
    #[must_use]
    pub fn data_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// One-line host summary for the `sysinfo` command.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "node {} | {}/{} | up {}s",
            self.identity.node_id,
            self.os(),
            self.arch(),
            self.uptime_secs()
        )
    }
}

impl Engine for CoreEngine {
    fn name(&self) -> &str {
        "core"
    }

    fn init(&mut self, _ctx: &BootContext) -> Result<(), EngineError> {
        for dir in ["keys", "scripts", "state"] {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).map_err(EngineError::init)?;
        }
        info!(node_id = %self.identity.node_id, os = self.os(), "core engine online");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = CoreEngine::open(dir.path()).expect("open");
        let second = CoreEngine::open(dir.path()).expect("reopen");
        assert_eq!(first.node_id(), second.node_id());
    }

    #[test]
    fn init_creates_data_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = CoreEngine::open(dir.path()).expect("open");
        let kernel = ghost_kernel::Kernel::builder(dir.path()).build();
        engine.init(&BootContext::new(kernel)).expect("init");

        for sub in ["keys", "scripts", "state"] {
            assert!(dir.path().join(sub).is_dir(), "{sub} missing");
        }
    }

    #[test]
    fn summary_names_the_node() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = CoreEngine::open(dir.path()).expect("open");
        assert!(engine.summary().contains(&engine.node_id().to_string()));
    }
}
