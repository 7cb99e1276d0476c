//! Boot sequence descriptors and the enable-override file.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One entry of the boot sequence.
///
/// Immutable once the sequence is handed to [`Kernel::boot`]
/// (crate::Kernel::boot). `engine_ref` is the opaque key under which the
/// engine's factory was registered; `type_name` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    pub name: String,
    pub engine_ref: String,
    pub type_name: String,
    pub critical: bool,
    pub enabled: bool,
}

impl EngineDescriptor {
    /// New enabled descriptor where the factory key equals the name.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, critical: bool) -> Self {
        let name = name.into();
        Self {
            engine_ref: name.clone(),
            name,
            type_name: type_name.into(),
            critical,
            enabled: true,
        }
    }

    /// Overrides the factory key.
    #[must_use]
    pub fn with_ref(mut self, engine_ref: impl Into<String>) -> Self {
        self.engine_ref = engine_ref.into();
        self
    }

    /// Marks the descriptor disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Per-engine override entry of the `engines.json` file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineOverride {
    pub enabled: bool,
}

/// The engine enable-override file (`engines.json`).
///
/// Maps engine names to `{ "enabled": bool }` and is applied to the boot
/// sequence before each load attempt. Unknown names are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineOverrides(HashMap<String, EngineOverride>);

impl EngineOverrides {
    /// Loads overrides from `path`. A missing file yields no overrides.
    pub fn load(path: &Path) -> Result<Self, KernelError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|e| KernelError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Applies the overrides to a boot sequence in place.
    pub fn apply(&self, sequence: &mut [EngineDescriptor]) {
        for descriptor in sequence {
            if let Some(entry) = self.0.get(&descriptor.name) {
                descriptor.enabled = entry.enabled;
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
