//! Client-local preferences persisted between runs.
//!
//! Preferences are loaded once by the binary and passed to whatever needs
//! them. Nothing here is global.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::Tool;

/// Persisted user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// Organisations collapsed in the session list
    pub collapsed_organisations: BTreeSet<String>,
    /// Tool chosen on the last launch
    pub last_launch_tool: Option<Tool>,
}

impl Preferences {
    /// Default location: `<config dir>/agentrix/preferences.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("agentrix").join("preferences.json"))
    }

    /// Load preferences; a missing file yields the defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write preferences, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Whether an organisation is collapsed.
    pub fn is_collapsed(&self, org: &str) -> bool {
        self.collapsed_organisations.contains(org)
    }

    /// Collapse or expand an organisation. Returns true if anything changed.
    pub fn set_collapsed(&mut self, org: &str, collapsed: bool) -> bool {
        if collapsed {
            self.collapsed_organisations.insert(org.to_string())
        } else {
            self.collapsed_organisations.remove(org)
        }
    }
}
