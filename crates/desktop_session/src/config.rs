//! Session configuration with serde defaults and an optional stored override.

use leptos::logging;
use platform_host::{load_typed_with, KeyValueStore};
use serde::{Deserialize, Serialize};

use crate::model::{DEFAULT_BASE_Z_INDEX, DEFAULT_MODAL_Z_INDEX};

/// Storage key of the optional JSON override for [`SessionConfig`].
pub const SESSION_CONFIG_KEY: &str = "desktop.session.config";

/// Rewrites paths recorded under an older root-folder convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPathRule {
    pub from: String,
    pub to: String,
}

impl LegacyPathRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key the session snapshot is stored under.
    pub storage_key: String,
    /// Quiet period before a debounced save is written.
    pub save_debounce_ms: u64,
    /// z-index of the bottom-most window.
    pub base_z_index: u32,
    /// z-index floor for modal overlays.
    pub modal_z_index: u32,
    pub restore_on_boot: bool,
    /// Upper bound on restored windows; `0` restores everything.
    pub max_restore_windows: usize,
    pub legacy_path_rules: Vec<LegacyPathRule>,
    /// Instance-state keys whose string values are virtual filesystem paths.
    pub path_state_keys: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: "desktop.session.v2".to_string(),
            save_debounce_ms: 400,
            base_z_index: DEFAULT_BASE_Z_INDEX,
            modal_z_index: DEFAULT_MODAL_Z_INDEX,
            restore_on_boot: true,
            max_restore_windows: 0,
            legacy_path_rules: vec![LegacyPathRule::new("/home", "/Users")],
            path_state_keys: ["path", "cwd", "current_path", "file_path", "root"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl SessionConfig {
    /// Loads the stored override, falling back to defaults when absent or malformed.
    pub fn load(store: &dyn KeyValueStore, key: &str) -> Self {
        match load_typed_with::<_, SessionConfig>(store, key) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(err) => {
                logging::warn!("session config load failed, using defaults: {err}");
                Self::default()
            }
        }
    }
}
