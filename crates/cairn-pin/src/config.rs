use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PinError, PinResult};

/// Repo key under which the pin set root is persisted.
pub const DEFAULT_PIN_KEY: &str = "local/pins";

/// Members a pin-set trie node holds before it is split into buckets.
pub const DEFAULT_MAX_ITEMS_PER_NODE: usize = 8192;

/// Pin manager settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PinConfig {
    /// Repo key holding the digest of the persisted pin set.
    pub pin_key: String,
    /// Leaf capacity of the pin-set trie. Larger sets are sharded by digest
    /// prefix, one byte per level.
    pub max_items_per_node: usize,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            pin_key: DEFAULT_PIN_KEY.to_string(),
            max_items_per_node: DEFAULT_MAX_ITEMS_PER_NODE,
        }
    }
}

impl PinConfig {
    /// Parse and validate a TOML document. Missing fields take defaults.
    pub fn from_toml_str(s: &str) -> PinResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| PinError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> PinResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PinError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check the settings for values the manager cannot work with.
    pub fn validate(&self) -> PinResult<()> {
        if self.max_items_per_node == 0 {
            return Err(PinError::Config(
                "max_items_per_node must be at least 1".into(),
            ));
        }
        cairn_repo::validate_key_name(&self.pin_key)
            .map_err(|e| PinError::Config(e.to_string()))
    }

    /// Override the trie leaf capacity.
    pub fn with_max_items_per_node(mut self, max_items: usize) -> Self {
        self.max_items_per_node = max_items;
        self
    }
}
