use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Static description of one origin of event data.
///
/// Sources are loaded by the caller (typically from a YAML file) and handed
/// to the engine by reference for the duration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Unique, stable identifier, e.g. `"stoup-ballard"`.
    pub key: String,
    /// Display name shown alongside every event from this source.
    pub name: String,
    /// Fetch address.
    pub url: String,
    /// Extraction strategy identifier, resolved by the strategy registry.
    pub strategy: String,
    /// Strategy-specific configuration. Opaque to everything but the
    /// strategy that reads it.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl Source {
    /// Convenience constructor for a source with no strategy settings.
    #[must_use]
    pub fn new(key: &str, name: &str, url: &str, strategy: &str) -> Self {
        Self {
            key: key.to_owned(),
            name: name.to_owned(),
            url: url.to_owned(),
            strategy: strategy.to_owned(),
            settings: BTreeMap::new(),
        }
    }

    /// Returns a copy with `key` set to `value` in the settings map.
    #[must_use]
    pub fn with_setting(mut self, key: &str, value: serde_json::Value) -> Self {
        self.settings.insert(key.to_owned(), value);
        self
    }
}
