//! # Configuration
//!
//! The workflow-level config map is plain JSON underneath — the same value
//! type task arguments use — loaded from an optional TOML file via the
//! [`config`](https://docs.rs/config) crate, the way the CLI's `--config`
//! flag has always worked. Tasks see it through [`TaskContext::config`],
//! never the raw file.

use crate::error::{ConfigError, EngineError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A workflow's configuration, handed to every task via [`TaskContext`].
///
/// Wraps a flat-ish JSON map rather than a typed struct: task functions are
/// registered by name across a whole binary and the engine has no way to
/// know ahead of time which keys any one of them needs.
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: BTreeMap<String, Value>,
}

impl ConfigMap {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Load a TOML config file, deserializing it into a JSON map.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| EngineError::Other(format!("failed to load config {}: {e}", path.display())))?;

        let value: serde_json::Map<String, Value> = settings
            .try_deserialize()
            .map_err(|e| EngineError::Other(format!("failed to parse config {}: {e}", path.display())))?;

        Ok(Self {
            values: value.into_iter().collect(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Fetch a required key, the way a task does when it needs something
    /// from the config rather than treating it as optional.
    pub fn require(&self, key: &str) -> Result<&Value, ConfigError> {
        self.values.get(key).ok_or_else(|| ConfigError(key.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The full map, as handed verbatim to each worker subprocess.
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_missing_key_errors() {
        let cfg = ConfigMap::default();
        let err = cfg.require("missing").unwrap_err();
        assert_eq!(err.0, "missing");
    }

    #[test]
    fn get_present_key() {
        let mut values = BTreeMap::new();
        values.insert("threshold".to_string(), json!(42));
        let cfg = ConfigMap::new(values);
        assert_eq!(cfg.get("threshold"), Some(&json!(42)));
    }

    #[test]
    fn load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "threshold = 42\nname = \"demo\"\n").unwrap();

        let cfg = ConfigMap::load(&path).unwrap();
        assert_eq!(cfg.get("threshold"), Some(&json!(42)));
        assert_eq!(cfg.get("name"), Some(&json!("demo")));
    }
}
