use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::error::{ConfigError, Result};

/// Config keys that an environment variable overrides unconditionally.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    (crate::KEY_CONTAINER_BINARY, "VEER_SINGULARITY_BINARY"),
    (crate::KEY_CONTAINER_IMAGE, "VEER_CONTAINER_IMAGE"),
    (crate::KEY_CONTAINER_APP, "VEER_CONTAINER_APP"),
    (crate::KEY_INTERPRETER_BINARY, "VEER_INTERPRETER_BINARY"),
];

/// Environment variable overriding `key`, if any.
pub fn env_override_for(key: &str) -> Option<&'static str> {
    ENV_OVERRIDES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, var)| *var)
}

/// Built-in defaults every configuration starts from.
pub fn defaults() -> Value {
    json!({
        "singularity": { "binary": "singularity" },
        "interpreter": { "binary": "sh" },
    })
}

/// Where environment lookups go.
#[derive(Debug, Clone, Default)]
pub enum Environment {
    /// The process environment.
    #[default]
    Process,
    /// A fixed set of variables; the process environment is ignored.
    Fixed(BTreeMap<String, String>),
}

impl Environment {
    /// A fixed environment from name/value pairs.
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Look up a variable. Non-UTF-8 values count as unset.
    pub fn var(&self, name: &str) -> Option<String> {
        match self {
            Environment::Process => std::env::var(name).ok(),
            Environment::Fixed(vars) => vars.get(name).cloned(),
        }
    }

    /// Whether a variable is present (any value, including empty).
    pub fn is_set(&self, name: &str) -> bool {
        match self {
            Environment::Process => std::env::var_os(name).is_some(),
            Environment::Fixed(vars) => vars.contains_key(name),
        }
    }
}

/// A configuration tree plus the environment that overrides it.
#[derive(Debug, Clone)]
pub struct Config {
    values: Map<String, Value>,
    environment: Environment,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Config {
    /// Configuration holding exactly `values` (non-mappings become empty).
    pub fn new(values: Value) -> Self {
        let values = match values {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            values,
            environment: Environment::Process,
        }
    }

    /// Configuration holding only the built-in defaults.
    pub fn with_defaults() -> Self {
        Self::new(defaults())
    }

    /// Replace the environment used for overrides and markers.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Look up an environment variable through this configuration.
    pub fn env_var(&self, name: &str) -> Option<String> {
        self.environment.var(name)
    }

    /// Whether an environment marker is present.
    pub fn env_is_set(&self, name: &str) -> bool {
        self.environment.is_set(name)
    }

    /// The stored tree (without environment overrides).
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Get an item by dotted key.
    ///
    /// A set environment override wins over the stored value. Mappings are
    /// returned as copies; editing them does not touch the configuration.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(var) = env_override_for(key) {
            if let Some(value) = self.environment.var(var) {
                return Some(Value::String(value));
            }
        }

        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current.clone())
    }

    /// Get a scalar item rendered as a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            Value::Null | Value::Object(_) | Value::Array(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set an item by dotted key, creating intermediate mappings.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let parts = split_key(key)?;
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?;

        let mut target = &mut self.values;
        for (depth, part) in parents.iter().enumerate() {
            let entry = target
                .entry((*part).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            target = entry
                .as_object_mut()
                .ok_or_else(|| ConfigError::NotAMapping {
                    key: key.to_string(),
                    parent: parents[..=depth].join("."),
                })?;
        }
        target.insert((*last).to_string(), value.into());
        Ok(())
    }

    /// Merge another layer on top of this configuration.
    pub fn merge(&mut self, layer: Value) -> Result<()> {
        match layer {
            Value::Object(map) => merge_into(&mut self.values, map),
            Value::Null => Ok(()),
            other => Err(ConfigError::MergeConflict {
                key: "<root>".to_string(),
                existing: other.to_string(),
            }),
        }
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }
    Ok(parts)
}

/// Recursively merge `from` into `into`.
///
/// Mappings merge key by key, scalars and lists replace. A mapping in `from`
/// landing on a non-mapping in `into` is a [`ConfigError::MergeConflict`].
pub fn merge_into(into: &mut Map<String, Value>, from: Map<String, Value>) -> Result<()> {
    merge_at(into, from, "")
}

fn merge_at(into: &mut Map<String, Value>, from: Map<String, Value>, prefix: &str) -> Result<()> {
    for (key, value) in from {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Object(nested) => {
                let slot = into
                    .entry(key)
                    .or_insert_with(|| Value::Object(Map::new()));
                match slot {
                    Value::Object(existing) => merge_at(existing, nested, &path)?,
                    other => {
                        return Err(ConfigError::MergeConflict {
                            key: path,
                            existing: other.to_string(),
                        })
                    }
                }
            }
            scalar => {
                into.insert(key, scalar);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isolated(values: Value) -> Config {
        Config::new(values).with_environment(Environment::fixed(Vec::<(String, String)>::new()))
    }

    #[test]
    fn defaults_present() {
        let cfg = Config::with_defaults().with_environment(Environment::fixed([("A", "b")]));
        assert_eq!(
            cfg.get_str(crate::KEY_CONTAINER_BINARY).as_deref(),
            Some("singularity")
        );
        assert_eq!(cfg.get_str(crate::KEY_INTERPRETER_BINARY).as_deref(), Some("sh"));
        assert!(cfg.get(crate::KEY_CONTAINER_IMAGE).is_none());
    }

    #[test]
    fn environment_wins_over_stored_value() {
        let mut cfg = Config::with_defaults().with_environment(Environment::fixed([
            ("VEER_CONTAINER_IMAGE", "/from/env.sif"),
            ("VEER_SINGULARITY_BINARY", "apptainer"),
        ]));
        cfg.set(crate::KEY_CONTAINER_IMAGE, "/stored.sif").unwrap();

        assert_eq!(
            cfg.get_str(crate::KEY_CONTAINER_IMAGE).as_deref(),
            Some("/from/env.sif")
        );
        assert_eq!(
            cfg.get_str(crate::KEY_CONTAINER_BINARY).as_deref(),
            Some("apptainer")
        );
    }

    #[test]
    fn environment_ignored_for_unmapped_keys() {
        let mut cfg = isolated(json!({}))
            .with_environment(Environment::fixed([("VEER_CONTAINER_APP", "env-app")]));
        cfg.set("foo.bar", "stored").unwrap();
        assert_eq!(cfg.get_str("foo.bar").as_deref(), Some("stored"));
        assert_eq!(cfg.get_str(crate::KEY_CONTAINER_APP).as_deref(), Some("env-app"));
    }

    #[test]
    fn set_then_get_nested() {
        let mut cfg = isolated(json!({}));
        cfg.set("foo.bar.dead", "beef").unwrap();

        assert_eq!(cfg.get("foo.bar.dead"), Some(json!("beef")));
        assert!(cfg.get("foo.bar").unwrap().is_object());
    }

    #[test]
    fn mappings_are_returned_as_copies() {
        let mut cfg = isolated(json!({}));
        cfg.set("foo.bar.dead", "beef").unwrap();

        let mut copy = cfg.get("foo.bar").unwrap();
        copy.as_object_mut().unwrap().remove("dead");
        assert_eq!(cfg.get("foo.bar.dead"), Some(json!("beef")));
    }

    #[test]
    fn missing_keys_are_none() {
        let cfg = isolated(json!({ "a": { "b": 1 } }));
        assert!(cfg.get("a.c").is_none());
        assert!(cfg.get("a.b.c").is_none());
        assert!(cfg.get("z").is_none());
    }

    #[test]
    fn get_str_renders_scalars() {
        let cfg = isolated(json!({ "n": 3, "flag": true, "list": [1] }));
        assert_eq!(cfg.get_str("n").as_deref(), Some("3"));
        assert_eq!(cfg.get_str("flag").as_deref(), Some("true"));
        assert!(cfg.get_str("list").is_none());
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut cfg = isolated(json!({ "a": 1 }));
        let err = cfg.set("a.b", 2).unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping { ref parent, .. } if parent == "a"));
    }

    #[test]
    fn set_rejects_empty_segments() {
        let mut cfg = isolated(json!({}));
        assert!(matches!(cfg.set("a..b", 1), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(cfg.set("", 1), Err(ConfigError::InvalidKey(_))));
    }

    #[test]
    fn merge_overlays_recursively() {
        let mut cfg = Config::with_defaults();
        cfg.merge(json!({
            "singularity": { "binary": "/opt/bin/singularity" },
            "default_container": { "image": "/c.sif", "app": "sim" },
        }))
        .unwrap();

        assert_eq!(
            cfg.values()["singularity"]["binary"],
            json!("/opt/bin/singularity")
        );
        assert_eq!(cfg.values()["interpreter"]["binary"], json!("sh"));
        assert_eq!(cfg.values()["default_container"]["app"], json!("sim"));
    }

    #[test]
    fn merge_conflict_reports_full_key() {
        let mut cfg = isolated(json!({ "a": { "b": 1 } }));
        let err = cfg.merge(json!({ "a": { "b": { "c": 2 } } })).unwrap_err();
        assert!(matches!(err, ConfigError::MergeConflict { ref key, .. } if key == "a.b"));
    }

    #[test]
    fn merge_null_is_noop() {
        let mut cfg = isolated(json!({ "a": 1 }));
        cfg.merge(Value::Null).unwrap();
        assert_eq!(cfg.get("a"), Some(json!(1)));
    }

    #[test]
    fn env_override_table() {
        assert_eq!(
            env_override_for("default_container.image"),
            Some("VEER_CONTAINER_IMAGE")
        );
        assert_eq!(env_override_for("foo"), None);
    }
}
