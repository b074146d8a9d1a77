use std::path::PathBuf;

/// Errors that can occur while loading or editing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML/JSON.
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A mapping in one layer collides with a scalar in another.
    #[error("{key} describes a mapping, but the existing value is {existing}")]
    MergeConflict { key: String, existing: String },

    /// A key cannot be set because a parent holds a scalar.
    #[error("cannot set {key}: {parent} is not a mapping")]
    NotAMapping { key: String, parent: String },

    /// The key is empty or has an empty segment.
    #[error("invalid config key {0:?}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
