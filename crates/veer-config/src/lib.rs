//! Configuration provider for veer.
//!
//! Configuration is a tree of values addressed by dotted keys
//! (`default_container.image`). A handful of keys can be overridden from the
//! environment; a set override always wins over the stored value.
//!
//! A process-wide configuration lives in [`store`]. Sessions take an
//! `Arc<Config>` snapshot of it, or any other `Config` a caller builds.

pub mod config;
pub mod error;
pub mod loader;
pub mod store;

pub use config::{defaults, env_override_for, merge_into, Config, Environment, ENV_OVERRIDES};
pub use error::{ConfigError, Result};
pub use loader::{candidate_paths, read_config};
pub use store::{
    get_config, global, read_set_config, replace_global, set_config, set_default_container_app,
    set_default_container_image,
};

/// Key of the container runtime binary.
pub const KEY_CONTAINER_BINARY: &str = "singularity.binary";
/// Key of the default container image.
pub const KEY_CONTAINER_IMAGE: &str = "default_container.image";
/// Key of the default container app.
pub const KEY_CONTAINER_APP: &str = "default_container.app";
/// Key of the interpreter that runs launcher scripts.
pub const KEY_INTERPRETER_BINARY: &str = "interpreter.binary";
