//! Process-wide configuration.
//!
//! The global configuration is an `Arc<Config>` behind a lock. Readers take a
//! cheap snapshot with [`global`]; [`read_set_config`] replaces the whole
//! configuration at once and [`set_config`] swaps in an edited copy, so a
//! session that already holds a snapshot never observes a half-applied change.

use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::config::{Config, Environment};
use crate::error::Result;
use crate::loader::read_config;

static GLOBAL: OnceLock<RwLock<Arc<Config>>> = OnceLock::new();

fn cell() -> &'static RwLock<Arc<Config>> {
    GLOBAL.get_or_init(|| RwLock::new(Arc::new(initial_config())))
}

/// Defaults plus the first config file found; a broken file leaves defaults.
fn initial_config() -> Config {
    match load(None) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable config, using defaults");
            Config::with_defaults()
        }
    }
}

fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::with_defaults();
    debug!(defaults = ?config.values(), "set defaults");
    config.merge(read_config(path, &Environment::Process)?)?;
    Ok(config)
}

/// Snapshot of the process-wide configuration.
pub fn global() -> Arc<Config> {
    cell()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the process-wide configuration.
pub fn replace_global(config: Config) {
    *cell().write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
}

/// Reset to defaults and merge a config file over them.
///
/// Without `path` the usual locations are searched (see
/// [`crate::candidate_paths`]); with one, that exact file must exist.
pub fn read_set_config(path: Option<&Path>) -> Result<()> {
    let config = load(path)?;
    replace_global(config);
    Ok(())
}

/// Get an item from the process-wide configuration.
pub fn get_config(key: &str) -> Option<Value> {
    global().get(key)
}

/// Set an item in the process-wide configuration.
pub fn set_config(key: &str, value: impl Into<Value>) -> Result<()> {
    let mut guard = cell().write().unwrap_or_else(PoisonError::into_inner);
    let mut edited = Config::clone(&guard);
    edited.set(key, value)?;
    *guard = Arc::new(edited);
    Ok(())
}

/// Set the default container app.
pub fn set_default_container_app(app: &str) -> Result<()> {
    set_config(crate::KEY_CONTAINER_APP, app)
}

/// Set the default container image.
pub fn set_default_container_image(image: &str) -> Result<()> {
    set_config(crate::KEY_CONTAINER_IMAGE, image)
}
