use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::config::Environment;
use crate::error::{ConfigError, Result};

const APP_DIR: &str = "veer";
const FILE_NAMES: [&str; 2] = ["config.yaml", "config.json"];

/// Possible configuration files, highest priority first.
///
/// - `$VEER_CONFIG` (exact file)
/// - `$PWD/veer/config.{yaml,json}`
/// - `$XDG_CONFIG_HOME/veer/config.{yaml,json}` (default `~/.config`)
/// - each of `$XDG_CONFIG_DIRS/veer/config.{yaml,json}` (default `/etc/xdg`)
/// - `/etc/veer/config.{yaml,json}`
pub fn candidate_paths(env: &Environment) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = env.var("VEER_CONFIG") {
        paths.push(expand_home(&explicit));
    }

    let mut push_dir = |dir: PathBuf| {
        for name in FILE_NAMES {
            paths.push(dir.join(APP_DIR).join(name));
        }
    };

    if let Ok(cwd) = std::env::current_dir() {
        push_dir(cwd);
    }

    match env.var("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => push_dir(expand_home(&dir)),
        _ => {
            if let Some(home) = dirs::home_dir() {
                push_dir(home.join(".config"));
            }
        }
    }

    let system_dirs = env
        .var("XDG_CONFIG_DIRS")
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| "/etc/xdg".to_string());
    for dir in system_dirs.split(':').filter(|d| !d.is_empty()) {
        push_dir(expand_home(dir));
    }

    push_dir(PathBuf::from("/etc"));
    paths
}

/// Read a configuration layer.
///
/// With an explicit `path` only that file is read and it must exist. Without
/// one, the first existing file among [`candidate_paths`] is read; if there is
/// none the layer is empty.
pub fn read_config(path: Option<&Path>, env: &Environment) -> Result<Value> {
    if let Some(path) = path {
        return parse_file(path);
    }

    for candidate in candidate_paths(env) {
        match std::fs::read_to_string(&candidate) {
            Ok(text) => {
                debug!(path = ?candidate, "loading config");
                return parse_text(&candidate, &text);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: candidate,
                    source: err,
                })
            }
        }
    }

    debug!("no config file found");
    Ok(Value::Object(serde_json::Map::new()))
}

fn parse_file(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(?path, "loading config");
    parse_text(path, &text)
}

/// `.json` files are parsed as JSON, everything else as YAML.
fn parse_text(path: &Path, text: &str) -> Result<Value> {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let parsed = if is_json {
        serde_json::from_str::<Value>(text).map_err(|err| err.to_string())
    } else {
        serde_yaml::from_str::<Value>(text).map_err(|err| err.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
