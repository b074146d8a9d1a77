use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;
use veer_config::{
    Config, KEY_CONTAINER_APP, KEY_CONTAINER_BINARY, KEY_CONTAINER_IMAGE, KEY_INTERPRETER_BINARY,
};

use crate::error::{Result, SessionError};
use crate::{ENV_CONTAINER_APP, ENV_CONTAINER_IMAGE, ENV_SINGULARITY};

const DEFAULT_INTERPRETER: &str = "sh";
const DEFAULT_RUNTIME: &str = "singularity";

/// Whether a call should run inside a container.
///
/// True when forced, when the container marker is set, or when both the
/// image and app overrides are present in the environment.
pub fn should_containerize(config: &Config, always: bool) -> bool {
    always
        || config.env_is_set(ENV_SINGULARITY)
        || (config.env_is_set(ENV_CONTAINER_IMAGE) && config.env_is_set(ENV_CONTAINER_APP))
}

/// Locate an executable by name or path.
pub fn resolve_binary(role: &'static str, name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|err| {
        debug!(role, name, error = %err, "executable lookup failed");
        SessionError::BinaryNotFound {
            role,
            name: name.to_string(),
        }
    })
}

fn interpreter(config: &Config) -> String {
    config
        .get_str(KEY_INTERPRETER_BINARY)
        .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string())
}

/// `<interpreter> <launcher>`, with the interpreter resolved on this host.
pub fn direct_command(config: &Config, launcher: &Path) -> Result<Vec<OsString>> {
    let interpreter = resolve_binary("interpreter", &interpreter(config))?;
    Ok(vec![interpreter.into_os_string(), launcher.as_os_str().to_owned()])
}

/// `<runtime> exec [--app <app>] -B <source_dir> <image> <interpreter> <launcher>`.
///
/// `image` and `app` override the configured defaults. The interpreter is
/// looked up inside the container, not here.
pub fn container_command(
    config: &Config,
    image: Option<&str>,
    app: Option<&str>,
    source_dir: &Path,
    launcher: &Path,
) -> Result<Vec<OsString>> {
    let image = image
        .map(str::to_string)
        .or_else(|| config.get_str(KEY_CONTAINER_IMAGE))
        .filter(|image| !image.is_empty())
        .ok_or(SessionError::NoContainerImage)?;
    let image = PathBuf::from(image);
    if !image.is_file() {
        return Err(SessionError::ContainerImageNotFound(image));
    }

    let app = app
        .map(str::to_string)
        .or_else(|| config.get_str(KEY_CONTAINER_APP))
        .filter(|app| !app.is_empty());

    let runtime_name = config
        .get_str(KEY_CONTAINER_BINARY)
        .unwrap_or_else(|| DEFAULT_RUNTIME.to_string());
    let runtime = resolve_binary("container runtime", &runtime_name)?;

    let mut argv = vec![runtime.into_os_string(), OsString::from("exec")];
    match &app {
        Some(app) => argv.extend([OsString::from("--app"), OsString::from(app)]),
        None => debug!("no container app configured, using the image default"),
    }
    argv.extend([
        OsString::from("-B"),
        source_dir.as_os_str().to_owned(),
        image.into_os_string(),
        OsString::from(interpreter(config)),
        launcher.as_os_str().to_owned(),
    ]);
    Ok(argv)
}
