use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use veer_config::Config;

use crate::args::CallArgs;
use crate::container::should_containerize;
use crate::error::{Result, SessionError};
use crate::registry::Entry;
use crate::session::{Session, SessionOptions, SessionPlan};
use crate::{ENV_DEBUG, ENV_NO_SUBPROCESS};

/// Whether calls should run in-process instead of in a child.
pub fn bypass_active(config: &Config) -> bool {
    config.env_is_set(ENV_DEBUG) || config.env_is_set(ENV_NO_SUBPROCESS)
}

/// A registered entry that runs in a fresh child process on every call.
///
/// ```no_run
/// use veer_session::{CallArgs, Registry, Remote};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("negative input")]
/// struct Negative;
///
/// let mut registry = Registry::new();
/// registry.register("sim::square", |args: CallArgs| -> Result<i64, Negative> {
///     let x: i64 = args.get(0).map_err(|_| Negative)?;
///     if x < 0 { Err(Negative) } else { Ok(x * x) }
/// });
/// veer_session::run_if_child(&registry);
///
/// let square = registry.remote("sim::square").unwrap();
/// let result: i64 = square.call(CallArgs::new().arg(12)).unwrap();
/// assert_eq!(result, 144);
/// ```
#[derive(Debug, Clone)]
pub struct Remote {
    entry: String,
    local: Option<Entry>,
    always_in_container: bool,
    image: Option<String>,
    app: Option<String>,
    program: Option<PathBuf>,
    program_args: Vec<OsString>,
    source_dir: Option<PathBuf>,
    config: Option<Arc<Config>>,
    options: SessionOptions,
}

impl Remote {
    /// Run `entry` in a plain child process (or a container if the
    /// environment asks for one).
    pub fn in_subprocess(entry: &Entry) -> Self {
        let mut remote = Self::detached(entry.name());
        remote.local = Some(entry.clone());
        remote
    }

    /// Run `entry` in a container on every call.
    pub fn in_container(entry: &Entry) -> Self {
        Self::in_subprocess(entry).always_in_container(true)
    }

    /// Refer to an entry by name only. Such a remote cannot be bypassed.
    pub fn detached(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            local: None,
            always_in_container: false,
            image: None,
            app: None,
            program: None,
            program_args: Vec::new(),
            source_dir: None,
            config: None,
            options: SessionOptions::default(),
        }
    }

    pub fn always_in_container(mut self, always: bool) -> Self {
        self.always_in_container = always;
        self
    }

    /// Container image, overriding the configured default.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Container app, overriding the configured default.
    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Program the child runs. Defaults to the current executable.
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Extra arguments for the child program.
    pub fn program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Working directory of the child. Defaults to the program's directory.
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    /// Use this configuration instead of the process-wide one.
    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Call the entry and return its raw value.
    pub fn invoke(&self, args: CallArgs) -> Result<Value> {
        let config = self.config.clone().unwrap_or_else(veer_config::global);

        if bypass_active(&config) {
            let local = self
                .local
                .as_ref()
                .ok_or_else(|| SessionError::NoLocalEntry(self.entry.clone()))?;
            debug!(entry = %self.entry, "subprocess bypassed, running in-process");
            return local.invoke(args).into_result().map_err(SessionError::Local);
        }

        let plan = self.plan(&config)?;
        Session::new(plan, config, self.options.clone()).run(args)
    }

    /// Call the entry and decode its value as `R`.
    pub fn call<R: DeserializeOwned>(&self, args: CallArgs) -> Result<R> {
        let value = self.invoke(args)?;
        serde_json::from_value(value).map_err(SessionError::Decode)
    }

    /// Resolve program, directory and container choice for one call.
    pub fn plan(&self, config: &Config) -> Result<SessionPlan> {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => std::env::current_exe().map_err(SessionError::Program)?,
        };
        let source_dir = match &self.source_dir {
            Some(dir) => dir.clone(),
            None => program
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    SessionError::Program(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} has no parent directory", program.display()),
                    ))
                })?,
        };

        Ok(SessionPlan {
            entry: self.entry.clone(),
            program,
            program_args: self.program_args.clone(),
            source_dir,
            containerize: should_containerize(config, self.always_in_container),
            image: self.image.clone(),
            app: self.app.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use veer_config::Environment;

    use super::*;
    use crate::registry::Registry;

    #[derive(Debug, thiserror::Error)]
    #[error("bad input")]
    struct ValueError;

    fn config_with(env: &[(&str, &str)]) -> Arc<Config> {
        Arc::new(Config::with_defaults().with_environment(Environment::fixed(
            env.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )))
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register("demo::sum", |args: CallArgs| {
                Ok::<_, ValueError>(args.all::<i64>().map_err(|_| ValueError)?.iter().sum::<i64>())
            })
            .register("demo::fail", |_args: CallArgs| Err::<(), _>(ValueError));
        registry
    }

    #[test]
    fn bypass_matches_direct_call() {
        let registry = registry();
        let args = CallArgs::new().arg(3).arg(7).arg(19);

        let direct = registry.get("demo::sum").unwrap().invoke(args.clone());
        for marker in ["DEBUG", "VEER_NO_SUBPROCESS"] {
            let remote = registry
                .remote("demo::sum")
                .unwrap()
                .config(config_with(&[(marker, "1")]));
            assert_eq!(remote.invoke(args.clone()).unwrap(), direct.clone().into_result().unwrap());
            assert_eq!(remote.call::<i64>(args.clone()).unwrap(), 29);
        }
    }

    #[test]
    fn bypass_failure_is_local_error() {
        let remote = registry()
            .remote("demo::fail")
            .unwrap()
            .config(config_with(&[("DEBUG", "")]));

        let err = remote.invoke(CallArgs::new()).unwrap_err();
        match err {
            SessionError::Local(envelope) => assert_eq!(envelope.original_kind, "ValueError"),
            other => panic!("expected local error, got {other:?}"),
        }
    }

    #[test]
    fn detached_cannot_bypass() {
        let remote = Remote::detached("demo::sum").config(config_with(&[("DEBUG", "1")]));
        assert!(matches!(
            remote.invoke(CallArgs::new()),
            Err(SessionError::NoLocalEntry(_))
        ));
    }

    #[test]
    fn decode_mismatch() {
        let remote = registry()
            .remote("demo::sum")
            .unwrap()
            .config(config_with(&[("DEBUG", "1")]));
        let err = remote.call::<String>(CallArgs::new().arg(1)).unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
    }

    #[test]
    fn plan_defaults_to_current_exe() {
        let config = config_with(&[]);
        let plan = registry().remote("demo::sum").unwrap().plan(&config).unwrap();

        let exe = std::env::current_exe().unwrap();
        assert_eq!(plan.program, exe);
        assert_eq!(plan.source_dir, exe.parent().unwrap());
        assert!(!plan.containerize);
        assert_eq!(plan.entry, "demo::sum");
    }

    #[test]
    fn plan_honours_builder() {
        let config = config_with(&[]);
        let plan = registry()
            .remote("demo::sum")
            .unwrap()
            .program("/opt/sim/bin/runner")
            .program_args(["--fast"])
            .image("/images/sim.sif")
            .app("sim")
            .plan(&config)
            .unwrap();

        assert_eq!(plan.source_dir, PathBuf::from("/opt/sim/bin"));
        assert_eq!(plan.program_args, vec![OsString::from("--fast")]);
        assert_eq!(plan.image.as_deref(), Some("/images/sim.sif"));
        assert_eq!(plan.app.as_deref(), Some("sim"));
        assert!(!plan.containerize);
    }

    #[test]
    fn container_selection() {
        let entry = registry().get("demo::sum").unwrap().clone();

        let forced = Remote::in_container(&entry).plan(&config_with(&[])).unwrap();
        assert!(forced.containerize);

        let by_marker = Remote::in_subprocess(&entry)
            .plan(&config_with(&[("VEER_SINGULARITY", "1")]))
            .unwrap();
        assert!(by_marker.containerize);

        let by_overrides = Remote::in_subprocess(&entry)
            .plan(&config_with(&[
                ("VEER_CONTAINER_IMAGE", "/c.sif"),
                ("VEER_CONTAINER_APP", "sim"),
            ]))
            .unwrap();
        assert!(by_overrides.containerize);
    }

    #[test]
    fn bare_program_name_needs_source_dir() {
        let config = config_with(&[]);
        let remote = Remote::detached("demo::sum").program("runner");
        assert!(matches!(remote.plan(&config), Err(SessionError::Program(_))));

        let plan = remote.source_dir("/work").plan(&config).unwrap();
        assert_eq!(plan.source_dir, PathBuf::from("/work"));
        assert_eq!(plan.program, PathBuf::from("runner"));
    }

    #[test]
    fn bypass_value_shape() {
        let mut registry = Registry::new();
        registry.register("demo::pair", |args: CallArgs| {
            Ok::<_, ValueError>((args.positional, args.keyword))
        });
        let remote = registry
            .remote("demo::pair")
            .unwrap()
            .config(config_with(&[("VEER_NO_SUBPROCESS", "")]));

        let value = remote
            .invoke(CallArgs::new().arg(3).kwarg("foobar", 42))
            .unwrap();
        assert_eq!(value, json!([[3], {"foobar": 42}]));
    }
}
