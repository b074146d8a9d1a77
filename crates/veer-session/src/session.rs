//! Host side of one remote call.
//!
//! A [`Session`] walks through
//! `Created -> Listening -> Launched -> Connected -> RequestSent -> ResultReceived -> Done`
//! and ends in `Failed` on any error. Whatever happens, the child is killed
//! if it is still running and the launcher script is deleted before
//! [`Session::run`] returns (or, at the latest, when the session is dropped).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info, warn};
use veer_config::Config;
use veer_frame::{FrameConfig, FramedChannel, JsonCodec, DEFAULT_MAX_PAYLOAD};
use veer_transport::{LoopbackListener, TransportError};

use crate::args::{CallArgs, Reply};
use crate::container::{container_command, direct_command};
use crate::error::{Result, SessionError};
use crate::launcher::{Launcher, LauncherSpec};
use crate::ENV_PARENT;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Listening,
    Launched,
    Connected,
    RequestSent,
    ResultReceived,
    Done,
    Failed,
}

/// What to run and where.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    /// Registered entry name.
    pub entry: String,
    /// Program the launcher `exec`s; it must call `run_if_child`.
    pub program: PathBuf,
    pub program_args: Vec<OsString>,
    /// Working directory of the child, bind-mounted into containers.
    pub source_dir: PathBuf,
    pub containerize: bool,
    /// Image override for containerized runs.
    pub image: Option<String>,
    /// App override for containerized runs.
    pub app: Option<String>,
}

/// Timeouts and limits for a session.
///
/// Without timeouts the host waits indefinitely for the child at each step.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long to wait for the child to connect.
    pub accept_timeout: Option<Duration>,
    /// Read/write timeout on the connection.
    pub io_timeout: Option<Duration>,
    /// How long to wait for the child to exit after it replied.
    pub exit_timeout: Option<Duration>,
    /// Largest payload accepted in either direction.
    pub max_payload_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            accept_timeout: None,
            io_timeout: None,
            exit_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl SessionOptions {
    fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: self.io_timeout,
            write_timeout: self.io_timeout,
        }
    }
}

/// One remote call, run once.
#[derive(Debug)]
pub struct Session {
    plan: SessionPlan,
    config: Arc<Config>,
    options: SessionOptions,
    state: SessionState,
    launcher: Option<Launcher>,
    launcher_path: Option<PathBuf>,
    child: Option<Child>,
}

impl Session {
    pub fn new(plan: SessionPlan, config: Arc<Config>, options: SessionOptions) -> Self {
        Self {
            plan,
            config,
            options,
            state: SessionState::Created,
            launcher: None,
            launcher_path: None,
            child: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    /// Path of the launcher script, once one was written.
    pub fn launcher_path(&self) -> Option<&Path> {
        self.launcher_path.as_deref()
    }

    /// Run the call and clean up.
    ///
    /// A failure inside the entry is logged line by line and returned as
    /// [`SessionError::Remote`].
    pub fn run(&mut self, args: CallArgs) -> Result<Value> {
        if self.state != SessionState::Created {
            return Err(SessionError::AlreadyRan);
        }

        let outcome = self.host(args);
        self.cleanup();

        match &outcome {
            Ok(_) => self.state = SessionState::Done,
            Err(err) => {
                if !matches!(err, SessionError::Remote(_)) {
                    error!(entry = %self.plan.entry, state = ?self.state, error = %err, "remote call failed");
                }
                self.state = SessionState::Failed;
            }
        }
        outcome
    }

    fn host(&mut self, args: CallArgs) -> Result<Value> {
        let listener = LoopbackListener::bind()?;
        let address = listener.local_addr();
        self.state = SessionState::Listening;
        debug!(%address, "listening for child");

        let launcher = Launcher::write(&LauncherSpec {
            entry: &self.plan.entry,
            address,
            program: &self.plan.program,
            program_args: &self.plan.program_args,
            source_dir: &self.plan.source_dir,
        })
        .map_err(SessionError::Launcher)?;
        let launcher_path = launcher.path().to_path_buf();
        self.launcher = Some(launcher);
        self.launcher_path = Some(launcher_path.clone());

        let argv = if self.plan.containerize {
            container_command(
                &self.config,
                self.plan.image.as_deref(),
                self.plan.app.as_deref(),
                &self.plan.source_dir,
                &launcher_path,
            )?
        } else {
            direct_command(&self.config, &launcher_path)?
        };

        listener.set_backlog(1)?;
        let mut child = self.spawn(&argv)?;
        info!(entry = %self.plan.entry, pid = child.id(), "launched child");
        self.state = SessionState::Launched;

        let accepted = listener.accept_one_polling(self.options.accept_timeout, || {
            matches!(child.try_wait(), Ok(None))
        });
        self.child = Some(child);
        let stream = match accepted {
            Ok(stream) => stream,
            Err(TransportError::Abandoned) => return Err(self.child_exited()),
            Err(err) => return Err(err.into()),
        };
        self.state = SessionState::Connected;

        let mut channel =
            FramedChannel::with_config_ipc(stream, JsonCodec, self.options.frame_config())?;
        debug!("sending arguments");
        channel.send_value(&args)?;
        self.state = SessionState::RequestSent;

        debug!("receiving return value");
        let reply: Reply = channel.recv_value()?;
        self.state = SessionState::ResultReceived;

        conclude(reply, || self.wait_for_exit())
    }

    fn spawn(&self, argv: &[OsString]) -> Result<Child> {
        let Some((program, rest)) = argv.split_first() else {
            return Err(SessionError::Spawn {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        debug!(?argv, cwd = ?self.plan.source_dir, "spawning child");
        Command::new(program)
            .args(rest)
            .current_dir(&self.plan.source_dir)
            .env(ENV_PARENT, std::process::id().to_string())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SessionError::Spawn {
                program: program.to_string_lossy().into_owned(),
                source,
            })
    }

    fn child_exited(&mut self) -> SessionError {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => SessionError::ChildExited { status },
            Some(Err(err)) => SessionError::Wait(err),
            _ => SessionError::Transport(TransportError::Abandoned),
        }
    }

    fn wait_for_exit(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        let status = match self.options.exit_timeout {
            None => child.wait().map_err(SessionError::Wait)?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait().map_err(SessionError::Wait)? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        warn!(?timeout, "child did not exit after replying");
                        return Ok(());
                    }
                    std::thread::sleep(EXIT_POLL_INTERVAL);
                }
            }
        };

        if status.success() {
            debug!(%status, "child exited");
        } else {
            warn!(%status, "child exited unsuccessfully after replying");
        }
        Ok(())
    }

    /// Kill a still-running child and delete the launcher. Safe to call twice.
    fn cleanup(&mut self) {
        if let Some(mut child) = self.child.take() {
            if !matches!(child.try_wait(), Ok(Some(_))) {
                warn!(pid = child.id(), "killing child process");
                if let Err(err) = child.kill() {
                    warn!(error = %err, "could not kill child process");
                }
                if let Err(err) = child.wait() {
                    warn!(error = %err, "could not reap child process");
                }
            }
        }

        if let Some(launcher) = self.launcher.take() {
            launcher.remove();
        }
    }
}

/// Turn the child's reply into the call result once the child has exited.
///
/// A raised envelope is logged before waiting and stays the error even if
/// waiting fails.
fn conclude(reply: Reply, wait: impl FnOnce() -> Result<()>) -> Result<Value> {
    match reply {
        Reply::Return(value) => {
            wait()?;
            Ok(value)
        }
        Reply::Raised(err) => {
            err.write_to_log();
            if let Err(wait_err) = wait() {
                warn!(error = %wait_err, "could not wait for child after remote failure");
            }
            Err(SessionError::Remote(err))
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}
