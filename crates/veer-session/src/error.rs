use std::path::PathBuf;
use std::process::ExitStatus;

use crate::envelope::RemoteError;

/// Errors that can occur while running a remote call.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Containerized run requested but no image was given or configured.
    #[error("no container image specified")]
    NoContainerImage,

    /// The configured container image is not a file.
    #[error("container image path does not exist: {}", .0.display())]
    ContainerImageNotFound(PathBuf),

    /// A required executable could not be located.
    #[error("could not find {role} executable {name:?}")]
    BinaryNotFound { role: &'static str, name: String },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] veer_config::ConfigError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] veer_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] veer_frame::FrameError),

    /// The launcher script could not be written.
    #[error("failed to write launcher script: {0}")]
    Launcher(std::io::Error),

    /// The program to run in the child could not be determined.
    #[error("cannot determine program to run: {0}")]
    Program(std::io::Error),

    /// The child process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The child exited without ever connecting.
    #[error("child process exited before connecting ({status}); does the program call run_if_child?")]
    ChildExited { status: ExitStatus },

    /// Waiting on the child failed.
    #[error("failed waiting for child process: {0}")]
    Wait(std::io::Error),

    /// A session object was run a second time.
    #[error("session already ran")]
    AlreadyRan,

    /// The child markers in the environment are malformed.
    #[error("invalid child invocation: {0}")]
    InvalidInvocation(String),

    /// No entry is registered under this name.
    #[error("unknown entry {0:?}")]
    UnknownEntry(String),

    /// Bypass requested but there is no in-process function to call.
    #[error("no local function for entry {0:?}")]
    NoLocalEntry(String),

    /// The entry failed in the child process.
    #[error(transparent)]
    Remote(RemoteError),

    /// The entry failed while running in-process (bypass mode).
    #[error("local call failed: {0}")]
    Local(RemoteError),

    /// The return value did not decode into the requested type.
    #[error("unexpected return value: {0}")]
    Decode(serde_json::Error),
}

/// Broad failure category, used for exit codes and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Config files, missing images or binaries.
    Configuration,
    /// Socket or framing failures.
    Transport,
    /// Launching or supervising the child.
    Process,
    /// The entry itself failed.
    Remote,
    /// The caller asked for something that does not exist.
    Usage,
}

impl SessionError {
    /// The failure category.
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::NoContainerImage
            | SessionError::ContainerImageNotFound(_)
            | SessionError::BinaryNotFound { .. }
            | SessionError::Config(_) => ErrorClass::Configuration,
            SessionError::Transport(_) | SessionError::Frame(_) => ErrorClass::Transport,
            SessionError::Launcher(_)
            | SessionError::Program(_)
            | SessionError::Spawn { .. }
            | SessionError::ChildExited { .. }
            | SessionError::Wait(_) => ErrorClass::Process,
            SessionError::Remote(_) | SessionError::Local(_) | SessionError::Decode(_) => {
                ErrorClass::Remote
            }
            SessionError::AlreadyRan
            | SessionError::InvalidInvocation(_)
            | SessionError::UnknownEntry(_)
            | SessionError::NoLocalEntry(_) => ErrorClass::Usage,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
