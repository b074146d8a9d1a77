use std::fmt;
use std::io;

use veer_config::ConfigError;
use veer_frame::FrameError;
use veer_session::{ErrorClass, SessionError};
use veer_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const REMOTE_FAILED: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_INVALID: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const LAUNCH_FAILED: i32 = 126;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::Codec(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::RemoteFailure { .. } => {
            CliError::new(REMOTE_FAILED, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Config(err) => config_error(context, err),
        // The envelope already reads "RemoteError wrapping Kind: message".
        SessionError::Remote(envelope) | SessionError::Local(envelope) => {
            CliError::new(REMOTE_FAILED, envelope.to_string())
        }
        other => {
            let code = match other.class() {
                ErrorClass::Configuration => CONFIG_INVALID,
                ErrorClass::Process => LAUNCH_FAILED,
                ErrorClass::Remote => DATA_INVALID,
                ErrorClass::Usage => USAGE,
                ErrorClass::Transport => TRANSPORT_ERROR,
            };
            CliError::new(code, format!("{context}: {other}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use veer_session::RemoteError;

    use super::*;

    #[test]
    fn remote_failures_keep_envelope_text() {
        let err = session_error(
            "call failed",
            SessionError::Remote(RemoteError::new("demo::fail", "ValueError", "bad input")),
        );
        assert_eq!(err.code, REMOTE_FAILED);
        assert_eq!(err.message, "RemoteError wrapping ValueError: bad input");
    }

    #[test]
    fn classes_map_to_codes() {
        assert_eq!(
            session_error("x", SessionError::NoContainerImage).code,
            CONFIG_INVALID
        );
        assert_eq!(
            session_error("x", SessionError::ContainerImageNotFound(PathBuf::from("/a.sif"))).code,
            CONFIG_INVALID
        );
        assert_eq!(
            session_error("x", SessionError::UnknownEntry("nope".into())).code,
            USAGE
        );
        assert_eq!(
            session_error(
                "x",
                SessionError::Transport(TransportError::Timeout(std::time::Duration::from_secs(1)))
            )
            .code,
            TIMEOUT
        );
        assert_eq!(
            session_error(
                "x",
                SessionError::Frame(FrameError::RemoteFailure { header: String::new() })
            )
            .code,
            REMOTE_FAILED
        );
    }
}
