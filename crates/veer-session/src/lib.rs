//! Remote call sessions.
//!
//! A [`Remote`] wraps a registered entry so that calling it spawns a fresh
//! child process (or a container around one), ships the arguments over a
//! loopback [`veer_frame::FramedChannel`], and hands back the child's return
//! value or a [`RemoteError`] describing what went wrong over there.
//!
//! Programs that act as children call [`run_if_child`] first thing in `main`
//! with the same [`Registry`] the host uses.

pub mod args;
pub mod child;
pub mod container;
pub mod envelope;
pub mod error;
pub mod launcher;
pub mod registry;
pub mod remote;
pub mod session;

pub use args::{ArgumentError, CallArgs, Reply};
pub use child::{in_child, run_if_child, serve_if_child, ChildInvocation};
pub use container::{container_command, direct_command, resolve_binary, should_containerize};
pub use envelope::RemoteError;
pub use error::{ErrorClass, Result, SessionError};
pub use launcher::{delete_launcher, render_script, Launcher, LauncherSpec};
pub use registry::{Entry, Registry};
pub use remote::{bypass_active, Remote};
pub use session::{Session, SessionOptions, SessionPlan, SessionState};

/// Set by the host in the child's environment: the host's process id.
pub const ENV_PARENT: &str = "VEER_PARENT";
/// Set by the launcher: the entry the child should run.
pub const ENV_ENTRY: &str = "VEER_ENTRY";
/// Set by the launcher: `address:port` of the host endpoint.
pub const ENV_ADDRESS: &str = "VEER_ADDRESS";
/// Bypass marker: run entries in-process.
pub const ENV_DEBUG: &str = "DEBUG";
/// Bypass marker: run entries in-process.
pub const ENV_NO_SUBPROCESS: &str = "VEER_NO_SUBPROCESS";
/// Run every call in a container.
pub const ENV_SINGULARITY: &str = "VEER_SINGULARITY";
/// Container image override; together with the app override it also turns
/// containerized runs on.
pub const ENV_CONTAINER_IMAGE: &str = "VEER_CONTAINER_IMAGE";
/// Container app override.
pub const ENV_CONTAINER_APP: &str = "VEER_CONTAINER_APP";
