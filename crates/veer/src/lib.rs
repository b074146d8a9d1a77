//! Call a function in a freshly spawned process or container.
//!
//! veer runs a registered function in a child process (optionally inside a
//! Singularity/Apptainer container), passes its arguments over a loopback
//! socket and returns the result, or a [`RemoteError`] describing the failure
//! on the other side.
//!
//! # Crate Structure
//!
//! - [`transport`]: loopback listener and stream
//! - [`frame`]: length-and-acknowledge framing with a pluggable codec
//! - [`config`]: layered configuration with environment overrides
//! - [`session`]: registry, launcher, container plumbing and call sessions
//! - [`demo`]: the entries built into the `veer` binary

/// Re-export transport types.
pub mod transport {
    pub use veer_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use veer_frame::*;
}

/// Re-export configuration types.
pub mod config {
    pub use veer_config::*;
}

/// Re-export session types.
pub mod session {
    pub use veer_session::*;
}

pub mod demo;

pub use veer_session::{
    in_child, run_if_child, CallArgs, Entry, Registry, Remote, RemoteError, SessionError,
    SessionOptions,
};
