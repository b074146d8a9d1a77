//! Loopback stream transport for veer sessions.
//!
//! A session host binds a listener on `127.0.0.1` with an OS-assigned port,
//! hands the address to the child it spawns and accepts exactly one
//! connection back from it. The child side simply connects.
//!
//! This is the lowest layer of veer. The framed channel builds on the
//! [`IpcStream`] type provided here.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::LoopbackListener;
pub use traits::IpcStream;
