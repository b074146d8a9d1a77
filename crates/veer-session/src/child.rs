//! Child side entry point.

use std::net::SocketAddr;

use tracing::{error, info};
use veer_config::Environment;

use crate::error::{Result, SessionError};
use crate::registry::Registry;
use crate::{ENV_ADDRESS, ENV_ENTRY, ENV_PARENT};

/// Whether this process was spawned by a session host.
pub fn in_child() -> bool {
    std::env::var_os(ENV_PARENT).is_some()
}

/// What the launcher asked this process to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildInvocation {
    pub entry: String,
    pub address: SocketAddr,
    /// Process id of the host, if it was passed.
    pub parent: Option<u32>,
}

impl ChildInvocation {
    /// Read the invocation from `env`.
    ///
    /// `None` unless both the entry and address markers are present.
    pub fn from_environment(env: &Environment) -> Option<Result<Self>> {
        let entry = env.var(ENV_ENTRY)?;
        let address = env.var(ENV_ADDRESS)?;

        let parsed = address.parse::<SocketAddr>().map_err(|err| {
            SessionError::InvalidInvocation(format!("{ENV_ADDRESS}={address:?}: {err}"))
        });
        Some(parsed.map(|address| Self {
            entry,
            address,
            parent: env.var(ENV_PARENT).and_then(|pid| pid.parse().ok()),
        }))
    }
}

/// Serve one call if this process was launched as a child; `None` otherwise.
pub fn serve_if_child(registry: &Registry) -> Option<Result<()>> {
    let invocation = ChildInvocation::from_environment(&Environment::Process)?;
    Some(invocation.and_then(|invocation| {
        info!(
            entry = %invocation.entry,
            address = %invocation.address,
            parent = ?invocation.parent,
            "running as child"
        );
        registry.serve(invocation.address, &invocation.entry)
    }))
}

/// Serve one call and exit if this process was launched as a child.
///
/// Call this first thing in `main`. In a normal run it returns immediately.
/// A child exits with status 0 once the reply is delivered, whether the entry
/// succeeded or failed, and with status 1 if the exchange itself broke.
pub fn run_if_child(registry: &Registry) {
    if let Some(outcome) = serve_if_child(registry) {
        let code = match outcome {
            Ok(()) => 0,
            Err(err) => {
                error!(error = %err, "child session failed");
                1
            }
        };
        std::process::exit(code);
    }
}
