use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use veer_frame::FramedChannel;
use veer_transport::LoopbackListener;

use crate::args::{CallArgs, Reply};
use crate::envelope::RemoteError;
use crate::error::{Result, SessionError};
use crate::remote::Remote;

type EntryFn = dyn Fn(CallArgs) -> Reply + Send + Sync;

/// A named function that can run in a child process.
#[derive(Clone)]
pub struct Entry {
    name: Arc<str>,
    func: Arc<EntryFn>,
}

impl Entry {
    /// Wrap a function under `name`.
    ///
    /// Errors are captured into a [`RemoteError`] named after the error type.
    pub fn new<F, T, E>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(CallArgs) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize + 'static,
        E: std::error::Error + 'static,
    {
        let name: Arc<str> = Arc::from(name.into());
        let label = Arc::clone(&name);
        let func = move |args: CallArgs| match func(args) {
            Ok(value) => match serde_json::to_value(value) {
                Ok(value) => Reply::Return(value),
                Err(err) => Reply::Raised(RemoteError::capture(&label, &err)),
            },
            Err(err) => Reply::Raised(RemoteError::capture(&label, &err)),
        };
        Self {
            name,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the function in this process. Panics become a `"panic"` envelope.
    pub fn invoke(&self, args: CallArgs) -> Reply {
        match catch_unwind(AssertUnwindSafe(|| (self.func)(args))) {
            Ok(reply) => reply,
            Err(payload) => Reply::Raised(RemoteError::from_panic(&self.name, payload.as_ref())),
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("name", &self.name).finish()
    }
}

/// The entries a program can run on behalf of a host.
///
/// Host and child must build the same registry; the child looks entries up
/// by the name the host sends in its launcher.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, replacing any entry with that name.
    pub fn register<F, T, E>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(CallArgs) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Serialize + 'static,
        E: std::error::Error + 'static,
    {
        self.insert(Entry::new(name, func))
    }

    /// Add an already wrapped entry.
    pub fn insert(&mut self, entry: Entry) -> &mut Self {
        self.entries.insert(entry.name().to_string(), entry);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A [`Remote`] for the entry registered under `name`.
    pub fn remote(&self, name: &str) -> Result<Remote> {
        self.get(name)
            .map(Remote::in_subprocess)
            .ok_or_else(|| SessionError::UnknownEntry(name.to_string()))
    }

    /// Child side of a session: connect to the host at `addr`, receive the
    /// arguments, run `entry` and send the reply back exactly once.
    ///
    /// Entry failures travel back as [`Reply::Raised`] and are not errors here;
    /// only a broken connection is.
    pub fn serve(&self, addr: SocketAddr, entry: &str) -> Result<()> {
        let stream = LoopbackListener::connect(addr)?;
        let mut channel = FramedChannel::new(stream);

        debug!("receiving arguments");
        let args: CallArgs = channel.recv_value()?;

        let reply = match self.get(entry) {
            Some(found) => {
                info!(entry, "running entry");
                found.invoke(args)
            }
            None => Reply::Raised(RemoteError::unknown_entry(entry)),
        };

        if let Reply::Raised(err) = &reply {
            debug!(error = %err, "entry failed, sending error envelope");
        }
        debug!("sending return value");
        channel.send_value(&reply)?;
        Ok(())
    }
}
