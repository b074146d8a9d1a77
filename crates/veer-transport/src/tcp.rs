use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::IpcStream;

/// Sleep between accept attempts while polling.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Loopback TCP listener used by the session host.
///
/// Binds `127.0.0.1` on an ephemeral port. The host reports the resolved
/// address to the child and then accepts exactly one connection with
/// [`LoopbackListener::accept_one`], which closes the listener so that any
/// later connection attempt is refused.
pub struct LoopbackListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl LoopbackListener {
    /// Bind to `127.0.0.1` on an OS-assigned port.
    pub fn bind() -> Result<Self> {
        Self::bind_to(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    }

    /// Bind to an explicit address.
    pub fn bind_to(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(%addr, "listening on loopback endpoint");

        Ok(Self { listener, addr })
    }

    /// Resolved address (with the assigned port).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shrink the pending-connection queue.
    ///
    /// The standard library listens with a large backlog; a session only ever
    /// expects one peer, so it asks the kernel for a queue of `backlog`.
    #[cfg(unix)]
    pub fn set_backlog(&self, backlog: i32) -> Result<()> {
        use std::os::fd::AsRawFd;

        let fd = self.listener.as_raw_fd();

        // SAFETY: `fd` is an open, bound and listening socket owned by `self.listener`;
        // calling listen(2) again on it only adjusts the queue length.
        let rc = unsafe { libc::listen(fd, backlog) };
        if rc != 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        debug!(backlog, "listener backlog set");
        Ok(())
    }

    /// Shrink the pending-connection queue (no-op on this platform).
    #[cfg(not(unix))]
    pub fn set_backlog(&self, backlog: i32) -> Result<()> {
        debug!(backlog, "listener backlog is fixed on this platform");
        Ok(())
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(IpcStream::from_tcp(stream))
    }

    /// Accept an incoming connection by polling.
    ///
    /// `keep_waiting` is consulted between attempts; returning `false` ends the
    /// wait with [`TransportError::Abandoned`]. With a `timeout`, the wait ends
    /// with [`TransportError::Timeout`] once it elapses.
    pub fn accept_polling<F>(&self, timeout: Option<Duration>, mut keep_waiting: F) -> Result<IpcStream>
    where
        F: FnMut() -> bool,
    {
        self.listener.set_nonblocking(true)?;
        let deadline = timeout.map(|t| Instant::now() + t);

        let accepted = loop {
            match self.listener.accept() {
                Ok(pair) => break Ok(pair),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => break Err(TransportError::Accept(err)),
            }

            if !keep_waiting() {
                break Err(TransportError::Abandoned);
            }
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                if Instant::now() >= deadline {
                    break Err(TransportError::Timeout(timeout));
                }
            }
            thread::sleep(ACCEPT_POLL_INTERVAL);
        };

        self.listener.set_nonblocking(false)?;
        let (stream, peer) = accepted?;
        // Accepted sockets inherit O_NONBLOCK on some platforms.
        stream.set_nonblocking(false)?;
        debug!(%peer, "accepted connection");
        Ok(IpcStream::from_tcp(stream))
    }

    /// Accept exactly one connection and close the listener.
    pub fn accept_one(self) -> Result<IpcStream> {
        let stream = self.accept()?;
        debug!(addr = %self.addr, "closing listener after first connection");
        Ok(stream)
    }

    /// Polling variant of [`LoopbackListener::accept_one`].
    pub fn accept_one_polling<F>(self, timeout: Option<Duration>, keep_waiting: F) -> Result<IpcStream>
    where
        F: FnMut() -> bool,
    {
        let stream = self.accept_polling(timeout, keep_waiting)?;
        debug!(addr = %self.addr, "closing listener after first connection");
        Ok(stream)
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(addr: SocketAddr) -> Result<IpcStream> {
        let stream =
            TcpStream::connect(addr).map_err(|source| TransportError::Connect { addr, source })?;
        debug!(%addr, "connected to session host");
        Ok(IpcStream::from_tcp(stream))
    }
}

impl std::fmt::Debug for LoopbackListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackListener")
            .field("addr", &self.addr)
            .finish()
    }
}
