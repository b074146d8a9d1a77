use std::io::{ErrorKind, Read, Write};

use serde::Serialize;
use tracing::debug;

use crate::channel::FramedChannel;
use crate::codec::{Codec, SYNC_TOKEN};
use crate::error::{FrameError, Result};

impl<T: Read + Write, C: Codec> FramedChannel<T, C> {
    /// Encode a value with the channel codec and send it (blocking).
    pub fn send_value<V: Serialize + ?Sized>(&mut self, value: &V) -> Result<()> {
        let payload = self.codec.encode(value)?;
        self.send_payload(&payload)
    }

    /// Send one raw payload (blocking).
    ///
    /// Writes the decimal length, waits for the token, writes the payload and
    /// waits for the token again. Returns only once the peer has drained the
    /// whole payload.
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        debug!(len = payload.len(), "sending payload length");
        write_fully(&mut self.inner, payload.len().to_string().as_bytes())?;
        self.await_token()?;

        write_fully(&mut self.inner, payload)?;
        self.await_token()
    }

    /// Receive the sync token (and only the token) after a send phase.
    fn await_token(&mut self) -> Result<()> {
        let mut received = [0u8; SYNC_TOKEN.len()];
        let mut filled = 0usize;
        while filled < received.len() {
            match self.inner.read(&mut received[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        if &received != SYNC_TOKEN {
            return Err(FrameError::SyncMismatch {
                received: received.to_vec(),
            });
        }
        Ok(())
    }
}

/// Write all of `bytes`, retrying short writes.
///
/// A write that accepts zero bytes means the peer is gone. An expired write
/// timeout surfaces as `WouldBlock` or `TimedOut` and is returned as
/// [`FrameError::Io`].
pub(crate) fn write_fully<W: Write>(inner: &mut W, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }

    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}
