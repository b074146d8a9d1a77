use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::channel::FramedChannel;
use crate::codec::{parse_length, Codec, MAX_HEADER_LEN, SYNC_TOKEN};
use crate::error::{FrameError, Result};
use crate::writer::write_fully;

const READ_CHUNK_SIZE: usize = 8 * 1024;

impl<T: Read + Write, C: Codec> FramedChannel<T, C> {
    /// Receive one value and decode it with the channel codec (blocking).
    pub fn recv_value<V: DeserializeOwned>(&mut self) -> Result<V> {
        let payload = self.recv_payload()?;
        self.codec.decode(&payload)
    }

    /// Receive one raw payload (blocking).
    ///
    /// Returns `Err(FrameError::RemoteFailure)` when the length header is not
    /// an integer, which is how a peer that failed before answering shows up.
    pub fn recv_payload(&mut self) -> Result<Bytes> {
        let len = match self.read_header() {
            Ok(len) => len,
            Err(err @ FrameError::RemoteFailure { .. }) => {
                error!("Remote computation failed. See log further up for details.");
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        debug!(len, "received payload length");

        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        self.send_token()?;

        self.buf.clear();
        self.buf.reserve(len);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while self.buf.len() < len {
            let want = (len - self.buf.len()).min(READ_CHUNK_SIZE);
            let read = match self.inner.read(&mut chunk[..want]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }

        let payload = self.buf.split_to(len).freeze();
        self.send_token()?;
        Ok(payload)
    }

    /// Read the length header with a single read.
    ///
    /// The sender is blocked on the token while the header is in flight, so the
    /// header is the only data on the stream at this point.
    fn read_header(&mut self) -> Result<usize> {
        let mut header = [0u8; MAX_HEADER_LEN];
        let read = loop {
            match self.inner.read(&mut header) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        };
        parse_length(&header[..read])
    }

    /// Acknowledge a received phase.
    fn send_token(&mut self) -> Result<()> {
        write_fully(&mut self.inner, SYNC_TOKEN)
    }
}
