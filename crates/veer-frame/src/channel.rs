use bytes::BytesMut;
use veer_transport::IpcStream;

use crate::codec::{FrameConfig, JsonCodec};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// A value channel over one connected byte stream.
///
/// Sending and receiving both need the stream in both directions because every
/// phase is acknowledged by the peer. The send half lives in `writer.rs`, the
/// receive half in `reader.rs`.
pub struct FramedChannel<T, C = JsonCodec> {
    pub(crate) inner: T,
    pub(crate) codec: C,
    pub(crate) buf: BytesMut,
    pub(crate) config: FrameConfig,
}

impl<T> FramedChannel<T, JsonCodec> {
    /// Create a JSON channel with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_codec(inner, JsonCodec)
    }
}

impl<T, C> FramedChannel<T, C> {
    /// Create a channel with an explicit codec.
    pub fn with_codec(inner: T, codec: C) -> Self {
        Self::with_config(inner, codec, FrameConfig::default())
    }

    /// Create a channel with an explicit codec and configuration.
    pub fn with_config(inner: T, codec: C, config: FrameConfig) -> Self {
        Self {
            inner,
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl<C> FramedChannel<IpcStream, C> {
    /// Create a channel for `IpcStream` and apply the timeouts from config.
    pub fn with_config_ipc(inner: IpcStream, codec: C, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, codec, config))
    }
}

fn transport_to_frame_error(err: veer_transport::TransportError) -> FrameError {
    match err {
        veer_transport::TransportError::Io(io) | veer_transport::TransportError::Accept(io) => {
            FrameError::Io(io)
        }
        veer_transport::TransportError::Bind { source, .. }
        | veer_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
