/// Errors that can occur while transferring values over a framed channel.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length header did not parse; the remote side failed before answering.
    #[error("remote computation failed (length header {header:?}); see log further up for details")]
    RemoteFailure { header: String },

    /// The peer answered a phase with something other than the sync token.
    #[error("synchronization token mismatch (received {received:?})")]
    SyncMismatch { received: Vec<u8> },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a transfer completed.
    #[error("connection lost")]
    ConnectionClosed,

    /// The codec could not encode or decode a value.
    #[error("codec error: {0}")]
    Codec(String),
}

impl FrameError {
    /// True for failures that mean the peer is gone or never answered.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FrameError::RemoteFailure { .. } | FrameError::ConnectionClosed | FrameError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
