//! Length-prefixed, handshake-synchronized value transfer.
//!
//! Every value crosses the stream in two phases, each closed by a fixed
//! synchronization token travelling the opposite way:
//! - the sender writes the payload length as decimal ASCII and waits for the token
//! - the sender writes the payload and waits for the token again
//!
//! The two sides are therefore in strict alternation, so a channel can carry
//! several values in sequence without delimiters or byte stuffing. The payload
//! format is supplied by a [`Codec`].

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use channel::FramedChannel;
pub use codec::{
    parse_length, Codec, FrameConfig, JsonCodec, DEFAULT_MAX_PAYLOAD, MAX_HEADER_LEN, SYNC_TOKEN,
};
pub use error::{FrameError, Result};
