use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Token exchanged after each transfer phase.
pub const SYNC_TOKEN: &[u8; 9] = b"VEER_SYNC";

/// Longest accepted length header: the digits of `u64::MAX`.
pub const MAX_HEADER_LEN: usize = 20;

/// Default maximum payload size: 256 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 256 * 1024 * 1024;

/// Serialization capability used by the channel.
///
/// The channel only moves opaque byte payloads; the codec decides what those
/// bytes mean. Both ends of a session must use the same codec.
pub trait Codec {
    /// Encode a value into a payload.
    fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<Vec<u8>>;

    /// Decode a payload into a value.
    fn decode<V: DeserializeOwned>(&self, payload: &[u8]) -> Result<V>;

    /// Codec name for diagnostics.
    fn name(&self) -> &'static str;
}

/// JSON payloads via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|err| FrameError::Codec(err.to_string()))
    }

    fn decode<V: DeserializeOwned>(&self, payload: &[u8]) -> Result<V> {
        serde_json::from_slice(payload).map_err(|err| FrameError::Codec(err.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Parse a decimal ASCII length header.
///
/// Anything that is not a plain non-negative integer (including an empty
/// header, which is what a peer that died before answering produces) is a
/// [`FrameError::RemoteFailure`].
pub fn parse_length(header: &[u8]) -> Result<usize> {
    let remote_failure = || FrameError::RemoteFailure {
        header: String::from_utf8_lossy(header).into_owned(),
    };

    let text = std::str::from_utf8(header).map_err(|_| remote_failure())?;
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(remote_failure());
    }
    text.parse::<usize>().map_err(|_| remote_failure())
}

/// Configuration for a framed channel.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 256 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations. Default: none.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations. Default: none.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Nested {
        name: String,
        values: Vec<i64>,
        tags: BTreeMap<String, Option<bool>>,
    }

    #[test]
    fn test_json_codec_nested_value() {
        let mut tags = BTreeMap::new();
        tags.insert("a".to_string(), Some(true));
        tags.insert("b".to_string(), None);
        let value = Nested {
            name: "nested".to_string(),
            values: vec![3, 7, 19],
            tags,
        };

        let payload = JsonCodec.encode(&value).unwrap();
        let decoded: Nested = JsonCodec.decode(&payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_json_codec_name() {
        assert_eq!(JsonCodec.name(), "json");
    }

    #[test]
    fn test_json_codec_decode_error() {
        let err = JsonCodec.decode::<Nested>(b"{not json").unwrap_err();
        assert!(matches!(err, FrameError::Codec(_)));
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length(b"0").unwrap(), 0);
        assert_eq!(parse_length(b"4096").unwrap(), 4096);
    }

    #[test]
    fn test_parse_length_empty_is_remote_failure() {
        let err = parse_length(b"").unwrap_err();
        assert!(matches!(err, FrameError::RemoteFailure { .. }));
    }

    #[test]
    fn test_parse_length_garbage_is_remote_failure() {
        for header in [&b"Traceback"[..], b"-3", b"12ab", b"\xff\xfe"] {
            let err = parse_length(header).unwrap_err();
            assert!(
                matches!(err, FrameError::RemoteFailure { .. }),
                "header {header:?} should be a remote failure"
            );
        }
    }

    #[test]
    fn test_sync_token_is_nine_bytes() {
        assert_eq!(SYNC_TOKEN.len(), 9);
    }
}
