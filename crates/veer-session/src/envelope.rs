//! Error envelope carried back from the child.
//!
//! Entries fail with ordinary Rust errors (or panic). The child turns that
//! into a [`RemoteError`]: the error's type name and message plus two lists of
//! pre-formatted text, so the host can log what happened over there without
//! knowing the concrete error type.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;

use serde::{Deserialize, Serialize};
use tracing::error;

const PANIC_KIND: &str = "panic";
const MAX_STACK_FRAMES: usize = 32;

/// A failure that happened inside a remote entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("RemoteError wrapping {original_kind}: {original_message}")]
pub struct RemoteError {
    /// Short type name of the original error (`"panic"` for panics).
    pub original_kind: String,
    /// Display text of the original error.
    pub original_message: String,
    /// `"Kind: message"` followed by one line per error source.
    pub formatted_exception: Vec<String>,
    /// Stack frames, oldest first. Never empty.
    pub formatted_stack: Vec<String>,
}

impl RemoteError {
    /// Build an envelope from explicit parts. The stack holds only the entry frame.
    pub fn new(entry: &str, kind: impl Into<String>, message: impl Into<String>) -> Self {
        let original_kind = kind.into();
        let original_message = message.into();
        Self {
            formatted_exception: vec![format!("{original_kind}: {original_message}")],
            formatted_stack: vec![entry_frame(entry)],
            original_kind,
            original_message,
        }
    }

    /// Capture an error returned by `entry`, including a backtrace of the
    /// capturing thread.
    pub fn capture<E>(entry: &str, err: &E) -> Self
    where
        E: Error + ?Sized,
    {
        let original_kind = short_type_name(std::any::type_name::<E>());
        let original_message = err.to_string();

        let mut formatted_exception = vec![format!("{original_kind}: {original_message}")];
        let mut source = err.source();
        while let Some(cause) = source {
            formatted_exception.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self {
            formatted_stack: capture_stack(entry),
            formatted_exception,
            original_kind,
            original_message,
        }
    }

    /// Capture a panic payload from `entry`.
    pub fn from_panic(entry: &str, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "entry panicked with a non-string payload".to_string()
        };

        let mut envelope = Self::new(entry, PANIC_KIND, message);
        envelope.formatted_stack = capture_stack(entry);
        envelope
    }

    /// Envelope for a child asked to run an entry it does not know.
    pub fn unknown_entry(entry: &str) -> Self {
        Self::new(
            entry,
            "UnknownEntry",
            format!(
                "no entry named {entry:?} is registered in process {}",
                std::process::id()
            ),
        )
    }

    /// Whether the original failure was a panic.
    pub fn is_panic(&self) -> bool {
        self.original_kind == PANIC_KIND
    }

    /// Individual log lines: stack first, then the error itself.
    pub fn log_lines(&self) -> Vec<&str> {
        self.formatted_stack
            .iter()
            .chain(self.formatted_exception.iter())
            .flat_map(|chunk| chunk.lines())
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Emit the remote stack and error at error severity, one record per line.
    pub fn write_to_log(&self) {
        for line in self.log_lines() {
            error!("{line}");
        }
    }
}

/// Last path segment of a type name, without generic arguments.
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn entry_frame(entry: &str) -> String {
    format!("  remote entry {entry:?} in process {}", std::process::id())
}

/// Frames of the current thread, oldest first, ending with the entry frame.
fn capture_stack(entry: &str) -> Vec<String> {
    let backtrace = Backtrace::force_capture();
    let mut frames = match backtrace.status() {
        BacktraceStatus::Captured => parse_frames(&backtrace.to_string()),
        _ => Vec::new(),
    };

    frames.retain(|frame| !is_capture_frame(frame));
    frames.truncate(MAX_STACK_FRAMES);
    frames.reverse();
    frames.push(entry_frame(entry));
    frames
}

/// Split std's backtrace rendering into one string per frame, newest first.
fn parse_frames(rendered: &str) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim_start();
        let numbered = trimmed
            .split_once(':')
            .filter(|(index, _)| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()));

        match (numbered, frames.last_mut()) {
            (Some((_, symbol)), _) => frames.push(format!("  {}", symbol.trim())),
            (None, Some(frame)) if trimmed.starts_with("at ") => {
                frame.push_str("\n    ");
                frame.push_str(trimmed);
            }
            _ => {}
        }
    }
    frames
}

fn is_capture_frame(frame: &str) -> bool {
    let symbol = frame.trim_start();
    symbol.starts_with("std::backtrace") || symbol.starts_with("veer_session::envelope::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("bad input")]
    struct ValueError;

    #[derive(Debug, thiserror::Error)]
    #[error("could not load model")]
    struct LoadError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn capture_records_kind_and_message() {
        let envelope = RemoteError::capture("demo::fail", &ValueError);

        assert_eq!(envelope.original_kind, "ValueError");
        assert_eq!(envelope.original_message, "bad input");
        assert_eq!(envelope.formatted_exception, vec!["ValueError: bad input"]);
        assert!(!envelope.formatted_stack.is_empty());
        assert!(envelope
            .formatted_stack
            .last()
            .unwrap()
            .contains("remote entry \"demo::fail\""));
    }

    #[test]
    fn capture_walks_sources() {
        let err = LoadError {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "model.bin missing"),
        };
        let envelope = RemoteError::capture("demo::load", &err);

        assert_eq!(
            envelope.formatted_exception,
            vec![
                "LoadError: could not load model".to_string(),
                "caused by: model.bin missing".to_string(),
            ]
        );
    }

    #[test]
    fn display_names_original() {
        let envelope = RemoteError::capture("demo::fail", &ValueError);
        assert_eq!(
            envelope.to_string(),
            "RemoteError wrapping ValueError: bad input"
        );
    }

    #[test]
    fn panic_payloads() {
        let from_str = RemoteError::from_panic("demo::boom", &"exploded");
        assert!(from_str.is_panic());
        assert_eq!(from_str.original_message, "exploded");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        let from_string = RemoteError::from_panic("demo::boom", owned.as_ref());
        assert_eq!(from_string.original_message, "owned boom");

        let other: Box<dyn Any + Send> = Box::new(42u8);
        let opaque = RemoteError::from_panic("demo::boom", other.as_ref());
        assert_eq!(opaque.original_kind, "panic");
        assert!(opaque.original_message.contains("non-string"));
    }

    #[test]
    fn log_lines_put_stack_before_exception() {
        let envelope = RemoteError {
            original_kind: "ValueError".into(),
            original_message: "bad input".into(),
            formatted_exception: vec!["ValueError: bad input\n".into()],
            formatted_stack: vec![
                "  main\n    at src/main.rs:3:5\n".into(),
                "  fail\n    at src/demo.rs:10:9".into(),
            ],
        };

        assert_eq!(
            envelope.log_lines(),
            vec![
                "  main",
                "    at src/main.rs:3:5",
                "  fail",
                "    at src/demo.rs:10:9",
                "ValueError: bad input",
            ]
        );
    }

    #[test]
    fn serde_field_names() {
        let envelope = RemoteError::new("demo::x", "ValueError", "bad input");
        let value = serde_json::to_value(&envelope).unwrap();

        for field in [
            "original_kind",
            "original_message",
            "formatted_exception",
            "formatted_stack",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        let back: RemoteError = serde_json::from_value(value).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn parse_frames_groups_locations() {
        let rendered = "   0: first::frame\n             at ./src/a.rs:1:1\n   1: second::frame\n   2: third\n             at ./src/c.rs:3:3\n";
        let frames = parse_frames(rendered);

        assert_eq!(
            frames,
            vec![
                "  first::frame\n    at ./src/a.rs:1:1".to_string(),
                "  second::frame".to_string(),
                "  third\n    at ./src/c.rs:3:3".to_string(),
            ]
        );
    }

    #[test]
    fn short_type_names() {
        assert_eq!(short_type_name("my_crate::errors::ValueError"), "ValueError");
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(
            short_type_name("alloc::boxed::Box<dyn core::error::Error>"),
            "Box"
        );
    }
}
