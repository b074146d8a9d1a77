use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};

/// In-memory duplex stream that hands out one scripted chunk per read.
///
/// Handing out chunks one at a time models a peer that only writes its next
/// phase after receiving the token, which a plain `Cursor` cannot.
#[derive(Debug, Default)]
pub struct ScriptedStream {
    reads: VecDeque<Vec<u8>>,
    pub written: Vec<u8>,
    /// Maximum bytes accepted per `write` call (0 = unlimited).
    pub write_limit: usize,
    /// Number of leading `write` calls answered with `Interrupted`.
    pub interrupt_writes: usize,
    /// Stop accepting bytes once this many have been written.
    pub close_after: Option<usize>,
}

impl ScriptedStream {
    pub fn new<I, B>(reads: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self {
            reads: reads.into_iter().map(|b| b.as_ref().to_vec()).collect(),
            ..Self::default()
        }
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(chunk) = self.reads.front_mut() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            self.reads.pop_front();
        }
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.interrupt_writes > 0 {
            self.interrupt_writes -= 1;
            return Err(std::io::Error::from(ErrorKind::Interrupted));
        }
        let mut n = buf.len();
        if self.write_limit > 0 {
            n = n.min(self.write_limit);
        }
        if let Some(limit) = self.close_after {
            n = n.min(limit.saturating_sub(self.written.len()));
        }
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
