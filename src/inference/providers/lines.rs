//! Line framing for streamed response bodies.
//!
//! Network chunks can end anywhere, including inside a multi-byte character,
//! so bytes are buffered raw and only complete lines are decoded.

/// Accumulates raw body chunks and yields complete, trimmed lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator, or `None` until more bytes arrive.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let pos = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Bytes still waiting for a newline.
    pub(crate) fn pending(&self) -> usize {
        self.bytes.len()
    }
}
