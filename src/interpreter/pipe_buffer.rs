//! Pipe Buffer
//!
//! In-memory stand-in for an OS pipe between two pipeline stages. The
//! producer appends arbitrary chunks; the consumer reads whole lines.

use std::collections::VecDeque;

/// Line-oriented FIFO with a pending partial line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeBuffer {
    lines: VecDeque<String>,
    remainder: String,
    closed: bool,
}

impl PipeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A finished buffer holding `text`.
    pub fn from_text(text: &str) -> Self {
        let mut buffer = Self::new();
        buffer.append(text);
        buffer.close();
        buffer
    }

    /// Queue every complete line in `chunk`; keep the unterminated tail pending.
    pub fn append(&mut self, chunk: &str) {
        let mut rest = chunk;
        while let Some(pos) = rest.find('\n') {
            let mut line = std::mem::take(&mut self.remainder);
            line.push_str(&rest[..=pos]);
            self.lines.push_back(line);
            rest = &rest[pos + 1..];
        }
        self.remainder.push_str(rest);
    }

    /// Mark the producer side finished.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Oldest complete line (with its `\n`). Once closed, a non-empty
    /// remainder is returned as the final line.
    pub fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.lines.pop_front() {
            return Some(line);
        }
        if self.closed && !self.remainder.is_empty() {
            return Some(std::mem::take(&mut self.remainder));
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.remainder.is_empty()
    }

    /// Everything still buffered, in order, including the remainder.
    pub fn drain_to_string(&mut self) -> String {
        let mut out: String = self.lines.drain(..).collect();
        out.push_str(&std::mem::take(&mut self.remainder));
        out
    }
}
