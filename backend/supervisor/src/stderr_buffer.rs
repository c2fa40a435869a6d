//! Bounded accumulation of the proxy's stderr.
//!
//! Only the most recent `limit` bytes are kept so a long-lived, noisy
//! process cannot grow the controller's memory without bound.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct StderrBuffer {
    limit: usize,
    bytes: VecDeque<u8>,
    dropped: usize,
}

impl StderrBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            bytes: VecDeque::with_capacity(limit.min(4096)),
            dropped: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.limit == 0 {
            self.dropped += chunk.len();
            return;
        }
        let chunk = if chunk.len() > self.limit {
            self.dropped += chunk.len() - self.limit;
            &chunk[chunk.len() - self.limit..]
        } else {
            chunk
        };
        let overflow = (self.bytes.len() + chunk.len()).saturating_sub(self.limit);
        self.bytes.drain(..overflow);
        self.dropped += overflow;
        self.bytes.extend(chunk);
    }

    /// Bytes discarded from the front so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Retained text, lossily decoded.
    pub fn text(&self) -> String {
        let (front, back) = self.bytes.as_slices();
        let mut raw = Vec::with_capacity(self.bytes.len());
        raw.extend_from_slice(front);
        raw.extend_from_slice(back);
        String::from_utf8_lossy(&raw).into_owned()
    }
}
