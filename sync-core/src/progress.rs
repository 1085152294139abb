//! Progress tracking for a single payload transfer.
//!
//! Percentages are `floor(done / total * 100)` and never go backwards.
//! Only changes are reported, so a large payload streamed in small chunks
//! does not flood observers with identical values.

use sync_types::progress_percent;

/// Tracks bytes transferred against a declared total.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: u64,
    done: u64,
    last_reported: Option<u8>,
}

impl ProgressTracker {
    /// Create a tracker for a payload of `total` bytes.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            done: 0,
            last_reported: None,
        }
    }

    /// Record `n` more bytes.
    ///
    /// Returns the new percentage when it differs from the last one reported.
    pub fn advance(&mut self, n: u64) -> Option<u8> {
        self.done = self.done.saturating_add(n).min(self.total);
        self.report()
    }

    /// Report 100% if it has not been reported yet.
    ///
    /// Needed for empty payloads, which never produce a chunk.
    pub fn finish(&mut self) -> Option<u8> {
        if self.done < self.total {
            return None;
        }
        self.report()
    }

    /// Bytes recorded so far.
    pub fn done(&self) -> u64 {
        self.done
    }

    /// Declared total.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.total - self.done
    }

    /// Whether every declared byte has been recorded.
    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }

    fn report(&mut self) -> Option<u8> {
        let percent = progress_percent(self.done, self.total);
        if self.last_reported == Some(percent) {
            return None;
        }
        self.last_reported = Some(percent);
        Some(percent)
    }
}
