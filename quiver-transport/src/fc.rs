// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Tracks the peer-granted send window for a single stream.

use log::trace;

/// How many bytes a sender is allowed to put on a stream, and whether a
/// `STREAM_DATA_BLOCKED` signal is owed for the current limit.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SenderFlowControl {
    /// The limit announced by the peer.  Only ever increases.
    limit: u64,
    /// Bytes already accounted as sent.
    used: u64,
    /// The limit at which a blocked signal was last reported, so the
    /// signal fires at most once per limit.
    blocked_reported_at: Option<u64>,
}

impl SenderFlowControl {
    #[must_use]
    pub const fn new(initial_limit: u64) -> Self {
        Self {
            limit: initial_limit,
            used: 0,
            blocked_reported_at: None,
        }
    }

    /// Bytes the peer has authorized but that have not been sent.
    #[must_use]
    pub const fn available(&self) -> u64 {
        self.limit - self.used
    }

    /// Total bytes accounted as sent.
    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Account for `count` newly sent bytes.  Callers size frames
    /// against [`available`][Self::available] first.
    pub fn consume(&mut self, count: u64) {
        debug_assert!(count <= self.available());
        self.used += count;
    }

    /// Advance the window.  Limits never regress; a smaller value is
    /// ignored.
    pub fn update(&mut self, limit: u64) {
        if limit > self.limit {
            trace!("flow control update {} -> {}", self.limit, limit);
            self.limit = limit;
        }
    }

    /// If the window is exhausted at a limit for which no blocked signal
    /// has been reported yet, mark it reported and return the blocking
    /// offset.
    pub fn newly_blocked(&mut self) -> Option<u64> {
        if self.available() > 0 || self.blocked_reported_at == Some(self.limit) {
            return None;
        }
        self.blocked_reported_at = Some(self.limit);
        Some(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::SenderFlowControl;

    #[test]
    fn consume_shrinks_window() {
        let mut fc = SenderFlowControl::new(100);
        assert_eq!(fc.available(), 100);
        fc.consume(60);
        assert_eq!(fc.available(), 40);
        assert_eq!(fc.used(), 60);
    }

    #[test]
    fn update_is_monotonic() {
        let mut fc = SenderFlowControl::new(100);
        fc.update(50);
        assert_eq!(fc.available(), 100);
        fc.update(150);
        assert_eq!(fc.available(), 150);
    }

    #[test]
    fn blocked_reports_once_per_limit() {
        let mut fc = SenderFlowControl::new(10);
        assert_eq!(fc.newly_blocked(), None);
        fc.consume(10);
        assert_eq!(fc.newly_blocked(), Some(10));
        assert_eq!(fc.newly_blocked(), None);
        fc.update(20);
        assert_eq!(fc.newly_blocked(), None);
        fc.consume(10);
        assert_eq!(fc.newly_blocked(), Some(20));
        assert_eq!(fc.newly_blocked(), None);
    }
}
