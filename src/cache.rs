//! Bounded cache of sent, not-yet-acknowledged I-frames.
//!
//! The cache is an insertion-ordered queue keyed by send sequence number.
//! Entries enter strictly in send order, so the queue represents a contiguous
//! window of the sequence space which may wrap past the maximum value. An
//! acknowledgement trims every entry older (in the wraparound sense) than the
//! acknowledged number; the symmetric suffix query is available for resend
//! logic but is not wired into any automatic retransmission trigger.

use std::collections::VecDeque;

use crate::codec::Frame;
use crate::types::{SEQUENCE_MAX, SEQUENCE_MIN};

/// Default cache capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Insertion-ordered, capacity-bounded store of sent I-frames.
#[derive(Debug)]
pub struct RetransmissionCache {
    queue: VecDeque<Frame>,
    capacity: usize,
    max_value: u16,
    min_value: u16,
}

impl Default for RetransmissionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RetransmissionCache {
    /// Create a cache with the default capacity and the full 15-bit
    /// sequence space.
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_CACHE_CAPACITY, SEQUENCE_MAX, SEQUENCE_MIN)
    }

    /// Create a cache with explicit capacity and sequence bounds.
    ///
    /// The reduced bounds exist to make the wraparound arithmetic testable
    /// with small sequence spaces.
    pub fn with_bounds(capacity: usize, max_value: u16, min_value: u16) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
            capacity,
            max_value,
            min_value,
        }
    }

    /// Number of cached frames.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop all cached frames.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Send sequence numbers of all cached frames, oldest first.
    pub fn send_sequence_numbers(&self) -> Vec<u16> {
        self.queue.iter().map(seq_of).collect()
    }

    /// Append a sent I-frame; the oldest entry is evicted on overflow.
    pub fn add(&mut self, frame: Frame) {
        debug_assert!(
            frame.apci.send_seq().is_some(),
            "only I-frames carry a send sequence and belong in the cache"
        );
        if frame.apci.send_seq().is_none() {
            return;
        }
        self.queue.push_back(frame);
        if self.queue.len() > self.capacity {
            self.queue.pop_front();
        }
    }

    /// Remove every cached frame older than `n` in the wraparound sense.
    ///
    /// Boundary rules:
    /// - newest cached value is the maximum and `n` is the minimum: the
    ///   acknowledgement wrapped past the boundary, clear everything;
    /// - newest cached value is below the maximum and `n` is newest+1: the
    ///   acknowledgement covers everything sent so far, clear everything;
    /// - otherwise scan from the newest entry backward for `n`; entries
    ///   strictly older than the match are removed, the match and newer
    ///   entries are kept. No match removes nothing.
    pub fn remove_less(&mut self, n: u16) {
        let Some(newest) = self.queue.back() else {
            return;
        };

        // [32764, 32765, 32766, 32767]   <-- 0
        let newest_seq = seq_of(newest);
        if newest_seq == self.max_value && n == self.min_value {
            self.queue.clear();
            return;
        }
        // [32765, 32766, 32767, 0, 1]   <-- 2
        if newest_seq < self.max_value && n == newest_seq + 1 {
            self.queue.clear();
            return;
        }

        // [32765, 32766, 32767, 0, 1]   <-- 0
        if let Some(pos) = self.queue.iter().rposition(|frame| seq_of(frame) == n) {
            self.queue.drain(..pos);
        }
    }

    /// Suffix of the cache from the frame with sequence `n` onward (oldest
    /// first), mirroring [`remove_less`](Self::remove_less): past either
    /// clear-all boundary the suffix is empty, and an unmatched `n` yields
    /// nothing.
    pub fn greater_equal(&self, n: u16) -> Vec<Frame> {
        let Some(newest) = self.queue.back() else {
            return Vec::new();
        };

        let newest_seq = seq_of(newest);
        if newest_seq == self.max_value && n == self.min_value {
            return Vec::new();
        }
        if newest_seq < self.max_value && n == newest_seq + 1 {
            return Vec::new();
        }

        match self.queue.iter().position(|frame| seq_of(frame) == n) {
            Some(pos) => self.queue.iter().skip(pos).cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[inline]
fn seq_of(frame: &Frame) -> u16 {
    frame.apci.send_seq().unwrap_or(SEQUENCE_MIN)
}
