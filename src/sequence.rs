//! Per-connection send/receive sequence counters.
//!
//! Both counters are 15-bit values in `[0, 32767]` that wrap to 0, owned
//! exclusively by the connection's state machine. Receive validation is a
//! strict equality check: TCP ordering is assumed, out-of-order frames are
//! dropped rather than buffered.

use crate::types::{SEQUENCE_MAX, SEQUENCE_MIN};

/// Send and receive sequence state for one connection.
#[derive(Debug, Default)]
pub struct SequenceController {
    send: u16,
    receive: u16,
}

impl SequenceController {
    /// Create a controller with both counters at the minimum value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current send sequence number and advance it.
    pub fn next_send(&mut self) -> u16 {
        let current = self.send;
        self.send = wrapping_increment(self.send);
        current
    }

    /// Current receive sequence number (the send number expected next from
    /// the peer).
    pub fn current_receive(&self) -> u16 {
        self.receive
    }

    /// Validate an inbound I-frame's send sequence number.
    ///
    /// Returns true and advances the receive counter iff `seq` matches it
    /// exactly; otherwise the counter is untouched and the frame must be
    /// dropped.
    pub fn accept_receive(&mut self, seq: u16) -> bool {
        if seq == self.receive {
            self.receive = wrapping_increment(self.receive);
            true
        } else {
            false
        }
    }
}

#[inline]
fn wrapping_increment(seq: u16) -> u16 {
    if seq >= SEQUENCE_MAX {
        SEQUENCE_MIN
    } else {
        seq + 1
    }
}
