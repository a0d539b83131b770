//! In-flight segment store.
//!
//! [`SendBuffer`] holds every data packet that has been transmitted but not
//! yet fully acknowledged, oldest first.
//!
//! # Contract
//!
//! - Sequence numbers strictly increase from front to back.
//! - The front entry is the retransmission candidate.
//! - ACKs are **cumulative**: `ack = K` means the peer holds every byte
//!   before `K`.  An entry is released once `seq + len <= K`; an entry
//!   that is only partly covered stays whole.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use std::collections::VecDeque;

use crate::packet::Packet;
use crate::seq::{seq_le, seq_lt};

/// Unacknowledged data packets for one connection.
///
/// ```text
///  front (head)                       back
///      │                                │
///  ────┼────────────────────────────────┼──────▶ seq space
///      │ <── sent, awaiting cumulative ACK ──▶ │
/// ```
#[derive(Debug, Default)]
pub struct SendBuffer {
    entries: VecDeque<Packet>,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a just-transmitted packet at the tail.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `packet` does not start after the current
    /// tail's sequence number.
    pub fn push(&mut self, packet: Packet) {
        debug_assert!(
            self.entries
                .back()
                .map_or(true, |tail| seq_lt(tail.header.seq, packet.header.seq)),
            "send buffer sequence numbers must strictly increase"
        );
        self.entries.push_back(packet);
    }

    /// Release every head entry whose byte range ends at or before `ack`.
    ///
    /// Returns the number of entries removed.
    pub fn acknowledge(&mut self, ack: u32) -> usize {
        let mut released = 0usize;
        while let Some(front) = self.entries.front() {
            if seq_le(front.seq_end(), ack) {
                self.entries.pop_front();
                released += 1;
            } else {
                break;
            }
        }
        released
    }

    /// Oldest unacknowledged packet, if any.
    pub fn head(&self) -> Option<&Packet> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Payload bytes held across all entries.
    pub fn bytes_in_flight(&self) -> usize {
        self.entries.iter().map(|p| p.payload.len()).sum()
    }
}
