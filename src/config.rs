//! Tunable protocol parameters.

use std::time::Duration;

use crate::packet::MAX_PAYLOAD;

/// Smallest receive window either side advertises: one full packet.
pub const MIN_WINDOW: u16 = MAX_PAYLOAD as u16;

/// Adjustable parameters for one connection.
///
/// The binary fills these from CLI flags; tests construct them directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed retransmission timeout for the oldest unacknowledged packet.
    pub rto: Duration,
    /// Number of duplicate ACKs that triggers a fast retransmit.
    pub dup_ack_threshold: u32,
    /// Receive window advertised to the peer (`our_max_receiving_window`).
    pub receive_window: u16,
    /// How long the runner sleeps after a tick that did nothing.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rto: Duration::from_millis(1000),
            dup_ack_threshold: 3,
            receive_window: MIN_WINDOW,
            poll_interval: Duration::from_millis(1),
        }
    }
}
