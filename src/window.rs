//! Receive-window flow control.
//!
//! The peer advertises how many bytes it is willing to buffer.  New data may
//! only leave while the bytes we have outstanding stay below that
//! advertisement.  The window is a fixed capacity ceiling, not a congestion
//! window.

use crate::config::MIN_WINDOW;

#[derive(Debug, Clone)]
pub struct FlowControl {
    /// Bytes sent since the last cumulative ACK advancement.
    pub our_send_window: u32,
    /// Most recent window advertised by the peer.
    pub their_receiving_window: u32,
    /// Window we advertise in every outgoing packet.
    pub our_max_receiving_window: u16,
}

impl FlowControl {
    /// Until the peer advertises otherwise it is assumed to hold
    /// [`MIN_WINDOW`] bytes.
    pub fn new(our_max_receiving_window: u16) -> Self {
        Self {
            our_send_window: 0,
            their_receiving_window: u32::from(MIN_WINDOW),
            our_max_receiving_window,
        }
    }

    /// `true` while the peer has room for more data.
    pub fn can_send(&self) -> bool {
        self.our_send_window < self.their_receiving_window
    }

    pub fn on_sent(&mut self, bytes: usize) {
        self.our_send_window = self.our_send_window.saturating_add(bytes as u32);
    }

    /// The cumulative ACK advanced: the whole window reopens.
    pub fn on_ack_advanced(&mut self) {
        self.our_send_window = 0;
    }

    pub fn on_peer_window(&mut self, window: u16) {
        self.their_receiving_window = u32::from(window);
    }
}
