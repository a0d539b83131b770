//! Connection finite-state machine (FSM) types.
//!
//! This module defines every state a [`crate::connection::Connection`] can
//! occupy.  State transitions are not implemented here; they live in
//! [`crate::connection`].
//!
//! ```text
//!  client:  ClientSendSyn ──SYN-ACK rcvd──▶ ClientAwaitSynAck ──ACK sent──▶ Established
//!  server:  AwaitPeerSyn  ──SYN rcvd─────▶ ServerSendSynAck  ──ACK rcvd──▶ Established
//! ```
//!
//! There is no teardown: `Established` is terminal.

use std::fmt;

/// All possible states of the connection FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Server initial state: waiting for the peer's SYN.
    AwaitPeerSyn,
    /// Client initial state: emit SYN, then wait for a matching SYN-ACK.
    ClientSendSyn,
    /// SYN received; emit SYN-ACK, then wait for the final ACK.
    ServerSendSynAck,
    /// SYN-ACK received; the final ACK is emitted on the next poll.
    ClientAwaitSynAck,
    /// Three-way handshake complete; data transfer in progress.
    Established,
}

impl ConnectionState {
    pub fn is_established(self) -> bool {
        self == Self::Established
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which side of the handshake this instance plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// The FSM state a fresh connection starts in.
    pub fn initial_state(self) -> ConnectionState {
        match self {
            Role::Client => ConnectionState::ClientSendSyn,
            Role::Server => ConnectionState::AwaitPeerSyn,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_start_in_their_own_state() {
        assert_eq!(Role::Client.initial_state(), ConnectionState::ClientSendSyn);
        assert_eq!(Role::Server.initial_state(), ConnectionState::AwaitPeerSyn);
    }

    #[test]
    fn only_established_is_established() {
        assert!(ConnectionState::Established.is_established());
        assert!(!ConnectionState::ServerSendSynAck.is_established());
    }
}
