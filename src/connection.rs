//! Per-connection protocol state.
//!
//! A [`Connection`] owns the complete state for one logical peer-to-peer
//! session.  Its responsibilities are:
//! - Driving the finite-state machine (see [`crate::state`]).
//! - Producing the next outbound packet when polled ([`Connection::poll_outgoing`]).
//! - Interpreting inbound packets ([`Connection::on_packet`]): handshake
//!   replies, cumulative ACKs, advertised windows and payload delivery.
//! - Owning the [`SendBuffer`], the [`FlowControl`] state and the
//!   [`RetransmitTimer`] that the event loop consults.
//!
//! A connection performs no I/O and never reads the clock; the event loop
//! passes in the application and the current time.

use std::time::Instant;

use crate::app::Application;
use crate::config::Config;
use crate::packet::{flags, Packet, MAX_PAYLOAD};
use crate::send_buffer::SendBuffer;
use crate::seq::{seq_gt, seq_le};
use crate::state::{ConnectionState, Role};
use crate::timer::RetransmitTimer;
use crate::window::FlowControl;

/// Which handshake packets this side has already emitted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeFlags {
    pub syn_sent: bool,
    pub syn_ack_sent: bool,
    pub ack_sent: bool,
}

/// Complete state of one connection.
#[derive(Debug)]
pub struct Connection {
    /// Current FSM state.
    pub state: ConnectionState,
    pub role: Role,
    /// Next sequence number this side will use for new data.
    pub seq: u32,
    /// Next sequence number expected from the peer.
    pub ack: u32,
    /// Highest cumulative ACK the peer has sent us.
    pub last_ack: u32,
    /// Consecutive ACKs equal to `last_ack` while data is outstanding.
    pub dup_ack_count: u32,
    pub flow: FlowControl,
    /// A received packet still needs acknowledging.
    pub pending_pure_ack: bool,
    pub handshake: HandshakeFlags,
    /// Data packets awaiting acknowledgement.
    pub send_buffer: SendBuffer,
    /// The SYN or SYN-ACK waiting for its reply.
    pub handshake_packet: Option<Packet>,
    pub timer: RetransmitTimer,
}

impl Connection {
    /// Create a connection in `role`'s initial state.
    ///
    /// `isn` is the initial sequence number; the SYN carries it and consumes
    /// one sequence number, so data starts at `isn + 1`.
    pub fn new(role: Role, isn: u32, config: &Config, now: Instant) -> Self {
        Self {
            state: role.initial_state(),
            role,
            seq: isn,
            ack: 0,
            last_ack: isn,
            dup_ack_count: 0,
            flow: FlowControl::new(config.receive_window),
            pending_pure_ack: false,
            handshake: HandshakeFlags::default(),
            send_buffer: SendBuffer::new(),
            handshake_packet: None,
            timer: RetransmitTimer::new(config.rto, now),
        }
    }

    pub fn is_established(&self) -> bool {
        self.state.is_established()
    }

    /// The packet the retransmission paths would resend: the oldest
    /// unacknowledged data packet, or the pending SYN / SYN-ACK.
    pub fn retransmit_candidate(&self) -> Option<&Packet> {
        self.send_buffer
            .head()
            .or(self.handshake_packet.as_ref())
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Produce the next packet to transmit, if any.
    ///
    /// During the handshake each control packet is produced at most once per
    /// state; resends go through the retransmission timer.  Once established,
    /// new data is pulled from `app` while the peer's window has room.
    pub fn poll_outgoing(&mut self, app: &mut dyn Application, now: Instant) -> Option<Packet> {
        match self.state {
            ConnectionState::AwaitPeerSyn => None,
            ConnectionState::ClientSendSyn => {
                if self.handshake.syn_sent {
                    return None;
                }
                self.handshake.syn_sent = true;
                let syn = Packet::control(self.seq, 0, flags::SYN, self.advertised_window());
                log::debug!("[conn] → SYN seq={}", syn.header.seq);
                Some(self.arm_handshake(syn, now))
            }
            ConnectionState::ServerSendSynAck => {
                if self.handshake.syn_ack_sent {
                    return None;
                }
                self.handshake.syn_ack_sent = true;
                let syn_ack = Packet::control(
                    self.seq,
                    self.ack,
                    flags::SYN | flags::ACK,
                    self.advertised_window(),
                );
                log::debug!("[conn] → SYN-ACK seq={} ack={}", self.seq, self.ack);
                Some(self.arm_handshake(syn_ack, now))
            }
            ConnectionState::ClientAwaitSynAck => {
                if self.handshake.ack_sent {
                    return None;
                }
                self.handshake.ack_sent = true;
                self.establish();
                log::debug!("[conn] → ACK seq={} ack={}", self.seq, self.ack);
                Some(self.make_ack())
            }
            ConnectionState::Established => self.next_data_packet(app, now),
        }
    }

    /// Take the pending pure ACK, clearing the flag.
    pub fn take_pure_ack(&mut self) -> Option<Packet> {
        if !self.pending_pure_ack {
            return None;
        }
        self.pending_pure_ack = false;
        Some(self.make_ack())
    }

    /// Zero-payload ACK reflecting the current sequence state.
    pub fn make_ack(&self) -> Packet {
        Packet::control(self.seq, self.ack, flags::ACK, self.advertised_window())
    }

    fn next_data_packet(&mut self, app: &mut dyn Application, now: Instant) -> Option<Packet> {
        if !self.flow.can_send() {
            return None;
        }

        let mut buf = [0u8; MAX_PAYLOAD];
        let bytes_read = app.try_read(&mut buf);
        if bytes_read == 0 {
            return None;
        }

        let pkt = Packet::data(
            self.seq,
            self.ack,
            self.advertised_window(),
            buf[..bytes_read].to_vec(),
        );
        self.send_buffer.push(pkt.clone());
        self.seq = self.seq.wrapping_add(bytes_read as u32);
        self.flow.on_sent(bytes_read);
        self.timer.reset(now);

        log::debug!(
            "[conn] → DATA seq={} len={} window_used={} in_flight={}",
            pkt.header.seq,
            bytes_read,
            self.flow.our_send_window,
            self.send_buffer.bytes_in_flight()
        );
        Some(pkt)
    }

    fn arm_handshake(&mut self, pkt: Packet, now: Instant) -> Packet {
        self.handshake_packet = Some(pkt.clone());
        self.timer.reset(now);
        pkt
    }

    fn advertised_window(&self) -> u16 {
        self.flow.our_max_receiving_window
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Process one inbound packet.
    ///
    /// Packets that do not fit the current handshake state are ignored.
    pub fn on_packet(&mut self, pkt: &Packet, app: &mut dyn Application) {
        let h = &pkt.header;
        match self.state {
            ConnectionState::AwaitPeerSyn => {
                if pkt.has_flags(flags::SYN) {
                    self.ack = h.seq.wrapping_add(1);
                    self.flow.on_peer_window(h.window);
                    self.state = ConnectionState::ServerSendSynAck;
                    log::debug!("[conn] ← SYN seq={}", h.seq);
                }
            }
            ConnectionState::ClientSendSyn => {
                if h.flags == flags::SYN | flags::ACK && h.ack == self.seq.wrapping_add(1) {
                    self.ack = h.seq.wrapping_add(1);
                    self.seq = h.ack;
                    self.last_ack = h.ack;
                    self.flow.on_peer_window(h.window);
                    self.handshake_packet = None;
                    self.state = ConnectionState::ClientAwaitSynAck;
                    log::debug!("[conn] ← SYN-ACK seq={} ack={}", h.seq, h.ack);
                }
            }
            ConnectionState::ServerSendSynAck => {
                if h.flags == flags::ACK && h.ack == self.seq.wrapping_add(1) {
                    self.seq = h.ack;
                    self.last_ack = h.ack;
                    self.handshake_packet = None;
                    self.establish();
                    log::debug!("[conn] ← ACK ack={}", h.ack);
                    // A data segment can complete the handshake when the
                    // client's final ACK was lost.
                    if !pkt.payload.is_empty() {
                        self.on_established(pkt, app);
                    } else {
                        self.flow.on_peer_window(h.window);
                    }
                }
            }
            // The final ACK goes out on the next poll; nothing to receive.
            ConnectionState::ClientAwaitSynAck => {}
            ConnectionState::Established => self.on_established(pkt, app),
        }
    }

    fn establish(&mut self) {
        self.state = ConnectionState::Established;
        log::info!(
            "[conn] {} established seq={} ack={}",
            self.role,
            self.seq,
            self.ack
        );
    }

    fn on_established(&mut self, pkt: &Packet, app: &mut dyn Application) {
        let h = &pkt.header;

        // Our final handshake ACK went missing and the server retried.
        if pkt.has_flags(flags::SYN) {
            if pkt.has_flags(flags::ACK) {
                self.pending_pure_ack = true;
            }
            return;
        }

        if !pkt.payload.is_empty() {
            self.on_payload(pkt, app);
        }

        if h.flags & flags::ACK == 0 {
            return;
        }
        // last_ack never passes seq, so this only rejects ACKs for unsent data.
        if !seq_le(h.ack, self.seq) {
            log::debug!("[conn] ← ACK ack={} beyond seq={}; ignored", h.ack, self.seq);
            return;
        }
        self.flow.on_peer_window(h.window);
        self.on_ack(h.ack, pkt.payload.is_empty());
    }

    /// Deliver in-order payload and schedule an acknowledgement.
    fn on_payload(&mut self, pkt: &Packet, app: &mut dyn Application) {
        let h = &pkt.header;
        if h.seq == self.ack {
            app.write(&pkt.payload);
            self.ack = pkt.seq_end();
            log::debug!("[conn] ← DATA seq={} len={}", h.seq, pkt.payload.len());
        } else {
            log::debug!(
                "[conn] ← DATA seq={} len={} discarded, expected seq={}",
                h.seq,
                pkt.payload.len(),
                self.ack
            );
        }
        // Re-ACK discarded segments too so the sender sees a duplicate ACK.
        self.pending_pure_ack = true;
    }

    /// Apply a cumulative ACK.
    fn on_ack(&mut self, ack: u32, pure: bool) {
        if seq_gt(ack, self.last_ack) {
            let released = self.send_buffer.acknowledge(ack);
            self.flow.on_ack_advanced();
            self.last_ack = ack;
            self.dup_ack_count = 0;
            log::debug!(
                "[conn] ← ACK ack={ack} released={released} in_flight={}",
                self.send_buffer.len()
            );
        } else if ack == self.last_ack && pure && !self.send_buffer.is_empty() {
            self.dup_ack_count += 1;
            log::debug!("[conn] ← dup ACK ack={ack} count={}", self.dup_ack_count);
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
