//! Single-connection polling loop.
//!
//! [`EventLoop::tick`] performs one iteration:
//!
//! 1. Try one non-blocking receive; decode and hand the packet to the
//!    [`Connection`].
//! 2. Ask the connection for an outgoing packet and transmit it.
//! 3. Otherwise, if an acknowledgement is owed, transmit a pure ACK.
//! 4. Evaluate the retransmission paths, in order, at most one per tick:
//!    timeout, fast retransmit, or (nothing outstanding) timer reset.
//!
//! Nothing in a tick blocks.  [`EventLoop::run`] repeats ticks forever and
//! yields to the tokio runtime in between so socket readiness and the
//! application's channels make progress.

use std::time::Instant;

use crate::app::Application;
use crate::config::Config;
use crate::connection::Connection;
use crate::packet::{Packet, MAX_DATAGRAM};
use crate::seq::initial_sequence_number;
use crate::socket::{Datagram, SocketError};
use crate::state::{ConnectionState, Role};

/// What the primary send step transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sent {
    Handshake,
    Data,
    PureAck,
}

/// Why the head packet was resent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retransmit {
    Timeout,
    FastRetransmit,
}

/// Summary of one [`EventLoop::tick`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// A datagram was received and decoded.
    pub received: bool,
    pub sent: Option<Sent>,
    pub retransmit: Option<Retransmit>,
}

impl Tick {
    /// `true` when the tick neither received nor sent anything.
    pub fn is_idle(&self) -> bool {
        !self.received && self.sent.is_none() && self.retransmit.is_none()
    }
}

/// Drives one [`Connection`] over a [`Datagram`] socket.
pub struct EventLoop<S, A> {
    pub conn: Connection,
    pub socket: S,
    pub app: A,
    config: Config,
    recv_buf: Vec<u8>,
}

impl<S: Datagram, A: Application> EventLoop<S, A> {
    /// Create a loop for `role` with a random initial sequence number.
    pub fn new(role: Role, socket: S, app: A, config: Config) -> Self {
        Self::with_isn(role, initial_sequence_number(), socket, app, config, Instant::now())
    }

    /// Create a loop with an explicit initial sequence number and start time.
    pub fn with_isn(
        role: Role,
        isn: u32,
        socket: S,
        app: A,
        config: Config,
        now: Instant,
    ) -> Self {
        Self {
            conn: Connection::new(role, isn, &config, now),
            socket,
            app,
            config,
            recv_buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one iteration of the loop at time `now`.
    pub fn tick(&mut self, now: Instant) -> Tick {
        let mut tick = Tick {
            received: self.receive(),
            ..Tick::default()
        };

        if let Some(pkt) = self.conn.poll_outgoing(&mut self.app, now) {
            let kind = if pkt.payload.is_empty() {
                Sent::Handshake
            } else {
                Sent::Data
            };
            if self.transmit(&pkt) {
                tick.sent = Some(kind);
            }
        } else if let Some(ack) = self.conn.take_pure_ack() {
            log::debug!("[loop] → ACK ack={}", ack.header.ack);
            if self.transmit(&ack) {
                tick.sent = Some(Sent::PureAck);
            }
        }

        tick.retransmit = self.check_retransmit(now);
        tick
    }

    /// Tick forever, yielding to the runtime between iterations.
    ///
    /// Idle ticks sleep for [`Config::poll_interval`]; busy ticks only yield.
    pub async fn run(&mut self) {
        loop {
            let tick = self.tick(Instant::now());
            if tick.is_idle() {
                tokio::time::sleep(self.config.poll_interval).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    fn receive(&mut self) -> bool {
        let n = match self.socket.try_recv(&mut self.recv_buf) {
            Ok(Some(n)) => n,
            Ok(None) => return false,
            Err(e) => {
                log::debug!("[loop] recv failed: {e}");
                return false;
            }
        };
        match Packet::decode(&self.recv_buf[..n]) {
            Ok(pkt) => {
                let before = self.conn.state;
                self.conn.on_packet(&pkt, &mut self.app);
                if before == ConnectionState::AwaitPeerSyn && self.conn.state != before {
                    self.socket.adopt_peer();
                }
                true
            }
            Err(e) => {
                log::debug!("[loop] dropping malformed datagram ({n} bytes): {e}");
                false
            }
        }
    }

    fn check_retransmit(&mut self, now: Instant) -> Option<Retransmit> {
        let Some(seq) = self.conn.retransmit_candidate().map(|p| p.header.seq) else {
            // Nothing outstanding; keep the timer fresh for the next send.
            self.conn.timer.reset(now);
            return None;
        };

        let reason = if self.conn.timer.expired(now) {
            log::warn!(
                "[loop] timeout after {:?}; resending seq={seq}",
                self.conn.timer.elapsed(now)
            );
            Retransmit::Timeout
        } else if self.conn.dup_ack_count >= self.config.dup_ack_threshold {
            log::warn!(
                "[loop] {} duplicate ACKs; fast retransmit seq={seq}",
                self.conn.dup_ack_count
            );
            self.conn.dup_ack_count = 0;
            Retransmit::FastRetransmit
        } else {
            return None;
        };

        if let Some(pkt) = self.conn.retransmit_candidate().cloned() {
            self.transmit(&pkt);
        }
        self.conn.timer.reset(now);
        Some(reason)
    }

    /// Encode and send `pkt`; failures are logged and swallowed.
    fn transmit(&mut self, pkt: &Packet) -> bool {
        match self.try_transmit(pkt) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("[loop] send of seq={} failed: {e}", pkt.header.seq);
                false
            }
        }
    }

    fn try_transmit(&mut self, pkt: &Packet) -> Result<(), SocketError> {
        let bytes = pkt.encode()?;
        self.socket.try_send(&bytes)?;
        Ok(())
    }
}
