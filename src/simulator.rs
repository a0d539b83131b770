//! In-memory network simulator for deterministic testing.
//!
//! Real networks drop, reorder, and duplicate packets.  To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! [`link`] returns two connected [`SimSocket`] endpoints that implement
//! [`Datagram`] over in-memory queues and apply a configurable fault model
//! to every datagram sent:
//!
//! | Fault            | Description                                      |
//! |------------------|--------------------------------------------------|
//! | Packet loss      | Drop a packet with probability `loss_rate`.      |
//! | Reordering       | Let a packet overtake the one queued before it   |
//! |                  | with probability `reorder_rate`.                 |
//! | Duplication      | Deliver a packet twice.                          |
//!
//! Faults are drawn from a seeded [`StdRng`], so a failing test replays
//! identically.  Both endpoints share one fabric and are meant to be driven
//! from a single thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::packet::Packet;
use crate::socket::Datagram;

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given packet is silently dropped.
    pub loss_rate: f64,
    /// Probability that a packet is reordered.
    pub reorder_rate: f64,
    /// Probability that a packet is duplicated.
    pub duplicate_rate: f64,
    /// Seed for the fault RNG.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default, simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            reorder_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
        }
    }
}

#[derive(Debug)]
struct Fabric {
    config: SimulatorConfig,
    rng: StdRng,
    /// `queues[i]` holds datagrams waiting to be received by endpoint `i`.
    queues: [VecDeque<Vec<u8>>; 2],
    /// `sent[i]` records every datagram endpoint `i` handed to the network,
    /// before faults were applied.
    sent: [Vec<Vec<u8>>; 2],
    /// Endpoint `i` fails every send / receive with an I/O error.
    fail_sends: [bool; 2],
    fail_recvs: [bool; 2],
}

impl Fabric {
    fn deliver(&mut self, to: usize, datagram: &[u8]) {
        if self.rng.random_bool(self.config.loss_rate) {
            return;
        }
        let copies = if self.rng.random_bool(self.config.duplicate_rate) { 2 } else { 1 };
        for _ in 0..copies {
            let queue = &mut self.queues[to];
            if !queue.is_empty() && self.rng.random_bool(self.config.reorder_rate) {
                let at = queue.len() - 1;
                queue.insert(at, datagram.to_vec());
            } else {
                queue.push_back(datagram.to_vec());
            }
        }
    }
}

/// One end of a simulated link.
#[derive(Debug, Clone)]
pub struct SimSocket {
    id: usize,
    fabric: Rc<RefCell<Fabric>>,
}

/// Create a pair of connected endpoints sharing one fault model.
pub fn link(config: SimulatorConfig) -> (SimSocket, SimSocket) {
    let fabric = Rc::new(RefCell::new(Fabric {
        rng: StdRng::seed_from_u64(config.seed),
        config,
        queues: [VecDeque::new(), VecDeque::new()],
        sent: [Vec::new(), Vec::new()],
        fail_sends: [false; 2],
        fail_recvs: [false; 2],
    }));
    (
        SimSocket {
            id: 0,
            fabric: Rc::clone(&fabric),
        },
        SimSocket { id: 1, fabric },
    )
}

impl SimSocket {
    fn peer_id(&self) -> usize {
        1 - self.id
    }

    /// Change the loss rate for both directions.
    pub fn set_loss_rate(&self, loss_rate: f64) {
        self.fabric.borrow_mut().config.loss_rate = loss_rate;
    }

    /// Datagrams waiting for this endpoint to receive.
    pub fn pending(&self) -> usize {
        self.fabric.borrow().queues[self.id].len()
    }

    /// Throw away everything queued for this endpoint.
    pub fn drop_pending(&self) -> usize {
        let mut fabric = self.fabric.borrow_mut();
        let n = fabric.queues[self.id].len();
        fabric.queues[self.id].clear();
        n
    }

    /// Every packet this endpoint has sent so far, decoded, oldest first.
    pub fn sent_packets(&self) -> Vec<Packet> {
        self.fabric.borrow().sent[self.id]
            .iter()
            .filter_map(|d| Packet::decode(d).ok())
            .collect()
    }

    /// Make this endpoint's sends fail with an I/O error.  Failed sends
    /// reach neither the peer nor the history.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fabric.borrow_mut().fail_sends[self.id] = fail;
    }

    /// Make this endpoint's receives fail; queued datagrams stay queued.
    pub fn set_fail_recvs(&self, fail: bool) {
        self.fabric.borrow_mut().fail_recvs[self.id] = fail;
    }

    /// Forget the send history.
    pub fn clear_sent(&self) {
        self.fabric.borrow_mut().sent[self.id].clear();
    }
}

impl Datagram for SimSocket {
    fn try_send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        let mut fabric = self.fabric.borrow_mut();
        if fabric.fail_sends[self.id] {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated send failure"));
        }
        fabric.sent[self.id].push(datagram.to_vec());
        fabric.deliver(self.peer_id(), datagram);
        Ok(datagram.len())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let mut fabric = self.fabric.borrow_mut();
        if fabric.fail_recvs[self.id] {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated receive failure"));
        }
        match fabric.queues[self.id].pop_front() {
            Some(datagram) => {
                // Oversized datagrams are truncated like a real recv would.
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            None => Ok(None),
        }
    }
}
