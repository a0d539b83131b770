//! Integration tests for the 3-way handshake.
//!
//! Each test wires a client and a server [`EventLoop`] together through the
//! in-memory simulator and drives both with a synthetic clock, so every run
//! is deterministic.

use std::time::{Duration, Instant};

use udp_stream::app::MemoryApp;
use udp_stream::packet::{flags, Packet};
use udp_stream::simulator::{link, SimSocket, SimulatorConfig};
use udp_stream::{Config, ConnectionState, EventLoop, Role};

type Endpoint = EventLoop<SimSocket, MemoryApp>;

const STEP: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn endpoints(sim: SimulatorConfig, t0: Instant) -> (Endpoint, Endpoint) {
    let (a, b) = link(sim);
    let client = EventLoop::with_isn(Role::Client, 100, a, MemoryApp::new(), Config::default(), t0);
    let server = EventLoop::with_isn(Role::Server, 9000, b, MemoryApp::new(), Config::default(), t0);
    (client, server)
}

/// Tick both sides until both are established; returns the ticks taken.
fn handshake(client: &mut Endpoint, server: &mut Endpoint, t0: Instant, max_ticks: u32) -> u32 {
    let mut now = t0;
    for n in 1..=max_ticks {
        client.tick(now);
        server.tick(now);
        if client.conn.is_established() && server.conn.is_established() {
            return n;
        }
        now += STEP;
    }
    panic!(
        "handshake incomplete after {max_ticks} ticks: client={} server={}",
        client.conn.state, server.conn.state
    );
}

fn count(packets: &[Packet], wanted_flags: u8) -> usize {
    packets
        .iter()
        .filter(|p| p.header.flags == wanted_flags && p.payload.is_empty())
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Both sides should reach `Established` after a clean handshake.
#[test]
fn handshake_both_sides_reach_established() {
    let t0 = Instant::now();
    let (mut client, mut server) = endpoints(SimulatorConfig::default(), t0);

    let ticks = handshake(&mut client, &mut server, t0, 10);
    assert!(ticks <= 3, "clean handshake took {ticks} ticks");
    assert_eq!(client.conn.state, ConnectionState::Established);
    assert_eq!(server.conn.state, ConnectionState::Established);
}

/// After the handshake each side's next sequence number must be exactly what
/// the other side expects.
#[test]
fn handshake_sequence_numbers_agree() {
    let t0 = Instant::now();
    let (mut client, mut server) = endpoints(SimulatorConfig::default(), t0);
    handshake(&mut client, &mut server, t0, 10);

    assert_eq!(client.conn.seq, server.conn.ack, "client seq vs server ack");
    assert_eq!(server.conn.seq, client.conn.ack, "server seq vs client ack");
    // The SYN consumed one sequence number on each side.
    assert_eq!(client.conn.seq, 101);
    assert_eq!(server.conn.seq, 9001);
}

/// Polling without a reply must never emit a second SYN before the RTO.
#[test]
fn client_sends_one_syn_while_unanswered() {
    let t0 = Instant::now();
    let (mut client, server) = endpoints(SimulatorConfig::default(), t0);

    for _ in 0..200 {
        client.tick(t0);
    }
    assert_eq!(count(&client.socket.sent_packets(), flags::SYN), 1);
    assert_eq!(server.socket.pending(), 1);
}

/// The server emits one SYN-ACK no matter how often it is polled.
#[test]
fn server_sends_one_syn_ack_while_unanswered() {
    let t0 = Instant::now();
    let (mut client, mut server) = endpoints(SimulatorConfig::default(), t0);

    client.tick(t0); // SYN
    for _ in 0..200 {
        server.tick(t0);
    }
    assert_eq!(server.conn.state, ConnectionState::ServerSendSynAck);
    assert_eq!(count(&server.socket.sent_packets(), flags::SYN | flags::ACK), 1);
}

/// The client emits one final ACK and then stays quiet.
#[test]
fn client_sends_one_final_ack() {
    let t0 = Instant::now();
    let (mut client, mut server) = endpoints(SimulatorConfig::default(), t0);

    client.tick(t0);
    server.tick(t0);
    for _ in 0..200 {
        client.tick(t0);
    }
    assert!(client.conn.is_established());
    assert_eq!(count(&client.socket.sent_packets(), flags::ACK), 1);
}

/// When the SYN-ACK is lost both handshake packets go out again on timeout
/// and the connection still comes up.
#[test]
fn lost_syn_ack_recovers_through_timeout() {
    let t0 = Instant::now();
    let (mut client, mut server) = endpoints(SimulatorConfig::default(), t0);
    let rto = client.config().rto;

    client.tick(t0);
    server.tick(t0);
    assert_eq!(client.socket.drop_pending(), 1, "SYN-ACK should be queued");

    let ticks = handshake(&mut client, &mut server, t0 + STEP, 500);
    assert!(STEP * ticks >= rto, "recovered before any timeout could fire");
    assert!(count(&server.socket.sent_packets(), flags::SYN | flags::ACK) >= 2);
    assert_eq!(client.conn.seq, server.conn.ack);
    assert_eq!(server.conn.seq, client.conn.ack);
}

/// A lost final ACK is repaired: the server's SYN-ACK retransmission makes
/// the established client acknowledge again.
#[test]
fn lost_final_ack_recovers_through_syn_ack_retransmit() {
    let t0 = Instant::now();
    let (mut client, mut server) = endpoints(SimulatorConfig::default(), t0);
    let rto = server.config().rto;

    client.tick(t0); // SYN
    server.tick(t0); // SYN-ACK
    client.tick(t0); // final ACK
    assert!(client.conn.is_established());
    assert_eq!(server.socket.drop_pending(), 1, "final ACK should be queued");

    // Nothing happens before the server's RTO.
    server.tick(t0 + rto / 2);
    assert_eq!(server.conn.state, ConnectionState::ServerSendSynAck);

    server.tick(t0 + rto); // SYN-ACK retransmitted
    client.tick(t0 + rto); // re-ACK
    server.tick(t0 + rto); // established
    assert!(server.conn.is_established());
    assert_eq!(server.conn.seq, client.conn.ack);
}

/// A lossy, duplicating, reordering link still yields a consistent handshake.
#[test]
fn handshake_over_faulty_link() {
    for seed in 0..20 {
        let t0 = Instant::now();
        let sim = SimulatorConfig {
            loss_rate: 0.3,
            reorder_rate: 0.2,
            duplicate_rate: 0.2,
            seed,
        };
        let (mut client, mut server) = endpoints(sim, t0);
        handshake(&mut client, &mut server, t0, 20_000);
        assert_eq!(client.conn.seq, server.conn.ack, "seed {seed}");
        assert_eq!(server.conn.seq, client.conn.ack, "seed {seed}");
    }
}
