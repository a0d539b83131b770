//! `udp-stream` is a TCP-like reliable byte stream implemented over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌─────────────┐ try_read / write ┌──────────────────────────────┐
//!  │ Application │◀────────────────▶│          EventLoop           │
//!  └─────────────┘                  │  tick(): recv → poll → ACK   │
//!                                   │          → retransmit check  │
//!                                   └──────┬────────────────┬──────┘
//!                                          │                │
//!                                ┌─────────▼─────────┐      │ raw datagrams
//!                                │    Connection     │      │
//!                                │ FSM + SendBuffer  │ ┌────▼──────────┐
//!                                │ + FlowControl     │ │   Datagram    │
//!                                │ + RetransmitTimer │ │ (Socket/Sim)  │
//!                                └───────────────────┘ └───────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]: wire format (serialise / deserialise)
//! - [`seq`]: wrap-around sequence-number comparison
//! - [`state`]: finite-state-machine types
//! - [`connection`]: handshake, data and ACK processing for one connection
//! - [`send_buffer`]: in-flight packets awaiting cumulative ACK
//! - [`window`]: advertised-window flow control
//! - [`timer`]: retransmission timer
//! - [`event_loop`]: the single non-blocking polling loop
//! - [`config`]: tunable parameters
//! - [`app`]: application byte source / sink
//! - [`socket`]: non-blocking datagram trait and tokio UDP socket
//! - [`simulator`]: in-memory lossy/reordering link for testing

pub mod app;
pub mod config;
pub mod connection;
pub mod event_loop;
pub mod packet;
pub mod send_buffer;
pub mod seq;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;
pub mod window;

pub use config::Config;
pub use connection::Connection;
pub use event_loop::{EventLoop, Retransmit, Sent, Tick};
pub use state::{ConnectionState, Role};
