//! Non-blocking datagram socket abstraction.
//!
//! [`Datagram`] is the seam between the protocol and the network: the
//! event loop only ever calls its two non-blocking methods.  [`Socket`] is
//! the production implementation, a thin wrapper around
//! `tokio::net::UdpSocket` bound to a single peer.  The in-memory
//! [`crate::simulator`] provides the test implementation.
//!
//! All protocol logic lives elsewhere; this module owns only byte I/O.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::PacketError;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
    /// A packet could not be encoded or a datagram could not be decoded.
    #[error("packet codec error: {0}")]
    Packet(#[from] PacketError),
}

// ---------------------------------------------------------------------------
// Datagram trait
// ---------------------------------------------------------------------------

/// A connected, non-blocking datagram channel.
pub trait Datagram {
    /// Send one datagram to the peer without waiting.
    fn try_send(&mut self, datagram: &[u8]) -> io::Result<usize>;

    /// Receive one datagram into `buf` if one is ready.
    ///
    /// Returns `Ok(None)` immediately when nothing is pending.
    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// The datagram just received opened a connection: talk only to its
    /// sender from now on.
    fn adopt_peer(&mut self) {}
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// A tokio UDP socket talking to exactly one peer.
///
/// A client knows its peer up front.  A server starts without one and
/// accepts datagrams from anyone until [`Datagram::adopt_peer`] pins the
/// sender of the SYN it accepted; datagrams from any other address are
/// discarded afterwards.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    peer: Option<SocketAddr>,
    /// Source of the last datagram received while no peer is pinned.
    last_from: Option<SocketAddr>,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr` with no peer yet (server side).
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        // Prime write readiness so the very first `try_send` does not spuriously
        // report WouldBlock.
        inner.writable().await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            peer: None,
            last_from: None,
            inner,
        })
    }

    /// Bind to `local_addr` and fix the peer to `peer` (client side).
    pub async fn connect(local_addr: SocketAddr, peer: SocketAddr) -> Result<Self, SocketError> {
        let mut socket = Self::bind(local_addr).await?;
        socket.peer = Some(peer);
        Ok(socket)
    }

    /// The peer this socket talks to, once known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl Datagram for Socket {
    fn try_send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        match self.peer {
            Some(peer) => self.inner.try_send_to(datagram, peer),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no peer address learned yet",
            )),
        }
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.inner.try_recv_from(buf) {
            Ok((n, from)) => match self.peer {
                Some(peer) if peer != from => {
                    log::debug!("[socket] dropping datagram from stranger {from}");
                    Ok(None)
                }
                Some(_) => Ok(Some(n)),
                None => {
                    self.last_from = Some(from);
                    Ok(Some(n))
                }
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn adopt_peer(&mut self) {
        if self.peer.is_some() {
            return;
        }
        if let Some(from) = self.last_from.take() {
            log::info!("[socket] peer is {from}");
            self.peer = Some(from);
        }
    }
}
