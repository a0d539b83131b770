//! Application-side byte source and sink.
//!
//! The transport pulls outbound bytes from, and pushes delivered bytes to,
//! an [`Application`].  Both calls happen inside the event loop, so neither
//! may block.
//!
//! Two implementations ship with the crate:
//! - [`ChannelApp`] bridges to `tokio::sync::mpsc` channels; the binary
//!   pumps stdin into one and drains the other to stdout.
//! - [`MemoryApp`] keeps everything in memory for tests.

use std::collections::VecDeque;

use tokio::sync::mpsc;

pub trait Application {
    /// Copy up to `buf.len()` bytes of pending input into `buf`.
    ///
    /// Returns `0` when nothing is available right now.
    fn try_read(&mut self, buf: &mut [u8]) -> usize;

    /// Accept bytes delivered in order by the peer.
    fn write(&mut self, data: &[u8]);
}

// ---------------------------------------------------------------------------
// ChannelApp
// ---------------------------------------------------------------------------

/// An [`Application`] backed by async channels.
///
/// Chunks arriving on `input` may be larger than one read; the remainder is
/// kept in `pending` for the next call.
pub struct ChannelApp {
    input: mpsc::Receiver<Vec<u8>>,
    output: mpsc::UnboundedSender<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl ChannelApp {
    pub fn new(input: mpsc::Receiver<Vec<u8>>, output: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            input,
            output,
            pending: VecDeque::new(),
        }
    }
}

impl Application for ChannelApp {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        if self.pending.is_empty() {
            // Empty and Disconnected both mean "nothing right now".
            if let Ok(chunk) = self.input.try_recv() {
                self.pending.extend(chunk);
            }
        }
        drain_into(&mut self.pending, buf)
    }

    fn write(&mut self, data: &[u8]) {
        if self.output.send(data.to_vec()).is_err() {
            log::warn!("[app] output closed; dropping {} bytes", data.len());
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryApp
// ---------------------------------------------------------------------------

/// In-memory [`Application`] for tests and simulations.
#[derive(Debug, Default)]
pub struct MemoryApp {
    /// Bytes waiting to be sent.
    pub input: VecDeque<u8>,
    /// Bytes delivered by the peer, in order.
    pub output: Vec<u8>,
    /// Optional cap on bytes handed out per [`Application::try_read`] call.
    pub read_limit: Option<usize>,
}

impl MemoryApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// An application with `data` queued for sending.
    pub fn with_input(data: &[u8]) -> Self {
        Self {
            input: data.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Queue more bytes for sending.
    pub fn push_input(&mut self, data: &[u8]) {
        self.input.extend(data.iter().copied());
    }
}

impl Application for MemoryApp {
    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        let limit = self.read_limit.unwrap_or(buf.len()).min(buf.len());
        drain_into(&mut self.input, &mut buf[..limit])
    }

    fn write(&mut self, data: &[u8]) {
        self.output.extend_from_slice(data);
    }
}

fn drain_into(src: &mut VecDeque<u8>, buf: &mut [u8]) -> usize {
    let n = buf.len().min(src.len());
    for (dst, byte) in buf[..n].iter_mut().zip(src.drain(..n)) {
        *dst = byte;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_app_reads_in_chunks() {
        let mut app = MemoryApp::with_input(b"hello world");
        let mut buf = [0u8; 5];
        assert_eq!(app.try_read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(app.input.len(), 6);
    }

    #[test]
    fn memory_app_respects_read_limit() {
        let mut app = MemoryApp::with_input(b"abcdef");
        app.read_limit = Some(2);
        let mut buf = [0u8; 16];
        assert_eq!(app.try_read(&mut buf), 2);
        assert_eq!(&buf[..2], b"ab");
    }

    #[test]
    fn memory_app_empty_reads_zero() {
        let mut app = MemoryApp::new();
        assert_eq!(app.try_read(&mut [0u8; 8]), 0);
    }

    #[test]
    fn channel_app_splits_large_chunks() {
        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut app = ChannelApp::new(in_rx, out_tx);

        in_tx.try_send(b"abcdefgh".to_vec()).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(app.try_read(&mut buf), 5);
        assert_eq!(&buf, b"abcde");
        assert_eq!(app.try_read(&mut buf), 3);
        assert_eq!(&buf[..3], b"fgh");
        assert_eq!(app.try_read(&mut buf), 0);

        app.write(b"delivered");
        assert_eq!(out_rx.try_recv().unwrap(), b"delivered");
    }

    #[test]
    fn channel_app_survives_closed_input() {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let mut app = ChannelApp::new(in_rx, out_tx);
        drop(in_tx);
        assert_eq!(app.try_read(&mut [0u8; 4]), 0);
    }
}
