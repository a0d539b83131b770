//! Segment codec.
//!
//! A [`Packet`] is one UDP datagram: a fixed 15-byte [`Header`] followed by
//! up to [`MAX_PAYLOAD`] bytes of stream data.  [`Packet::encode`] and
//! [`Packet::decode`] are pure functions over byte slices; sockets live in
//! [`crate::socket`].
//!
//! Layout (big-endian):
//!
//! ```text
//! offset  size  field
//!      0     4  seq          first payload byte, or the ISN on a SYN
//!      4     4  ack          next byte expected from the peer
//!      8     1  flags        SYN = 0x01, ACK = 0x02
//!      9     2  window       sender's receive window in bytes
//!     11     2  payload_len  bytes of payload that follow
//!     13     2  reserved     zero on send, ignored on receive
//!     15     -  payload
//! ```
//!
//! A datagram may be longer than `HEADER_LEN + payload_len` (some peers pad
//! every datagram to the maximum size); the trailing bytes are ignored.

use thiserror::Error;

/// Header flag bits.
pub mod flags {
    /// Opens a connection; `seq` carries the initial sequence number.
    pub const SYN: u8 = 0x01;
    /// `ack` is meaningful.
    pub const ACK: u8 = 0x02;
}

pub const HEADER_LEN: usize = 15;

/// Largest payload a single packet may carry.
pub const MAX_PAYLOAD: usize = 1012;

/// Largest datagram this protocol ever produces or needs to read.
pub const MAX_DATAGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_WINDOW: usize = 9;
const OFF_PAYLOAD_LEN: usize = 11;
const OFF_RESERVED: usize = 13;

/// Decoded header, host byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
    pub window: u16,
    /// Recomputed from the payload on encode.
    pub payload_len: u16,
    pub reserved: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a control packet (handshake or pure ACK) with no payload.
    pub fn control(seq: u32, ack: u32, flags: u8, window: u16) -> Self {
        Self {
            header: Header {
                seq,
                ack,
                flags,
                window,
                payload_len: 0,
                reserved: 0,
            },
            payload: Vec::new(),
        }
    }

    /// Build a data segment.  Data segments always carry a valid ACK.
    pub fn data(seq: u32, ack: u32, window: u16, payload: Vec<u8>) -> Self {
        Self {
            header: Header {
                seq,
                ack,
                flags: flags::ACK,
                window,
                payload_len: payload.len() as u16,
                reserved: 0,
            },
            payload,
        }
    }

    /// `true` when every bit in `mask` is set.
    pub fn has_flags(&self, mask: u8) -> bool {
        self.header.flags & mask == mask
    }

    /// Sequence number immediately after this segment's payload.
    pub fn seq_end(&self) -> u32 {
        self.header.seq.wrapping_add(self.payload.len() as u32)
    }

    /// Encode into a fresh buffer of exactly `HEADER_LEN + payload.len()` bytes.
    ///
    /// The stored `payload_len` and `reserved` values are not trusted.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let payload_len = self.payload.len();
        if payload_len > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(payload_len));
        }
        let mut buf = Vec::with_capacity(HEADER_LEN + payload_len);
        buf.extend_from_slice(&self.header.seq.to_be_bytes());
        buf.extend_from_slice(&self.header.ack.to_be_bytes());
        buf.push(self.header.flags);
        buf.extend_from_slice(&self.header.window.to_be_bytes());
        buf.extend_from_slice(&(payload_len as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
        debug_assert_eq!(buf.len(), HEADER_LEN);
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decode one datagram.
    ///
    /// Exactly `payload_len` payload bytes are read and anything after them
    /// is padding.  Fails when the header is incomplete, when `payload_len`
    /// exceeds [`MAX_PAYLOAD`] or when the datagram ends before the payload does.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::ShortHeader(buf.len()));
        }

        let seq = read_u32(buf, OFF_SEQ);
        let ack = read_u32(buf, OFF_ACK);
        let flags = buf[OFF_FLAGS];
        let window = read_u16(buf, OFF_WINDOW);
        let payload_len = read_u16(buf, OFF_PAYLOAD_LEN);
        let reserved = read_u16(buf, OFF_RESERVED);

        let len = payload_len as usize;
        if len > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(len));
        }
        if buf.len() < HEADER_LEN + len {
            return Err(PacketError::Truncated {
                declared: len,
                available: buf.len() - HEADER_LEN,
            });
        }

        Ok(Packet {
            header: Header {
                seq,
                ack,
                flags,
                window,
                payload_len,
                reserved,
            },
            payload: buf[HEADER_LEN..HEADER_LEN + len].to_vec(),
        })
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {0} bytes is shorter than the header")]
    ShortHeader(usize),
    #[error("payload of {0} bytes exceeds the maximum payload size")]
    PayloadTooLarge(usize),
    /// `payload_len` claims more bytes than the datagram holds.
    #[error("payload_len is {declared} but only {available} bytes follow the header")]
    Truncated { declared: usize, available: usize },
}
