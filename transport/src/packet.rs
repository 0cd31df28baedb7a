//! # Framed Packets
//!
//! The unit exchanged in both directions is a length-prefixed buffer.
//!
//! ## Wire Format
//!
//! ```text
//! ┌────────┬───────────────────────────────┐
//! │ Length │            Payload            │
//! │ 1 byte │  0..=MAX_PACKET_LEN bytes     │
//! └────────┴───────────────────────────────┘
//! ```
//!
//! A length of zero is the idle marker: "nothing to send". The status byte
//! never travels from host to device; it is filled from the first byte the
//! device clocks back and cleared whenever the packet enters a queue.

use core::fmt;

use crate::error::{Result, TransportError};
use crate::{MAX_PACKET_LEN, PACKET_BUFFER_LEN};

/// One command or event
///
/// Bytes past `len()` are unspecified and ignored by equality.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    pub(crate) status: u8,
    /// `buffer[0]` is the length byte, payload follows
    pub(crate) buffer: [u8; PACKET_BUFFER_LEN],
}

impl Packet {
    /// The idle packet (length 0)
    pub const EMPTY: Self = Self {
        status: 0,
        buffer: [0; PACKET_BUFFER_LEN],
    };

    /// Create the idle packet
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Create a packet carrying `payload`
    pub fn new(payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PACKET_LEN {
            return Err(TransportError::PacketTooLong { len: payload.len() });
        }

        let mut packet = Self::EMPTY;
        packet.buffer[0] = payload.len() as u8;
        packet.buffer[1..=payload.len()].copy_from_slice(payload);
        Ok(packet)
    }

    /// Parse a wire frame (length byte followed by payload)
    ///
    /// Trailing bytes past the declared length are ignored.
    pub fn from_frame(frame: &[u8]) -> Result<Self> {
        let (&len, rest) = frame.split_first().ok_or(TransportError::Truncated)?;
        let len = len as usize;
        if len > MAX_PACKET_LEN {
            return Err(TransportError::PacketTooLong { len });
        }

        let payload = rest.get(..len).ok_or(TransportError::Truncated)?;
        Self::new(payload)
    }

    /// Number of payload bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer[0] as usize
    }

    /// True for the idle marker
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer[0] == 0
    }

    /// Transport bookkeeping byte
    #[inline]
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Meaningful payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.buffer[1..=self.len()]
    }

    /// Length byte plus payload, as sent on the wire
    pub fn as_frame(&self) -> &[u8] {
        &self.buffer[..=self.len()]
    }

    /// Byte at wire position `index`, or 0 past the declared length
    pub(crate) fn wire_byte(&self, index: usize) -> u8 {
        if index <= self.len() {
            self.buffer[index]
        } else {
            0
        }
    }

    /// Human-readable frame dump for the diagnostic log
    pub fn dump(&self) -> FrameDump<'_> {
        FrameDump(self)
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.as_frame() == other.as_frame()
    }
}

impl Eq for Packet {}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("status", &self.status)
            .field("payload", &self.payload())
            .finish()
    }
}

/// `"<len> :<b0>, <b1>, ..."` with every wire byte in hex, length included
pub struct FrameDump<'a>(&'a Packet);

impl fmt::Display for FrameDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :", self.0.len())?;
        for byte in self.0.as_frame() {
            write!(f, "{:X}, ", byte)?;
        }
        Ok(())
    }
}
