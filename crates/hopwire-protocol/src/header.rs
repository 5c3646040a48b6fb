//! The fixed 5-byte envelope header.
//!
//! ```text
//! ┌──────────────────────────┬──────────────┬─────────────────────┐
//! │ type code (i32, LE)      │ destination  │ body (kind-specific)│
//! │ byte 0..4                │ byte 4       │ byte 5..            │
//! └──────────────────────────┴──────────────┴─────────────────────┘
//! ```
//!
//! There is no version field. The transport's channel tag guarantees
//! that only envelopes reach the decoder, so the header codec never has
//! to guess what it is looking at.

use bytes::{Buf, BufMut};

use crate::{Destination, ProtocolError, TypeCode};

/// Identifies the payload type and the roles it is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub type_code: TypeCode,
    pub destination: Destination,
}

impl Header {
    /// Encoded size in bytes.
    pub const SIZE: usize = 5;

    /// Creates a header.
    pub fn new(type_code: TypeCode, destination: Destination) -> Self {
        Self {
            type_code,
            destination,
        }
    }

    /// Writes the header: type code, then the destination byte.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.type_code.0);
        buf.put_u8(self.destination.bits());
    }

    /// Reads a header, advancing `buf` past it.
    ///
    /// # Errors
    /// - [`ProtocolError::Truncated`] if fewer than 5 bytes remain
    /// - [`ProtocolError::InvalidDestination`] if bits 2-7 of the
    ///   destination byte are set
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        if buf.remaining() < Self::SIZE {
            return Err(ProtocolError::Truncated {
                needed: Self::SIZE,
                available: buf.remaining(),
            });
        }
        let type_code = TypeCode(buf.get_i32_le());
        let bits = buf.get_u8();
        let destination =
            Destination::from_bits(bits).ok_or(ProtocolError::InvalidDestination(bits))?;
        Ok(Self {
            type_code,
            destination,
        })
    }
}
