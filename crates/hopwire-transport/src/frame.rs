//! Channel-tagged frames as they travel over a byte-message socket.
//!
//! ```text
//! byte[0..2]  channel id (u16, big-endian)
//! byte[2]     delivery tag
//! byte[3..]   data
//! ```
//!
//! The socket's own message boundary delimits the frame, so no length
//! prefix is needed.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{ChannelId, Delivery, TransportError};

/// One channel-tagged buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this buffer was opened on.
    pub channel: ChannelId,
    /// The delivery mode it was sent with.
    pub delivery: Delivery,
    /// The buffer contents.
    pub data: Bytes,
}

impl Frame {
    /// Size of the channel + delivery prefix.
    pub const PREFIX_LEN: usize = 3;

    /// Serializes the frame into one socket message.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::PREFIX_LEN + self.data.len());
        buf.put_u16(self.channel.0);
        buf.put_u8(self.delivery.as_u8());
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Parses one socket message.
    pub fn decode(mut raw: Bytes) -> Result<Self, TransportError> {
        if raw.len() < Self::PREFIX_LEN {
            return Err(TransportError::MalformedFrame(format!(
                "frame is {} bytes, need at least {}",
                raw.len(),
                Self::PREFIX_LEN
            )));
        }
        let channel = ChannelId(raw.get_u16());
        let tag = raw.get_u8();
        let delivery = Delivery::from_u8(tag).ok_or_else(|| {
            TransportError::MalformedFrame(format!("unknown delivery tag {tag}"))
        })?;
        Ok(Self {
            channel,
            delivery,
            data: raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = Frame {
            channel: ChannelId(0x0800),
            delivery: Delivery::Unreliable,
            data: Bytes::from_static(b"hi"),
        };
        assert_eq!(frame.encode().as_ref(), &[0x08, 0x00, 2, b'h', b'i']);
    }

    #[test]
    fn test_frame_decode_inverts_encode() {
        let frame = Frame {
            channel: ChannelId(6144),
            delivery: Delivery::ReliableOrdered,
            data: Bytes::from_static(&[1, 2, 3, 4, 5]),
        };
        assert_eq!(Frame::decode(frame.encode()).unwrap(), frame);
    }

    #[test]
    fn test_frame_with_empty_data() {
        let decoded = Frame::decode(Bytes::from_static(&[0, 1, 0])).unwrap();
        assert_eq!(decoded.channel, ChannelId(1));
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn test_frame_too_short_is_rejected() {
        let err = Frame::decode(Bytes::from_static(&[0, 1])).unwrap_err();
        assert!(matches!(err, TransportError::MalformedFrame(_)));
    }

    #[test]
    fn test_frame_unknown_delivery_is_rejected() {
        let err = Frame::decode(Bytes::from_static(&[0, 1, 7])).unwrap_err();
        assert!(err.to_string().contains("delivery tag 7"));
    }
}
