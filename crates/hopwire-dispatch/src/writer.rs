//! Scoped channel writer: open a tagged buffer, always flush it.
//!
//! A [`ChannelWriter`] is the only way this crate produces outgoing
//! bytes. Opening one starts a buffer for one connection on one channel;
//! releasing it (explicitly with [`finish`](ChannelWriter::finish) or
//! implicitly on drop) hands the buffer to the transport. There is no
//! path that opens a buffer without attempting to send it, including an
//! early return from a failed body encode.

use bytes::{BufMut, BytesMut};
use hopwire_protocol::{ChannelId, Codec, ConnectionId, Delivery, Header, ProtocolError};
use hopwire_transport::{Transport, TransportError};
use serde::Serialize;

/// A buffer bound to one connection and channel, flushed on release.
pub struct ChannelWriter<'a, T: Transport + ?Sized> {
    transport: &'a T,
    connection: ConnectionId,
    channel: ChannelId,
    delivery: Delivery,
    buf: BytesMut,
    flushed: bool,
}

impl<'a, T: Transport + ?Sized> ChannelWriter<'a, T> {
    /// Opens a buffer for `connection` on `channel`.
    pub fn open(
        transport: &'a T,
        connection: ConnectionId,
        channel: ChannelId,
        delivery: Delivery,
    ) -> Self {
        Self {
            transport,
            connection,
            channel,
            delivery,
            buf: BytesMut::with_capacity(64),
            flushed: false,
        }
    }

    /// Appends an envelope header.
    pub fn header(&mut self, header: &Header) -> &mut Self {
        header.encode(&mut self.buf);
        self
    }

    /// Appends a codec-encoded body.
    ///
    /// # Errors
    /// Returns the codec's error. The buffer is still flushed when the
    /// writer is released.
    pub fn body<C: Codec, V: Serialize>(
        &mut self,
        codec: &C,
        value: &V,
    ) -> Result<&mut Self, ProtocolError> {
        let bytes = codec.encode(value)?;
        self.buf.put_slice(&bytes);
        Ok(self)
    }

    /// Appends bytes verbatim (used when relaying a body untouched).
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Hands the buffer to the transport and reports the outcome.
    pub fn finish(mut self) -> Result<(), TransportError> {
        self.flush()
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.flushed = true;
        let data = std::mem::take(&mut self.buf).freeze();
        self.transport
            .send(self.connection, self.channel, self.delivery, data)
    }
}

impl<T: Transport + ?Sized> Drop for ChannelWriter<'_, T> {
    fn drop(&mut self) {
        if self.flushed {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(
                connection = %self.connection,
                channel = %self.channel,
                error = %e,
                "failed to send buffer on writer release"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use hopwire_protocol::{Destination, JsonCodec, TypeCode};

    use super::*;
    use crate::testing::RecordingTransport;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_finish_sends_exactly_once() {
        let transport = RecordingTransport::server([conn(1)]);
        let mut writer =
            ChannelWriter::open(&transport, conn(1), ChannelId(9), Delivery::Unreliable);
        writer.header(&Header::new(TypeCode(5), Destination::CLIENTS));
        writer.finish().unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].connection, conn(1));
        assert_eq!(sent[0].channel, ChannelId(9));
        assert_eq!(sent[0].delivery, Delivery::Unreliable);
        assert_eq!(sent[0].header().type_code, TypeCode(5));
    }

    #[test]
    fn test_drop_sends_unfinished_buffer() {
        let transport = RecordingTransport::server([conn(1)]);
        {
            let mut writer = ChannelWriter::open(
                &transport,
                conn(1),
                ChannelId(9),
                Delivery::ReliableOrdered,
            );
            writer.raw(b"abc");
        }
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.sent()[0].data.as_ref(), b"abc");
    }

    #[test]
    fn test_failed_body_still_flushes_header() {
        use std::collections::HashMap;

        // JSON refuses maps with non-string keys.
        let mut bad = HashMap::new();
        bad.insert((1, 2), 3);

        let transport = RecordingTransport::server([conn(1)]);
        let result = (|| -> Result<(), ProtocolError> {
            let mut writer = ChannelWriter::open(
                &transport,
                conn(1),
                ChannelId(9),
                Delivery::ReliableOrdered,
            );
            writer.header(&Header::new(TypeCode(1), Destination::SERVER));
            writer.body(&JsonCodec, &bad)?;
            Ok(())
        })();

        assert!(result.is_err());
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data.len(), Header::SIZE);
    }

    #[test]
    fn test_transport_failure_is_reported_by_finish() {
        let transport = RecordingTransport::server([conn(1)]).failing(conn(1));
        let writer =
            ChannelWriter::open(&transport, conn(1), ChannelId(9), Delivery::ReliableOrdered);
        assert!(writer.finish().is_err());
    }

    #[test]
    fn test_len_tracks_writes() {
        let transport = RecordingTransport::server([conn(1)]);
        let mut writer =
            ChannelWriter::open(&transport, conn(1), ChannelId(9), Delivery::ReliableOrdered);
        assert!(writer.is_empty());
        writer.header(&Header::new(TypeCode(1), Destination::ALL)).raw(&[0; 3]);
        assert_eq!(writer.len(), Header::SIZE + 3);
    }
}
