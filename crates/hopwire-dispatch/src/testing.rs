//! An in-memory [`Transport`] that records every buffer it is handed.
//!
//! Used by this crate's tests and, through the `testing` feature, by
//! other crates that want to assert on what a dispatcher sent without
//! opening sockets.

use std::cell::RefCell;
use std::collections::HashSet;

use bytes::Bytes;
use hopwire_protocol::{ChannelId, ConnectionId, Delivery, Header, Role};
use hopwire_transport::{Transport, TransportError};

/// One buffer handed to [`RecordingTransport::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEnvelope {
    pub connection: ConnectionId,
    pub channel: ChannelId,
    pub delivery: Delivery,
    pub data: Bytes,
}

impl SentEnvelope {
    /// Decodes the envelope header.
    ///
    /// # Panics
    /// If the buffer does not start with a valid header.
    pub fn header(&self) -> Header {
        let mut data = self.data.clone();
        Header::decode(&mut data).expect("sent envelope should start with a header")
    }

    /// The bytes after the header.
    pub fn body(&self) -> Bytes {
        self.data.slice(Header::SIZE.min(self.data.len())..)
    }
}

/// A transport with a fixed role and connection set that records sends.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    role: Role,
    connections: Vec<ConnectionId>,
    server: Option<ConnectionId>,
    loopbacks: HashSet<ConnectionId>,
    failing: HashSet<ConnectionId>,
    sent: RefCell<Vec<SentEnvelope>>,
}

impl RecordingTransport {
    /// A dedicated server with the given client connections.
    pub fn server(connections: impl IntoIterator<Item = ConnectionId>) -> Self {
        Self {
            role: Role::SERVER,
            connections: connections.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A remote client whose only connection leads to the server.
    pub fn client(server: ConnectionId) -> Self {
        Self {
            role: Role::CLIENT,
            connections: vec![server],
            server: Some(server),
            ..Self::default()
        }
    }

    /// A listen server: client connections plus a loopback to itself.
    pub fn host(
        loopback: ConnectionId,
        connections: impl IntoIterator<Item = ConnectionId>,
    ) -> Self {
        let mut all = vec![loopback];
        all.extend(connections);
        Self {
            role: Role::HOST,
            connections: all,
            ..Self::default()
        }
        .with_loopback(loopback)
    }

    /// Not networked at all.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Overrides the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Marks `connection` as a loopback of this process.
    pub fn with_loopback(mut self, connection: ConnectionId) -> Self {
        self.loopbacks.insert(connection);
        self
    }

    /// Makes every send to `connection` fail.
    pub fn failing(mut self, connection: ConnectionId) -> Self {
        self.failing.insert(connection);
        self
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<SentEnvelope> {
        self.sent.borrow().clone()
    }

    /// Everything sent so far, clearing the record.
    pub fn take_sent(&self) -> Vec<SentEnvelope> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    /// Number of buffers sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Transport for RecordingTransport {
    fn role(&self) -> Role {
        self.role
    }

    fn connections(&self) -> Vec<ConnectionId> {
        self.connections.clone()
    }

    fn server_connection(&self) -> Option<ConnectionId> {
        self.server
    }

    fn is_loopback(&self, connection: ConnectionId) -> bool {
        self.loopbacks.contains(&connection)
    }

    fn send(
        &self,
        connection: ConnectionId,
        channel: ChannelId,
        delivery: Delivery,
        data: Bytes,
    ) -> Result<(), TransportError> {
        if self.failing.contains(&connection) {
            return Err(TransportError::ConnectionClosed(format!(
                "{connection} refuses sends"
            )));
        }
        if !self.connections.contains(&connection) {
            return Err(TransportError::UnknownConnection(connection));
        }
        self.sent.borrow_mut().push(SentEnvelope {
            connection,
            channel,
            delivery,
            data,
        });
        Ok(())
    }
}
