//! Transport abstraction layer for hopwire.
//!
//! The messaging layer above this crate never touches sockets. It only
//! needs to know:
//!
//! - which connections exist ([`Transport::connections`]),
//! - which one leads to the server ([`Transport::server_connection`]),
//! - which ones are loopbacks of this very process ([`Transport::is_loopback`]),
//! - how to hand over a finished, channel-tagged buffer ([`Transport::send`]).
//!
//! That synchronous seam is the [`Transport`] trait. The async
//! [`Listener`] and [`Connection`] traits describe the socket side that a
//! runtime drives to feed it.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
mod frame;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use frame::Frame;
#[cfg(feature = "websocket")]
pub use websocket::{ClientConnection, WebSocketConnection, WebSocketTransport, connect};

use std::fmt;

use bytes::Bytes;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Numeric tag the transport uses to demultiplex inbound buffers before
/// any envelope decoding happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u16);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// The delivery guarantee requested for an outgoing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Delivery {
    /// Delivered in order, no loss. Like TCP.
    #[default]
    ReliableOrdered,

    /// Delivered (no loss), but may arrive out of order.
    ReliableUnordered,

    /// May be lost, may arrive out of order. Like UDP.
    Unreliable,
}

impl Delivery {
    /// Returns the one-byte tag used in frames.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::ReliableOrdered => 0,
            Self::ReliableUnordered => 1,
            Self::Unreliable => 2,
        }
    }

    /// Parses a frame tag. Returns `None` for unknown tags.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::ReliableOrdered),
            1 => Some(Self::ReliableUnordered),
            2 => Some(Self::Unreliable),
            _ => None,
        }
    }
}

/// The roles this process currently plays on the network.
///
/// A dedicated server is `server` only, a remote player is `client`
/// only, and a listen-server (host) is both at once: it runs the server
/// and a local client whose connection is a loopback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Role {
    /// The process is acting as the server.
    pub server: bool,
    /// The process is acting as a client.
    pub client: bool,
}

impl Role {
    /// Neither server nor client (not networked).
    pub const NONE: Role = Role { server: false, client: false };
    /// Dedicated server.
    pub const SERVER: Role = Role { server: true, client: false };
    /// Remote client.
    pub const CLIENT: Role = Role { server: false, client: true };
    /// Listen server: server plus a local client.
    pub const HOST: Role = Role { server: true, client: true };

    /// Returns `true` if acting as server.
    pub fn is_server(self) -> bool {
        self.server
    }

    /// Returns `true` if acting as client.
    pub fn is_client(self) -> bool {
        self.client
    }

    /// Returns `true` if the process plays any network role.
    pub fn is_active(self) -> bool {
        self.server || self.client
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.server, self.client) {
            (true, true) => write!(f, "host"),
            (true, false) => write!(f, "server"),
            (false, true) => write!(f, "client"),
            (false, false) => write!(f, "offline"),
        }
    }
}

/// The outbound side of the network as seen by the messaging layer.
///
/// Implementations are driven from a single thread: the dispatcher calls
/// these methods from inside its receive callback or from a `send_*`
/// call, never concurrently. `send` must not block; it queues the buffer
/// for the connection and returns.
pub trait Transport {
    /// The roles this process currently plays.
    fn role(&self) -> Role;

    /// All currently active connections.
    ///
    /// On a server this is every accepted connection (including loopback
    /// connections). On a pure client it is the single server connection.
    fn connections(&self) -> Vec<ConnectionId>;

    /// The connection leading to the server, when acting as client.
    fn server_connection(&self) -> Option<ConnectionId>;

    /// Returns `true` if `connection` is this process talking to itself
    /// (the local client of a listen server).
    fn is_loopback(&self, connection: ConnectionId) -> bool;

    /// Hands a finished buffer to the transport for delivery.
    fn send(
        &self,
        connection: ConnectionId,
        channel: ChannelId,
        delivery: Delivery,
        data: Bytes,
    ) -> Result<(), TransportError>;

    /// Returns `true` if `connection` is currently active.
    fn contains(&self, connection: ConnectionId) -> bool {
        self.connections().contains(&connection)
    }
}

/// Accepts new incoming connections.
pub trait Listener: Send + Sync + 'static {
    /// The connection type produced by this listener.
    type Connection: Connection;
    /// The error type for listener operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the listener, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that carries channel-tagged frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, frame: &Frame) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Frame>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_channel_id_display() {
        assert_eq!(ChannelId(2048).to_string(), "ch-2048");
    }

    #[test]
    fn test_delivery_default_is_reliable_ordered() {
        assert_eq!(Delivery::default(), Delivery::ReliableOrdered);
    }

    #[test]
    fn test_delivery_tags_are_inverse() {
        for delivery in [
            Delivery::ReliableOrdered,
            Delivery::ReliableUnordered,
            Delivery::Unreliable,
        ] {
            assert_eq!(Delivery::from_u8(delivery.as_u8()), Some(delivery));
        }
        assert_eq!(Delivery::from_u8(9), None);
    }

    #[test]
    fn test_role_constants() {
        assert!(!Role::NONE.is_active());
        assert!(Role::SERVER.is_server() && !Role::SERVER.is_client());
        assert!(Role::CLIENT.is_client() && !Role::CLIENT.is_server());
        assert!(Role::HOST.is_server() && Role::HOST.is_client());
        assert_eq!(Role::default(), Role::NONE);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::HOST.to_string(), "host");
        assert_eq!(Role::SERVER.to_string(), "server");
        assert_eq!(Role::CLIENT.to_string(), "client");
        assert_eq!(Role::NONE.to_string(), "offline");
    }
}
