//! Error types for the dispatch layer.

use hopwire_protocol::{ConnectionId, ProtocolError};
use hopwire_transport::TransportError;

/// Errors returned by `send_*` calls and by inbound dispatch.
///
/// Routing misuse (`NotServer`, `UnknownConnection`) is reported to the
/// caller synchronously and never downgraded to a silent no-op.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A connection-targeted send was attempted while not acting as server.
    #[error("connection-targeted sends require acting as server")]
    NotServer,

    /// A client-side send found no server connection to send to.
    #[error("not connected to a server")]
    NotConnected,

    /// The target connection is not known to the transport.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The dispatch configuration is unusable.
    #[error("invalid dispatch config: {0}")]
    InvalidConfig(String),

    /// An envelope could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport refused a buffer.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
