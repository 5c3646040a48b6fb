//! Unified error type for hopwire.

use hopwire_dispatch::DispatchError;
use hopwire_protocol::ProtocolError;
use hopwire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `hopwire` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HopwireError {
    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, short envelope).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A dispatch-level error (misuse of a send, bad configuration).
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The builder was finished without choosing bind, host, or connect.
    #[error("node has no role: call bind, host, or connect before build")]
    NoRole,

    /// The node's dispatch task is no longer running.
    #[error("node stopped")]
    Stopped,
}
