//! Wire protocol for hopwire.
//!
//! This crate defines what an envelope is and how a process decides what
//! to do with one:
//!
//! - **Types** ([`Destination`], [`TypeCode`], [`PayloadKind`],
//!   [`ChannelIds`]): the vocabulary of the wire.
//! - **Header** ([`Header`]): the fixed 5-byte prefix of every envelope.
//! - **Policy** ([`policy`]): run locally, transmit, or both.
//! - **Payloads** ([`Command`], [`Message`], [`Request`], [`Reply`]):
//!   the traits payload authors implement.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payload bodies are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (tagged buffers) → Protocol (Header + body) → Dispatch (registries, relay)
//! ```

mod codec;
mod error;
mod header;
mod payload;
pub mod policy;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use header::Header;
pub use payload::{Command, Message, Payload, Reply, Request};
pub use policy::{should_run_locally, should_transmit};
pub use types::{ChannelIds, Destination, PayloadKind, TypeCode};

// Re-exported so payload crates only need one dependency.
pub use hopwire_transport::{ChannelId, ConnectionId, Delivery, Role};
