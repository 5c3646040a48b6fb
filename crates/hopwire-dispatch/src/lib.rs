//! Relay dispatch for hopwire.
//!
//! This crate turns the protocol's building blocks into a working
//! messaging layer:
//!
//! - [`Registry`]: type code → handler maps for commands, messages, and
//!   request/reply pairs
//! - [`ChannelWriter`]: a buffer that is always handed to the transport
//!   when released
//! - [`Dispatcher`]: the receive handlers, the relay algorithm, the
//!   role-transition hooks, and the `send_*` entry points
//! - [`DispatchConfig`]: channel table and delivery mode
//!
//! # How it fits in the stack
//!
//! ```text
//! Runtime (above)     ← drives on_receive from the socket, calls send_*
//!     ↕
//! Dispatch (this crate) ← decides: run here, relay on, reply back
//!     ↕
//! Protocol (below)    ← Header, Destination, payload traits, Codec
//! ```
//!
//! # Example
//!
//! ```rust
//! use hopwire_dispatch::Dispatcher;
//! use hopwire_dispatch::testing::RecordingTransport;
//! use hopwire_protocol::{Command, ConnectionId, Destination, JsonCodec, Payload};
//!
//! #[derive(Default)]
//! struct Respawn;
//! impl Payload for Respawn {}
//! impl Command for Respawn {
//!     fn on_received(&self) {}
//! }
//!
//! let mut dispatcher = Dispatcher::new(JsonCodec);
//! assert!(dispatcher.register_command::<Respawn>());
//!
//! // A pure client sends `Server`-addressed commands upstream only.
//! let transport = RecordingTransport::client(ConnectionId::new(1));
//! dispatcher
//!     .send_command(&transport, &Respawn, Destination::SERVER)
//!     .unwrap();
//! assert_eq!(transport.sent_count(), 1);
//! ```

mod config;
mod dispatcher;
mod error;
mod registry;
mod send;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod writer;

pub use config::DispatchConfig;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use registry::Registry;
pub use writer::ChannelWriter;
