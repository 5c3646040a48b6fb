//! # hopwire
//!
//! Typed remote invocation with hop-by-hop relay for multiplayer game
//! hosts.
//!
//! Payload authors implement one of three traits and register the type:
//!
//! - [`Command`](hopwire_protocol::Command): fire and forget, no body
//! - [`Message`](hopwire_protocol::Message): a serializable value
//! - [`Request`](hopwire_protocol::Request): a serializable value whose
//!   handler produces a [`Reply`](hopwire_protocol::Reply)
//!
//! Every send names a [`Destination`](hopwire_protocol::Destination)
//! (`CLIENTS`, `SERVER`, or both). The sending process runs the payload
//! itself if it plays a targeted role, and the server relays it to every
//! other peer until each targeted process has seen it once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hopwire::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Chat {
//!     text: String,
//! }
//!
//! impl Payload for Chat {}
//! impl Message for Chat {
//!     fn on_received(&self) {
//!         println!("chat: {}", self.text);
//!     }
//! }
//!
//! # async fn demo() -> Result<(), HopwireError> {
//! let mut node = Node::builder().bind("0.0.0.0:7777").build().await?;
//! node.dispatcher_mut().register_message::<Chat>();
//! let handle = node.handle();
//! tokio::spawn(node.run());
//!
//! handle
//!     .invoke(|dispatcher, transport| {
//!         let chat = Chat { text: "welcome".into() };
//!         dispatcher.send_message(transport, &chat, Destination::CLIENTS)
//!     })
//!     .await??;
//! # Ok(())
//! # }
//! ```

mod error;
mod node;
mod runtime;

pub use error::HopwireError;
pub use node::{LOOPBACK, Node, NodeBuilder, NodeHandle};
pub use runtime::NodeTransport;

pub use hopwire_dispatch as dispatch;
pub use hopwire_protocol as protocol;
pub use hopwire_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a formatted `tracing` subscriber for binaries and demos.
///
/// The filter comes from `RUST_LOG` and falls back to `info`. Calling it
/// more than once is harmless: later calls leave the first subscriber in
/// place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub mod prelude {
    pub use crate::{HopwireError, LOOPBACK, Node, NodeBuilder, NodeHandle, NodeTransport, init_tracing};
    pub use hopwire_dispatch::{DispatchConfig, DispatchError, Dispatcher};
    pub use hopwire_protocol::{
        ChannelIds, Codec, Command, ConnectionId, Delivery, Destination, JsonCodec, Message,
        Payload, Reply, Request, Role, TypeCode,
    };
    pub use hopwire_transport::Transport;
}
