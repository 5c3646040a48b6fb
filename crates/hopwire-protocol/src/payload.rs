//! The traits payload authors implement.
//!
//! Three invocation patterns, three traits:
//!
//! - [`Command`]: identity is the whole payload; nothing but the header
//!   crosses the wire.
//! - [`Message`]: a serializable value delivered one way.
//! - [`Request`] + [`Reply`]: a serializable value whose handler returns
//!   a reply, which travels back to the hop the request came from.
//!
//! Handlers take `&self` and return nothing: effects go wherever the
//! payload's author wants them (game state, a channel, a log).

use serde::{Serialize, de::DeserializeOwned};

use crate::TypeCode;

/// Anything that can be registered and addressed by [`TypeCode`].
///
/// `Send` because a registered command instance lives in the dispatcher,
/// which a runtime moves into its dispatch task.
pub trait Payload: Send + 'static {
    /// The code this type is registered and sent under.
    ///
    /// Defaults to [`TypeCode::of::<Self>()`](TypeCode::of). Override it
    /// only to pin a code across renames.
    fn type_code() -> TypeCode
    where
        Self: Sized,
    {
        TypeCode::of::<Self>()
    }
}

/// A fire-and-forget payload with no body.
///
/// The receiving side rebuilds the command with `Default`, so a command
/// must not depend on any state the sender would have had to encode.
///
/// ```rust
/// use hopwire_protocol::{Command, Payload};
///
/// #[derive(Default)]
/// struct RingBell;
///
/// impl Payload for RingBell {}
///
/// impl Command for RingBell {
///     fn on_received(&self) {
///         println!("ding");
///     }
/// }
/// ```
pub trait Command: Payload + Default {
    /// Runs the command on this process.
    fn on_received(&self);
}

/// A one-way payload with a serialized body.
pub trait Message: Payload + Serialize + DeserializeOwned {
    /// Handles the message on this process.
    fn on_received(&self);
}

/// A payload that produces a [`Reply`] on the process that handles it.
pub trait Request: Payload + Serialize + DeserializeOwned {
    /// The reply type paired with this request.
    type Reply: Reply;

    /// Handles the request and builds the reply.
    fn on_request_received(&self) -> Self::Reply;
}

/// The answer to a [`Request`].
///
/// Replies have no type code of their own: they travel under the code of
/// the request they answer.
pub trait Reply: Serialize + DeserializeOwned + 'static {
    /// Handles the reply on the process that receives it.
    fn on_reply_received(&self);
}
