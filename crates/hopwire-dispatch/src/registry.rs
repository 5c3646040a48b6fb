//! The three type registries: commands, messages, request/reply pairs.
//!
//! Each registry maps a [`TypeCode`] to a type-erased handler. They are
//! filled once at startup, read on every inbound envelope, and only ever
//! emptied as a whole. A code can be claimed once per registry: the
//! first registration wins and later ones are rejected.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::marker::PhantomData;

use hopwire_protocol::{
    Codec, Command, Message, PayloadKind, ProtocolError, Reply, Request, TypeCode,
};

// ---------------------------------------------------------------------------
// Erased handlers
// ---------------------------------------------------------------------------

/// Common surface of every registry entry.
pub(crate) trait Handler: Send {
    /// Fully qualified name of the registered type, for logs.
    fn type_name(&self) -> &'static str;
}

/// Runs a registered command.
pub(crate) trait CommandHandler: Handler {
    fn run(&self);
}

/// Decodes and runs a registered message.
pub(crate) trait MessageHandler<C>: Handler {
    fn receive(&self, codec: &C, body: &[u8]) -> Result<(), ProtocolError>;
}

/// Bound to one `(Request, Reply)` pair.
pub(crate) trait RequestPerformer<C>: Handler {
    /// Decodes a request, handles it, and returns the encoded reply.
    fn perform_request(&self, codec: &C, body: &[u8]) -> Result<Vec<u8>, ProtocolError>;

    /// Decodes a reply and handles it.
    fn perform_reply(&self, codec: &C, body: &[u8]) -> Result<(), ProtocolError>;
}

/// Commands carry no state, so one instance serves every invocation.
struct CommandEntry<T>(T);

impl<T: Command> Handler for CommandEntry<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T: Command> CommandHandler for CommandEntry<T> {
    fn run(&self) {
        self.0.on_received();
    }
}

/// Messages decode into a fresh value on every receipt.
struct MessageEntry<T>(PhantomData<fn() -> T>);

impl<T: Message> Handler for MessageEntry<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T: Message, C: Codec> MessageHandler<C> for MessageEntry<T> {
    fn receive(&self, codec: &C, body: &[u8]) -> Result<(), ProtocolError> {
        let message: T = codec.decode(body)?;
        message.on_received();
        Ok(())
    }
}

struct RequestEntry<R>(PhantomData<fn() -> R>);

impl<R: Request> Handler for RequestEntry<R> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<R>()
    }
}

impl<R: Request, C: Codec> RequestPerformer<C> for RequestEntry<R> {
    fn perform_request(&self, codec: &C, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let request: R = codec.decode(body)?;
        let reply = request.on_request_received();
        codec.encode(&reply)
    }

    fn perform_reply(&self, codec: &C, body: &[u8]) -> Result<(), ProtocolError> {
        let reply: R::Reply = codec.decode(body)?;
        reply.on_reply_received();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All registered payload types, keyed by [`TypeCode`].
///
/// Owned by a [`Dispatcher`](crate::Dispatcher); there is no global
/// registry.
pub struct Registry<C> {
    commands: HashMap<TypeCode, Box<dyn CommandHandler>>,
    messages: HashMap<TypeCode, Box<dyn MessageHandler<C>>>,
    requests: HashMap<TypeCode, Box<dyn RequestPerformer<C>>>,
}

impl<C: Codec> Registry<C> {
    /// Creates empty registries.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            messages: HashMap::new(),
            requests: HashMap::new(),
        }
    }

    /// Registers command type `T`, instantiated with `Default`.
    ///
    /// Returns `false` (and logs an error) if `T`'s code is taken.
    pub fn register_command<T: Command>(&mut self) -> bool {
        let handler: Box<dyn CommandHandler> = Box::new(CommandEntry(T::default()));
        install(&mut self.commands, PayloadKind::Command, T::type_code(), handler)
    }

    /// Registers message type `T`.
    ///
    /// Returns `false` (and logs an error) if `T`'s code is taken.
    pub fn register_message<T: Message>(&mut self) -> bool {
        let handler: Box<dyn MessageHandler<C>> = Box::new(MessageEntry::<T>(PhantomData));
        install(&mut self.messages, PayloadKind::Message, T::type_code(), handler)
    }

    /// Registers request type `R` together with its reply type.
    ///
    /// Returns `false` (and logs an error) if `R`'s code is taken.
    pub fn register_request_reply<R: Request>(&mut self) -> bool {
        let handler: Box<dyn RequestPerformer<C>> = Box::new(RequestEntry::<R>(PhantomData));
        install(&mut self.requests, PayloadKind::Request, R::type_code(), handler)
    }

    /// Name of the command type registered under `code`.
    pub fn command_type(&self, code: TypeCode) -> Option<&'static str> {
        self.commands.get(&code).map(|h| h.type_name())
    }

    /// Name of the message type registered under `code`.
    pub fn message_type(&self, code: TypeCode) -> Option<&'static str> {
        self.messages.get(&code).map(|h| h.type_name())
    }

    /// Name of the request type registered under `code`.
    pub fn request_type(&self, code: TypeCode) -> Option<&'static str> {
        self.requests.get(&code).map(|h| h.type_name())
    }

    /// Number of registered types of `kind`. Replies share the request
    /// registry.
    pub fn len(&self, kind: PayloadKind) -> usize {
        match kind {
            PayloadKind::Command => self.commands.len(),
            PayloadKind::Message => self.messages.len(),
            PayloadKind::Request | PayloadKind::Reply => self.requests.len(),
        }
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.messages.is_empty() && self.requests.is_empty()
    }

    /// Drops every registration (process teardown).
    pub fn clear(&mut self) {
        self.commands.clear();
        self.messages.clear();
        self.requests.clear();
    }

    pub(crate) fn command(&self, code: TypeCode) -> Option<&dyn CommandHandler> {
        self.commands.get(&code).map(|h| h.as_ref())
    }

    pub(crate) fn message(&self, code: TypeCode) -> Option<&dyn MessageHandler<C>> {
        self.messages.get(&code).map(|h| h.as_ref())
    }

    pub(crate) fn performer(&self, code: TypeCode) -> Option<&dyn RequestPerformer<C>> {
        self.requests.get(&code).map(|h| h.as_ref())
    }
}

impl<C: Codec> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Inserts `handler` unless `code` is already claimed.
fn install<H: Handler + ?Sized>(
    map: &mut HashMap<TypeCode, Box<H>>,
    kind: PayloadKind,
    code: TypeCode,
    handler: Box<H>,
) -> bool {
    match map.entry(code) {
        Entry::Occupied(existing) => {
            tracing::error!(
                %kind,
                type_code = %code,
                registered = existing.get().type_name(),
                rejected = handler.type_name(),
                "type code already registered"
            );
            false
        }
        Entry::Vacant(slot) => {
            tracing::debug!(%kind, type_code = %code, name = handler.type_name(), "registered");
            slot.insert(handler);
            true
        }
    }
}
