//! The dispatcher: inbound envelopes in, local execution and relay out.
//!
//! Each of the four channels (command, message, request, reply) has a
//! server-side and a client-side handler. Every handler follows the same
//! shape:
//!
//! ```text
//! decode header ──→ should_run_locally? ──→ look up type, execute
//!       │
//!       └─────────→ should_transmit? (server side only)
//!                        └──→ relay to every connection except the
//!                             one it came from and loopbacks
//! ```
//!
//! Requests additionally answer the hop they arrived from on the reply
//! channel. There is no request id: each hop replies only to its
//! immediate predecessor, and relayed requests are answered by whoever
//! handles them, back along the same path, one hop at a time. A cycle
//! in the relay topology is not detected.

use bytes::Bytes;
use hopwire_protocol::{
    ChannelId, Codec, Command, ConnectionId, Destination, Header, Message, PayloadKind,
    Request, TypeCode, should_run_locally, should_transmit,
};
use hopwire_transport::Transport;

use crate::{ChannelWriter, DispatchConfig, DispatchError, Registry};

/// Which handler set an inbound envelope goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// Arrived on a connection this process accepted as server.
    Server,
    /// Arrived from the server this process is a client of.
    Client,
}

/// Owns the registries and runs every receive and send path.
///
/// A dispatcher is driven from a single thread: the transport calls
/// [`on_receive`](Self::on_receive) for each inbound buffer, and user
/// code calls the `send_*` methods, never concurrently.
pub struct Dispatcher<C> {
    pub(crate) registry: Registry<C>,
    pub(crate) codec: C,
    pub(crate) config: DispatchConfig,
    server_handlers: bool,
    client_handlers: bool,
}

impl<C: Codec> Dispatcher<C> {
    /// Creates a dispatcher with the default channel table.
    pub fn new(codec: C) -> Self {
        Self {
            registry: Registry::new(),
            codec,
            config: DispatchConfig::default(),
            server_handlers: false,
            client_handlers: false,
        }
    }

    /// Creates a dispatcher with a custom configuration.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidConfig`] if the configuration
    /// does not validate.
    pub fn with_config(codec: C, config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(codec)
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The registries, for lookups.
    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }

    // -----------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------

    /// Registers command type `T`. See [`Registry::register_command`].
    pub fn register_command<T: Command>(&mut self) -> bool {
        self.registry.register_command::<T>()
    }

    /// Registers message type `T`. See [`Registry::register_message`].
    pub fn register_message<T: Message>(&mut self) -> bool {
        self.registry.register_message::<T>()
    }

    /// Registers request type `R` and its reply.
    /// See [`Registry::register_request_reply`].
    pub fn register_request_reply<R: Request>(&mut self) -> bool {
        self.registry.register_request_reply::<R>()
    }

    /// Uninstalls all handlers and empties the registries.
    pub fn teardown(&mut self) {
        self.server_handlers = false;
        self.client_handlers = false;
        self.registry.clear();
        tracing::info!("dispatcher torn down");
    }

    // -----------------------------------------------------------------
    // Role transitions
    // -----------------------------------------------------------------

    /// Installs the server-side handlers.
    pub fn on_server_started(&mut self) {
        self.server_handlers = true;
        tracing::info!("server handlers installed");
    }

    /// Installs the client-side handlers.
    pub fn on_client_started(&mut self) {
        self.client_handlers = true;
        tracing::info!("client handlers installed");
    }

    /// Uninstalls the server-side handlers.
    pub fn on_server_stopped(&mut self) {
        self.server_handlers = false;
        tracing::info!("server handlers removed");
    }

    /// Uninstalls the client-side handlers.
    pub fn on_client_stopped(&mut self) {
        self.client_handlers = false;
        tracing::info!("client handlers removed");
    }

    /// Returns `true` if the server-side handlers are installed.
    pub fn serves(&self) -> bool {
        self.server_handlers
    }

    /// Returns `true` if the client-side handlers are installed.
    pub fn listens(&self) -> bool {
        self.client_handlers
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    /// Handles one inbound buffer.
    ///
    /// Buffers on channels that are not in the channel table, or for a
    /// handler set that is not installed, are dropped.
    ///
    /// # Errors
    /// A short or malformed envelope, an undecodable body, or a failed
    /// reply/relay send. The error is local to this hop: nothing is
    /// reported back to the sender.
    pub fn on_receive<T: Transport + ?Sized>(
        &self,
        transport: &T,
        from: ConnectionId,
        channel: ChannelId,
        data: Bytes,
    ) -> Result<(), DispatchError> {
        let Some(kind) = self.config.channels.kind_of(channel) else {
            tracing::debug!(%from, %channel, "dropping buffer on unknown channel");
            return Ok(());
        };

        let side = if transport.server_connection() == Some(from) {
            Side::Client
        } else {
            Side::Server
        };
        let installed = match side {
            Side::Server => self.server_handlers,
            Side::Client => self.client_handlers,
        };
        if !installed {
            tracing::debug!(%from, %kind, ?side, "no handlers installed, dropping envelope");
            return Ok(());
        }

        let mut body = data;
        let header = Header::decode(&mut body)?;
        let inbound = Inbound { from, header, body };

        match (side, kind) {
            (Side::Server, PayloadKind::Command) => self.handle_command_server(transport, inbound),
            (Side::Client, PayloadKind::Command) => self.handle_command_client(transport, inbound),
            (Side::Server, PayloadKind::Message) => self.handle_message_server(transport, inbound),
            (Side::Client, PayloadKind::Message) => self.handle_message_client(transport, inbound),
            (Side::Server, PayloadKind::Request) => self.handle_request_server(transport, inbound),
            (Side::Client, PayloadKind::Request) => self.handle_request_client(transport, inbound),
            (Side::Server, PayloadKind::Reply) => self.handle_reply_server(transport, inbound),
            (Side::Client, PayloadKind::Reply) => self.handle_reply_client(transport, inbound),
        }
    }

    fn handle_command_server<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        let role = transport.role();
        let destination = inbound.header.destination;
        if should_run_locally(role, destination) {
            self.run_command(inbound.header.type_code);
        }
        if should_transmit(role, destination) {
            self.relay(transport, PayloadKind::Command, &inbound)?;
        }
        Ok(())
    }

    fn handle_command_client<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        if should_run_locally(transport.role(), inbound.header.destination) {
            self.run_command(inbound.header.type_code);
        }
        Ok(())
    }

    fn handle_message_server<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        let role = transport.role();
        let destination = inbound.header.destination;
        let local = if should_run_locally(role, destination) {
            self.run_message(inbound.header.type_code, &inbound.body)
        } else {
            Ok(())
        };
        // A hop that cannot decode the body still passes it on.
        if should_transmit(role, destination) {
            self.relay(transport, PayloadKind::Message, &inbound)?;
        }
        local
    }

    fn handle_message_client<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        if should_run_locally(transport.role(), inbound.header.destination) {
            self.run_message(inbound.header.type_code, &inbound.body)?;
        }
        Ok(())
    }

    fn handle_request_server<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        let role = transport.role();
        let destination = inbound.header.destination;
        let local = if should_run_locally(role, destination) {
            self.answer_request(transport, &inbound)
        } else {
            Ok(())
        };
        if should_transmit(role, destination) {
            self.relay(transport, PayloadKind::Request, &inbound)?;
        }
        local
    }

    fn handle_request_client<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        if should_run_locally(transport.role(), inbound.header.destination) {
            self.answer_request(transport, &inbound)?;
        }
        Ok(())
    }

    fn handle_reply_server<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        let role = transport.role();
        let destination = inbound.header.destination;
        let local = if should_run_locally(role, destination) {
            self.run_reply(inbound.header.type_code, &inbound.body)
        } else {
            Ok(())
        };
        if should_transmit(role, destination) {
            self.relay(transport, PayloadKind::Reply, &inbound)?;
        }
        local
    }

    fn handle_reply_client<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: Inbound,
    ) -> Result<(), DispatchError> {
        if should_run_locally(transport.role(), inbound.header.destination) {
            self.run_reply(inbound.header.type_code, &inbound.body)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Local execution
    // -----------------------------------------------------------------

    fn run_command(&self, code: TypeCode) {
        match self.registry.command(code) {
            Some(handler) => handler.run(),
            None => missing_type(PayloadKind::Command, code),
        }
    }

    fn run_message(&self, code: TypeCode, body: &[u8]) -> Result<(), DispatchError> {
        match self.registry.message(code) {
            Some(handler) => handler.receive(&self.codec, body)?,
            None => missing_type(PayloadKind::Message, code),
        }
        Ok(())
    }

    fn run_reply(&self, code: TypeCode, body: &[u8]) -> Result<(), DispatchError> {
        match self.registry.performer(code) {
            Some(performer) => performer.perform_reply(&self.codec, body)?,
            None => missing_type(PayloadKind::Reply, code),
        }
        Ok(())
    }

    /// Handles a request and sends the reply back to the hop it came from.
    fn answer_request<T: Transport + ?Sized>(
        &self,
        transport: &T,
        inbound: &Inbound,
    ) -> Result<(), DispatchError> {
        let code = inbound.header.type_code;
        let Some(performer) = self.registry.performer(code) else {
            missing_type(PayloadKind::Request, code);
            return Ok(());
        };
        let reply = performer.perform_request(&self.codec, &inbound.body)?;

        let header = Header::new(code, Destination::CLIENTS);
        let mut writer = ChannelWriter::open(
            transport,
            inbound.from,
            self.config.channels.reply,
            self.config.delivery,
        );
        writer.header(&header).raw(&reply);
        writer.finish()?;
        tracing::debug!(to = %inbound.from, type_code = %code, "reply sent");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Outbound helpers
    // -----------------------------------------------------------------

    /// Forwards an inbound envelope to every other peer.
    ///
    /// The server hop has been handled here, so the relayed header drops
    /// the `Server` bit. The body is forwarded byte for byte.
    fn relay<T: Transport + ?Sized>(
        &self,
        transport: &T,
        kind: PayloadKind,
        inbound: &Inbound,
    ) -> Result<(), DispatchError> {
        let header = Header::new(
            inbound.header.type_code,
            inbound.header.destination.without(Destination::SERVER),
        );
        self.broadcast(transport, kind, Some(inbound.from), &header, &inbound.body)
    }

    /// Sends one envelope to every connection except `except` and
    /// loopbacks.
    ///
    /// A failed send does not stop the others; the first failure is
    /// returned once all connections were tried.
    pub(crate) fn broadcast<T: Transport + ?Sized>(
        &self,
        transport: &T,
        kind: PayloadKind,
        except: Option<ConnectionId>,
        header: &Header,
        body: &[u8],
    ) -> Result<(), DispatchError> {
        let channel = self.config.channels.channel(kind);
        let mut result = Ok(());
        let mut sent = 0usize;

        for connection in transport.connections() {
            if Some(connection) == except || transport.is_loopback(connection) {
                continue;
            }
            let mut writer =
                ChannelWriter::open(transport, connection, channel, self.config.delivery);
            writer.header(header).raw(body);
            match writer.finish() {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(%connection, %kind, error = %e, "send failed");
                    if result.is_ok() {
                        result = Err(e.into());
                    }
                }
            }
        }

        tracing::debug!(
            %kind,
            type_code = %header.type_code,
            destination = %header.destination,
            except = ?except,
            sent,
            "broadcast envelope"
        );
        result
    }

    /// Sends one envelope to the server connection.
    pub(crate) fn send_to_server<T: Transport + ?Sized>(
        &self,
        transport: &T,
        kind: PayloadKind,
        header: &Header,
        body: &[u8],
    ) -> Result<(), DispatchError> {
        let server = transport
            .server_connection()
            .ok_or(DispatchError::NotConnected)?;
        let mut writer = ChannelWriter::open(
            transport,
            server,
            self.config.channels.channel(kind),
            self.config.delivery,
        );
        writer.header(header).raw(body);
        writer.finish()?;
        Ok(())
    }
}

/// A decoded header plus the still-encoded body.
struct Inbound {
    from: ConnectionId,
    header: Header,
    body: Bytes,
}

fn missing_type(kind: PayloadKind, code: TypeCode) {
    tracing::error!(
        %kind,
        type_code = %code,
        "received unregistered type code, you may be missing mods"
    );
}
