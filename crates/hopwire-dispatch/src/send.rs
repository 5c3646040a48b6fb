//! Invocation entry points: commands, messages, and requests.
//!
//! Every `send_*` call applies the destination policy the same way a
//! relaying hop would: execute here if this process plays a targeted
//! role, then transmit unless the server itself was the only target.
//!
//! The `*_to` variants address one connection and are server-only.

use hopwire_protocol::{
    Codec, Command, ConnectionId, Destination, Header, Message, PayloadKind, Reply, Request,
    should_run_locally, should_transmit,
};
use hopwire_transport::Transport;

use crate::{ChannelWriter, DispatchError, Dispatcher};

impl<C: Codec> Dispatcher<C> {
    /// Sends a command to every process playing a role in `destination`.
    pub fn send_command<T, M>(
        &self,
        transport: &T,
        command: &M,
        destination: Destination,
    ) -> Result<(), DispatchError>
    where
        T: Transport + ?Sized,
        M: Command,
    {
        let role = transport.role();
        if should_run_locally(role, destination) {
            command.on_received();
        }
        if should_transmit(role, destination) {
            let header = Header::new(M::type_code(), destination);
            self.transmit(transport, PayloadKind::Command, &header, &[])?;
        }
        Ok(())
    }

    /// Sends a command to one connection (server only).
    ///
    /// If the target is this process's own local client, the command runs
    /// here and nothing is sent.
    pub fn send_command_to<T, M>(
        &self,
        transport: &T,
        command: &M,
        target: ConnectionId,
    ) -> Result<(), DispatchError>
    where
        T: Transport + ?Sized,
        M: Command,
    {
        if self.is_local_target(transport, target)? {
            command.on_received();
            return Ok(());
        }
        let header = Header::new(M::type_code(), Destination::CLIENTS);
        let mut writer = self.open(transport, PayloadKind::Command, target);
        writer.header(&header);
        writer.finish()?;
        Ok(())
    }

    /// Sends a message to every process playing a role in `destination`.
    ///
    /// # Errors
    /// Encoding the message fails, or no connection could be sent to.
    pub fn send_message<T, M>(
        &self,
        transport: &T,
        message: &M,
        destination: Destination,
    ) -> Result<(), DispatchError>
    where
        T: Transport + ?Sized,
        M: Message,
    {
        let role = transport.role();
        if should_run_locally(role, destination) {
            message.on_received();
        }
        if should_transmit(role, destination) {
            let header = Header::new(M::type_code(), destination);
            let body = self.codec.encode(message)?;
            self.transmit(transport, PayloadKind::Message, &header, &body)?;
        }
        Ok(())
    }

    /// Sends a message to one connection (server only).
    pub fn send_message_to<T, M>(
        &self,
        transport: &T,
        message: &M,
        target: ConnectionId,
    ) -> Result<(), DispatchError>
    where
        T: Transport + ?Sized,
        M: Message,
    {
        if self.is_local_target(transport, target)? {
            message.on_received();
            return Ok(());
        }
        let header = Header::new(M::type_code(), Destination::CLIENTS);
        let body = self.codec.encode(message)?;
        let mut writer = self.open(transport, PayloadKind::Message, target);
        writer.header(&header).raw(&body);
        writer.finish()?;
        Ok(())
    }

    /// Sends a request to every process playing a role in `destination`.
    ///
    /// When this process is itself a target, the request is handled and
    /// its reply delivered immediately, without touching the network.
    /// Remote replies arrive later through the reply channel, one per
    /// answering hop, or never: there is no timeout.
    pub fn send_request<T, R>(
        &self,
        transport: &T,
        request: &R,
        destination: Destination,
    ) -> Result<(), DispatchError>
    where
        T: Transport + ?Sized,
        R: Request,
    {
        let role = transport.role();
        if should_run_locally(role, destination) {
            request.on_request_received().on_reply_received();
        }
        if should_transmit(role, destination) {
            let header = Header::new(R::type_code(), destination);
            let body = self.codec.encode(request)?;
            self.transmit(transport, PayloadKind::Request, &header, &body)?;
        }
        Ok(())
    }

    /// Sends a request to one connection (server only).
    pub fn send_request_to<T, R>(
        &self,
        transport: &T,
        request: &R,
        target: ConnectionId,
    ) -> Result<(), DispatchError>
    where
        T: Transport + ?Sized,
        R: Request,
    {
        if self.is_local_target(transport, target)? {
            request.on_request_received().on_reply_received();
            return Ok(());
        }
        let header = Header::new(R::type_code(), Destination::CLIENTS);
        let body = self.codec.encode(request)?;
        let mut writer = self.open(transport, PayloadKind::Request, target);
        writer.header(&header).raw(&body);
        writer.finish()?;
        Ok(())
    }

    /// Server: every non-loopback connection. Client: the server.
    fn transmit<T: Transport + ?Sized>(
        &self,
        transport: &T,
        kind: PayloadKind,
        header: &Header,
        body: &[u8],
    ) -> Result<(), DispatchError> {
        if transport.role().is_server() {
            self.broadcast(transport, kind, None, header, body)
        } else {
            self.send_to_server(transport, kind, header, body)
        }
    }

    /// Validates a targeted send and reports whether the target is this
    /// process's own local client.
    fn is_local_target<T: Transport + ?Sized>(
        &self,
        transport: &T,
        target: ConnectionId,
    ) -> Result<bool, DispatchError> {
        let role = transport.role();
        if !role.is_server() {
            return Err(DispatchError::NotServer);
        }
        if !transport.contains(target) {
            return Err(DispatchError::UnknownConnection(target));
        }
        Ok(role.is_client() && transport.is_loopback(target))
    }

    fn open<'a, T: Transport + ?Sized>(
        &self,
        transport: &'a T,
        kind: PayloadKind,
        target: ConnectionId,
    ) -> ChannelWriter<'a, T> {
        ChannelWriter::open(
            transport,
            target,
            self.config.channels.channel(kind),
            self.config.delivery,
        )
    }
}
