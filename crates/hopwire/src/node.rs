//! `Node` builder, run loop, and handle.
//!
//! A node is one hopwire process on a WebSocket network. It is either a
//! server (accepting clients), a host (a server whose own local client is
//! a loopback connection), or a client (connected to one server). This
//! is the entry point that ties the layers together:
//! transport → dispatch task → dispatcher.

use std::net::SocketAddr;
use std::time::Duration;

use hopwire_dispatch::{DispatchConfig, Dispatcher};
use hopwire_protocol::{Codec, ConnectionId, JsonCodec, Role};
use hopwire_transport::{ClientConnection, Connection, Listener, WebSocketTransport};
use tokio::sync::{mpsc, oneshot};

use crate::HopwireError;
use crate::runtime::{Event, NodeTransport, dispatch_loop, serve_connection};

/// The connection id a host uses for its own local client.
pub const LOOPBACK: ConnectionId = ConnectionId::new(u64::MAX);

enum Mode {
    Serve { addr: String, host: bool },
    Connect { url: String },
}

/// Builder for configuring and starting a node.
///
/// # Example
///
/// ```rust,ignore
/// use hopwire::prelude::*;
///
/// let mut node = Node::builder().bind("0.0.0.0:7777").build().await?;
/// node.dispatcher_mut().register_message::<Chat>();
/// node.run().await
/// ```
pub struct NodeBuilder<C = JsonCodec> {
    mode: Option<Mode>,
    config: DispatchConfig,
    codec: C,
    idle_timeout: Option<Duration>,
}

impl NodeBuilder<JsonCodec> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            mode: None,
            config: DispatchConfig::default(),
            codec: JsonCodec,
            idle_timeout: None,
        }
    }
}

impl Default for NodeBuilder<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> NodeBuilder<C> {
    /// Runs as a dedicated server listening on `addr`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.mode = Some(Mode::Serve {
            addr: addr.to_string(),
            host: false,
        });
        self
    }

    /// Runs as a listen server on `addr`: a server that is also its own
    /// client, reachable through the [`LOOPBACK`] connection.
    pub fn host(mut self, addr: &str) -> Self {
        self.mode = Some(Mode::Serve {
            addr: addr.to_string(),
            host: true,
        });
        self
    }

    /// Runs as a client of the server at `url` (e.g. `ws://127.0.0.1:7777`).
    pub fn connect(mut self, url: &str) -> Self {
        self.mode = Some(Mode::Connect {
            url: url.to_string(),
        });
        self
    }

    /// Sets the dispatch configuration.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Swaps the body codec.
    pub fn codec<D: Codec>(self, codec: D) -> NodeBuilder<D> {
        NodeBuilder {
            mode: self.mode,
            config: self.config,
            codec,
            idle_timeout: self.idle_timeout,
        }
    }

    /// Closes connections that stay silent for longer than `limit`.
    ///
    /// Off by default: the protocol has no heartbeat of its own.
    pub fn idle_timeout(mut self, limit: Duration) -> Self {
        self.idle_timeout = Some(limit);
        self
    }

    /// Binds or connects, and returns a node ready to [`run`](Node::run).
    ///
    /// # Errors
    /// [`HopwireError::NoRole`] if no mode was chosen, an invalid
    /// dispatch configuration, or a failed bind/connect.
    pub async fn build(self) -> Result<Node<C>, HopwireError> {
        let mode = self.mode.ok_or(HopwireError::NoRole)?;
        let dispatcher = Dispatcher::with_config(self.codec, self.config)?;

        let (socket, role, loopback) = match mode {
            Mode::Serve { addr, host: false } => (
                Socket::Listening(WebSocketTransport::bind(&addr).await?),
                Role::SERVER,
                None,
            ),
            Mode::Serve { addr, host: true } => (
                Socket::Listening(WebSocketTransport::bind(&addr).await?),
                Role::HOST,
                Some(LOOPBACK),
            ),
            Mode::Connect { url } => (
                Socket::Upstream(hopwire_transport::connect(&url).await?),
                Role::CLIENT,
                None,
            ),
        };

        let (events, inbox) = mpsc::unbounded_channel();
        Ok(Node {
            socket,
            dispatcher,
            role,
            loopback,
            idle_timeout: self.idle_timeout,
            events,
            inbox,
        })
    }
}

enum Socket {
    Listening(WebSocketTransport),
    Upstream(ClientConnection),
}

/// A bound or connected node.
///
/// Register payload types through [`dispatcher_mut`](Self::dispatcher_mut),
/// take a [`NodeHandle`], then call [`run`](Self::run).
pub struct Node<C = JsonCodec> {
    socket: Socket,
    dispatcher: Dispatcher<C>,
    role: Role,
    loopback: Option<ConnectionId>,
    idle_timeout: Option<Duration>,
    events: mpsc::UnboundedSender<Event<C>>,
    inbox: mpsc::UnboundedReceiver<Event<C>>,
}

impl Node<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> NodeBuilder {
        NodeBuilder::new()
    }
}

impl<C: Codec> Node<C> {
    /// The roles this node plays.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The address a server or host is listening on.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            Socket::Listening(listener) => listener.local_addr().ok(),
            Socket::Upstream(_) => None,
        }
    }

    /// The dispatcher, for registering payload types before running.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<C> {
        &mut self.dispatcher
    }

    /// A handle for reaching the dispatcher once the node runs.
    pub fn handle(&self) -> NodeHandle<C> {
        NodeHandle {
            events: self.events.clone(),
        }
    }

    /// Runs the node until it is shut down.
    ///
    /// A server or host accepts connections and serves each in its own
    /// task. A client serves its single server connection and returns
    /// once it closes. A client's server connection is attached before
    /// the dispatcher sees any event, so sends issued right after
    /// spawning `run` already reach the server.
    pub async fn run(self) -> Result<(), HopwireError> {
        let Node {
            socket,
            dispatcher,
            role,
            loopback,
            idle_timeout,
            events,
            inbox,
        } = self;
        let mut transport = NodeTransport::new(role, loopback);

        match socket {
            Socket::Listening(mut listener) => {
                let mut dispatch = tokio::spawn(dispatch_loop(dispatcher, transport, inbox));
                tracing::info!(%role, "hopwire node running");
                loop {
                    tokio::select! {
                        accepted = listener.accept() => match accepted {
                            Ok(conn) => {
                                let (outbox, pending) = mpsc::unbounded_channel();
                                let id = conn.id();
                                // Queued ahead of any frame the connection task reads.
                                if events.send(Event::Connected { id, outbox }).is_err() {
                                    break;
                                }
                                tokio::spawn(serve_connection(
                                    conn,
                                    pending,
                                    events.clone(),
                                    idle_timeout,
                                ));
                            }
                            Err(e) => tracing::error!(error = %e, "accept failed"),
                        },
                        _ = &mut dispatch => break,
                    }
                }
                listener.shutdown().await?;
            }
            Socket::Upstream(conn) => {
                let (outbox, pending) = mpsc::unbounded_channel();
                transport.attach(conn.id(), outbox, true);
                let mut dispatch = tokio::spawn(dispatch_loop(dispatcher, transport, inbox));
                tracing::info!(%role, "hopwire node running");

                let disconnected = tokio::select! {
                    () = serve_connection(conn, pending, events.clone(), idle_timeout) => true,
                    _ = &mut dispatch => false,
                };
                if disconnected {
                    tracing::info!("server connection ended");
                    let _ = events.send(Event::Shutdown);
                    let _ = dispatch.await;
                }
            }
        }

        tracing::info!(%role, "hopwire node stopped");
        Ok(())
    }
}

/// A cloneable handle to a running node's dispatcher.
pub struct NodeHandle<C = JsonCodec> {
    events: mpsc::UnboundedSender<Event<C>>,
}

impl<C> Clone for NodeHandle<C> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<C: Codec> NodeHandle<C> {
    /// Runs `f` on the dispatch task and returns its result.
    ///
    /// This is how application code calls `send_*` or registers types
    /// once the node runs: the dispatcher only ever runs on its own task.
    ///
    /// ```rust,ignore
    /// handle
    ///     .invoke(|dispatcher, transport| {
    ///         dispatcher.send_message(transport, &Chat::new("hi"), Destination::ALL)
    ///     })
    ///     .await??;
    /// ```
    ///
    /// # Errors
    /// [`HopwireError::Stopped`] if the node is no longer running.
    pub async fn invoke<F, R>(&self, f: F) -> Result<R, HopwireError>
    where
        F: FnOnce(&mut Dispatcher<C>, &NodeTransport) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = Box::new(move |dispatcher: &mut Dispatcher<C>, transport: &NodeTransport| {
            let _ = tx.send(f(dispatcher, transport));
        });
        self.events
            .send(Event::Invoke(job))
            .map_err(|_| HopwireError::Stopped)?;
        rx.await.map_err(|_| HopwireError::Stopped)
    }

    /// Asks the node to stop. Pending events queued before this call are
    /// handled first.
    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }

    /// Returns `true` while the node's dispatch task is alive.
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }
}
