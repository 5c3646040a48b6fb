//! The node's tasks: one dispatch task, one task per connection.
//!
//! ```text
//!  socket ─→ connection task ─┐
//!  socket ─→ connection task ─┼─→ events (mpsc) ─→ dispatch task ─→ Dispatcher
//!  NodeHandle::invoke ────────┘                         │
//!                                                       ↓
//!  socket ←─ connection task ←── outbox (mpsc) ←─ NodeTransport::send
//! ```
//!
//! The dispatcher is only ever touched by the dispatch task, so it runs
//! single-threaded even though sockets are served concurrently.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use hopwire_dispatch::Dispatcher;
use hopwire_protocol::{ChannelId, Codec, ConnectionId, Delivery, Role};
use hopwire_transport::{Connection, Frame, Transport, TransportError};
use tokio::sync::mpsc;

/// Work item for the dispatch task.
pub(crate) type Job<C> = Box<dyn FnOnce(&mut Dispatcher<C>, &NodeTransport) + Send>;

/// Everything the dispatch task reacts to.
pub(crate) enum Event<C> {
    /// An accepted connection is ready; frames for it go into `outbox`.
    Connected {
        id: ConnectionId,
        outbox: mpsc::UnboundedSender<Frame>,
    },
    /// A frame arrived on `from`.
    Frame { from: ConnectionId, frame: Frame },
    /// A connection ended.
    Disconnected { id: ConnectionId },
    /// Run a closure against the dispatcher.
    Invoke(Job<C>),
    /// Stop the dispatch task.
    Shutdown,
}

/// The [`Transport`] the dispatch task hands to the dispatcher.
///
/// Sends never block: each frame is queued on the connection's outbox
/// and written by that connection's task, in order.
#[derive(Debug)]
pub struct NodeTransport {
    role: Role,
    server: Option<ConnectionId>,
    loopback: Option<ConnectionId>,
    peers: BTreeMap<ConnectionId, mpsc::UnboundedSender<Frame>>,
}

impl NodeTransport {
    pub(crate) fn new(role: Role, loopback: Option<ConnectionId>) -> Self {
        Self {
            role,
            server: None,
            loopback,
            peers: BTreeMap::new(),
        }
    }

    /// Number of remote peers currently connected.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub(crate) fn attach(
        &mut self,
        id: ConnectionId,
        outbox: mpsc::UnboundedSender<Frame>,
        upstream: bool,
    ) {
        if upstream {
            self.server = Some(id);
        }
        self.peers.insert(id, outbox);
    }

    fn detach(&mut self, id: ConnectionId) {
        self.peers.remove(&id);
        if self.server == Some(id) {
            self.server = None;
        }
    }
}

impl Transport for NodeTransport {
    fn role(&self) -> Role {
        self.role
    }

    fn connections(&self) -> Vec<ConnectionId> {
        self.loopback
            .into_iter()
            .chain(self.peers.keys().copied())
            .collect()
    }

    fn server_connection(&self) -> Option<ConnectionId> {
        self.server
    }

    fn is_loopback(&self, connection: ConnectionId) -> bool {
        self.loopback == Some(connection)
    }

    fn send(
        &self,
        connection: ConnectionId,
        channel: ChannelId,
        delivery: Delivery,
        data: Bytes,
    ) -> Result<(), TransportError> {
        let outbox = self
            .peers
            .get(&connection)
            .ok_or(TransportError::UnknownConnection(connection))?;
        outbox
            .send(Frame {
                channel,
                delivery,
                data,
            })
            .map_err(|_| TransportError::ConnectionClosed(format!("{connection} is closing")))
    }
}

/// Owns the dispatcher until shutdown or until every event sender is gone.
pub(crate) async fn dispatch_loop<C: Codec>(
    mut dispatcher: Dispatcher<C>,
    mut transport: NodeTransport,
    mut events: mpsc::UnboundedReceiver<Event<C>>,
) {
    let role = transport.role();
    if role.is_server() {
        dispatcher.on_server_started();
    }
    if role.is_client() {
        dispatcher.on_client_started();
    }
    tracing::info!(%role, "dispatch task running");

    while let Some(event) = events.recv().await {
        match event {
            Event::Connected { id, outbox } => {
                transport.attach(id, outbox, false);
                tracing::debug!(connection = %id, "peer attached");
            }
            Event::Frame { from, frame } => {
                if let Err(e) = dispatcher.on_receive(&transport, from, frame.channel, frame.data) {
                    tracing::debug!(connection = %from, channel = %frame.channel, error = %e, "inbound envelope failed");
                }
            }
            Event::Disconnected { id } => {
                transport.detach(id);
                tracing::debug!(connection = %id, "peer detached");
            }
            Event::Invoke(job) => job(&mut dispatcher, &transport),
            Event::Shutdown => break,
        }
    }

    if role.is_server() {
        dispatcher.on_server_stopped();
    }
    if role.is_client() {
        dispatcher.on_client_stopped();
    }
    tracing::info!(%role, "dispatch task stopped");
    // Dropping the transport closes every outbox, which ends the
    // connection tasks.
}

/// Reports the connection as gone when the connection task exits, even
/// on panic.
struct ConnectionGuard<C> {
    id: ConnectionId,
    events: mpsc::UnboundedSender<Event<C>>,
}

impl<C> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let _ = self.events.send(Event::Disconnected { id: self.id });
    }
}

/// Serves one connection from attach to close.
///
/// The connection must already be attached, with `pending` the receiving
/// end of its outbox. Reads frames into the event channel and writes
/// frames from the outbox, concurrently, until either side ends.
pub(crate) async fn serve_connection<C, S>(
    conn: S,
    mut pending: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::UnboundedSender<Event<C>>,
    idle_timeout: Option<Duration>,
) where
    S: Connection<Error = TransportError>,
{
    let id = conn.id();
    let _guard = ConnectionGuard {
        id,
        events: events.clone(),
    };
    tracing::debug!(connection = %id, "serving connection");

    let read = async {
        loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::info!(connection = %id, "connection timed out");
                        break;
                    }
                },
                None => conn.recv().await,
            };
            match next {
                Ok(Some(frame)) => {
                    if events.send(Event::Frame { from: id, frame }).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(connection = %id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(connection = %id, error = %e, "recv error");
                    break;
                }
            }
        }
    };

    let write = async {
        while let Some(frame) = pending.recv().await {
            if let Err(e) = conn.send(&frame).await {
                tracing::debug!(connection = %id, error = %e, "send error");
                break;
            }
        }
    };

    tokio::select! {
        () = read => {}
        () = write => {}
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(connection = %id, error = %e, "close failed");
    }
}
