//! Payload types and an event log shared by the dispatch tests.
//!
//! Handlers record `(node, event)` pairs into a thread-local log. Each
//! test runs on its own thread, so logs never leak between tests. The
//! "current node" is set by whoever is about to drive a dispatcher, so a
//! multi-node test can tell which process executed what.

#![allow(dead_code)]

use std::cell::RefCell;

use hopwire_dispatch::Dispatcher;
use hopwire_protocol::{Command, JsonCodec, Message, Payload, Reply, Request, TypeCode};
use serde::{Deserialize, Serialize};

thread_local! {
    static NODE: RefCell<&'static str> = const { RefCell::new("local") };
    static EVENTS: RefCell<Vec<(&'static str, String)>> = const { RefCell::new(Vec::new()) };
}

/// Sets the node that subsequent handler calls are attributed to.
pub fn set_node(name: &'static str) {
    NODE.with(|n| *n.borrow_mut() = name);
}

fn record(event: String) {
    let node = NODE.with(|n| *n.borrow());
    EVENTS.with(|e| e.borrow_mut().push((node, event)));
}

/// Every recorded `(node, event)` pair, in order.
pub fn events() -> Vec<(&'static str, String)> {
    EVENTS.with(|e| e.borrow().clone())
}

/// How many times `node` recorded `event`.
pub fn count(node: &str, event: &str) -> usize {
    EVENTS.with(|e| {
        e.borrow()
            .iter()
            .filter(|(n, ev)| *n == node && ev == event)
            .count()
    })
}

/// How many times any node recorded `event`.
pub fn total(event: &str) -> usize {
    EVENTS.with(|e| e.borrow().iter().filter(|(_, ev)| ev == event).count())
}

/// Events recorded by `node`, in order.
pub fn events_of(node: &str) -> Vec<String> {
    EVENTS.with(|e| {
        e.borrow()
            .iter()
            .filter(|(n, _)| *n == node)
            .map(|(_, ev)| ev.clone())
            .collect()
    })
}

// =========================================================================
// Payloads
// =========================================================================

#[derive(Debug, Default)]
pub struct Ping;

impl Payload for Ping {}

impl Command for Ping {
    fn on_received(&self) {
        record("ping".into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub text: String,
}

impl Chat {
    pub fn new(text: &str) -> Self {
        Self { text: text.into() }
    }
}

impl Payload for Chat {}

impl Message for Chat {
    fn on_received(&self) {
        record(format!("chat:{}", self.text));
    }
}

/// Registered only on some nodes in relay tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Whisper {
    pub text: String,
}

impl Payload for Whisper {}

impl Message for Whisper {
    fn on_received(&self) {
        record(format!("whisper:{}", self.text));
    }
}

/// Claims `Chat`'s type code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatImpostor {
    pub text: String,
}

impl Payload for ChatImpostor {
    fn type_code() -> TypeCode {
        Chat::type_code()
    }
}

impl Message for ChatImpostor {
    fn on_received(&self) {
        record(format!("impostor:{}", self.text));
    }
}

/// A message whose body never encodes.
#[derive(Debug, Deserialize)]
pub struct Unencodable;

impl Serialize for Unencodable {
    fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("refuses to encode"))
    }
}

impl Payload for Unencodable {}

impl Message for Unencodable {
    fn on_received(&self) {
        record("unencodable".into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Add {
    pub a: i64,
    pub b: i64,
}

impl Payload for Add {}

impl Request for Add {
    type Reply = Sum;

    fn on_request_received(&self) -> Sum {
        record(format!("add:{}+{}", self.a, self.b));
        Sum(self.a + self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sum(pub i64);

impl Reply for Sum {
    fn on_reply_received(&self) {
        record(format!("sum:{}", self.0));
    }
}

/// A dispatcher with `Ping`, `Chat` and `Add` registered and no role
/// handlers installed yet.
pub fn dispatcher() -> Dispatcher<JsonCodec> {
    let mut dispatcher = Dispatcher::new(JsonCodec);
    assert!(dispatcher.register_command::<Ping>());
    assert!(dispatcher.register_message::<Chat>());
    assert!(dispatcher.register_request_reply::<Add>());
    dispatcher
}

/// A dispatcher acting as a dedicated server.
pub fn server_dispatcher() -> Dispatcher<JsonCodec> {
    let mut dispatcher = dispatcher();
    dispatcher.on_server_started();
    dispatcher
}

/// A dispatcher acting as a remote client.
pub fn client_dispatcher() -> Dispatcher<JsonCodec> {
    let mut dispatcher = dispatcher();
    dispatcher.on_client_started();
    dispatcher
}
