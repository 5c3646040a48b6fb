//! Integration tests for `Node`: real WebSocket servers and clients
//! exchanging commands, messages, and requests.

use std::sync::Mutex;
use std::time::Duration;

use hopwire::prelude::*;
use serde::{Deserialize, Serialize};

// =========================================================================
// Payloads and event log
// =========================================================================

/// Handlers run on dispatch tasks, so they record into a global log.
/// Every test uses its own text so parallel tests don't collide.
static EVENTS: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn record(event: String) {
    EVENTS.lock().unwrap().push(event);
}

fn count(event: &str) -> usize {
    EVENTS.lock().unwrap().iter().filter(|e| *e == event).count()
}

async fn wait_for(event: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while count(event) == 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {event}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Debug, Default)]
struct Kick;

impl Payload for Kick {}

impl Command for Kick {
    fn on_received(&self) {
        record("kick".into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Chat {
    text: String,
}

impl Chat {
    fn new(text: &str) -> Self {
        Self { text: text.into() }
    }
}

impl Payload for Chat {}

impl Message for Chat {
    fn on_received(&self) {
        record(format!("chat:{}", self.text));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Echo {
    text: String,
}

impl Payload for Echo {}

impl Request for Echo {
    type Reply = Echoed;

    fn on_request_received(&self) -> Echoed {
        record(format!("echo:{}", self.text));
        Echoed {
            text: self.text.to_uppercase(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Echoed {
    text: String,
}

impl Reply for Echoed {
    fn on_reply_received(&self) {
        record(format!("echoed:{}", self.text));
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn register(node: &mut Node) {
    let dispatcher = node.dispatcher_mut();
    dispatcher.register_command::<Kick>();
    dispatcher.register_message::<Chat>();
    dispatcher.register_request_reply::<Echo>();
}

/// Starts a dedicated server on an ephemeral port.
async fn start_server() -> (NodeHandle, String) {
    let mut node = Node::builder().bind("127.0.0.1:0").build().await.unwrap();
    register(&mut node);
    let url = format!("ws://{}", node.local_addr().unwrap());
    let handle = node.handle();
    tokio::spawn(node.run());
    (handle, url)
}

/// Connects a client. Its server connection is usable as soon as `run`
/// is spawned.
async fn start_client(url: &str) -> NodeHandle {
    let mut node = Node::builder().connect(url).build().await.unwrap();
    register(&mut node);
    let handle = node.handle();
    tokio::spawn(node.run());
    handle
}

async fn wait_for_peers(handle: &NodeHandle, peers: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let attached = handle
            .invoke(|_, transport| transport.peer_count())
            .await
            .unwrap();
        if attached >= peers {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {peers} peers"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_client_message_reaches_server() {
    let (_server, url) = start_server().await;
    let client = start_client(&url).await;

    client
        .invoke(|dispatcher, transport| {
            dispatcher.send_message(transport, &Chat::new("up-1"), Destination::SERVER)
        })
        .await
        .unwrap()
        .unwrap();

    wait_for("chat:up-1").await;
    assert_eq!(count("chat:up-1"), 1);
}

#[tokio::test]
async fn test_client_sends_immediately_after_run() {
    let (_server, url) = start_server().await;
    let mut node = Node::builder().connect(&url).build().await.unwrap();
    register(&mut node);
    let client = node.handle();
    tokio::spawn(node.run());

    let (attached, sent) = client
        .invoke(|dispatcher, transport| {
            let attached = transport.server_connection().is_some();
            let sent = dispatcher.send_message(transport, &Chat::new("early-1"), Destination::SERVER);
            (attached, sent)
        })
        .await
        .unwrap();

    assert!(attached, "server connection not attached");
    assert!(sent.is_ok());
    wait_for("chat:early-1").await;
    assert_eq!(count("chat:early-1"), 1);
}

#[tokio::test]
async fn test_server_message_reaches_client() {
    let (server, url) = start_server().await;
    let _client = start_client(&url).await;
    wait_for_peers(&server, 1).await;

    server
        .invoke(|dispatcher, transport| {
            dispatcher.send_message(transport, &Chat::new("down-1"), Destination::CLIENTS)
        })
        .await
        .unwrap()
        .unwrap();

    wait_for("chat:down-1").await;
    assert_eq!(count("chat:down-1"), 1);
}

#[tokio::test]
async fn test_request_is_answered_over_the_wire() {
    let (_server, url) = start_server().await;
    let client = start_client(&url).await;

    client
        .invoke(|dispatcher, transport| {
            let echo = Echo {
                text: "ping-7".into(),
            };
            dispatcher.send_request(transport, &echo, Destination::SERVER)
        })
        .await
        .unwrap()
        .unwrap();

    wait_for("echoed:PING-7").await;
    assert_eq!(count("echo:ping-7"), 1);
    assert_eq!(count("echoed:PING-7"), 1);
}

#[tokio::test]
async fn test_server_relays_between_clients() {
    let (server, url) = start_server().await;
    let alice = start_client(&url).await;
    let _bob = start_client(&url).await;
    wait_for_peers(&server, 2).await;

    alice
        .invoke(|dispatcher, transport| {
            dispatcher.send_message(transport, &Chat::new("relay-1"), Destination::CLIENTS)
        })
        .await
        .unwrap()
        .unwrap();

    // Alice runs her own message; Bob gets the relayed copy.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while count("chat:relay-1") < 2 {
        assert!(tokio::time::Instant::now() < deadline, "relay timed out");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(count("chat:relay-1"), 2);
}

#[tokio::test]
async fn test_targeted_command_from_client_is_rejected() {
    let (_server, url) = start_server().await;
    let client = start_client(&url).await;

    let result = client
        .invoke(|dispatcher, transport| {
            let server = transport.server_connection().unwrap();
            dispatcher.send_command_to(transport, &Kick, server)
        })
        .await
        .unwrap();

    assert!(matches!(result, Err(DispatchError::NotServer)));
}

#[tokio::test]
async fn test_host_runs_loopback_target_locally() {
    let mut node = Node::builder().host("127.0.0.1:0").build().await.unwrap();
    register(&mut node);
    assert_eq!(node.role(), Role::HOST);
    let handle = node.handle();
    tokio::spawn(node.run());

    let sent = handle
        .invoke(|dispatcher, transport| {
            dispatcher.send_message_to(transport, &Chat::new("self-1"), LOOPBACK)
        })
        .await
        .unwrap();

    assert!(sent.is_ok());
    assert_eq!(count("chat:self-1"), 1);
}

#[tokio::test]
async fn test_invoke_after_shutdown_fails() {
    let (server, _url) = start_server().await;

    server.shutdown();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while server.is_running() {
        assert!(tokio::time::Instant::now() < deadline, "shutdown timed out");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let result = server.invoke(|_, _| ()).await;
    assert!(matches!(result, Err(HopwireError::Stopped)));
}

#[tokio::test]
async fn test_build_without_role_fails() {
    let result = Node::builder().build().await;
    assert!(matches!(result, Err(HopwireError::NoRole)));
}

#[tokio::test]
async fn test_overlapping_channels_fail_build() {
    let config = DispatchConfig {
        channels: ChannelIds {
            command: ChannelIds::MESSAGE,
            ..ChannelIds::default()
        },
        ..DispatchConfig::default()
    };

    let result = Node::builder()
        .bind("127.0.0.1:0")
        .config(config)
        .build()
        .await;

    assert!(matches!(
        result,
        Err(HopwireError::Dispatch(DispatchError::InvalidConfig(_)))
    ));
}
