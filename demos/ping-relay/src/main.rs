use std::time::Duration;

use hopwire::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Rings the server's bell. No body.
#[derive(Default)]
struct Ring;

impl Payload for Ring {}

impl Command for Ring {
    fn on_received(&self) {
        tracing::info!("ding");
    }
}

#[derive(Serialize, Deserialize)]
struct Chat {
    from: String,
    text: String,
}

impl Payload for Chat {}

impl Message for Chat {
    fn on_received(&self) {
        tracing::info!(from = %self.from, "chat: {}", self.text);
    }
}

#[derive(Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

impl Payload for Ping {}

impl Request for Ping {
    type Reply = Pong;

    fn on_request_received(&self) -> Pong {
        tracing::info!(seq = self.seq, "ping");
        Pong { seq: self.seq }
    }
}

#[derive(Serialize, Deserialize)]
struct Pong {
    seq: u32,
}

impl Reply for Pong {
    fn on_reply_received(&self) {
        tracing::info!(seq = self.seq, "pong");
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

fn register(node: &mut Node) {
    let dispatcher = node.dispatcher_mut();
    dispatcher.register_command::<Ring>();
    dispatcher.register_message::<Chat>();
    dispatcher.register_request_reply::<Ping>();
}

async fn start(builder: NodeBuilder) -> Result<(NodeHandle, Option<String>), HopwireError> {
    let mut node = builder.build().await?;
    register(&mut node);
    let url = node.local_addr().map(|addr| format!("ws://{addr}"));
    let handle = node.handle();
    tokio::spawn(async move {
        if let Err(e) = node.run().await {
            tracing::error!(error = %e, "node failed");
        }
    });
    Ok((handle, url))
}

async fn wait_for_peers(handle: &NodeHandle, peers: usize) -> Result<(), HopwireError> {
    while handle.invoke(|_, transport| transport.peer_count()).await? < peers {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let bind = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:0".to_string());
    let (server, url) = start(Node::builder().bind(&bind)).await?;
    let url = url.ok_or("server has no local address")?;
    tracing::info!(%url, "server listening");

    let (alice, _) = start(Node::builder().connect(&url)).await?;
    let (bob, _) = start(Node::builder().connect(&url)).await?;
    wait_for_peers(&server, 2).await?;

    // Alice talks to every client: she runs it herself, the server relays
    // it to Bob.
    alice
        .invoke(|dispatcher, transport| {
            let chat = Chat {
                from: "alice".into(),
                text: "anyone up for a round?".into(),
            };
            dispatcher.send_message(transport, &chat, Destination::CLIENTS)
        })
        .await??;

    // Bob rings the server only.
    bob.invoke(|dispatcher, transport| {
        dispatcher.send_command(transport, &Ring, Destination::SERVER)
    })
    .await??;

    // Alice pings the server and gets one pong back.
    alice
        .invoke(|dispatcher, transport| {
            dispatcher.send_request(transport, &Ping { seq: 1 }, Destination::SERVER)
        })
        .await??;

    // The server pings everyone. It answers itself, each client answers
    // the server, and the server relays each client's pong to the other.
    server
        .invoke(|dispatcher, transport| {
            dispatcher.send_request(transport, &Ping { seq: 2 }, Destination::ALL)
        })
        .await??;

    tokio::time::sleep(Duration::from_millis(200)).await;
    server.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tracing::info!("done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pong_echoes_sequence_number() {
        let pong = Ping { seq: 41 }.on_request_received();
        assert_eq!(pong.seq, 41);
    }

    #[tokio::test]
    async fn test_client_chat_is_sent() {
        let (server, url) = start(Node::builder().bind("127.0.0.1:0")).await.unwrap();
        let url = url.unwrap();
        let (alice, _) = start(Node::builder().connect(&url)).await.unwrap();
        let (bob, _) = start(Node::builder().connect(&url)).await.unwrap();
        wait_for_peers(&server, 2).await.unwrap();

        let sent = alice
            .invoke(|dispatcher, transport| {
                let chat = Chat {
                    from: "alice".into(),
                    text: "gg".into(),
                };
                dispatcher.send_message(transport, &chat, Destination::CLIENTS)
            })
            .await
            .unwrap();

        assert!(sent.is_ok());
        server.shutdown();
    }
}
