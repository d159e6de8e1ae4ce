//! Test helpers for integration tests
//!
//! Spawns gateway servers on ephemeral ports and connects node clients to them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use futures_util::{SinkExt, StreamExt};
use nova_common::HeartbeatConfig;
use nova_gateway::protocol::NodeMessage;
use nova_gateway::server::{create_app, serve, GatewayState};
use nova_gateway::NodeGateway;
use reqwest::{Client, Response};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// WebSocket client acting as a node
pub type NodeClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for something it expects to happen
pub const EVENTUALLY: Duration = Duration::from_secs(5);

/// Test server instance that manages lifecycle
pub struct TestGateway {
    pub addr: SocketAddr,
    pub gateway: Arc<NodeGateway>,
    pub client: Client,
    handle: JoinHandle<()>,
}

impl TestGateway {
    /// Start a gateway with default heartbeat settings
    pub async fn start() -> Result<Self> {
        Self::start_with(HeartbeatConfig::default()).await
    }

    /// Start a gateway with custom heartbeat settings
    pub async fn start_with(heartbeat: HeartbeatConfig) -> Result<Self> {
        Self::start_gateway(NodeGateway::new(heartbeat)?).await
    }

    /// Start serving a prepared gateway
    pub async fn start_gateway(gateway: NodeGateway) -> Result<Self> {
        let gateway = Arc::new(gateway);
        gateway.start();
        let app = create_app(GatewayState::new(gateway.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            serve(listener, app, std::future::pending::<()>()).await.ok();
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            gateway,
            client,
            handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Open a node connection with the given identifier
    pub async fn connect(&self, identifier: &str) -> Result<NodeClient> {
        self.connect_url(&format!("ws://{}/ws?identifier={}", self.addr, identifier))
            .await
    }

    /// Open a WebSocket connection to an arbitrary gateway URL
    pub async fn connect_url(&self, url: &str) -> Result<NodeClient> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(ws)
    }

    /// HTTP status of a rejected upgrade, or `None` if the upgrade succeeded
    pub async fn rejected_status(&self, url: &str) -> Option<u16> {
        match tokio_tungstenite::connect_async(url).await {
            Ok(_) => None,
            Err(tungstenite::Error::Http(response)) => Some(response.status().as_u16()),
            Err(e) => panic!("unexpected connect error: {e}"),
        }
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Local address of a node client, i.e. what the gateway sees as remote
pub fn local_addr(ws: &NodeClient) -> Result<SocketAddr> {
    match ws.get_ref() {
        MaybeTlsStream::Plain(stream) => Ok(stream.local_addr()?),
        _ => bail!("unexpected TLS stream"),
    }
}

/// Send a message as a node
pub async fn send_message(ws: &mut NodeClient, message: &NodeMessage) -> Result<()> {
    ws.send(Message::Text(message.to_json()?)).await?;
    Ok(())
}

/// Wait for the next JSON message, skipping control frames
pub async fn next_message(ws: &mut NodeClient) -> Result<NodeMessage> {
    tokio::time::timeout(EVENTUALLY, async {
        while let Some(frame) = ws.next().await {
            match frame? {
                Message::Text(text) => return Ok(NodeMessage::from_json(&text)?),
                Message::Close(frame) => bail!("connection closed: {frame:?}"),
                _ => {}
            }
        }
        bail!("stream ended")
    })
    .await?
}

/// Wait for the close frame sent by the gateway and return its code
pub async fn next_close_code(ws: &mut NodeClient) -> Result<u16> {
    tokio::time::timeout(EVENTUALLY, async {
        while let Some(frame) = ws.next().await {
            match frame? {
                Message::Close(Some(frame)) => return Ok(u16::from(frame.code)),
                Message::Close(None) => bail!("close frame without code"),
                _ => {}
            }
        }
        bail!("stream ended without close frame")
    })
    .await?
}

/// Keep reading a client in the background so it answers heartbeat pings
pub fn keep_reading(mut ws: NodeClient) -> JoinHandle<()> {
    tokio::spawn(async move { while let Some(Ok(_)) = ws.next().await {} })
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
