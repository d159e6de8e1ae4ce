//! Gateway Integration Tests
//!
//! Each test starts its own gateway on an ephemeral port and talks to it with
//! real WebSocket clients.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use integration_tests::{
    keep_reading, local_addr, next_close_code, next_message, send_message, wait_until, TestGateway, EVENTUALLY,
};
use nova_common::HeartbeatConfig;
use nova_gateway::handlers::ControlMessageHandler;
use nova_gateway::protocol::{MessageType, NodeMessage, Payload};
use nova_gateway::NodeGateway;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

fn fast_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        interval_ms: 50,
        max_missed: 2,
        write_timeout_ms: 200,
        outbound_buffer: 16,
    }
}

fn ping() -> NodeMessage {
    NodeMessage::new(MessageType::Ping, Payload::default())
}

// ============================================================================
// HTTP surface
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestGateway::start().await.unwrap();

    let response = server.get("/health").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_missing_identifier_rejected() {
    let server = TestGateway::start().await.unwrap();

    let without = format!("ws://{}/ws", server.addr);
    let blank = format!("ws://{}/ws?identifier=", server.addr);

    assert_eq!(server.rejected_status(&without).await, Some(400));
    assert_eq!(server.rejected_status(&blank).await, Some(400));
    assert_eq!(server.gateway.total_connections(), 0);
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_and_disconnect() {
    let server = TestGateway::start().await.unwrap();
    let gateway = server.gateway.clone();

    let mut ws = server.connect("n1").await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 1).await);
    assert_eq!(gateway.active_node_ids(), vec!["n1".to_string()]);

    ws.close(None).await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 0).await);
    assert!(gateway.active_node_ids().is_empty());
}

#[tokio::test]
async fn test_two_connections_for_one_node() {
    let server = TestGateway::start().await.unwrap();
    let gateway = server.gateway.clone();

    let mut first = server.connect("n1").await.unwrap();
    let _second = server.connect("n1").await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 2).await);
    assert_eq!(gateway.active_node_count(), 1);

    first.close(None).await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 1).await);
    assert_eq!(gateway.active_node_ids(), vec!["n1".to_string()]);
}

// ============================================================================
// Inbound messages
// ============================================================================

#[tokio::test]
async fn test_ping_gets_pong_with_remote_endpoint() {
    let server = TestGateway::start().await.unwrap();
    let mut ws = server.connect("n1").await.unwrap();
    let addr = local_addr(&ws).unwrap();

    send_message(&mut ws, &ping()).await.unwrap();
    let reply = next_message(&mut ws).await.unwrap();

    assert_eq!(reply.kind, MessageType::Pong);
    assert_eq!(reply.payload.message, format!("nova pong from {addr}"));
    assert_eq!(reply.payload.status, "success");
    assert!(reply.timestamp.is_some());
}

#[tokio::test]
async fn test_bad_frames_keep_connection_open() {
    let server = TestGateway::start().await.unwrap();
    let mut ws = server.connect("n1").await.unwrap();

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    ws.send(Message::Text(serde_json::json!({"type": "reboot"}).to_string()))
        .await
        .unwrap();
    ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();

    send_message(&mut ws, &ping()).await.unwrap();
    assert_eq!(next_message(&mut ws).await.unwrap().kind, MessageType::Pong);
    assert_eq!(server.gateway.total_connections(), 1);
}

struct ForwardStatus(mpsc::UnboundedSender<(String, NodeMessage)>);

#[async_trait]
impl ControlMessageHandler for ForwardStatus {
    async fn on_control_message(&self, node_id: &str, message: NodeMessage) {
        let _ = self.0.send((node_id.to_string(), message));
    }
}

#[tokio::test]
async fn test_status_reaches_control_handler() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let gateway = NodeGateway::new(HeartbeatConfig::default()).unwrap().with_control_handler(Arc::new(ForwardStatus(tx)));
    let server = TestGateway::start_gateway(gateway).await.unwrap();
    let mut ws = server.connect("agent-7").await.unwrap();

    let status = NodeMessage::status(Payload::new("cpu", "load 0.93", "warning"));
    send_message(&mut ws, &status).await.unwrap();

    let (node_id, received) = tokio::time::timeout(EVENTUALLY, rx.recv()).await.unwrap().unwrap();
    assert_eq!(node_id, "agent-7");
    assert_eq!(received.kind, MessageType::StatusMsg);
    assert_eq!(received.payload, status.payload);
}

// ============================================================================
// Outbound messages
// ============================================================================

#[tokio::test]
async fn test_broadcast_to_node_and_all() {
    let server = TestGateway::start().await.unwrap();
    let gateway = server.gateway.clone();
    let mut a = server.connect("a").await.unwrap();
    let mut b = server.connect("b").await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 2).await);

    let only_a = NodeMessage::status(Payload::new("restart", "a only", "info"));
    gateway.broadcast_to_node("a", &only_a).await;
    assert_eq!(next_message(&mut a).await.unwrap().payload.message, "a only");
    assert!(tokio::time::timeout(Duration::from_millis(200), next_message(&mut b))
        .await
        .is_err());

    let everyone = NodeMessage::status(Payload::new("notice", "everyone", "info"));
    gateway.broadcast_to_all_nodes(&everyone).await;
    assert_eq!(next_message(&mut a).await.unwrap().payload.message, "everyone");
    assert_eq!(next_message(&mut b).await.unwrap().payload.message, "everyone");
}

#[tokio::test]
async fn test_broadcast_to_unknown_node_is_noop() {
    let server = TestGateway::start().await.unwrap();
    let gateway = server.gateway.clone();
    let _a = server.connect("a").await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 1).await);

    let msg = NodeMessage::status(Payload::new("t", "m", "s"));
    gateway.broadcast_to_node("ghost", &msg).await;

    assert_eq!(gateway.total_connections(), 1);
    assert_eq!(gateway.active_node_ids(), vec!["a".to_string()]);
}

// ============================================================================
// Liveness and shutdown
// ============================================================================

#[tokio::test]
async fn test_silent_node_is_reaped() {
    let server = TestGateway::start_with(fast_heartbeat()).await.unwrap();
    let gateway = server.gateway.clone();

    let alive = server.connect("alive").await.unwrap();
    let _alive = keep_reading(alive);
    // Never reads, so never answers the heartbeat pings
    let _silent = server.connect("silent").await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 2).await);

    assert!(wait_until(EVENTUALLY, || gateway.active_node_ids() == vec!["alive".to_string()]).await);

    // Well past max_missed sweeps, the answering node is still there
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(gateway.active_node_ids(), vec!["alive".to_string()]);
    assert_eq!(gateway.total_connections(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_nodes() {
    let server = TestGateway::start().await.unwrap();
    let gateway = server.gateway.clone();
    let mut a = server.connect("a").await.unwrap();
    let mut b = server.connect("b").await.unwrap();
    assert!(wait_until(EVENTUALLY, || gateway.total_connections() == 2).await);

    gateway.shutdown().await;

    assert_eq!(gateway.total_connections(), 0);
    assert_eq!(next_close_code(&mut a).await.unwrap(), 1001);
    assert_eq!(next_close_code(&mut b).await.unwrap(), 1001);

    let url = format!("ws://{}/ws?identifier=late", server.addr);
    assert_eq!(server.rejected_status(&url).await, Some(503));
    assert_eq!(gateway.total_connections(), 0);
}
