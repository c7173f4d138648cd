//! Client Integration Tests
//!
//! Runs the client against an in-process WebSocket server over loopback.
//!
//! Run with: cargo test -p integration-tests --test client_tests

use std::time::Duration;

use chat_client::{ChatClient, ClientError, ConnectionEvent, ConnectionState, TransportError};
use chat_common::AutoReconnectConfig;
use chat_core::Message;
use integration_tests::*;
use serde_json::json;
use tokio::net::TcpListener;

async fn next_event(
    events: &mut tokio::sync::broadcast::Receiver<ConnectionEvent>,
) -> ConnectionEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("event channel closed")
}

// ============================================================================
// Outbound
// ============================================================================

#[tokio::test]
async fn test_send_public_reaches_server() {
    let mut server = TestServer::start().await.unwrap();
    let client = ChatClient::new(server.client_config()).unwrap();

    connect(&client).await.unwrap();
    server.expect_connected().await.unwrap();

    client.send_public("hello").unwrap();
    assert_eq!(
        server.expect_frame().await.unwrap(),
        json!({"type": "PUBLIC", "payload": {"text": "hello"}})
    );
}

#[tokio::test]
async fn test_send_private_reaches_server() {
    let mut server = TestServer::start().await.unwrap();
    let client = ChatClient::new(server.client_config()).unwrap();
    connect(&client).await.unwrap();

    let to = unique_user();
    client.send_private("psst", to.clone()).unwrap();
    assert_eq!(
        server.expect_frame().await.unwrap(),
        json!({"type": "PRIVATE", "payload": {"text": "psst", "to": to}})
    );
}

#[tokio::test]
async fn test_send_before_open_is_delivered_first() {
    let mut server = TestServer::start().await.unwrap();
    let client = ChatClient::new(server.client_config()).unwrap();

    client.connect();
    client.send_public("early").unwrap();
    client.wait_until_connected().await.unwrap();
    client.send_public("late").unwrap();

    assert_eq!(
        server.expect_frame().await.unwrap()["payload"]["text"],
        "early"
    );
    assert_eq!(
        server.expect_frame().await.unwrap()["payload"]["text"],
        "late"
    );
}

#[tokio::test]
async fn test_keepalive_ping_on_the_wire() {
    let mut server = TestServer::start().await.unwrap();
    let mut config = server.client_config();
    config.keepalive.interval = Duration::from_millis(200);
    let client = ChatClient::new(config).unwrap();
    connect(&client).await.unwrap();

    assert_eq!(
        server.expect_frame().await.unwrap(),
        json!({"type": "PING", "payload": {}})
    );
}

// ============================================================================
// Inbound
// ============================================================================

#[tokio::test]
async fn test_inbound_messages_are_delivered() {
    let mut server = TestServer::start().await.unwrap();
    let client = ChatClient::new(server.client_config()).unwrap();
    let mut inbox = collect_messages(&client);

    connect(&client).await.unwrap();
    let session = server.expect_connected().await.unwrap();

    server.send_text(session, public_frame("hi all"));
    server.send_text(session, private_frame("just you", "me"));

    assert_eq!(
        next_message(&mut inbox).await.unwrap(),
        Message::public("hi all")
    );
    assert_eq!(
        next_message(&mut inbox).await.unwrap(),
        Message::private("just you", "me")
    );
}

#[tokio::test]
async fn test_undecodable_frames_are_skipped() {
    let mut server = TestServer::start().await.unwrap();
    let client = ChatClient::new(server.client_config()).unwrap();
    let mut inbox = collect_messages(&client);

    connect(&client).await.unwrap();
    let session = server.expect_connected().await.unwrap();

    server.send_text(session, "definitely not json");
    server.send_text(session, r#"{"type":"SHOUT","payload":{}}"#);
    server.send_text(session, ping_frame());

    assert_eq!(next_message(&mut inbox).await.unwrap(), Message::ping());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_relay_between_clients() {
    let mut server = TestServer::start_relay().await.unwrap();
    let alice = ChatClient::new(server.client_config()).unwrap();
    let bob = ChatClient::new(server.client_config()).unwrap();
    let mut bob_inbox = collect_messages(&bob);

    connect(&alice).await.unwrap();
    server.expect_connected().await.unwrap();
    connect(&bob).await.unwrap();
    server.expect_connected().await.unwrap();

    alice.send_public("hello bob").unwrap();
    assert_eq!(
        next_message(&mut bob_inbox).await.unwrap(),
        Message::public("hello bob")
    );
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_quit_sends_quit_and_closes_normally() {
    let mut server = TestServer::start().await.unwrap();
    let client = ChatClient::new(server.client_config()).unwrap();
    connect(&client).await.unwrap();

    client.quit(Some("bye")).unwrap();

    assert_eq!(
        server.expect_frame().await.unwrap(),
        json!({"type": "QUIT", "payload": {"reason": "bye"}})
    );
    assert_eq!(
        server.expect_closed().await.unwrap(),
        (Some(1000), "bye".to_string())
    );

    tokio::time::timeout(WAIT, client.wait_until_disconnected())
        .await
        .unwrap();
    assert_eq!(
        client.send_public("after quit"),
        Err(chat_client::SendError::NotConnected)
    );
}

#[tokio::test]
async fn test_server_close_is_reported() {
    let mut server = TestServer::start().await.unwrap();
    let client = ChatClient::new(server.client_config()).unwrap();
    let mut events = client.events();

    connect(&client).await.unwrap();
    let session = server.expect_connected().await.unwrap();
    assert_eq!(next_event(&mut events).await, ConnectionEvent::Opened);

    server.close_session(session, 1001, "restart");
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::Closed {
            code: Some(1001),
            reason: "restart".into()
        }
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_auto_reconnect_after_drop() {
    let mut server = TestServer::start().await.unwrap();
    let mut config = server.client_config();
    config.auto_reconnect = AutoReconnectConfig {
        enabled: true,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(500),
        backoff_factor: 2.0,
    };
    let client = ChatClient::new(config).unwrap();
    let mut events = client.events();

    connect(&client).await.unwrap();
    let first = server.expect_connected().await.unwrap();
    assert_eq!(next_event(&mut events).await, ConnectionEvent::Opened);

    server.drop_session(first);
    assert!(next_event(&mut events).await.is_closed());
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled { attempt: 1, .. }
    ));

    // Sent while down, delivered on the new session
    client.send_public("while away").unwrap();

    let second = server.expect_connected().await.unwrap();
    assert_ne!(first, second);
    assert_eq!(next_event(&mut events).await, ConnectionEvent::Opened);
    assert_eq!(
        server.expect_frame().await.unwrap()["payload"]["text"],
        "while away"
    );
}

#[tokio::test]
async fn test_connect_refused() {
    // Grab a free port, then release it so nothing listens there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        ChatClient::new(chat_common::ClientConfig::with_url(format!("ws://{addr}/websock")))
            .unwrap();
    client.connect();

    let err = tokio::time::timeout(WAIT, client.wait_until_connected())
        .await
        .unwrap()
        .unwrap_err();
    assert!(
        matches!(err, ClientError::Transport(TransportError::Connect(_))),
        "{err:?}"
    );
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
