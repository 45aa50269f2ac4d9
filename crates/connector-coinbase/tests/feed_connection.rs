mod support;

use std::sync::Arc;
use std::time::Duration;

use connector_coinbase::{FeedConnection, SubscribeRequest};
use connector_core::{
    create_message_channel, ConnectionEvent, ConnectionState, ConnectorError, Frame,
};
use model::FeedEvent;
use support::*;

fn connection(transport: &Arc<MockTransport>, products: &[&str]) -> FeedConnection {
    FeedConnection::with_transport(config(products), credentials(), transport.clone())
        .with_clock(counting_clock())
}

fn sent_json(transport: &MockTransport, index: usize) -> serde_json::Value {
    serde_json::from_str(&transport.sent_texts()[index]).unwrap()
}

#[tokio::test]
async fn test_start_subscribes_and_delivers_messages() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let connection = connection(&transport, &["BTC-USD", "ETH-USD"]);
    let (tx, mut rx) = create_message_channel(16);

    assert!(connection.is_stopped());
    assert_eq!(connection.state(), ConnectionState::Idle);

    connection.start(tx).await.unwrap();
    assert!(!connection.is_stopped());
    assert_eq!(connection.state(), ConnectionState::Subscribed);

    let subscribe = sent_json(&transport, 0);
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(subscribe["channel"], "level2");
    assert_eq!(subscribe["product_ids"], serde_json::json!(["BTC-USD", "ETH-USD"]));
    assert_eq!(subscribe["api_key"], "test-key");
    assert_eq!(subscribe["timestamp"], "1700000000");

    feed.send(text(&subscriptions_frame(&["BTC-USD", "ETH-USD"])))
        .unwrap();
    let message = rx.recv().await.unwrap();
    assert!(matches!(message.events[0], FeedEvent::Subscription { .. }));
    assert_eq!(connection.state(), ConnectionState::Listening);

    connection.close().await;
    assert!(connection.is_stopped());
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(transport.closes(), 1);
    assert!(connection.last_error().is_none());
}

#[tokio::test]
async fn test_reconnects_once_per_transport_error_with_fresh_signature() {
    let transport = MockTransport::new();
    let first = transport.add_session();
    let _second = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    first
        .send(Err(ConnectorError::Transport("connection reset".into())))
        .unwrap();

    wait_until(|| transport.sent_texts().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(transport.connects(), 2);
    assert_eq!(transport.sent_texts().len(), 2);
    assert_eq!(transport.closes(), 1);

    let products = vec!["BTC-USD".to_string()];
    for (index, timestamp) in ["1700000000", "1700000001"].iter().enumerate() {
        let expected = SubscribeRequest::signed(&credentials(), "level2", &products, timestamp);
        assert_eq!(
            sent_json(&transport, index),
            serde_json::to_value(&expected).unwrap()
        );
    }
    assert_ne!(
        sent_json(&transport, 0)["signature"],
        sent_json(&transport, 1)["signature"]
    );

    assert_eq!(
        connection.last_error(),
        Some(ConnectorError::Transport("connection reset".into()))
    );
    assert_eq!(connection.metrics().reconnect_attempts(), 1);
    assert_eq!(connection.metrics().reconnect_successes(), 1);
    assert!(!connection.is_stopped());

    connection.close().await;
}

#[tokio::test]
async fn test_server_close_reconnects_and_reports_lifecycle() {
    let transport = MockTransport::new();
    let first = transport.add_session();
    let _second = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let mut lifecycle = connection.subscribe_lifecycle();
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    first.send(Ok(Frame::Close(Some("going away".into())))).unwrap();

    wait_until(|| transport.connects() == 2 && transport.sent_texts().len() == 2).await;
    connection.close().await;

    let mut events = Vec::new();
    while let Ok(event) = lifecycle.try_recv() {
        events.push(event);
    }

    assert!(events.contains(&ConnectionEvent::Subscribed { attempt: 0 }));
    assert!(events.contains(&ConnectionEvent::Reconnecting {
        attempt: 1,
        delay: Duration::from_millis(10),
    }));
    assert!(events.contains(&ConnectionEvent::Subscribed { attempt: 1 }));
    assert!(events.contains(&ConnectionEvent::StateChanged(ConnectionState::Closing)));
    assert_eq!(events.last(), Some(&ConnectionEvent::Closed));
}

#[tokio::test]
async fn test_peer_disconnect_triggers_reconnect() {
    let transport = MockTransport::new();
    let first = transport.add_session();
    let _second = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    drop(first);

    wait_until(|| transport.sent_texts().len() == 2).await;
    assert!(matches!(
        connection.last_error(),
        Some(ConnectorError::Transport(_))
    ));

    connection.close().await;
}

#[tokio::test]
async fn test_close_while_blocked_returns_promptly() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();

    // The reader never yields a frame; close must not wait for one.
    tokio::time::timeout(Duration::from_millis(500), connection.close())
        .await
        .expect("close blocked on a pending receive");

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(transport.closes(), 1);
    assert_eq!(transport.connects(), 1);

    tokio::time::timeout(Duration::from_millis(500), connection.close())
        .await
        .expect("second close blocked");
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn test_close_is_not_held_up_by_a_stalled_ping() {
    let transport = MockTransport::with_stalled_pings();
    let _feed = transport.add_session();
    let mut config = config(&["BTC-USD"]);
    config.keepalive_interval = Duration::from_millis(10);
    let connection = FeedConnection::with_transport(config, credentials(), transport.clone());
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    // Let the keepalive task get stuck inside a ping.
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_millis(500), connection.close())
        .await
        .expect("close blocked behind a pending ping");

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(transport.closes(), 1);
    assert_eq!(transport.pings(), 0);
    assert_eq!(connection.metrics().pings_sent(), 0);
}

#[tokio::test]
async fn test_close_before_start_prevents_start() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, _rx) = create_message_channel(16);

    connection.close().await;
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(connection.is_stopped());

    let err = connection.start(tx).await.unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn test_close_during_reconnect_attempts() {
    let transport = MockTransport::new();
    let first = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    first
        .send(Err(ConnectorError::Transport("reset".into())))
        .unwrap();

    // No more sessions queued: every reconnect is refused and retried.
    wait_until(|| transport.connects() >= 3).await;
    assert!(matches!(
        connection.last_error(),
        Some(ConnectorError::Connect(_))
    ));

    tokio::time::timeout(Duration::from_millis(500), connection.close())
        .await
        .expect("close blocked during reconnect");
    assert!(connection.is_stopped());
    assert_eq!(connection.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_decode_error_does_not_stop_loop() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, mut rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();

    feed.send(text("{definitely not json")).unwrap();
    feed.send(text(r#"{"type":"error","message":"bad product"}"#))
        .unwrap();
    feed.send(text(&book_frame(
        "snapshot",
        "BTC-USD",
        1,
        &[("bid", "100.00", "1.5")],
    )))
    .unwrap();

    let message = rx.recv().await.unwrap();
    assert_eq!(message.sequence_num, Some(1));
    assert_eq!(message.events[0].instrument(), Some("BTC-USD"));

    assert_eq!(transport.connects(), 1);
    assert_eq!(connection.metrics().decode_errors(), 2);
    assert_eq!(connection.metrics().frames_received(), 3);
    assert_eq!(
        connection.last_error(),
        Some(ConnectorError::Rejected("bad product".into()))
    );
    assert!(!connection.is_stopped());

    connection.close().await;
}

#[tokio::test]
async fn test_initial_connect_failure_is_reported() {
    let transport = MockTransport::new();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, _rx) = create_message_channel(16);

    let err = connection.start(tx).await.unwrap_err();
    assert!(matches!(err, ConnectorError::Connect(_)));
    assert_eq!(transport.connects(), 1);
    assert!(connection.is_stopped());
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(connection.last_error(), Some(err));

    // Nothing to join.
    connection.close().await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_connecting() {
    let transport = MockTransport::new();
    let connection = connection(&transport, &[]);
    let (tx, _rx) = create_message_channel(16);

    let err = connection.start(tx).await.unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);

    let (tx, _rx) = create_message_channel(16);
    connection.start(tx).await.unwrap();

    let (tx2, _rx2) = create_message_channel(16);
    assert!(connection.start(tx2).await.unwrap_err().is_config_error());
    assert_eq!(transport.connects(), 1);

    connection.close().await;
}

#[tokio::test]
async fn test_keepalive_pings_until_close() {
    let transport = MockTransport::new();
    let _feed = transport.add_session();
    let mut config = config(&["BTC-USD"]);
    config.keepalive_interval = Duration::from_millis(20);
    let connection = FeedConnection::with_transport(config, credentials(), transport.clone());
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    wait_until(|| transport.pings() >= 2).await;

    connection.close().await;
    let pings = transport.pings();
    assert_eq!(connection.metrics().pings_sent() as usize, pings);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(transport.pings(), pings);
}

#[tokio::test]
async fn test_ping_is_answered() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, _rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    feed.send(Ok(Frame::Ping(b"hello".to_vec()))).unwrap();

    wait_until(|| !transport.recorder.lock().pongs.is_empty()).await;
    assert_eq!(transport.recorder.lock().pongs[0], b"hello".to_vec());

    connection.close().await;
}

#[tokio::test]
async fn test_dropped_receiver_stops_connection() {
    let transport = MockTransport::new();
    let feed = transport.add_session();
    let connection = connection(&transport, &["BTC-USD"]);
    let (tx, rx) = create_message_channel(16);

    connection.start(tx).await.unwrap();
    drop(rx);
    feed.send(text(&subscriptions_frame(&["BTC-USD"]))).unwrap();

    wait_until(|| connection.state() == ConnectionState::Closed).await;
    assert!(connection.is_stopped());
    assert_eq!(connection.last_error(), Some(ConnectorError::ChannelClosed));
    assert_eq!(transport.connects(), 1);

    connection.close().await;
}
