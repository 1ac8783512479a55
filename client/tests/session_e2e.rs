//! End-to-end session lifecycle against the simulated engine.
//!
//! These tests drive the full path a deployment takes: connect, subscribe,
//! poll, observe, tear down. The session code sees the same trait surface
//! the real engine would present.

use std::sync::Arc;
use std::time::Duration;

use headlight_client::sim::SimulatedEngine;
use headlight_client::{ClientConfiguration, ClientSession, Network, Status};

fn fast_config() -> ClientConfiguration {
    ClientConfiguration::new()
        .network(Network::DevAlbatross)
        .poll_interval(Duration::from_millis(10))
        .build()
}

#[tokio::test]
async fn full_lifecycle_happy_path() {
    let connector = Arc::new(SimulatedEngine::with_tick(Duration::from_millis(5)));
    let session = ClientSession::new(connector, fast_config());

    session.start().await.expect("connect");
    assert_eq!(session.status(), Status::Connected);

    session.subscribe_head_changes().await.expect("subscribe");
    session.spawn_height_poller().await;

    // Let the chain grow a bit.
    tokio::time::sleep(Duration::from_millis(80)).await;

    let view = session.snapshot();
    assert_eq!(view.status, Status::Connected);
    assert!(view.error_message.is_none());
    assert!(!view.head_changes.is_empty(), "head changes observed");
    assert!(view.head_changes.len() <= 10, "log stays bounded");
    assert!(view.current_height.is_some(), "height polled");

    // Most-recent-first: observation timestamps never increase down the list.
    for pair in view.head_changes.windows(2) {
        assert!(pair[0].observed_at >= pair[1].observed_at);
    }

    session.stop().await;
    assert_eq!(session.status(), Status::Connected, "stop leaves status alone");
}

#[tokio::test]
async fn failed_connect_surfaces_the_engine_message() {
    let connector = Arc::new(SimulatedEngine::failing("network unreachable"));
    let session = ClientSession::new(connector, fast_config());

    session.start().await.expect_err("connect must fail");

    let view = session.snapshot();
    assert_eq!(view.status, Status::Error);
    assert_eq!(view.error_message.as_deref(), Some("network unreachable"));
    assert!(view.head_changes.is_empty());
    assert!(view.current_height.is_none());

    // Teardown of a session that never connected must not blow up.
    session.stop().await;
}

#[tokio::test]
async fn unavailable_context_refuses_to_instantiate() {
    let connector = Arc::new(SimulatedEngine::unavailable());
    let session = ClientSession::new(connector, fast_config());

    session.start().await.expect_err("gate closed");
    assert_eq!(session.status(), Status::Error);
}

#[tokio::test]
async fn snapshot_serializes_for_the_presentation_boundary() {
    let connector = Arc::new(SimulatedEngine::with_tick(Duration::from_millis(5)));
    let session = ClientSession::new(connector, fast_config());
    session.start().await.unwrap();
    session.subscribe_head_changes().await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    session.stop().await;

    let view = session.snapshot();
    let json = serde_json::to_value(&view).expect("view serializes");
    assert_eq!(json["status"], "connected");
    assert!(json["head_changes"].is_array());
    assert!(json.get("error_message").is_none(), "unset slot is omitted");
}
