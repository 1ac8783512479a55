//! # Read-Only HTTP + WebSocket API
//!
//! Builds the axum router that exposes the session's read model. All
//! endpoints share application state through axum's `State` extractor and
//! none of them mutate anything — the presentation boundary is strictly
//! one-way.
//!
//! ## Endpoints
//!
//! | Method | Path            | Description                              |
//! |--------|-----------------|------------------------------------------|
//! | GET    | `/health`       | Liveness probe                           |
//! | GET    | `/status`       | Session status, error, height, uptime    |
//! | GET    | `/head-changes` | Recent head changes, most recent first   |
//! | GET    | `/ws`           | WebSocket stream of live head changes    |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use headlight_client::{ClientSession, HeadChangeRecord, Network, Status};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The monitor's reported version string.
    pub version: String,
    /// Network the session was configured for.
    pub network: Network,
    /// When this monitor process started, for the uptime field.
    pub started_at: DateTime<Utc>,
    /// The one client session this monitor owns. Handlers only ever call
    /// read methods on it.
    pub session: Arc<ClientSession>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/head-changes", get(head_changes_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Monitor software version.
    pub version: String,
    /// Network identifier the session targets.
    pub network: Network,
    /// Session lifecycle status.
    pub status: Status,
    /// Initialization/subscription failure message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Last polled block height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    /// Number of head changes currently in the bounded log.
    pub recent_head_changes: usize,
    /// Seconds since the monitor process started.
    pub uptime_secs: i64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the monitor is alive.
///
/// Liveness only; whether the engine is connected belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — session status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.session.snapshot();
    state.metrics.observe_view(&view);

    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network,
        status: view.status,
        error_message: view.error_message,
        block_height: view.current_height,
        recent_head_changes: view.head_changes.len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        timestamp: Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /head-changes` — the bounded recent head-change log, most recent
/// first.
async fn head_changes_handler(State(state): State<AppState>) -> impl IntoResponse {
    let records: Vec<HeadChangeRecord> = state.session.snapshot().head_changes;
    Json(records)
}

/// `GET /ws` — WebSocket upgrade for live head-change streaming.
///
/// Clients receive one JSON-encoded [`HeadChangeRecord`] per message. The
/// connection is push-only; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding the session's live
/// feed until the client disconnects or the feed closes.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.session.subscribe_events();

    loop {
        tokio::select! {
            record = rx.recv() => {
                match record {
                    Ok(record) => {
                        let payload = match serde_json::to_string(&record) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize head change: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            // Client disconnected.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} head changes", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {
                        // Push-only channel; inbound messages are ignored.
                    }
                    _ => break, // Disconnected or error.
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use headlight_client::sim::SimulatedEngine;
    use headlight_client::{ClientConfiguration, EngineConnector};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn fast_config() -> ClientConfiguration {
        ClientConfiguration::new()
            .network(Network::DevAlbatross)
            .poll_interval(Duration::from_millis(10))
            .build()
    }

    fn test_app_state(connector: Arc<dyn EngineConnector>) -> AppState {
        let session = Arc::new(ClientSession::new(connector, fast_config()));
        AppState {
            version: "0.1.0-test".into(),
            network: Network::DevAlbatross,
            started_at: Utc::now(),
            session,
            metrics: Arc::new(crate::metrics::MonitorMetrics::new()),
        }
    }

    /// Sends a GET request and returns (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let state = test_app_state(Arc::new(SimulatedEngine::new()));
        let router = create_router(state);
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_endpoint_reports_a_fresh_session() {
        let state = test_app_state(Arc::new(SimulatedEngine::new()));
        let router = create_router(state);
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.status, Status::Initializing);
        assert!(resp.error_message.is_none());
        assert!(resp.block_height.is_none());
        assert_eq!(resp.network, Network::DevAlbatross);
    }

    #[tokio::test]
    async fn status_endpoint_reports_connected_session_with_height() {
        let state = test_app_state(Arc::new(SimulatedEngine::with_tick(
            Duration::from_millis(5),
        )));
        state.session.start().await.unwrap();
        state.session.subscribe_head_changes().await.unwrap();
        state.session.spawn_height_poller().await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let router = create_router(state.clone());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.status, Status::Connected);
        assert!(resp.block_height.is_some());
        assert!(resp.recent_head_changes > 0);
        // The handler also syncs the gauges.
        assert_eq!(state.metrics.engine_connected.get(), 1);

        state.session.stop().await;
    }

    #[tokio::test]
    async fn status_endpoint_surfaces_the_error_slot() {
        let state = test_app_state(Arc::new(SimulatedEngine::failing("network unreachable")));
        state.session.start().await.expect_err("connect fails");

        let router = create_router(state);
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.status, Status::Error);
        assert_eq!(resp.error_message.as_deref(), Some("network unreachable"));
    }

    #[tokio::test]
    async fn head_changes_endpoint_is_empty_before_any_event() {
        let state = test_app_state(Arc::new(SimulatedEngine::new()));
        let router = create_router(state);
        let (status, body) = get(&router, "/head-changes").await;

        assert_eq!(status, StatusCode::OK);
        let records: Vec<HeadChangeRecord> = serde_json::from_slice(&body).unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn head_changes_endpoint_returns_bounded_most_recent_first() {
        let state = test_app_state(Arc::new(SimulatedEngine::with_tick(
            Duration::from_millis(3),
        )));
        state.session.start().await.unwrap();
        state.session.subscribe_head_changes().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        state.session.stop().await;

        let router = create_router(state);
        let (status, body) = get(&router, "/head-changes").await;

        assert_eq!(status, StatusCode::OK);
        let records: Vec<HeadChangeRecord> = serde_json::from_slice(&body).unwrap();
        assert!(!records.is_empty());
        assert!(records.len() <= 10);
        for pair in records.windows(2) {
            assert!(pair[0].observed_at >= pair[1].observed_at);
        }
    }
}
