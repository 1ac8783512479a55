//! # Prometheus Metrics
//!
//! Operational metrics for the monitor, scraped at `/metrics` on the
//! configured metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] so they do not
//! collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use headlight_client::{HeadChangeRecord, SessionView, Status};

/// Holds all Prometheus metric handles for the monitor.
///
/// Clone-friendly (prometheus handles wrap `Arc` internally) so it can be
/// shared across request handlers and background tasks.
#[derive(Clone)]
pub struct MonitorMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of head-change notifications observed.
    pub head_changes_total: IntCounter,
    /// Total number of head changes that reverted at least one block.
    pub rebranches_total: IntCounter,
    /// Last block height reported by the engine.
    pub block_height: IntGauge,
    /// 1 while the session is connected, 0 otherwise.
    pub engine_connected: IntGauge,
}

impl MonitorMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("headlight".into()), None)
            .expect("failed to create prometheus registry");

        let head_changes_total = IntCounter::new(
            "head_changes_total",
            "Total number of head-change notifications observed",
        )
        .expect("metric creation");
        registry
            .register(Box::new(head_changes_total.clone()))
            .expect("metric registration");

        let rebranches_total = IntCounter::new(
            "rebranches_total",
            "Total number of head changes that reverted at least one block",
        )
        .expect("metric creation");
        registry
            .register(Box::new(rebranches_total.clone()))
            .expect("metric registration");

        let block_height =
            IntGauge::new("block_height", "Last block height reported by the engine")
                .expect("metric creation");
        registry
            .register(Box::new(block_height.clone()))
            .expect("metric registration");

        let engine_connected = IntGauge::new(
            "engine_connected",
            "Whether the session is currently connected (1) or not (0)",
        )
        .expect("metric creation");
        registry
            .register(Box::new(engine_connected.clone()))
            .expect("metric registration");

        Self {
            registry,
            head_changes_total,
            rebranches_total,
            block_height,
            engine_connected,
        }
    }

    /// Folds one head-change record into the counters.
    pub fn observe_head_change(&self, record: &HeadChangeRecord) {
        self.head_changes_total.inc();
        if !record.reverted_block_hashes.is_empty() {
            self.rebranches_total.inc();
        }
    }

    /// Syncs the gauges from a session snapshot.
    pub fn observe_view(&self, view: &SessionView) {
        self.engine_connected
            .set(if view.status == Status::Connected { 1 } else { 0 });
        if let Some(height) = view.current_height {
            self.block_height.set(height as i64);
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition
    /// format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<MonitorMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(reverted: Vec<String>) -> HeadChangeRecord {
        HeadChangeRecord {
            hash: "aa".into(),
            reason: "extended".into(),
            reverted_block_hashes: reverted,
            adopted_block_hashes: vec!["aa".into()],
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn head_change_counters_distinguish_rebranches() {
        let metrics = MonitorMetrics::new();
        metrics.observe_head_change(&record(vec![]));
        metrics.observe_head_change(&record(vec!["old".into()]));

        assert_eq!(metrics.head_changes_total.get(), 2);
        assert_eq!(metrics.rebranches_total.get(), 1);
    }

    #[test]
    fn view_sync_sets_gauges() {
        let metrics = MonitorMetrics::new();
        let view = SessionView {
            status: Status::Connected,
            error_message: None,
            head_changes: vec![],
            current_height: Some(1234),
        };
        metrics.observe_view(&view);
        assert_eq!(metrics.engine_connected.get(), 1);
        assert_eq!(metrics.block_height.get(), 1234);

        let view = SessionView {
            status: Status::Error,
            error_message: Some("boom".into()),
            head_changes: vec![],
            current_height: None,
        };
        metrics.observe_view(&view);
        assert_eq!(metrics.engine_connected.get(), 0);
        // Height gauge keeps the last known value.
        assert_eq!(metrics.block_height.get(), 1234);
    }

    #[test]
    fn encode_produces_namespaced_exposition() {
        let metrics = MonitorMetrics::new();
        metrics.head_changes_total.inc();
        let body = metrics.encode().unwrap();
        assert!(body.contains("headlight_head_changes_total"));
        assert!(body.contains("headlight_block_height"));
    }
}
