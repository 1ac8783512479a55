// Copyright (c) 2026 Headlight Contributors. MIT License.
// See LICENSE for details.

//! # Headlight Monitor
//!
//! Entry point for the `headlight-monitor` binary. Parses CLI arguments,
//! initializes logging and metrics, starts the client session against the
//! engine, and serves the read-only HTTP/WS API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the monitor
//! - `status`  — query a running monitor's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;

use headlight_client::sim::SimulatedEngine;
use headlight_client::{ClientConfiguration, ClientSession, Network};

use cli::{Commands, MonitorCli};
use logging::LogFormat;
use metrics::MonitorMetrics;

/// How often the background task re-syncs the gauges from a session
/// snapshot, independent of anyone hitting `/status`.
const GAUGE_SYNC_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MonitorCli::parse();

    match cli.command {
        Commands::Run(args) => run_monitor(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full monitor: session lifecycle, API server, and metrics
/// endpoint.
async fn run_monitor(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(LogFormat::from_str_lossy(&args.log_format));

    let Some(network) = Network::from_id(&args.network) else {
        bail!("unknown network: {}", args.network);
    };

    tracing::info!(
        %network,
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        poll_interval_secs = args.poll_interval_secs,
        "starting headlight-monitor"
    );

    // --- Session ---
    let config = ClientConfiguration::new()
        .network(network)
        .poll_interval(Duration::from_secs(args.poll_interval_secs))
        .build();
    let connector = Arc::new(SimulatedEngine::new());
    let session = Arc::new(ClientSession::new(connector, config));

    // A failed start is not fatal to the monitor: the API keeps serving
    // the error status, the same way a status page keeps rendering when
    // the thing it watches is down.
    match session.start().await {
        Ok(()) => {
            tracing::info!("engine connected");
            if let Err(e) = session.subscribe_head_changes().await {
                tracing::error!("{}", e);
            }
            session.spawn_height_poller().await;
        }
        Err(e) => tracing::error!("{}", e),
    }

    // --- Metrics ---
    let monitor_metrics = Arc::new(MonitorMetrics::new());

    // Background sync: fold live head changes into the counters and keep
    // the gauges fresh even when nobody scrapes /status.
    let sync_metrics = Arc::clone(&monitor_metrics);
    let sync_session = Arc::clone(&session);
    let metrics_sync = tokio::spawn(async move {
        let mut events = sync_session.subscribe_events();
        let mut ticker = tokio::time::interval(GAUGE_SYNC_INTERVAL);
        loop {
            tokio::select! {
                record = events.recv() => {
                    match record {
                        Ok(record) => sync_metrics.observe_head_change(&record),
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = ticker.tick() => {
                    sync_metrics.observe_view(&sync_session.snapshot());
                }
            }
        }
    });

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        network,
        started_at: chrono::Utc::now(),
        session: Arc::clone(&session),
        metrics: Arc::clone(&monitor_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&monitor_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    metrics_sync.abort();
    session.stop().await;
    tracing::info!("headlight-monitor stopped");
    Ok(())
}

/// Queries a running monitor's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.api_url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP/1.1 GET over a raw TCP stream. One request, one endpoint,
/// no need to pull in an HTTP client for it.
async fn http_get(url: &str) -> Result<String> {
    let (host, port, path) = split_url(url)?;

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Splits an `http://host[:port]/path` URL into its parts. Just enough
/// parsing for the `status` subcommand; anything fancier is rejected.
fn split_url(url: &str) -> Result<(String, u16, String)> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| anyhow::anyhow!("only http:// URLs are supported: {}", url))?;

    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    if authority.is_empty() {
        bail!("missing host in URL: {}", url);
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("bad port in URL: {}", url))?;
            (host.to_string(), port)
        }
        None => (authority.to_string(), 80),
    };

    Ok((host, port, path.to_string()))
}

/// Prints version information to stdout.
fn print_version() {
    println!("headlight-monitor {}", env!("CARGO_PKG_VERSION"));
    println!("rustc             {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_url_with_port_and_path() {
        let (host, port, path) = split_url("http://127.0.0.1:8640/status").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8640);
        assert_eq!(path, "/status");
    }

    #[test]
    fn split_url_defaults_port_and_path() {
        let (host, port, path) = split_url("http://example.com").unwrap();
        assert_eq!(host, "example.com");
        assert_eq!(port, 80);
        assert_eq!(path, "/");
    }

    #[test]
    fn split_url_rejects_other_schemes() {
        assert!(split_url("https://example.com").is_err());
        assert!(split_url("example.com").is_err());
        assert!(split_url("http://").is_err());
    }
}
