//! Listing watcher
//!
//! Single-binary Rust service that:
//! 1. Loads watch targets and credentials from config
//! 2. Polls each feed under a shared request budget
//! 3. Writes every new item to stdout as a JSON line
//! 4. Serves /health and /metrics when a listen address is configured

mod app;
mod config;
mod error;
mod metrics;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::app::WatchMetrics;
use crate::config::Config;

/// Time allowed for in-flight sweeps and the listener to finish after a signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the health and metrics endpoints
#[derive(Clone)]
struct AppState {
    metrics: WatchMetrics,
    watchers: Arc<Vec<String>>,
    prometheus: PrometheusHandle,
}

/// Build the axum router with a concurrency limit of `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout carries emitted items
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    info!("starting listing-watcher");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        watches = config.watches.len(),
        authenticated = config.account.is_some(),
        requests_per_minute = config.client.requests_per_minute,
        timeout_secs = config.client.timeout_secs,
        "configuration loaded"
    );

    let http = app::build_http(&config).context("failed to build http client")?;
    let source = app::build_source(&config, http).context("failed to build page source")?;

    let watch_metrics = WatchMetrics::new();
    let handles = app::start_watchers(
        &config,
        source,
        &watch_metrics,
        Arc::new(Mutex::new(std::io::stdout())),
    )
    .context("failed to start watchers")?;

    let names: Vec<String> = handles.iter().map(|h| h.name().to_string()).collect();
    info!(watchers = ?names, "watchers running");

    let server = match &config.server {
        Some(server) => {
            let state = AppState {
                metrics: watch_metrics.clone(),
                watchers: Arc::new(names),
                prometheus: prometheus_handle,
            };
            let app = build_router(state, server.max_connections);
            let listener = TcpListener::bind(server.listen_addr)
                .await
                .with_context(|| format!("failed to bind to {}", server.listen_addr))?;
            info!(addr = %server.listen_addr, "serving /health and /metrics");

            let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
            let task = tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
            });
            Some((shutdown_tx, task))
        }
        None => None,
    };

    shutdown_signal().await;

    for handle in &handles {
        handle.close();
    }

    // Closing does not cancel in-flight requests; bound the wait for them
    let drain = async {
        for handle in handles {
            let name = handle.name().to_string();
            match handle.join().await {
                Ok(stats) => info!(
                    watcher = %name,
                    cycles = stats.cycles,
                    items = stats.items,
                    errors = stats.errors,
                    "watcher stopped"
                ),
                Err(e) => error!(watcher = %name, error = %e, "watcher task panicked"),
            }
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        );
    }
    watch_metrics.running.store(0, Ordering::Relaxed);
    metrics::set_watchers_running(0);

    if let Some((shutdown_tx, task)) = server {
        let _ = shutdown_tx.send(());
        match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
            Ok(Err(e)) => error!(error = %e, "server task panicked"),
            Err(_) => warn!("health listener did not stop in time"),
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: JSON with status, watchers, totals, and uptime.
/// Returns 200 while watchers are running, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.started_at.elapsed().as_secs();
    let running = state.metrics.running.load(Ordering::Relaxed);
    let items = state.metrics.items_total.load(Ordering::Relaxed);
    let errors = state.metrics.errors_total.load(Ordering::Relaxed);

    let (status_code, status) = if running > 0 {
        (axum::http::StatusCode::OK, "healthy")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = serde_json::json!({
        "status": status,
        "watchers": state.watchers.as_slice(),
        "watchers_running": running,
        "items_emitted": items,
        "errors_total": errors,
        "uptime_seconds": uptime,
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
