//! Prometheus metrics exposition
//!
//! - `watcher_items_emitted_total` (counter): label `watcher`
//! - `watcher_errors_total` (counter): labels `watcher`, `kind`
//! - `watchers_running` (gauge)

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub fn record_item(watcher: &str) {
    metrics::counter!("watcher_items_emitted_total", "watcher" => watcher.to_string()).increment(1);
}

/// Record a failed poll cycle with the sweep error classification.
pub fn record_error(watcher: &str, kind: &str) {
    metrics::counter!(
        "watcher_errors_total",
        "watcher" => watcher.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

pub fn set_watchers_running(count: usize) {
    metrics::gauge!("watchers_running").set(count as f64);
}
