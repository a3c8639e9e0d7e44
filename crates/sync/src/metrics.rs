//! Prometheus metrics export.
//!
//! A sync run is a short-lived process, so metrics are written once at the
//! end as a text file for the node exporter's textfile collector.

use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntGauge, Registry, TextEncoder};
use std::path::Path;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Unix time the last run finished.
pub static LAST_RUN_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "gridsync_last_run_timestamp_seconds",
        "Unix time the last sync run finished",
    )
    .unwrap()
});

/// Whether the last run succeeded (1) or failed (0).
pub static LAST_RUN_SUCCESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "gridsync_last_run_success",
        "Whether the last sync run succeeded",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(LAST_RUN_TIMESTAMP.clone()))
        .unwrap();
    registry
        .register(Box::new(LAST_RUN_SUCCESS.clone()))
        .unwrap();

    // Core metrics (commands, transfers, sync)
    for metric in gridsync_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Stamps the outcome of the run that is about to exit.
pub fn record_run(success: bool) {
    LAST_RUN_SUCCESS.set(i64::from(success));
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    LAST_RUN_TIMESTAMP.set(now);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Writes the exposition to `path` through a temporary sibling file so the
/// collector never reads a partial file.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, encode_metrics())?;
    std::fs::rename(&tmp, path)
}
