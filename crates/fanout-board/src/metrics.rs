//! Metrics export for the board demo.
//!
//! The bus records through the `metrics` facade; this module installs the
//! Prometheus exporter when enabled.

use crate::config::MetricsConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Install the exporter (if enabled) and describe the bus metrics.
///
/// Returns whether the exporter is running.
pub fn init_metrics(config: &MetricsConfig) -> bool {
    let exporter = config.enabled
        && match start_metrics_server(config.port) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to start metrics server: {}", e);
                false
            }
        };

    fanout_core::metrics::describe();
    info!(exporter, "Metrics initialized");
    exporter
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}
