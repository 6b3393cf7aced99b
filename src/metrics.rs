//! Run metrics published through the `metrics` facade.
//!
//! Without an installed recorder every call here is a no-op; `--metrics-addr`
//! installs the Prometheus exporter.

use crate::{ProbeError, ProbeOutcome};
use ::metrics::{gauge, increment_counter};
use std::net::SocketAddr;
use tracing::info;

pub const ATTEMPTS_TOTAL: &str = "authprobe_attempts_total";
pub const IN_FLIGHT: &str = "authprobe_in_flight";
pub const ATTEMPTS_PER_SECOND: &str = "authprobe_attempts_per_second";

pub fn record_outcome(outcome: &ProbeOutcome) {
    increment_counter!(ATTEMPTS_TOTAL, "outcome" => outcome.label());
}

pub fn set_in_flight(count: usize) {
    gauge!(IN_FLIGHT, count as f64);
}

pub fn set_rate(rate: f64) {
    gauge!(ATTEMPTS_PER_SECOND, rate);
}

/// Serves `/metrics` on `addr`. Must be called from within a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), ProbeError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ProbeError::Configuration(format!("metrics exporter: {e}")))?;

    info!("Serving Prometheus metrics on http://{}/metrics", addr);
    Ok(())
}
