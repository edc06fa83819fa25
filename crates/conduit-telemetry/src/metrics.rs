//! Prometheus metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `conduit_messages_total` | Counter | `outcome` |
//! | `conduit_message_bytes` | Histogram | - |
//! | `conduit_ingest_duration_seconds` | Histogram | `outcome` |
//! | `conduit_in_flight_messages` | Gauge | - |
//! | `conduit_queue_creates_total` | Counter | - |
//! | `conduit_archive_total` | Counter | `result` |
//! | `conduit_diagnostics_total` | Counter | `level` |
//!
//! Recording functions work whether or not [`init_metrics`] ran; without an
//! installed recorder they are no-ops.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use conduit_core::{DiagnosticLevel, DiagnosticsSink, TenantId};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;

use crate::error::TelemetryError;
use crate::TelemetryResult;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const MESSAGES_TOTAL: &str = "conduit_messages_total";
const MESSAGE_BYTES: &str = "conduit_message_bytes";
const INGEST_DURATION: &str = "conduit_ingest_duration_seconds";
const IN_FLIGHT: &str = "conduit_in_flight_messages";
const QUEUE_CREATES: &str = "conduit_queue_creates_total";
const ARCHIVE_TOTAL: &str = "conduit_archive_total";
const DIAGNOSTICS_TOTAL: &str = "conduit_diagnostics_total";

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether the exporter is installed.
    pub enabled: bool,

    /// Listen address of the Prometheus scrape endpoint.
    pub addr: String,

    /// Buckets for `conduit_ingest_duration_seconds`.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

impl MetricsConfig {
    /// Parses [`addr`](Self::addr).
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::InvalidAddress` if it is not a socket address.
    pub fn socket_addr(&self) -> TelemetryResult<SocketAddr> {
        self.addr
            .parse()
            .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", self.addr)))
    }
}

/// Installs the Prometheus recorder and its HTTP scrape listener.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = config.socket_addr()?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(INGEST_DURATION.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    describe_metrics();

    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

/// Renders current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(MESSAGES_TOTAL, "Messages processed, by outcome");
    describe_histogram!(MESSAGE_BYTES, "Size of admitted messages in bytes");
    describe_histogram!(INGEST_DURATION, "Time from receipt to completion in seconds");
    describe_gauge!(IN_FLIGHT, "Messages currently being processed");
    describe_counter!(QUEUE_CREATES, "Queues provisioned on first use");
    describe_counter!(ARCHIVE_TOTAL, "Archive decisions, by result");
    describe_counter!(DIAGNOSTICS_TOTAL, "Tenant diagnostics emitted, by level");
}

/// Records a completed message.
pub fn record_message(outcome: &'static str, duration: Duration) {
    counter!(MESSAGES_TOTAL, "outcome" => outcome).increment(1);
    histogram!(INGEST_DURATION, "outcome" => outcome).record(duration.as_secs_f64());
}

/// Records the size of an admitted message.
#[allow(clippy::cast_precision_loss)]
pub fn record_message_bytes(len: usize) {
    histogram!(MESSAGE_BYTES).record(len as f64);
}

/// Records a queue created on first use.
pub fn record_queue_created() {
    counter!(QUEUE_CREATES).increment(1);
}

/// Records an archive decision.
pub fn record_archive(result: &'static str) {
    counter!(ARCHIVE_TOTAL, "result" => result).increment(1);
}

/// Records a tenant diagnostic.
pub fn record_diagnostic(level: DiagnosticLevel) {
    counter!(DIAGNOSTICS_TOTAL, "level" => level.as_str()).increment(1);
}

/// Holds `conduit_in_flight_messages` up for its lifetime.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT).decrement(1.0);
    }
}

/// Counts diagnostics before handing them to another sink.
pub struct MeteredDiagnostics {
    inner: Arc<dyn DiagnosticsSink>,
}

impl MeteredDiagnostics {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn DiagnosticsSink>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for MeteredDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredDiagnostics").finish_non_exhaustive()
    }
}

impl DiagnosticsSink for MeteredDiagnostics {
    fn emit(&self, tenant: &TenantId, level: DiagnosticLevel, message: &str) {
        record_diagnostic(level);
        self.inner.emit(tenant, level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::MemoryDiagnostics;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.socket_addr().unwrap().port(), 9090);
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_invalid_addr() {
        let config = MetricsConfig {
            addr: "not-an-addr".to_string(),
            ..MetricsConfig::default()
        };
        assert!(matches!(
            config.socket_addr(),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_disabled_init_is_noop() {
        let config = MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_message("accepted", Duration::from_millis(3));
        record_message_bytes(1024);
        record_queue_created();
        record_archive("archived");
        record_diagnostic(DiagnosticLevel::Warn);
        let guard = InFlightGuard::new();
        drop(guard);
    }

    #[test]
    fn test_metered_diagnostics_forwards() {
        let memory = Arc::new(MemoryDiagnostics::new());
        let metered = MeteredDiagnostics::new(memory.clone());
        let tenant = TenantId::new("acme").unwrap();

        metered.warn(&tenant, "careful");
        metered.info(&tenant, "fyi");

        let entries = memory.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, DiagnosticLevel::Warn);
        assert_eq!(entries[1].message, "fyi");
    }
}
