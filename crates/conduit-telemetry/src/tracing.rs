//! OpenTelemetry trace export.
//!
//! Disabled by default. When enabled, spans are batched to an OTLP collector
//! over gRPC and sampled by trace id at the configured ratio.

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;
use serde::Deserialize;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Tracing configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Whether spans are exported.
    pub enabled: bool,

    /// OTLP gRPC endpoint.
    pub otlp_endpoint: String,

    /// Fraction of traces to keep, in `[0, 1]`.
    pub sample_ratio: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            sample_ratio: 1.0,
        }
    }
}

impl TracingConfig {
    fn sampler(&self) -> Sampler {
        if self.sample_ratio >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sample_ratio <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sample_ratio)
        }
    }
}

/// Identifies the service on exported spans.
#[derive(Debug, Clone, Copy)]
pub struct ServiceInfo<'a> {
    /// `service.name`.
    pub name: &'a str,
    /// `service.version`.
    pub version: &'a str,
    /// `deployment.environment`.
    pub environment: &'a str,
}

/// Builds the OTLP exporter and installs the global tracer provider.
///
/// Must be called inside a Tokio runtime. Returns the provider so the caller
/// can flush it on shutdown.
///
/// # Errors
///
/// Returns `TelemetryError::TracingInit` if the exporter cannot be built.
pub fn init_tracing(
    config: &TracingConfig,
    service: ServiceInfo<'_>,
) -> TelemetryResult<Option<TracerProvider>> {
    if !config.enabled {
        return Ok(None);
    }

    let resource = Resource::new([
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            service.name.to_string(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            service.version.to_string(),
        ),
        KeyValue::new("deployment.environment", service.environment.to_string()),
    ]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(config.sampler())
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());
    tracing::info!(
        endpoint = %config.otlp_endpoint,
        sample_ratio = config.sample_ratio,
        "trace export enabled"
    );

    Ok(Some(provider))
}
