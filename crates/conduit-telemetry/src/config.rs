//! Telemetry configuration.

use serde::Deserialize;

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;
use crate::tracing::{ServiceInfo, TracingConfig};

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name on spans and in logs.
    pub service_name: String,

    /// Service version.
    pub service_version: String,

    /// Deployment environment.
    pub environment: String,

    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,

    /// Tracing configuration.
    pub tracing: TracingConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "conduit".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            logging: LogConfig::default(),
            metrics: MetricsConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl TelemetryConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    /// Service identity for exported spans.
    #[must_use]
    pub fn service_info(&self) -> ServiceInfo<'_> {
        ServiceInfo {
            name: &self.service_name,
            version: &self.service_version,
            environment: &self.environment,
        }
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Sets the service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.service_name = name.into();
        self
    }

    /// Sets the environment.
    #[must_use]
    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.config.environment = env.into();
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn logging(mut self, config: LogConfig) -> Self {
        self.config.logging = config;
        self
    }

    /// Enables the Prometheus listener on `addr`.
    #[must_use]
    pub fn metrics_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.metrics.enabled = true;
        self.config.metrics.addr = addr.into();
        self
    }

    /// Disables the Prometheus listener.
    #[must_use]
    pub fn without_metrics(mut self) -> Self {
        self.config.metrics.enabled = false;
        self
    }

    /// Enables OTLP export to `endpoint`.
    #[must_use]
    pub fn otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.tracing.enabled = true;
        self.config.tracing.otlp_endpoint = endpoint.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "conduit");
        assert_eq!(config.environment, "development");
        assert!(config.metrics.enabled);
        assert!(!config.tracing.enabled);
    }

    #[test]
    fn test_builder() {
        let config = TelemetryConfig::builder()
            .service_name("ingest-eu")
            .environment("production")
            .metrics_addr("127.0.0.1:9999")
            .otlp_endpoint("http://collector:4317")
            .build();

        assert_eq!(config.service_name, "ingest-eu");
        assert_eq!(config.metrics.addr, "127.0.0.1:9999");
        assert!(config.tracing.enabled);
        assert_eq!(config.service_info().environment, "production");
    }

    #[test]
    fn test_builder_without_metrics() {
        let config = TelemetryConfig::builder().without_metrics().build();
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_deserialize_nested() {
        let config: TelemetryConfig = serde_json::from_str(
            r#"{"service_name":"x","tracing":{"enabled":true,"sample_ratio":0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.service_name, "x");
        assert!(config.tracing.enabled);
        assert!((config.tracing.sample_ratio - 0.5).abs() < f64::EPSILON);
        assert!(config.logging.json_format);
    }
}
