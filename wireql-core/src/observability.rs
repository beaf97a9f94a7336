//! Logging and OpenTelemetry bootstrap
//!
//! The client itself only emits `tracing` events and OpenTelemetry
//! instruments; nothing is printed unless the application installs a
//! subscriber. `init_observability` is the batteries-included way to do that:
//!
//! - a `tracing-subscriber` registry filtered by `RUST_LOG` (or the configured
//!   level) with a JSON formatter
//! - optionally an OTLP span exporter bridged through `tracing-opentelemetry`
//! - optionally an OTLP metric exporter registered as the global meter
//!   provider, which `wireql_client::ClientMetrics` picks up
//!
//! # Usage
//!
//! ```rust,no_run
//! use wireql_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("orders-service")
//!         .with_log_level("wireql_client=debug,info")
//!         .with_traces(false);
//!
//!     wireql_core::init_observability(config).expect("failed to init observability");
//!
//!     // ... use the client ...
//!
//!     wireql_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log filter directives

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Handles kept so shutdown can flush what the global copies still buffer
static TRACER_PROVIDER: Mutex<Option<SdkTracerProvider>> = Mutex::new(None);
static METER_PROVIDER: Mutex<Option<SdkMeterProvider>> = Mutex::new(None);

/// Observability configuration
///
/// Defaults: service name `wireql`, crate version, endpoint from
/// `OTEL_EXPORTER_OTLP_ENDPOINT` (falling back to `http://localhost:4317`),
/// logs on, OTLP traces and metrics off, level from `RUST_LOG` or `info`.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    /// Service version attached to every span and metric
    pub service_version: String,
    /// OTLP gRPC collector endpoint
    pub otlp_endpoint: String,
    /// Export spans over OTLP
    pub enable_traces: bool,
    /// Export metrics over OTLP
    pub enable_metrics: bool,
    /// Emit JSON log lines locally
    pub enable_logs: bool,
    /// Filter directives used when `RUST_LOG` is unset
    pub log_level: String,
    /// Metric export interval
    pub metrics_interval: Duration,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "wireql".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: false,
            enable_metrics: false,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_interval: Duration::from_secs(30),
        }
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global subscriber and, if enabled, the OTLP pipelines
///
/// Fails if a global subscriber is already installed.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));
    let fmt_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .json()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry_layer)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(config: &ObservabilityConfig) -> Result<opentelemetry_sdk::trace::Tracer, BoxError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider.clone());
    *TRACER_PROVIDER.lock().unwrap_or_else(PoisonError::into_inner) = Some(provider);

    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> Result<(), BoxError> {
    use opentelemetry_sdk::metrics::PeriodicReader;

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(config.metrics_interval)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider.clone());
    *METER_PROVIDER.lock().unwrap_or_else(PoisonError::into_inner) = Some(provider);
    Ok(())
}

/// Flush and stop the OTLP pipelines installed by [`init_observability`]
///
/// Exports pending spans and the last metric interval. Safe to call more
/// than once; later calls find nothing left to shut down.
pub fn shutdown_observability() {
    let tracer_provider = TRACER_PROVIDER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }

    let meter_provider = METER_PROVIDER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(provider) = meter_provider {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }

    tracing::info!("Observability shut down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "wireql");
        assert!(config.enable_logs);
        assert!(!config.enable_traces);
        assert!(!config.enable_metrics);
        assert_eq!(config.metrics_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_chaining() {
        let config = ObservabilityConfig::new("billing")
            .with_endpoint("http://collector:4317")
            .with_log_level("debug")
            .with_version("2.1.0")
            .with_traces(true)
            .with_metrics(true)
            .with_logs(false)
            .with_metrics_interval(Duration::from_secs(5));

        assert_eq!(config.service_name, "billing");
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "2.1.0");
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(!config.enable_logs);
        assert_eq!(config.metrics_interval, Duration::from_secs(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_init_metrics_then_shutdown() {
        let config = ObservabilityConfig::new("observability-test")
            .with_endpoint("http://127.0.0.1:1")
            .with_traces(false)
            .with_metrics(true)
            .with_logs(false);

        init_observability(config).unwrap();
        assert!(METER_PROVIDER.lock().unwrap().is_some());
        assert!(TRACER_PROVIDER.lock().unwrap().is_none());

        tokio::task::spawn_blocking(|| {
            shutdown_observability();
            shutdown_observability();
        })
        .await
        .unwrap();
        assert!(METER_PROVIDER.lock().unwrap().is_none());
    }
}
