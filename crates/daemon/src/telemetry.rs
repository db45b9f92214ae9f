//! Telemetry setup for OpenTelemetry integration
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: codequal-server)
//!
//! ```text
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 \
//! OTEL_SERVICE_NAME=codequal-dev \
//!     ./codequal-server
//! ```

use anyhow::Result;
use tracing_subscriber::{Layer, Registry};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// What `init_telemetry` decided; logged once the subscriber is installed
pub enum TelemetryStatus {
    Disabled,
    /// Endpoint set, but the binary was built without `telemetry`
    FeatureMissing,
    Enabled { endpoint: String },
}

/// Build the OpenTelemetry layer if an endpoint is configured.
///
/// Runs before the subscriber exists, so nothing is logged here.
pub fn init_telemetry() -> Result<(Option<BoxedLayer>, TelemetryStatus)> {
    let endpoint = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.trim().is_empty() => endpoint,
        _ => return Ok((None, TelemetryStatus::Disabled)),
    };

    build_layer(endpoint)
}

#[cfg(feature = "telemetry")]
fn build_layer(endpoint: String) -> Result<(Option<BoxedLayer>, TelemetryStatus)> {
    let layer = init_telemetry_impl(&endpoint)?;
    Ok((Some(layer), TelemetryStatus::Enabled { endpoint }))
}

#[cfg(not(feature = "telemetry"))]
fn build_layer(_endpoint: String) -> Result<(Option<BoxedLayer>, TelemetryStatus)> {
    Ok((None, TelemetryStatus::FeatureMissing))
}

impl TelemetryStatus {
    pub fn log(&self) {
        match self {
            TelemetryStatus::Disabled => {
                tracing::debug!("OpenTelemetry not configured (OTEL_EXPORTER_OTLP_ENDPOINT not set)")
            }
            TelemetryStatus::FeatureMissing => {
                tracing::warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
                tracing::warn!("Rebuild with: cargo build --features telemetry");
            }
            TelemetryStatus::Enabled { endpoint } => {
                tracing::info!(endpoint = %endpoint, "OpenTelemetry initialized");
            }
        }
    }
}

/// Flush pending spans on shutdown
pub fn shutdown_telemetry() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(feature = "telemetry")]
fn init_telemetry_impl(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::TracerProvider;
    use opentelemetry_sdk::Resource;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "codequal-server".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
