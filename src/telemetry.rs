//! Tracing and OpenTelemetry initialization.
//!
//! When any `OTEL_EXPORTER_OTLP_*` variable is set, spans and metrics are
//! exported over OTLP (HTTP or gRPC per `OTEL_EXPORTER_OTLP_PROTOCOL`);
//! otherwise only local fmt logging is installed. Providers are shut down on
//! drop so buffered spans flush on exit.

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
use std::env;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Transport protocol for OTLP export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportProtocol {
    Http,
    Grpc,
}

impl ExportProtocol {
    /// Enabled only when OTLP is configured through the environment.
    fn from_env() -> Option<Self> {
        let enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_HEADERS").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_PROTOCOL").is_ok();
        if !enabled {
            return None;
        }
        match env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => Some(ExportProtocol::Grpc),
            _ => Some(ExportProtocol::Http),
        }
    }
}

fn resource() -> Resource {
    let deployment_env = env::var("ENV").unwrap_or_else(|_| "dev".to_string());
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_schema_url(
            [
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_meter_provider(protocol: ExportProtocol) -> SdkMeterProvider {
    let exporter = opentelemetry_otlp::MetricExporter::builder();
    let exporter = match protocol {
        ExportProtocol::Http => exporter
            .with_http()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build(),
        ExportProtocol::Grpc => exporter
            .with_tonic()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build(),
    };
    let exporter = exporter.expect("Failed to build OTLP metric exporter");

    let reader = PeriodicReader::builder(exporter)
        .with_interval(std::time::Duration::from_secs(30))
        .build();
    let stdout_reader =
        PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();

    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource())
        .with_reader(reader)
        .with_reader(stdout_reader)
        .build();
    global::set_meter_provider(meter_provider.clone());
    meter_provider
}

fn init_tracer_provider(protocol: ExportProtocol) -> SdkTracerProvider {
    let exporter = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match protocol {
        ExportProtocol::Http => exporter.with_http().build(),
        ExportProtocol::Grpc => exporter.with_tonic().build(),
    };
    let exporter = exporter.expect("Failed to build OTLP span exporter");

    SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            1.0,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build()
}

/// Holds the installed providers so they can be flushed on shutdown.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    /// Installs the global tracing subscriber, with OTLP layers when the
    /// environment enables them.
    pub fn init() -> Self {
        match ExportProtocol::from_env() {
            Some(protocol) => {
                let tracer_provider = init_tracer_provider(protocol);
                let meter_provider = init_meter_provider(protocol);
                let tracer = tracer_provider.tracer("tracing-otel-subscriber");

                // The INFO floor keeps the exporter's own network stack from
                // re-entering the telemetry layer with its span noise.
                tracing_subscriber::registry()
                    .with(tracing_subscriber::filter::LevelFilter::INFO)
                    .with(tracing_subscriber::fmt::layer())
                    .with(MetricsLayer::new(meter_provider.clone()))
                    .with(OpenTelemetryLayer::new(tracer))
                    .init();

                tracing::info!(?protocol, "OpenTelemetry export enabled");
                Telemetry {
                    tracer_provider: Some(tracer_provider),
                    meter_provider: Some(meter_provider),
                }
            }
            None => {
                tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer())
                    .init();
                tracing::info!("OpenTelemetry is not enabled");
                Telemetry {
                    tracer_provider: None,
                    meter_provider: None,
                }
            }
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(tracer_provider) = self.tracer_provider.as_ref() {
            if let Err(err) = tracer_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
        if let Some(meter_provider) = self.meter_provider.as_ref() {
            if let Err(err) = meter_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
