//! # Telemetry Features
//!
//! Console logging through `tracing_subscriber::fmt` is always on: the
//! harness emits one event per response so throughput and error timing can
//! be reconstructed downstream. OpenTelemetry export is opt-in.
//!
//! ## Feature matrix
//!
//! - `tracing`: export spans (one per batch dispatch) via OpenTelemetry.
//! - `metrics`: export raw counters for dispatched batches, received
//!   responses, dispatch errors, and a dispatch latency histogram.
//! - `otlp`: OTLP/gRPC exporter. The endpoint is taken from
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` (default `http://localhost:4317`).
//! - `stdout`: stdout exporter.
//!
//! ## Feature constraints
//!
//! - Exporters require at least one of `tracing` or `metrics`.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --release --features tracing,metrics,otlp -- --target 10.0.0.5:50051
//! ```
//!
//! The log level defaults to `info` and honours `RUST_LOG`. Per-response
//! events are at `info`; set `RUST_LOG=warn` to keep only anomalies.

#[cfg(all(feature = "otlp", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!("The 'otlp' feature requires at least one of 'tracing' or 'metrics' to be enabled.");

#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use core::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use viewer_bench_core::types::Phase;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

const SERVICE_NAME: &str = "viewer-bench";

/// Exporter handles that must be flushed before the process exits.
pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every enabled exporter. Failures are reported
    /// on stderr since the subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber. Call once, before any RPC activity.
///
/// # Errors
///
/// Returns an error if an exporter cannot be built.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder(SERVICE_NAME)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Compact single-line output: one line per response.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(&meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(Duration::from_secs(5))
            .build();
        builder.with_reader(reader)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .build()
            .context("failed to build metrics exporter")?;
        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "tracing")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::SpanExporter::default();
        builder.with_span_processor(batch_processor(exporter))
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()
            .context("failed to build tracer exporter")?;
        builder.with_span_processor(batch_processor(exporter))
    };

    Ok(builder.build())
}

#[cfg(all(feature = "tracing", any(feature = "stdout", feature = "otlp")))]
fn batch_processor<E>(exporter: E) -> sdktrace::BatchSpanProcessor
where
    E: opentelemetry_sdk::trace::SpanExporter + 'static,
{
    sdktrace::BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_scheduled_delay(Duration::from_secs(5))
                .with_max_queue_size(8192)
                .build(),
        )
        .build()
}

#[cfg(feature = "metrics")]
static BATCHES_DISPATCHED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RESPONSES_RECEIVED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DISPATCH_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DISPATCH_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = BATCHES_DISPATCHED.set(
        meter
            .u64_counter("batches_dispatched")
            .with_description("Batches answered by the service")
            .build(),
    );

    let _ = RESPONSES_RECEIVED.set(
        meter
            .u64_counter("responses_received")
            .with_description("Individual responses received")
            .build(),
    );

    let _ = DISPATCH_ERRORS.set(
        meter
            .u64_counter("dispatch_errors")
            .with_description("Failed or malformed batch dispatches")
            .build(),
    );

    let _ = DISPATCH_DURATION_MS.set(
        meter
            .f64_histogram("dispatch_duration")
            .with_unit("ms")
            .with_description("Round-trip time of one batch RPC")
            .build(),
    );
}

// No-ops when metrics are disabled.
#[cfg(feature = "metrics")]
pub fn record_batch_dispatched(phase: Phase, responses: u64, elapsed: Duration) {
    let attrs = [KeyValue::new("phase", phase.as_str())];
    if let Some(counter) = BATCHES_DISPATCHED.get() {
        counter.add(1, &attrs);
    }
    if let Some(counter) = RESPONSES_RECEIVED.get() {
        counter.add(responses, &attrs);
    }
    if let Some(histogram) = DISPATCH_DURATION_MS.get() {
        histogram.record(elapsed.as_secs_f64() * 1000.0, &attrs);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_batch_dispatched(_phase: Phase, _responses: u64, _elapsed: Duration) {}

#[cfg(feature = "metrics")]
pub fn increment_dispatch_errors(phase: Phase) {
    if let Some(counter) = DISPATCH_ERRORS.get() {
        counter.add(1, &[KeyValue::new("phase", phase.as_str())]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_dispatch_errors(_phase: Phase) {}
