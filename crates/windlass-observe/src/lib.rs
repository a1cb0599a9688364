//! Telemetry bootstrap for the windlass binary.
//!
//! Installs the global tracing subscriber: a structured fmt layer filtered
//! by `RUST_LOG` (workers and the claim loop log at info by default, noisy
//! dependencies at warn), optionally bridged to OpenTelemetry with a
//! stdout span exporter for local inspection. Swap the exporter for OTLP
//! when wiring a real collector.
//!
//! [`init`] returns a [`Telemetry`] guard; hold it for the life of the
//! process so buffered spans are flushed on the way out.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Flushes buffered spans when dropped. A no-op when span export was not
/// enabled.
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("warning: failed to flush telemetry spans: {err}");
            }
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already set or the OTel pipeline cannot
/// be built.
pub fn init(export_spans: bool) -> Result<Telemetry, Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,windlass=info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    if !export_spans {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
        return Ok(Telemetry { provider: None });
    }

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    let tracer = provider.tracer("windlass");

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;

    Ok(Telemetry {
        provider: Some(provider),
    })
}
