//! Global `tracing` subscriber setup.

use common::FunctionError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::trace::TraceExport;
use crate::config::TelemetryConfig;

/// Initialise the global tracing subscriber.
///
/// Configures:
/// - An [`EnvFilter`] from `RUST_LOG`, falling back to `cfg.log_level`.
/// - A JSON-formatted [`tracing_subscriber`] layer writing to stdout.
/// - When `export` is given, a [`tracing_opentelemetry`] layer that turns
///   spans into exported traces.
///
/// # Errors
///
/// Returns [`FunctionError::Telemetry`] if a global subscriber is already set.
pub fn init_subscriber(
    cfg: &TelemetryConfig,
    export: Option<&TraceExport>,
) -> Result<(), FunctionError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    let otel_layer =
        export.map(|e| tracing_opentelemetry::layer().with_tracer(e.tracer().clone()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(otel_layer)
        .try_init()
        .map_err(|e| FunctionError::Telemetry(Box::new(e)))
}
