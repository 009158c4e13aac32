//! Observability bootstrap: trace export, structured logging, and the
//! process-wide `tracing` subscriber.
//!
//! # Process-wide state
//!
//! [`enable_trace_export`] installs the global OpenTelemetry tracer provider
//! and [`init_subscriber`] installs the global `tracing` subscriber. Neither
//! happens implicitly; callers invoke them once at startup. Calling
//! [`enable_trace_export`] again re-registers the exporter, last call wins.
//!
//! # Telemetry invariants
//!
//! - **No secret material** appears in any span attribute or log field emitted
//!   by this crate.

pub mod init;
pub mod logger;
pub mod trace;

pub use init::init_subscriber;
pub use logger::{
    new_function_logger, new_function_logger_with_sink, CloudLoggingSink, LogSink, Logger,
    LoggingClient, StdoutSink, WriterSink,
};
pub use trace::{enable_trace_export, TraceExport};
