//! Error types and log wire definitions shared across `cloudfunction` crates.

pub mod error;
pub mod protocol;

pub use error::{BoxError, ErrorKind, FunctionError};
pub use protocol::{LogEntry, MonitoredResource, Payload, Severity};
