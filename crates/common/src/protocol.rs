//! Wire types for structured log entries.
//!
//! These mirror the Cloud Logging `LogEntry` and `MonitoredResource`
//! messages. Sinks translate them into whatever their destination accepts:
//! API messages for the logging service, or structured-log lines for stdout.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Monitored resource type used for Cloud Functions.
pub const CLOUD_FUNCTION_RESOURCE: &str = "cloud_function";

// ---------------------------------------------------------------------------
// Monitored resource
// ---------------------------------------------------------------------------

/// Descriptor identifying the execution context that produced an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredResource {
    /// Resource type, e.g. `"cloud_function"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource labels, e.g. `function_name` and `region`.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl MonitoredResource {
    /// Construct a `cloud_function` resource for the given function and region.
    pub fn cloud_function(function_name: impl Into<String>, region: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("function_name".to_owned(), function_name.into());
        labels.insert("region".to_owned(), region.into());
        Self {
            kind: CLOUD_FUNCTION_RESOURCE.to_owned(),
            labels,
        }
    }
}

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Log severity, serialised with the Cloud Logging enum names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    /// Numeric level used by the logging API (`DEFAULT` = 0 ... `EMERGENCY` = 800).
    pub fn code(self) -> i32 {
        match self {
            Self::Default => 0,
            Self::Debug => 100,
            Self::Info => 200,
            Self::Notice => 300,
            Self::Warning => 400,
            Self::Error => 500,
            Self::Critical => 600,
            Self::Alert => 700,
            Self::Emergency => 800,
        }
    }
}

/// Entry payload: either free text or a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    #[serde(rename = "textPayload")]
    Text(String),
    #[serde(rename = "jsonPayload")]
    Json(serde_json::Value),
}

/// A single structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Full log name: `projects/<project>/logs/<log id>`.
    pub log_name: String,
    /// Resource the entry is attributed to.
    pub resource: MonitoredResource,
    pub severity: Severity,
    /// Flattened so the payload appears as `textPayload` or `jsonPayload`.
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
