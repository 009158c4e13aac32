//! Structured logger bound to the function's monitored resource.
//!
//! [`LoggingClient::new`] writes entries through the Cloud Logging API
//! (`WriteLogEntries`), each attributed to the logger's log name and
//! monitored resource. [`StdoutSink`] and [`WriterSink`] instead emit
//! structured-log JSON lines (`severity`, `message`,
//! `logging.googleapis.com/labels`), the format the Cloud Functions runtime
//! picks up from stdout.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::{FunctionError, LogEntry, MonitoredResource, Payload, Severity};
use google_cloud_logging_v2::client::LoggingServiceV2;
use google_cloud_logging_v2::model;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::FunctionEnv;

/// Characters kept as-is in a log id: the URL unreserved set.
const LOG_ID: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const LABELS_FIELD: &str = "logging.googleapis.com/labels";

/// Destination for log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Write a single entry.
    async fn write(&self, entry: &LogEntry) -> Result<(), FunctionError>;
}

// ---------------------------------------------------------------------------
// Cloud Logging API
// ---------------------------------------------------------------------------

/// Writes entries with the Cloud Logging `WriteLogEntries` call.
#[derive(Clone, Debug)]
pub struct CloudLoggingSink {
    client: LoggingServiceV2,
}

impl CloudLoggingSink {
    /// Connect using ambient Google credentials.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::Telemetry`] if the client cannot be built.
    pub async fn new() -> Result<Self, FunctionError> {
        let client = LoggingServiceV2::builder()
            .build()
            .await
            .map_err(|e| FunctionError::Telemetry(Box::new(e)))?;
        Ok(Self::from_client(client))
    }

    /// Wrap an already-configured client.
    pub fn from_client(client: LoggingServiceV2) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogSink for CloudLoggingSink {
    async fn write(&self, entry: &LogEntry) -> Result<(), FunctionError> {
        self.client
            .write_log_entries()
            .set_entries([api_entry(entry)])
            .send()
            .await
            .map_err(|e| FunctionError::Telemetry(Box::new(e)))?;
        Ok(())
    }
}

fn api_entry(entry: &LogEntry) -> model::LogEntry {
    let resource = google_cloud_api::model::MonitoredResource::new()
        .set_type(entry.resource.kind.clone())
        .set_labels(entry.resource.labels.clone());

    let api = model::LogEntry::new()
        .set_log_name(entry.log_name.clone())
        .set_resource(resource)
        .set_severity(entry.severity.code())
        .set_labels(entry.labels.clone());

    match &entry.payload {
        Payload::Text(text) => api.set_text_payload(text.clone()),
        Payload::Json(value) => api.set_json_payload(json_object(value)),
    }
}

/// JSON payloads must be objects; other values are wrapped as `message`.
fn json_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        other => Map::from_iter([("message".to_owned(), other.clone())]),
    }
}

// ---------------------------------------------------------------------------
// Structured stdout
// ---------------------------------------------------------------------------

/// Writes structured-log JSON lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[async_trait]
impl LogSink for StdoutSink {
    async fn write(&self, entry: &LogEntry) -> Result<(), FunctionError> {
        let mut out = std::io::stdout().lock();
        write_structured_line(&mut out, entry)
    }
}

/// Writes structured-log JSON lines to any [`Write`] implementation.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<W: Write + Send> LogSink for WriterSink<W> {
    async fn write(&self, entry: &LogEntry) -> Result<(), FunctionError> {
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        write_structured_line(&mut *w, entry)
    }
}

fn structured_line(entry: &LogEntry) -> Result<Map<String, Value>, serde_json::Error> {
    let mut line = match &entry.payload {
        Payload::Text(text) => Map::from_iter([("message".to_owned(), Value::from(text.clone()))]),
        Payload::Json(value) => json_object(value),
    };
    // Reserved keys win over payload fields of the same name.
    line.insert("severity".to_owned(), serde_json::to_value(entry.severity)?);
    if !entry.labels.is_empty() {
        line.insert(
            LABELS_FIELD.to_owned(),
            Value::Object(
                entry
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                    .collect(),
            ),
        );
    }
    Ok(line)
}

fn write_structured_line<W: Write + ?Sized>(
    w: &mut W,
    entry: &LogEntry,
) -> Result<(), FunctionError> {
    structured_line(entry)
        .and_then(|line| serde_json::to_writer(&mut *w, &line))
        .map_err(|e| FunctionError::Telemetry(Box::new(e)))?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Client and logger
// ---------------------------------------------------------------------------

/// Logging client scoped to a single project.
#[derive(Clone)]
pub struct LoggingClient {
    project_id: String,
    sink: Arc<dyn LogSink>,
}

impl LoggingClient {
    /// Create a client that writes through the Cloud Logging API.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::Config`] if `project_id` is empty, or
    /// [`FunctionError::Telemetry`] if the API client cannot be built.
    pub async fn new(project_id: impl Into<String>) -> Result<Self, FunctionError> {
        let project_id = checked_project(project_id.into())?;
        let sink = CloudLoggingSink::new().await?;
        Ok(Self {
            project_id,
            sink: Arc::new(sink),
        })
    }

    /// Create a client that writes to `sink`.
    pub fn with_sink(
        project_id: impl Into<String>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, FunctionError> {
        let project_id = checked_project(project_id.into())?;
        Ok(Self { project_id, sink })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Return a logger writing to `log_id`, attributing every entry to
    /// `resource`.
    pub fn logger(&self, log_id: &str, resource: MonitoredResource) -> Logger {
        Logger {
            log_name: format!(
                "projects/{}/logs/{}",
                self.project_id,
                utf8_percent_encode(log_id, LOG_ID)
            ),
            resource,
            labels: BTreeMap::new(),
            sink: Arc::clone(&self.sink),
        }
    }
}

fn checked_project(project_id: String) -> Result<String, FunctionError> {
    if project_id.trim().is_empty() {
        return Err(FunctionError::Config("project ID must not be empty".into()));
    }
    Ok(project_id)
}

impl std::fmt::Debug for LoggingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingClient")
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

/// Handle for writing entries to one log.
#[derive(Clone)]
pub struct Logger {
    log_name: String,
    resource: MonitoredResource,
    labels: BTreeMap<String, String>,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Full log name, `projects/<project>/logs/<log id>`.
    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn resource(&self) -> &MonitoredResource {
        &self.resource
    }

    /// Attach a label to every subsequent entry.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Write one entry.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the entry cannot be written.
    pub async fn log(&self, severity: Severity, payload: Payload) -> Result<(), FunctionError> {
        self.sink
            .write(&LogEntry {
                log_name: self.log_name.clone(),
                resource: self.resource.clone(),
                severity,
                payload,
                labels: self.labels.clone(),
            })
            .await
    }

    /// Write a plain text entry.
    pub async fn text(
        &self,
        severity: Severity,
        message: impl Into<String>,
    ) -> Result<(), FunctionError> {
        self.log(severity, Payload::Text(message.into())).await
    }

    /// Write a structured entry from any serialisable value.
    pub async fn json<T: Serialize + ?Sized>(
        &self,
        severity: Severity,
        value: &T,
    ) -> Result<(), FunctionError> {
        let value = serde_json::to_value(value).map_err(|e| FunctionError::Telemetry(Box::new(e)))?;
        self.log(severity, Payload::Json(value)).await
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("log_name", &self.log_name)
            .field("resource", &self.resource)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

/// Build a Cloud Logging logger for the running function.
///
/// The log id is the function name and entries are attributed to the
/// `cloud_function` resource for the function and region.
///
/// # Errors
///
/// Returns [`FunctionError::MissingVar`] for the first of `GCP_PROJECT`,
/// `FUNCTION_NAME`, `FUNCTION_REGION` that is unset, before any client is
/// built. Returns [`FunctionError::Telemetry`] if the API client cannot be
/// built.
pub async fn new_function_logger(env: &FunctionEnv) -> Result<Logger, FunctionError> {
    let (project_id, function_name, region) = function_metadata(env)?;
    let client = LoggingClient::new(project_id).await?;
    debug!(project_id, function_name, "function logger created");
    Ok(function_logger(&client, function_name, region))
}

/// Same as [`new_function_logger`], writing to `sink`.
pub fn new_function_logger_with_sink(
    env: &FunctionEnv,
    sink: Arc<dyn LogSink>,
) -> Result<Logger, FunctionError> {
    let (project_id, function_name, region) = function_metadata(env)?;
    let client = LoggingClient::with_sink(project_id, sink)?;
    Ok(function_logger(&client, function_name, region))
}

fn function_metadata(env: &FunctionEnv) -> Result<(&str, &str, &str), FunctionError> {
    Ok((env.project_id()?, env.function_name()?, env.region()?))
}

fn function_logger(client: &LoggingClient, function_name: &str, region: &str) -> Logger {
    client.logger(
        function_name,
        MonitoredResource::cloud_function(function_name, region),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FUNCTION_NAME, FUNCTION_REGION, GCP_PROJECT};
    use serde_json::json;

    #[derive(Default)]
    struct MemorySink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LogSink for MemorySink {
        async fn write(&self, entry: &LogEntry) -> Result<(), FunctionError> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn full_env() -> FunctionEnv {
        FunctionEnv::from_vars([
            (GCP_PROJECT, "acme"),
            (FUNCTION_NAME, "resize"),
            (FUNCTION_REGION, "us-central1"),
        ])
    }

    fn entry(payload: Payload) -> LogEntry {
        LogEntry {
            log_name: "projects/acme/logs/resize".into(),
            resource: MonitoredResource::cloud_function("resize", "us-central1"),
            severity: Severity::Warning,
            payload,
            labels: BTreeMap::from([("execution_id".to_owned(), "e-1".to_owned())]),
        }
    }

    #[tokio::test]
    async fn function_logger_is_scoped_to_resource() {
        let sink = Arc::new(MemorySink::default());
        let logger = new_function_logger_with_sink(&full_env(), sink.clone()).unwrap();

        assert_eq!(logger.log_name(), "projects/acme/logs/resize");
        assert_eq!(logger.resource().kind, "cloud_function");

        logger.text(Severity::Info, "started").await.unwrap();
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resource.labels["function_name"], "resize");
        assert_eq!(entries[0].resource.labels["region"], "us-central1");
        assert_eq!(entries[0].payload, Payload::Text("started".into()));
    }

    #[tokio::test]
    async fn missing_project_is_reported_first() {
        let env = FunctionEnv::default();
        let err = new_function_logger_with_sink(&env, Arc::new(MemorySink::default())).unwrap_err();
        assert_eq!(err.missing_var(), Some(GCP_PROJECT));
        assert!(new_function_logger(&env)
            .await
            .unwrap_err()
            .to_string()
            .contains("GCP_PROJECT"));
    }

    #[tokio::test]
    async fn missing_name_and_region_are_named() {
        let env = FunctionEnv::from_vars([(GCP_PROJECT, "acme")]);
        assert_eq!(
            new_function_logger(&env).await.unwrap_err().missing_var(),
            Some(FUNCTION_NAME)
        );

        let env = FunctionEnv::from_vars([(GCP_PROJECT, "acme"), (FUNCTION_NAME, "f")]);
        assert_eq!(
            new_function_logger(&env).await.unwrap_err().missing_var(),
            Some(FUNCTION_REGION)
        );
    }

    #[test]
    fn api_entry_carries_log_name_and_resource() {
        let api = api_entry(&entry(Payload::Text("disk almost full".into())));

        assert_eq!(api.log_name, "projects/acme/logs/resize");
        let resource = api.resource.as_ref().unwrap();
        assert_eq!(resource.r#type, "cloud_function");
        assert_eq!(resource.labels["function_name"], "resize");
        assert_eq!(resource.labels["region"], "us-central1");
        assert_eq!(api.labels["execution_id"], "e-1");
        assert_eq!(
            api.text_payload().map(String::as_str),
            Some("disk almost full")
        );
        assert!(api.json_payload().is_none());
    }

    #[test]
    fn api_entry_wraps_non_object_json() {
        let api = api_entry(&entry(Payload::Json(json!({"stage": "decode"}))));
        assert_eq!(api.json_payload().unwrap()["stage"], "decode");

        let api = api_entry(&entry(Payload::Json(json!([1, 2]))));
        assert_eq!(api.json_payload().unwrap()["message"], json!([1, 2]));
        assert!(api.text_payload().is_none());
    }

    #[tokio::test]
    async fn writer_sink_emits_structured_fields() {
        let sink = Arc::new(WriterSink::new(Vec::new()));
        let client = LoggingClient::with_sink("acme", sink.clone()).unwrap();
        let logger = client
            .logger("resize", MonitoredResource::cloud_function("resize", "eu"))
            .with_label("execution_id", "e-1");

        logger
            .json(Severity::Error, &json!({"stage": "decode", "severity": "spoofed"}))
            .await
            .unwrap();
        logger.text(Severity::Debug, "done").await.unwrap();
        drop(logger);
        drop(client);

        let out = Arc::try_unwrap(sink).ok().unwrap().into_inner();
        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["severity"], "ERROR");
        assert_eq!(lines[0]["stage"], "decode");
        assert_eq!(lines[0][LABELS_FIELD]["execution_id"], "e-1");
        assert_eq!(lines[1]["severity"], "DEBUG");
        assert_eq!(lines[1]["message"], "done");
        assert!(lines[1].get("textPayload").is_none());
        assert!(lines[1].get("logName").is_none());
    }

    #[test]
    fn log_id_is_path_escaped() {
        let client = LoggingClient::with_sink("p", Arc::new(MemorySink::default())).unwrap();
        let name = |id: &str| {
            client
                .logger(id, MonitoredResource::cloud_function("f", "r"))
                .log_name()
                .to_owned()
        };
        assert_eq!(name("resize"), "projects/p/logs/resize");
        assert_eq!(name("jobs/nightly"), "projects/p/logs/jobs%2Fnightly");
        assert_eq!(name("a b~c.d"), "projects/p/logs/a%20b~c.d");
        assert_eq!(name("café"), "projects/p/logs/caf%C3%A9");
    }

    #[test]
    fn empty_project_rejected() {
        let sink: Arc<dyn LogSink> = Arc::new(MemorySink::default());
        assert!(LoggingClient::with_sink("  ", sink.clone()).is_err());
        assert_eq!(
            LoggingClient::with_sink("acme", sink).unwrap().project_id(),
            "acme"
        );
    }
}
