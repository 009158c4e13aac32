//! Process-wide trace export to Cloud Trace with an always-sample policy.

use async_trait::async_trait;
use common::FunctionError;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::{Config, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::resource;
use opentelemetry_stackdriver::{Authorizer, GcpAuthorizer, StackDriverExporter};
use tracing::info;

use crate::config::{FunctionEnv, FUNCTION_NAME, FUNCTION_REGION};

const TRACER_NAME: &str = "cloudfunction";

/// Handle to the installed trace pipeline.
///
/// Calling [`enable_trace_export`] again replaces the global tracer provider;
/// the most recent registration wins.
#[derive(Clone)]
pub struct TraceExport {
    project_id: String,
    tracer: Tracer,
}

impl TraceExport {
    /// Project spans are written to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Tracer bound to the installed provider, for use with
    /// `tracing-opentelemetry` or the OpenTelemetry API directly.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Flush pending spans and uninstall the global tracer provider.
    pub fn shutdown(self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

impl std::fmt::Debug for TraceExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceExport")
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

/// Export every span to Cloud Trace in the function's project.
///
/// Credentials come from the ambient Google configuration. Must be called
/// from within a Tokio runtime: the exporter's request driver and the batch
/// span processor both run on it.
///
/// # Errors
///
/// Returns [`FunctionError::MissingVar`] if `GCP_PROJECT` is unset (before any
/// exporter is built), or [`FunctionError::Telemetry`] if credentials cannot
/// be loaded or the exporter cannot be built.
pub async fn enable_trace_export(env: &FunctionEnv) -> Result<TraceExport, FunctionError> {
    let project_id = env.project_id()?;

    let authorizer = ProjectAuthorizer {
        inner: GcpAuthorizer::new()
            .await
            .map_err(|e| FunctionError::Telemetry(Box::new(e)))?,
        project_id: project_id.to_owned(),
    };
    let (exporter, driver) = StackDriverExporter::builder()
        .build(authorizer)
        .await
        .map_err(|e| FunctionError::Telemetry(Box::new(e)))?;
    tokio::spawn(driver);

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(trace_config(env, project_id))
        .build();
    let tracer = provider.tracer(TRACER_NAME);
    opentelemetry::global::set_tracer_provider(provider);

    info!(project_id, "trace export enabled");
    Ok(TraceExport {
        project_id: project_id.to_owned(),
        tracer,
    })
}

/// Authorizer that reports `project_id` instead of the credentials' own
/// project, so spans land in the function's project.
struct ProjectAuthorizer {
    inner: GcpAuthorizer,
    project_id: String,
}

#[async_trait]
impl Authorizer for ProjectAuthorizer {
    type Error = <GcpAuthorizer as Authorizer>::Error;

    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn authorize<T: Send + Sync>(
        &self,
        request: &mut tonic::Request<T>,
        scopes: &[&str],
    ) -> Result<(), Self::Error> {
        self.inner.authorize(request, scopes).await
    }
}

fn trace_config(env: &FunctionEnv, project_id: &str) -> Config {
    Config::default()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(function_resource(env, project_id))
}

fn function_resource(env: &FunctionEnv, project_id: &str) -> Resource {
    let mut attrs = vec![
        KeyValue::new(resource::CLOUD_PROVIDER, "gcp"),
        KeyValue::new(resource::CLOUD_PLATFORM, "gcp_cloud_functions"),
        KeyValue::new(resource::CLOUD_ACCOUNT_ID, project_id.to_owned()),
    ];
    if let Some(name) = env.get(FUNCTION_NAME) {
        attrs.push(KeyValue::new(resource::SERVICE_NAME, name.to_owned()));
        attrs.push(KeyValue::new(resource::FAAS_NAME, name.to_owned()));
    }
    if let Some(region) = env.get(FUNCTION_REGION) {
        attrs.push(KeyValue::new(resource::CLOUD_REGION, region.to_owned()));
    }
    Resource::new(attrs)
}
