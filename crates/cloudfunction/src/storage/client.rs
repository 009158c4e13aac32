//! Default Cloud Storage client backed by `object_store`.

use async_trait::async_trait;
use common::FunctionError;
use futures::{StreamExt, TryStreamExt};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::ObjectStore;

use super::{ObjectStorage, ObjectStream};

/// Bucket name used only while validating credentials in
/// [`GcsClient::from_env`]. `build()` never contacts the bucket.
const CREDENTIAL_CHECK_BUCKET: &str = "_";

/// Cloud Storage client using ambient Google credentials.
///
/// Credentials and endpoint overrides are taken from the standard
/// `GOOGLE_*` environment variables (service account file, application
/// default credentials, or the metadata server when running on GCP).
/// A bucket-scoped store is built per request, so one client can read from
/// any bucket the credentials allow.
#[derive(Debug, Clone)]
pub struct GcsClient {
    builder: GoogleCloudStorageBuilder,
}

impl GcsClient {
    /// Create a client from environment credentials.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::Storage`] if the credential configuration is
    /// present but unusable, e.g. a service account path that does not exist.
    pub fn from_env() -> Result<Self, FunctionError> {
        let builder = GoogleCloudStorageBuilder::from_env();
        // object_store only exposes credential loading through `build()`,
        // which needs a bucket name. It reads local credential files and
        // issues no network call, so a broken setup fails here instead of on
        // the first request.
        builder
            .clone()
            .with_bucket_name(CREDENTIAL_CHECK_BUCKET)
            .build()
            .map_err(|e| FunctionError::Storage(Box::new(e)))?;
        Ok(Self::with_builder(builder))
    }

    /// Create a client from a pre-configured builder.
    ///
    /// Any bucket name set on `builder` is replaced per request.
    pub fn with_builder(builder: GoogleCloudStorageBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl ObjectStorage for GcsClient {
    async fn open_object(&self, bucket: &str, object: &str) -> Result<ObjectStream, FunctionError> {
        let location = object_path(object)?;

        let store = self
            .builder
            .clone()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| FunctionError::Storage(Box::new(e)))?;

        let result = store
            .get(&location)
            .await
            .map_err(|e| FunctionError::Storage(Box::new(e)))?;

        Ok(result
            .into_stream()
            .map_err(|e| FunctionError::Storage(Box::new(e)))
            .boxed())
    }
}

/// Map an object name to a store path without altering it.
///
/// `Path::parse` keeps the name verbatim (the GCS client encodes it exactly
/// once when building the URL). Names it would normalise, such as leading or
/// trailing `/`, are rejected rather than silently fetching another object.
fn object_path(object: &str) -> Result<Path, FunctionError> {
    if object.is_empty() {
        return Err(FunctionError::Storage("object name must not be empty".into()));
    }
    let path = Path::parse(object).map_err(|e| FunctionError::Storage(Box::new(e)))?;
    if path.as_ref() != object {
        return Err(FunctionError::Storage(
            format!("object name {object:?} cannot be addressed without rewriting it").into(),
        ));
    }
    Ok(path)
}
