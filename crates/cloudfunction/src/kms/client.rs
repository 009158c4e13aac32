//! Cloud KMS client wrapper.

use async_trait::async_trait;
use bytes::Bytes;
use common::FunctionError;
use google_cloud_kms_v1::client::KeyManagementService;

use super::KeyManagement;

/// [`KeyManagement`] implementation over the Cloud KMS API.
#[derive(Clone, Debug)]
pub struct KmsClient {
    inner: KeyManagementService,
}

impl KmsClient {
    /// Build a client using application default credentials.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::Kms`] if credentials cannot be resolved.
    pub async fn new() -> Result<Self, FunctionError> {
        let inner = KeyManagementService::builder()
            .build()
            .await
            .map_err(|e| FunctionError::Kms(Box::new(e)))?;
        Ok(Self { inner })
    }

    /// Wrap an already configured service client.
    pub fn from_service(inner: KeyManagementService) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl KeyManagement for KmsClient {
    async fn decrypt(&self, key_name: &str, ciphertext: Bytes) -> Result<Bytes, FunctionError> {
        let resp = self
            .inner
            .decrypt()
            .set_name(key_name)
            .set_ciphertext(ciphertext)
            .send()
            .await
            .map_err(|e| FunctionError::Kms(Box::new(e)))?;
        Ok(resp.plaintext)
    }
}
