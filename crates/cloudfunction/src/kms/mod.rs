//! Decrypt base64 ciphertext held in an environment variable with Cloud KMS.
//!
//! Ciphertext is produced out of band, for example:
//!
//! ```text
//! gcloud kms encrypt --location global --keyring my-keyring --key my-key \
//!     --plaintext-file secret.txt --ciphertext-file - | base64 -w 0
//! ```
//!
//! # Security invariants
//!
//! - Decrypted plaintext is returned to the caller only. It is never logged,
//!   cached, or written to disk by this module.

pub mod client;

pub use client::KmsClient;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use common::FunctionError;
use tracing::debug;

use crate::config::FunctionEnv;

/// Decrypt capability of a key-management service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyManagement: Send + Sync {
    /// Decrypt `ciphertext` with the key identified by `key_name`
    /// (`projects/*/locations/*/keyRings/*/cryptoKeys/*`).
    async fn decrypt(&self, key_name: &str, ciphertext: Bytes) -> Result<Bytes, FunctionError>;
}

/// Decrypt the environment variable `var` and return it as a UTF-8 string.
///
/// `key_id` overrides the `KMS_KEY_ID` variable when it is `Some` and
/// non-empty. If `client` is `None`, a [`KmsClient`] is built for this call.
///
/// # Errors
///
/// - [`FunctionError::MissingVar`] if `var` is unset, or no key id is given
///   and `KMS_KEY_ID` is unset.
/// - [`FunctionError::InvalidBase64`] if `var` is not standard base64. KMS is
///   not contacted in this case.
/// - [`FunctionError::Kms`] if the client cannot be built or the decrypt call
///   fails.
/// - [`FunctionError::InvalidPlaintext`] if the plaintext is not UTF-8.
pub async fn decrypt_env(
    client: Option<&dyn KeyManagement>,
    env: &FunctionEnv,
    key_id: Option<&str>,
    var: &str,
) -> Result<String, FunctionError> {
    let plaintext = decrypt_env_bytes(client, env, key_id, var).await?;
    String::from_utf8(plaintext).map_err(FunctionError::InvalidPlaintext)
}

/// Same as [`decrypt_env`], returning the raw plaintext bytes.
pub async fn decrypt_env_bytes(
    client: Option<&dyn KeyManagement>,
    env: &FunctionEnv,
    key_id: Option<&str>,
    var: &str,
) -> Result<Vec<u8>, FunctionError> {
    let encoded = env.require(var)?;

    let key_name = match key_id.filter(|k| !k.is_empty()) {
        Some(k) => k,
        None => env.kms_key_id()?,
    };

    let ciphertext = STANDARD
        .decode(encoded)
        .map_err(|source| FunctionError::InvalidBase64 {
            var: var.to_owned(),
            source,
        })?;

    let default_client;
    let client: &dyn KeyManagement = match client {
        Some(c) => c,
        None => {
            default_client = KmsClient::new().await?;
            &default_client
        }
    };

    let plaintext = client.decrypt(key_name, Bytes::from(ciphertext)).await?;
    debug!(var, key = key_name, "decrypted environment variable");
    Ok(plaintext.to_vec())
}
