//! Helpers for code running inside a Google Cloud Functions environment.
//!
//! - [`config`]: execution metadata (`FUNCTION_NAME`, `GCP_PROJECT`, ...)
//!   captured once into a [`FunctionEnv`] snapshot.
//! - [`storage`]: copy a Cloud Storage object into a local temp file.
//! - [`kms`]: decrypt a base64 ciphertext environment variable via Cloud KMS.
//! - [`telemetry`]: trace export and a logger bound to the function's
//!   monitored resource.
//!
//! Operations that talk to a service accept an optional client. Passing
//! `None` builds a default client for that call; a supplied client stays
//! owned by the caller.
//!
//! ```no_run
//! # async fn handler() -> Result<(), cloudfunction::FunctionError> {
//! use cloudfunction::{kms, storage, FunctionEnv};
//!
//! let env = FunctionEnv::from_env();
//! let path = storage::object_to_temp_file(None, "uploads", "photo.jpg").await?;
//! let api_key = kms::decrypt_env(None, &env, None, "API_KEY").await?;
//! # let _ = (path, api_key);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod kms;
pub mod storage;
pub mod telemetry;

pub use common::{ErrorKind, FunctionError, LogEntry, MonitoredResource, Payload, Severity};
pub use config::{FunctionEnv, TelemetryConfig};
