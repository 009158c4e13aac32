//! Execution metadata and library configuration.
//!
//! The process environment is read once, at the boundary, into a
//! [`FunctionEnv`] snapshot. Every operation in this crate takes the snapshot
//! by reference instead of reading `std::env` itself.

use std::collections::HashMap;

use common::FunctionError;
use serde::Deserialize;

/// Name of the deployed function.
pub const FUNCTION_NAME: &str = "FUNCTION_NAME";
/// Project the function runs in.
pub const GCP_PROJECT: &str = "GCP_PROJECT";
/// Region the function is deployed to.
pub const FUNCTION_REGION: &str = "FUNCTION_REGION";
/// Fallback Cloud KMS key resource name for [`crate::kms::decrypt_env`].
pub const KMS_KEY_ID: &str = "KMS_KEY_ID";

/// Immutable snapshot of the function's environment variables.
#[derive(Clone, Default)]
pub struct FunctionEnv {
    vars: HashMap<String, String>,
}

impl FunctionEnv {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Build a snapshot from explicit name/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Return the value of `name`, or `None` if it is unset or empty.
    ///
    /// Values are returned verbatim, surrounding whitespace included.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Return the value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::MissingVar`] naming the variable if it is unset
    /// or empty.
    pub fn require(&self, name: &str) -> Result<&str, FunctionError> {
        self.get(name)
            .ok_or_else(|| FunctionError::MissingVar(name.to_owned()))
    }

    /// Name of the running function (`FUNCTION_NAME`).
    pub fn function_name(&self) -> Result<&str, FunctionError> {
        self.require(FUNCTION_NAME)
    }

    /// Project ID (`GCP_PROJECT`).
    pub fn project_id(&self) -> Result<&str, FunctionError> {
        self.require(GCP_PROJECT)
    }

    /// Deployment region (`FUNCTION_REGION`).
    pub fn region(&self) -> Result<&str, FunctionError> {
        self.require(FUNCTION_REGION)
    }

    /// Default KMS key resource name (`KMS_KEY_ID`).
    pub fn kms_key_id(&self) -> Result<&str, FunctionError> {
        self.require(KMS_KEY_ID)
    }
}

impl std::fmt::Debug for FunctionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Values may hold credentials or ciphertext; print names only.
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionEnv").field("vars", &names).finish()
    }
}

/// Settings for the process-wide log subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Tracing log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl TelemetryConfig {
    /// Load and validate telemetry settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::Config`] if a value cannot be parsed or fails
    /// validation.
    pub fn from_env() -> Result<Self, FunctionError> {
        Self::load(config::Environment::default())
    }

    /// Load settings from an explicit variable map instead of the process
    /// environment.
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self, FunctionError> {
        Self::load(config::Environment::default().source(Some(vars)))
    }

    fn load(source: config::Environment) -> Result<Self, FunctionError> {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|e| FunctionError::Config(format!("failed to read environment: {e}")))?;

        let c: TelemetryConfig = cfg
            .try_deserialize()
            .map_err(|e| FunctionError::Config(format!("failed to deserialise settings: {e}")))?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<(), FunctionError> {
        if self.log_level.trim().is_empty() {
            return Err(FunctionError::Config("LOG_LEVEL must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> FunctionEnv {
        FunctionEnv::from_vars([
            (FUNCTION_NAME, "thumbnail"),
            (GCP_PROJECT, "acme-prod"),
            (FUNCTION_REGION, "us-central1"),
            ("BLANK", "   "),
        ])
    }

    #[test]
    fn accessors_return_exact_values() {
        let env = env();
        assert_eq!(env.function_name().unwrap(), "thumbnail");
        assert_eq!(env.project_id().unwrap(), "acme-prod");
        assert_eq!(env.region().unwrap(), "us-central1");
    }

    #[test]
    fn missing_variable_is_named() {
        let err = FunctionEnv::default().function_name().unwrap_err();
        assert_eq!(err.missing_var(), Some(FUNCTION_NAME));
        assert!(err.to_string().contains("FUNCTION_NAME"));

        let err = FunctionEnv::default().project_id().unwrap_err();
        assert!(err.to_string().contains("GCP_PROJECT"));

        let err = env().kms_key_id().unwrap_err();
        assert!(err.to_string().contains("KMS_KEY_ID"));
    }

    #[test]
    fn only_empty_values_count_as_missing() {
        let env = FunctionEnv::from_vars([(GCP_PROJECT, "")]);
        assert_eq!(env.project_id().unwrap_err().missing_var(), Some(GCP_PROJECT));
        assert_eq!(self::env().require("BLANK").unwrap(), "   ");
        assert_eq!(self::env().get("BLANK"), Some("   "));
    }

    #[test]
    fn debug_hides_values() {
        let env = FunctionEnv::from_vars([("DB_PASSWORD", "hunter2")]);
        let dbg = format!("{env:?}");
        assert!(dbg.contains("DB_PASSWORD"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn telemetry_defaults() {
        assert_eq!(default_log_level(), "info");
        let cfg = TelemetryConfig::from_source(HashMap::new()).unwrap();
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn telemetry_reads_overrides() {
        let vars = HashMap::from([("LOG_LEVEL".to_owned(), "debug".to_owned())]);
        let cfg = TelemetryConfig::from_source(vars).unwrap();
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn validate_rejects_blank_log_level() {
        let cfg = TelemetryConfig {
            log_level: "  ".into(),
        };
        assert!(cfg.validate().is_err());
    }
}
