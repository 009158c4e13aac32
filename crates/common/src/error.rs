//! Common error types shared across crates.

use thiserror::Error;

/// Boxed error returned by an external client library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad classification of a [`FunctionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required configuration is missing or invalid.
    Configuration,
    /// Caller-provided data could not be decoded.
    InvalidInput,
    /// An external service or the local filesystem failed.
    Service,
}

/// Top-level library error type.
///
/// Every error is terminal for the call that produced it; retries are left to
/// the caller. Service variants are transparent so the underlying client's
/// message is reported unchanged.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// A required environment variable is absent or empty.
    #[error("{0} environment variable unset or missing")]
    MissingVar(String),

    /// Library configuration could not be loaded or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The named variable does not hold valid standard base64.
    #[error("{var} is not valid base64: {source}")]
    InvalidBase64 {
        var: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    InvalidPlaintext(#[source] std::string::FromUtf8Error),

    /// Cloud Storage client construction or object read failed.
    #[error(transparent)]
    Storage(BoxError),

    /// Cloud KMS client construction or decrypt call failed.
    #[error(transparent)]
    Kms(BoxError),

    /// Trace exporter or log sink failed.
    #[error(transparent)]
    Telemetry(BoxError),

    /// Local filesystem failure (temp file creation or write).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FunctionError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FunctionError::MissingVar(_) | FunctionError::Config(_) => ErrorKind::Configuration,
            FunctionError::InvalidBase64 { .. } | FunctionError::InvalidPlaintext(_) => {
                ErrorKind::InvalidInput
            }
            FunctionError::Storage(_)
            | FunctionError::Kms(_)
            | FunctionError::Telemetry(_)
            | FunctionError::Io(_) => ErrorKind::Service,
        }
    }

    /// Name of the missing environment variable, if that is what failed.
    pub fn missing_var(&self) -> Option<&str> {
        match self {
            FunctionError::MissingVar(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    #[test]
    fn missing_var_names_variable() {
        let e = FunctionError::MissingVar("GCP_PROJECT".into());
        assert_eq!(
            e.to_string(),
            "GCP_PROJECT environment variable unset or missing"
        );
        assert_eq!(e.missing_var(), Some("GCP_PROJECT"));
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn service_errors_are_transparent() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "object not found");
        let e = FunctionError::Storage(Box::new(inner));
        assert_eq!(e.to_string(), "object not found");
        assert_eq!(e.kind(), ErrorKind::Service);
        assert!(e.missing_var().is_none());
    }

    #[test]
    fn invalid_base64_is_input_error() {
        let source = STANDARD.decode("!!!").unwrap_err();
        let e = FunctionError::InvalidBase64 {
            var: "DB_PASSWORD".into(),
            source,
        };
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
        assert!(e.to_string().starts_with("DB_PASSWORD is not valid base64"));
    }
}
