use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Structured error type for the service. The serialized form carries a
/// stable `code` so the visualizer can match on it.
///
/// Malformed generator output is deliberately absent: the normalizer absorbs
/// it into a fallback command and it never becomes an `AppError`.
#[derive(Debug, Clone, Error, Serialize)]
#[cfg_attr(feature = "ts-export", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-export", ts(export))]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    /// A required request field was missing or empty.
    #[error("{message}")]
    ClientInput { message: String },
    /// The text-generation provider cannot be reached or has no credential.
    #[error("{message}")]
    ProviderUnavailable { message: String },
    /// The provider answered, but not with a usable completion.
    #[error("{message}")]
    ProviderError { message: String },
    #[error("Provider did not respond within {seconds}s")]
    ProviderTimeout { seconds: u64 },
    #[error("{message}")]
    InvalidMatrix { message: String },
    #[error("Configuration error: {message}")]
    Config { message: String },
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl AppError {
    /// HTTP status for this error. Only client input problems are 4xx.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ClientInput { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable variant name, used as the `code` field of error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ClientInput { .. } => "ClientInput",
            AppError::ProviderUnavailable { .. } => "ProviderUnavailable",
            AppError::ProviderError { .. } => "ProviderError",
            AppError::ProviderTimeout { .. } => "ProviderTimeout",
            AppError::InvalidMatrix { .. } => "InvalidMatrix",
            AppError::Config { .. } => "Config",
            AppError::Io { .. } => "Io",
        }
    }

    pub fn client_input(message: impl Into<String>) -> Self {
        AppError::ClientInput {
            message: message.into(),
        }
    }

    pub fn invalid_matrix(message: impl Into<String>) -> Self {
        AppError::InvalidMatrix {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_client_input_is_bad_request() {
        assert_eq!(
            AppError::client_input("message is required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ProviderTimeout { seconds: 5 }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::invalid_matrix("not square").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_serialized_code_matches_code_fn() {
        let err = AppError::ProviderError {
            message: "boom".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], err.code());
        assert_eq!(json["detail"]["message"], "boom");
    }

    #[test]
    fn test_timeout_display() {
        let err = AppError::ProviderTimeout { seconds: 30 };
        assert_eq!(err.to_string(), "Provider did not respond within 30s");
    }

    #[cfg(feature = "ts-export")]
    #[test]
    fn test_error_is_exported_with_commands() {
        fn exported<T: ts_rs::TS>() {}
        exported::<AppError>();
        exported::<crate::schema::Command>();
    }
}
