//! Error types for federated search operations

use crate::error::AppError;

/// Result type for federated search operations
pub type FederationResult<T> = std::result::Result<T, FederationError>;

/// Errors raised across the federation boundary
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// Caller input was rejected before any backend call was made
    #[error("Validation failed: {message} (value: {value:?})")]
    Validation { message: String, value: String },

    /// The search backend failed or answered with something unusable
    #[error("Search backend error: {0}")]
    SearchBackend(String),

    /// The search backend did not answer within the configured timeout
    #[error("Search backend timed out: {0}")]
    BackendTimeout(String),

    /// The user directory could not resolve visibility for an identified user
    #[error("User directory error: {0}")]
    Directory(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl FederationError {
    /// Build a validation error carrying the offending value
    pub fn validation(message: impl Into<String>, value: impl Into<String>) -> Self {
        FederationError::Validation {
            message: message.into(),
            value: value.into(),
        }
    }

    /// Whether this error was caused by the caller's input
    pub fn is_validation(&self) -> bool {
        matches!(self, FederationError::Validation { .. })
    }

    /// Whether this error originated in the search backend
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            FederationError::SearchBackend(_) | FederationError::BackendTimeout(_)
        )
    }
}

impl From<reqwest::Error> for FederationError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest's Display omits the underlying cause
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        if err.is_timeout() {
            FederationError::BackendTimeout(message)
        } else {
            FederationError::SearchBackend(message)
        }
    }
}

impl From<FederationError> for AppError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::Validation { .. } => AppError::Validation(err.to_string()),
            FederationError::SearchBackend(msg) => AppError::Integration {
                integration_source: "search-backend".to_string(),
                message: msg,
            },
            FederationError::BackendTimeout(msg) => AppError::Timeout(msg),
            FederationError::Directory(msg) => AppError::Integration {
                integration_source: "user-directory".to_string(),
                message: msg,
            },
            FederationError::InvalidConfiguration(msg) => AppError::Configuration(msg),
        }
    }
}
