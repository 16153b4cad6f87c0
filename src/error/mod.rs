use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Model client construction or call failure.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Malformed analysis request.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Unexpected internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file or pool could not be opened.
    #[error("Database connection failed: {message}")]
    Connection {
        /// Underlying cause.
        message: String,
    },

    /// A query failed or returned malformed rows.
    #[error("Query failed: {message}")]
    Query {
        /// Underlying cause.
        message: String,
    },

    /// No stored analysis has this id.
    #[error("Analysis not found: {analysis_id}")]
    AnalysisNotFound {
        /// The id that was looked up.
        analysis_id: String,
    },

    /// Schema migrations failed.
    #[error("Migration failed: {message}")]
    Migration {
        /// Underlying cause.
        message: String,
    },

    /// A stored payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Raw driver error.
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Failure class reported by the model client.
///
/// Only [`ModelErrorKind::Timeout`] and [`ModelErrorKind::Network`] are
/// transient; everything else fails the call on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    /// The attempt exceeded its per-call timeout.
    Timeout,
    /// Connection refused/reset, TLS failure, or a retryable server status.
    Network,
    /// Missing or rejected credentials.
    Auth,
    /// The endpoint answered but produced no text.
    EmptyResponse,
    /// The request was refused (content policy, bad request).
    Rejected,
}

impl ModelErrorKind {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelErrorKind::Timeout => "timeout",
            ModelErrorKind::Network => "network",
            ModelErrorKind::Auth => "auth",
            ModelErrorKind::EmptyResponse => "empty_response",
            ModelErrorKind::Rejected => "rejected",
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelErrorKind::Timeout | ModelErrorKind::Network)
    }
}

impl fmt::Display for ModelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by the external model client
#[derive(Debug, Error)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct ModelError {
    /// Failure class, decides whether a retry is attempted.
    pub kind: ModelErrorKind,
    /// Detail from the last attempt.
    pub message: String,
    /// Attempts made, including the first.
    pub attempts: u32,
}

impl ModelError {
    /// Create an error for a single attempt.
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 1,
        }
    }

    /// Record how many attempts were made before giving up.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Shorthand for a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            ModelErrorKind::Timeout,
            format!("request timed out after {}ms", timeout_ms),
        )
    }

    /// Whether the underlying failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Structured response parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// No balanced object or array in the text.
    #[error("No balanced JSON {expected} found. First 100 chars: '{preview}'")]
    NoStructure {
        /// `object` or `array`.
        expected: String,
        /// Leading characters of the raw text.
        preview: String,
    },

    /// A balanced span was found but did not parse.
    #[error("Invalid JSON {expected}: {message}")]
    Invalid {
        /// `object` or `array`.
        expected: String,
        /// serde_json's error.
        message: String,
    },

    /// Valid JSON that does not fit the target type.
    #[error("Unexpected shape: {message}")]
    Shape {
        /// serde_json's error.
        message: String,
    },
}

/// Why a stage could not produce a model-derived payload.
///
/// Every variant leads to that stage's fallback; none reaches the caller.
#[derive(Debug, Error)]
pub enum StageError {
    /// The model call failed after retries.
    #[error("Model call failed: {0}")]
    Model(#[from] ModelError),

    /// The response held no usable JSON.
    #[error("Response parsing failed: {0}")]
    Parse(#[from] ParseError),

    /// The parsed payload failed schema checks.
    #[error("Model output rejected by validation: {0}")]
    Invalid(#[from] SchemaError),

    /// The stage deadline fired first.
    #[error("Stage {stage} exceeded its {budget_ms}ms budget")]
    Timeout {
        /// Stage name.
        stage: String,
        /// Configured deadline.
        budget_ms: u64,
    },
}

/// A payload that does not satisfy the output schema
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Schema violation in {payload}.{field}: {reason}")]
pub struct SchemaError {
    /// Payload type, e.g. `core_analysis`.
    pub payload: &'static str,
    /// Offending field.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: String,
}

impl SchemaError {
    /// Create a schema violation for a payload field.
    pub fn new(payload: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            payload,
            field,
            reason: reason.into(),
        }
    }
}

/// Malformed analysis requests, rejected before any stage runs
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    /// Thesis was empty or whitespace.
    #[error("Thesis text cannot be empty")]
    EmptyThesis,

    /// Some other field was invalid.
    #[error("Validation failed: {field} - {reason}")]
    Validation {
        /// Offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for model calls
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type alias for stage executors
pub type StageResultOf<T> = Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(err.to_string(), "Database connection failed: failed to connect");

        let err = StorageError::AnalysisNotFound {
            analysis_id: "a-123".to_string(),
        };
        assert_eq!(err.to_string(), "Analysis not found: a-123");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_model_error_display() {
        let err = ModelError::new(ModelErrorKind::Auth, "401 unauthorized");
        assert_eq!(err.to_string(), "auth after 1 attempt(s): 401 unauthorized");

        let err = ModelError::timeout(5000).with_attempts(4);
        assert_eq!(
            err.to_string(),
            "timeout after 4 attempt(s): request timed out after 5000ms"
        );
    }

    #[test]
    fn test_model_error_kind_transience() {
        assert!(ModelErrorKind::Timeout.is_transient());
        assert!(ModelErrorKind::Network.is_transient());
        assert!(!ModelErrorKind::Auth.is_transient());
        assert!(!ModelErrorKind::EmptyResponse.is_transient());
        assert!(!ModelErrorKind::Rejected.is_transient());
    }

    #[test]
    fn test_model_error_kind_serde() {
        let json = serde_json::to_string(&ModelErrorKind::EmptyResponse).unwrap();
        assert_eq!(json, "\"empty_response\"");
        assert_eq!(ModelErrorKind::EmptyResponse.to_string(), "empty_response");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::NoStructure {
            expected: "object".to_string(),
            preview: "hello".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No balanced JSON object found. First 100 chars: 'hello'"
        );
    }

    #[test]
    fn test_stage_error_conversions() {
        let err: StageError = ModelError::new(ModelErrorKind::Network, "reset").into();
        assert!(matches!(err, StageError::Model(_)));

        let err: StageError = ParseError::Shape {
            message: "not an array".to_string(),
        }
        .into();
        assert!(matches!(err, StageError::Parse(_)));

        let err: StageError = SchemaError::new("signals", "signals", "empty").into();
        assert_eq!(
            err.to_string(),
            "Model output rejected by validation: Schema violation in signals.signals: empty"
        );

        let err = StageError::Timeout {
            stage: "core_claim".to_string(),
            budget_ms: 100,
        };
        assert_eq!(err.to_string(), "Stage core_claim exceeded its 100ms budget");
    }

    #[test]
    fn test_request_error_display() {
        assert_eq!(
            RequestError::EmptyThesis.to_string(),
            "Thesis text cannot be empty"
        );
        let err = RequestError::Validation {
            field: "thesis_text".to_string(),
            reason: "too long".to_string(),
        };
        assert_eq!(err.to_string(), "Validation failed: thesis_text - too long");
    }

    #[test]
    fn test_error_conversion_to_app_error() {
        let app_err: AppError = StorageError::AnalysisNotFound {
            analysis_id: "x".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Storage(_)));

        let app_err: AppError = ModelError::timeout(10).into();
        assert!(matches!(app_err, AppError::Model(_)));

        let app_err: AppError = RequestError::EmptyThesis.into();
        assert!(matches!(app_err, AppError::Request(_)));
    }
}
