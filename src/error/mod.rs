use thiserror::Error;

/// Application-level errors surfaced to callers of the exposed operations
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Validation error helper
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Not-found error helper
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Conflict error helper
    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
        }
    }
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Funnel not found: {funnel_id}")]
    FunnelNotFound { funnel_id: String },

    #[error("Page not found: {page}")]
    PageNotFound { page: String },

    #[error("Experiment not found: {experiment_id}")]
    ExperimentNotFound { experiment_id: String },

    #[error("Experiment already running for page {page_name} in funnel {funnel_id}")]
    RunningExperimentExists {
        funnel_id: String,
        page_name: String,
    },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Errors from the external page generator service
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for generator calls
pub type GeneratorResult<T> = Result<T, GeneratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::validation("funnelId", "cannot be empty");
        assert_eq!(
            err.to_string(),
            "Validation failed: funnelId - cannot be empty"
        );

        let err = AppError::not_found("funnel", "fn-123");
        assert_eq!(err.to_string(), "funnel not found: fn-123");

        let err = AppError::conflict("experiment exp-1 already running");
        assert_eq!(err.to_string(), "Conflict: experiment exp-1 already running");

        let err = AppError::RateLimited {
            retry_after_ms: 12000,
        };
        assert_eq!(err.to_string(), "Rate limited, retry in 12000ms");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database connection failed: failed to connect"
        );

        let err = StorageError::FunnelNotFound {
            funnel_id: "fn-123".to_string(),
        };
        assert_eq!(err.to_string(), "Funnel not found: fn-123");

        let err = StorageError::PageNotFound {
            page: "Landing".to_string(),
        };
        assert_eq!(err.to_string(), "Page not found: Landing");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");

        let err = StorageError::RunningExperimentExists {
            funnel_id: "fn-1".to_string(),
            page_name: "Landing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Experiment already running for page Landing in funnel fn-1"
        );
    }

    #[test]
    fn test_generator_error_display() {
        let err = GeneratorError::Api {
            status: 429,
            message: "quota exhausted".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 - quota exhausted");

        let err = GeneratorError::InvalidResponse {
            message: "malformed JSON".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response: malformed JSON");

        let err = GeneratorError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_storage_error_conversion() {
        let storage_err = StorageError::FunnelNotFound {
            funnel_id: "fn-9".to_string(),
        };
        let app_err: AppError = storage_err.into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }

    #[test]
    fn test_generator_error_conversion() {
        let gen_err = GeneratorError::Timeout { timeout_ms: 1000 };
        let app_err: AppError = gen_err.into();
        assert!(matches!(app_err, AppError::Generator(_)));
    }
}
