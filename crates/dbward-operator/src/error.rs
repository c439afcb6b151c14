//! Error types for the dbward operator

use std::time::Duration;
use thiserror::Error;

/// Delay before retrying after an optimistic-lock conflict
const CONFLICT_REQUEUE_SECONDS: u64 = 5;

/// Errors that can occur during operator operations
#[derive(Error, Debug)]
pub enum OperatorError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Database engine error
    #[error("Database engine error: {0}")]
    EngineError(#[from] dbward_rdbc::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Finalizer error
    #[error("Finalizer error: {0}")]
    FinalizerError(String),

    /// Secret could not be written or removed
    #[error("Secret {name} in namespace {namespace}: {message}")]
    SecretError {
        name: String,
        namespace: String,
        message: String,
    },
}

/// Result type for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            OperatorError::KubeError(_)
            | OperatorError::FinalizerError(_)
            | OperatorError::SecretError { .. } => true,
            OperatorError::EngineError(e) => e.is_retriable(),
            _ => false,
        }
    }

    /// Get a fixed requeue delay for errors that should not back off
    ///
    /// Optimistic-lock conflicts (409) resolve on the next read, so they
    /// retry quickly; everything else is left to the controller's
    /// exponential backoff.
    pub fn requeue_delay(&self) -> Option<Duration> {
        match self {
            OperatorError::KubeError(kube::Error::Api(ae)) if ae.code == 409 => {
                Some(Duration::from_secs(CONFLICT_REQUEUE_SECONDS))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbward_rdbc::ObjectKind;

    #[test]
    fn test_error_display() {
        let err = OperatorError::SecretError {
            name: "orders-db-secret".to_string(),
            namespace: "shop".to_string(),
            message: "forbidden".to_string(),
        };
        assert!(err.to_string().contains("orders-db-secret"));
        assert!(err.to_string().contains("shop"));
    }

    #[test]
    fn test_retryable_errors() {
        let engine_err = OperatorError::from(dbward_rdbc::Error::connection("refused"));
        assert!(engine_err.is_retryable());

        let engine_err = OperatorError::from(dbward_rdbc::Error::config("bad credentials"));
        assert!(!engine_err.is_retryable());

        let config_err = OperatorError::InvalidConfig("test".to_string());
        assert!(!config_err.is_retryable());

        let finalizer_err = OperatorError::FinalizerError("no adapter".to_string());
        assert!(finalizer_err.is_retryable());
    }

    #[test]
    fn test_engine_error_keeps_context() {
        let err = OperatorError::from(dbward_rdbc::Error::ObjectInUse {
            kind: ObjectKind::Database,
            name: "orders".to_string(),
            message: "being accessed by other users".to_string(),
        });
        assert!(err.to_string().contains("orders"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_requeue_delay() {
        let conflict = OperatorError::KubeError(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        }));
        assert_eq!(
            conflict.requeue_delay(),
            Some(Duration::from_secs(CONFLICT_REQUEUE_SECONDS))
        );

        let not_conflict = OperatorError::InvalidConfig("test".to_string());
        assert!(not_conflict.requeue_delay().is_none());
    }
}
