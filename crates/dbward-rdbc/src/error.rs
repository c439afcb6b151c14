//! Error types for dbward-rdbc
//!
//! Provides granular error classification so callers can tell apart:
//! - Retriable errors (connection, timeout, deadlock, pool exhaustion)
//! - Absorbable errors (object already exists, object does not exist on drop)
//! - Everything else, which aborts the current provisioning pass

use std::fmt;
use thiserror::Error;

/// Result type for dbward-rdbc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection-related errors (retriable)
    Connection,
    /// Statement execution errors
    Query,
    /// Timeout or lock wait errors (retriable)
    Timeout,
    /// Deadlock detected (retriable)
    Deadlock,
    /// Authentication failure
    Authentication,
    /// Configuration error
    Configuration,
    /// Pool exhausted (retriable with backoff)
    PoolExhausted,
    /// The object being created already exists
    AlreadyExists,
    /// The object being dropped or referenced does not exist
    NotFound,
    /// Other objects still depend on the object being dropped
    DependentObjects,
    /// The object is in use by other sessions
    ObjectInUse,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::Connection
                | Self::Timeout
                | Self::Deadlock
                | Self::PoolExhausted
                | Self::ObjectInUse
                | Self::DependentObjects
        )
    }
}

/// Main error type for dbward-rdbc
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out or could not acquire a lock
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Deadlock detected
    #[error("deadlock detected")]
    Deadlock,

    /// Authentication failed
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Connection pool exhausted
    #[error("pool exhausted: {message}")]
    PoolExhausted { message: String },

    /// Object already exists
    #[error("{kind} \"{name}\" already exists")]
    AlreadyExists { kind: ObjectKind, name: String },

    /// Object does not exist
    #[error("{kind} \"{name}\" does not exist")]
    NotFound { kind: ObjectKind, name: String },

    /// Dependent objects prevent the drop
    #[error("{kind} \"{name}\" cannot be dropped: {message}")]
    DependentObjects {
        kind: ObjectKind,
        name: String,
        message: String,
    },

    /// Object is being accessed by other sessions
    #[error("{kind} \"{name}\" is in use: {message}")]
    ObjectInUse {
        kind: ObjectKind,
        name: String,
        message: String,
    },
}

/// Kind of engine object an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A database
    Database,
    /// A group role
    Role,
    /// A login user
    User,
    /// A membership or privilege grant
    Grant,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Role => write!(f, "role"),
            Self::User => write!(f, "user"),
            Self::Grant => write!(f, "grant"),
        }
    }
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Deadlock => ErrorCategory::Deadlock,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::PoolExhausted { .. } => ErrorCategory::PoolExhausted,
            Self::AlreadyExists { .. } => ErrorCategory::AlreadyExists,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::DependentObjects { .. } => ErrorCategory::DependentObjects,
            Self::ObjectInUse { .. } => ErrorCategory::ObjectInUse,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Whether this error means the object is already in the desired "present" state
    #[inline]
    pub fn is_already_exists(&self) -> bool {
        self.category() == ErrorCategory::AlreadyExists
    }

    /// Whether this error means the object is already in the desired "absent" state
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::PoolExhausted {
            message: message.into(),
        }
    }

    /// Create an already-exists error
    pub fn already_exists(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Timeout => write!(f, "timeout"),
            Self::Deadlock => write!(f, "deadlock"),
            Self::Authentication => write!(f, "authentication"),
            Self::Configuration => write!(f, "configuration"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::NotFound => write!(f, "not_found"),
            Self::DependentObjects => write!(f, "dependent_objects"),
            Self::ObjectInUse => write!(f, "object_in_use"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retriable() {
        assert!(ErrorCategory::Connection.is_retriable());
        assert!(ErrorCategory::Timeout.is_retriable());
        assert!(ErrorCategory::Deadlock.is_retriable());
        assert!(ErrorCategory::PoolExhausted.is_retriable());
        assert!(ErrorCategory::ObjectInUse.is_retriable());

        assert!(!ErrorCategory::AlreadyExists.is_retriable());
        assert!(!ErrorCategory::Configuration.is_retriable());
        assert!(!ErrorCategory::Query.is_retriable());
    }

    #[test]
    fn test_idempotency_predicates() {
        let exists = Error::already_exists(ObjectKind::Database, "orders");
        assert!(exists.is_already_exists());
        assert!(!exists.is_not_found());

        let missing = Error::not_found(ObjectKind::Role, "orders_owners");
        assert!(missing.is_not_found());
        assert!(!missing.is_already_exists());
        assert!(!Error::Deadlock.is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = Error::already_exists(ObjectKind::User, "alice");
        assert_eq!(err.to_string(), "user \"alice\" already exists");

        let err = Error::Query {
            message: "syntax error".to_string(),
            sql: Some("CREATE DATABSE x".to_string()),
            source: None,
        };
        assert!(err.to_string().contains("syntax error"));
    }
}
