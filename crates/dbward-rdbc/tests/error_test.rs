//! Unit tests for dbward-rdbc error module

use dbward_rdbc::{Error, ErrorCategory, ObjectKind};

#[test]
fn test_transient_errors_are_retriable() {
    assert!(Error::connection("refused").is_retriable());
    assert!(Error::timeout("lock wait").is_retriable());
    assert!(Error::Deadlock.is_retriable());
    assert!(Error::pool_exhausted("busy").is_retriable());
}

#[test]
fn test_fatal_errors_are_not_retriable() {
    assert!(!Error::Query {
        message: "permission denied".into(),
        sql: None,
        source: None,
    }
    .is_retriable());
    assert!(!Error::config("missing host").is_retriable());
    assert!(!Error::Authentication {
        message: "bad password".into()
    }
    .is_retriable());
}

#[test]
fn test_drop_blocked_by_sessions_is_retriable() {
    let err = Error::ObjectInUse {
        kind: ObjectKind::Database,
        name: "orders".into(),
        message: "database is being accessed by other users".into(),
    };

    assert_eq!(err.category(), ErrorCategory::ObjectInUse);
    assert!(err.is_retriable());
    assert!(err.to_string().contains("orders"));
}

#[test]
fn test_category_mapping() {
    assert_eq!(
        Error::already_exists(ObjectKind::Role, "r").category(),
        ErrorCategory::AlreadyExists
    );
    assert_eq!(
        Error::not_found(ObjectKind::User, "u").category(),
        ErrorCategory::NotFound
    );
    assert_eq!(Error::config("x").category(), ErrorCategory::Configuration);
}

#[test]
fn test_category_display() {
    assert_eq!(ErrorCategory::PoolExhausted.to_string(), "pool_exhausted");
    assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
}

#[test]
fn test_object_kind_display() {
    assert_eq!(ObjectKind::Database.to_string(), "database");
    assert_eq!(ObjectKind::Grant.to_string(), "grant");
    assert_eq!(
        Error::not_found(ObjectKind::Database, "x").to_string(),
        "database \"x\" does not exist"
    );
}
