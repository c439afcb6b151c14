//! Unit tests for dbward-rdbc security module

use dbward_rdbc::security::{
    checked_identifier, escape_string_literal, quote_identifier, validate_identifier,
};

#[test]
fn test_validate_identifier() {
    assert!(validate_identifier("orders").is_ok());
    assert!(validate_identifier("Orders-2024").is_ok());
    assert!(validate_identifier("").is_err());
    assert!(validate_identifier("a\0b").is_err());
    assert!(validate_identifier(&"x".repeat(64)).is_err());
}

#[test]
fn test_quote_identifier() {
    assert_eq!(quote_identifier("users"), "\"users\"");
    assert_eq!(quote_identifier("my\"table"), "\"my\"\"table\"");
}

#[test]
fn test_checked_identifier() {
    assert_eq!(checked_identifier("x_owners").unwrap(), "\"x_owners\"");
    assert!(checked_identifier("").is_err());
}

#[test]
fn test_escape_string_literal() {
    assert_eq!(escape_string_literal("abc"), "abc");
    assert_eq!(escape_string_literal("it's"), "it''s");
}
