//! Security utilities for SQL injection prevention in dbward-rdbc.
//!
//! Account DDL (`CREATE ROLE`, `GRANT`, `DROP DATABASE`, ...) cannot take bind
//! parameters for object names, so every identifier is validated and quoted
//! before it is interpolated, and every string literal is escaped.

use crate::error::Error;

/// Maximum identifier length in bytes (PostgreSQL `NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Validate an identifier that will be interpolated as a quoted name.
///
/// Quoted identifiers may contain almost anything (Kubernetes resource names
/// routinely contain `-`), so only the properties quoting cannot fix are
/// checked:
/// - Must not be empty
/// - Must not contain NUL
/// - Must fit into [`MAX_IDENTIFIER_BYTES`]; longer names are silently
///   truncated by the server, which would alias distinct resources
///
/// # Examples
///
/// ```
/// use dbward_rdbc::security::validate_identifier;
///
/// assert!(validate_identifier("orders").is_ok());
/// assert!(validate_identifier("orders-eu-1").is_ok());
///
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("bad\0name").is_err());
/// assert!(validate_identifier(&"x".repeat(64)).is_err());
/// ```
pub fn validate_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::config("SQL identifier cannot be empty"));
    }

    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(Error::config(format!(
            "SQL identifier too long: '{}' is {} bytes (max {})",
            name,
            name.len(),
            MAX_IDENTIFIER_BYTES
        )));
    }

    if name.contains('\0') {
        return Err(Error::config(format!(
            "Invalid SQL identifier '{}': contains NUL",
            name.escape_default()
        )));
    }

    Ok(())
}

/// Quote an identifier with double quotes, doubling embedded quotes.
///
/// ```
/// use dbward_rdbc::security::quote_identifier;
///
/// assert_eq!(quote_identifier("orders"), "\"orders\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate and quote in one step.
pub fn checked_identifier(name: &str) -> crate::Result<String> {
    validate_identifier(name)?;
    Ok(quote_identifier(name))
}

/// Escape a string value for safe interpolation into a SQL string literal context.
///
/// Replaces `'` with `''` (standard SQL escaping for single-quoted string literals).
/// Used for the password literal of `CREATE USER ... WITH ENCRYPTED PASSWORD`,
/// which does not accept bind parameters.
///
/// # Examples
///
/// ```
/// use dbward_rdbc::security::escape_string_literal;
///
/// assert_eq!(escape_string_literal("secret"), "secret");
/// assert_eq!(escape_string_literal("don't"), "don''t");
/// ```
pub fn escape_string_literal(value: &str) -> String {
    // Fast path: no escaping needed (common case)
    if !value.contains('\'') {
        return value.to_string();
    }
    value.replace('\'', "''")
}
