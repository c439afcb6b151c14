//! SQL dialect abstraction for dbward-rdbc
//!
//! Generates the account-management statements an engine adapter issues:
//! - Database, role and user creation
//! - Database privilege and role membership grants
//! - Membership revocation and object drops
//! - The role membership catalog query
//!
//! Every builder validates and quotes the identifiers it interpolates.

use crate::error::Result;
use crate::security::{checked_identifier, escape_string_literal};

/// SQL dialect for vendor-specific account DDL
pub trait SqlDialect: Send + Sync {
    /// `CREATE DATABASE`
    fn create_database_sql(&self, database: &str) -> Result<String>;

    /// `CREATE ROLE` (group role without login)
    fn create_role_sql(&self, role: &str) -> Result<String>;

    /// `CREATE USER` with a password
    fn create_user_sql(&self, user: &str, password: &str) -> Result<String>;

    /// Grant all database privileges to a role
    fn grant_database_sql(&self, database: &str, role: &str) -> Result<String>;

    /// Grant role membership to one or more users
    fn grant_membership_sql(&self, role: &str, users: &[&str]) -> Result<String>;

    /// Revoke role membership from a user
    fn revoke_membership_sql(&self, role: &str, user: &str) -> Result<String>;

    /// `DROP ROLE`
    fn drop_role_sql(&self, role: &str) -> Result<String>;

    /// `DROP USER`
    fn drop_user_sql(&self, user: &str) -> Result<String>;

    /// `DROP DATABASE`
    fn drop_database_sql(&self, database: &str) -> Result<String>;

    /// Parameterized query listing the login names that are members of the
    /// role bound to the first placeholder
    fn role_members_sql(&self) -> &'static str;
}

/// PostgreSQL dialect
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn create_database_sql(&self, database: &str) -> Result<String> {
        Ok(format!("CREATE DATABASE {}", checked_identifier(database)?))
    }

    fn create_role_sql(&self, role: &str) -> Result<String> {
        Ok(format!("CREATE ROLE {}", checked_identifier(role)?))
    }

    fn create_user_sql(&self, user: &str, password: &str) -> Result<String> {
        Ok(format!(
            "CREATE USER {} WITH ENCRYPTED PASSWORD '{}'",
            checked_identifier(user)?,
            escape_string_literal(password)
        ))
    }

    fn grant_database_sql(&self, database: &str, role: &str) -> Result<String> {
        Ok(format!(
            "GRANT ALL ON DATABASE {} TO {}",
            checked_identifier(database)?,
            checked_identifier(role)?
        ))
    }

    fn grant_membership_sql(&self, role: &str, users: &[&str]) -> Result<String> {
        if users.is_empty() {
            return Err(crate::Error::config(
                "GRANT requires at least one grantee",
            ));
        }
        let grantees = users
            .iter()
            .map(|u| checked_identifier(u))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "GRANT {} TO {}",
            checked_identifier(role)?,
            grantees.join(", ")
        ))
    }

    fn revoke_membership_sql(&self, role: &str, user: &str) -> Result<String> {
        Ok(format!(
            "REVOKE {} FROM {}",
            checked_identifier(role)?,
            checked_identifier(user)?
        ))
    }

    fn drop_role_sql(&self, role: &str) -> Result<String> {
        Ok(format!("DROP ROLE {}", checked_identifier(role)?))
    }

    fn drop_user_sql(&self, user: &str) -> Result<String> {
        Ok(format!("DROP USER {}", checked_identifier(user)?))
    }

    fn drop_database_sql(&self, database: &str) -> Result<String> {
        Ok(format!("DROP DATABASE {}", checked_identifier(database)?))
    }

    fn role_members_sql(&self) -> &'static str {
        "SELECT pg_user.usename \
         FROM pg_user \
         JOIN pg_auth_members ON (pg_user.usesysid = pg_auth_members.member) \
         JOIN pg_roles ON (pg_roles.oid = pg_auth_members.roleid) \
         WHERE pg_roles.rolname = $1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_create_statements() {
        let d = PostgresDialect;
        assert_eq!(d.create_database_sql("x").unwrap(), r#"CREATE DATABASE "x""#);
        assert_eq!(
            d.create_role_sql("x_owners").unwrap(),
            r#"CREATE ROLE "x_owners""#
        );
        assert_eq!(
            d.create_user_sql("alice", "pw").unwrap(),
            r#"CREATE USER "alice" WITH ENCRYPTED PASSWORD 'pw'"#
        );
    }

    #[test]
    fn test_postgres_password_is_escaped() {
        let d = PostgresDialect;
        let sql = d.create_user_sql("alice", "it's").unwrap();
        assert!(sql.ends_with("'it''s'"));
    }

    #[test]
    fn test_postgres_grant_membership_multiple() {
        let d = PostgresDialect;
        assert_eq!(
            d.grant_membership_sql("x_owners", &["alice", "bob"]).unwrap(),
            r#"GRANT "x_owners" TO "alice", "bob""#
        );
        assert!(d.grant_membership_sql("x_owners", &[]).is_err());
    }

    #[test]
    fn test_postgres_rejects_invalid_identifiers() {
        let d = PostgresDialect;
        assert!(d.create_database_sql("").is_err());
        assert!(d.drop_role_sql(&"r".repeat(64)).is_err());
        assert!(d.grant_membership_sql("role", &["ok", ""]).is_err());
    }
}
