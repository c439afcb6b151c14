//! Engine adapter capability
//!
//! An [`EngineAdapter`] is the only way the operator touches an external
//! database engine. Every primitive is idempotent: creating something that
//! already exists and dropping something that is already gone both succeed,
//! so a provisioning pass interrupted halfway can simply be run again.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;

/// Suffix appended to a database name to form its owning role
pub const OWNER_ROLE_SUFFIX: &str = "_owners";

/// Name of the group role that owns `database`
///
/// ```
/// assert_eq!(dbward_rdbc::owner_role_name("orders"), "orders_owners");
/// ```
pub fn owner_role_name(database: &str) -> String {
    format!("{}{}", database, OWNER_ROLE_SUFFIX)
}

/// Database engines a resource can ask for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineKind {
    /// PostgreSQL
    Postgres,
    /// MySQL / MariaDB
    Mysql,
    /// Anything else, carried verbatim
    Other(String),
}

impl EngineKind {
    /// Parse an engine name (case-insensitive)
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Self::Postgres,
            "mysql" | "mariadb" => Self::Mysql,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Whether the engine is one dbward knows about, whether or not an
    /// adapter for it is available
    pub fn is_declared(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Mysql => write!(f, "mysql"),
            Self::Other(s) if s.is_empty() => write!(f, "<unset>"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Outcome of an idempotent create primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The object was created by this call
    Created,
    /// The object was already there; nothing was changed
    AlreadyExisted,
}

impl Provisioned {
    /// Whether this call created the object
    pub fn was_created(self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Idempotent account-management primitives of a database engine
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Engine this adapter drives
    fn kind(&self) -> EngineKind;

    /// Port clients should connect to
    fn port(&self) -> u16;

    /// Host clients should connect to
    fn host(&self) -> &str;

    /// Create a database
    async fn create_database(&self, name: &str) -> Result<Provisioned>;

    /// Create a group role without login
    async fn create_owner_role(&self, role: &str) -> Result<Provisioned>;

    /// Create a login user with the given password
    async fn create_user(&self, name: &str, password: &SecretString) -> Result<Provisioned>;

    /// Grant all privileges on `database` to `role`
    async fn grant_database_ownership(&self, database: &str, role: &str) -> Result<()>;

    /// Login names currently holding membership in `role`; a missing role
    /// yields an empty set
    async fn list_role_members(&self, role: &str) -> Result<BTreeSet<String>>;

    /// Grant `role` to every user in `users`
    async fn grant_membership(&self, role: &str, users: &[String]) -> Result<()>;

    /// Revoke `role` from `user`
    async fn revoke_membership(&self, role: &str, user: &str) -> Result<()>;

    /// Drop a login user
    async fn drop_user(&self, name: &str) -> Result<()>;

    /// Drop a group role
    async fn drop_role(&self, role: &str) -> Result<()>;

    /// Drop a database
    async fn drop_database(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!(EngineKind::parse("postgres"), EngineKind::Postgres);
        assert_eq!(EngineKind::parse("PostgreSQL"), EngineKind::Postgres);
        assert_eq!(EngineKind::parse("mysql"), EngineKind::Mysql);
        assert_eq!(
            EngineKind::parse("oracle"),
            EngineKind::Other("oracle".to_string())
        );
        assert_eq!(EngineKind::parse(""), EngineKind::Other(String::new()));
    }

    #[test]
    fn test_engine_kind_declared() {
        assert!(EngineKind::Postgres.is_declared());
        assert!(EngineKind::Mysql.is_declared());
        assert!(!EngineKind::Other("db2".into()).is_declared());
    }

    #[test]
    fn test_owner_role_name() {
        assert_eq!(owner_role_name("x"), "x_owners");
    }
}
