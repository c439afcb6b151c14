//! PostgreSQL engine adapter
//!
//! Issues account DDL through the shared [`PgPool`]. Each statement runs on
//! its own in autocommit mode (`CREATE DATABASE` cannot run inside a
//! transaction block anyway); server errors are classified by SQLSTATE so
//! "already exists" and "does not exist" can be absorbed by the idempotent
//! primitives.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeSet;
use tokio_postgres::error::SqlState;
use tracing::{debug, info};

use crate::adapter::{EngineAdapter, EngineKind, Provisioned};
use crate::dialect::{PostgresDialect, SqlDialect};
use crate::error::{Error, ErrorCategory, ObjectKind, Result};
use crate::pool::PgPool;

/// Default PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

/// Map a SQLSTATE to an error category
pub fn category_for_sqlstate(code: &SqlState) -> ErrorCategory {
    if *code == SqlState::DUPLICATE_DATABASE || *code == SqlState::DUPLICATE_OBJECT {
        ErrorCategory::AlreadyExists
    } else if *code == SqlState::UNDEFINED_OBJECT || *code == SqlState::INVALID_CATALOG_NAME {
        ErrorCategory::NotFound
    } else if *code == SqlState::DEPENDENT_OBJECTS_STILL_EXIST {
        ErrorCategory::DependentObjects
    } else if *code == SqlState::OBJECT_IN_USE {
        ErrorCategory::ObjectInUse
    } else if *code == SqlState::T_R_DEADLOCK_DETECTED {
        ErrorCategory::Deadlock
    } else if *code == SqlState::LOCK_NOT_AVAILABLE || *code == SqlState::QUERY_CANCELED {
        ErrorCategory::Timeout
    } else if *code == SqlState::INVALID_PASSWORD
        || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION
    {
        ErrorCategory::Authentication
    } else if *code == SqlState::ADMIN_SHUTDOWN
        || *code == SqlState::CRASH_SHUTDOWN
        || *code == SqlState::CANNOT_CONNECT_NOW
        || *code == SqlState::CONNECTION_EXCEPTION
        || *code == SqlState::CONNECTION_FAILURE
        || *code == SqlState::TOO_MANY_CONNECTIONS
    {
        ErrorCategory::Connection
    } else {
        ErrorCategory::Query
    }
}

/// Convert a driver error into a categorized [`Error`] without object context
pub(crate) fn classify_pg_error(err: tokio_postgres::Error, sql: Option<&str>) -> Error {
    classify_object_error(err, ObjectKind::Grant, "", sql)
}

/// Convert a driver error into a categorized [`Error`] about `kind` `name`
///
/// `sql` is attached to generic query errors; pass `None` for statements
/// carrying secrets.
pub(crate) fn classify_object_error(
    err: tokio_postgres::Error,
    kind: ObjectKind,
    name: &str,
    sql: Option<&str>,
) -> Error {
    let Some(code) = err.code() else {
        if err.is_closed() {
            return Error::connection_with_source("connection closed", err);
        }
        return Error::connection_with_source("database communication failed", err);
    };

    let message = err
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| err.to_string());

    match category_for_sqlstate(code) {
        ErrorCategory::AlreadyExists => Error::already_exists(kind, name),
        ErrorCategory::NotFound => Error::not_found(kind, name),
        ErrorCategory::DependentObjects => Error::DependentObjects {
            kind,
            name: name.to_string(),
            message,
        },
        ErrorCategory::ObjectInUse => Error::ObjectInUse {
            kind,
            name: name.to_string(),
            message,
        },
        ErrorCategory::Deadlock => Error::Deadlock,
        ErrorCategory::Timeout => Error::timeout(message),
        ErrorCategory::Authentication => Error::Authentication { message },
        ErrorCategory::Connection => Error::connection_with_source(message, err),
        _ => Error::Query {
            message,
            sql: sql.map(str::to_string),
            source: Some(Box::new(err)),
        },
    }
}

/// PostgreSQL [`EngineAdapter`]
pub struct PgEngine {
    pool: PgPool,
    dialect: PostgresDialect,
    host: String,
    port: u16,
}

impl PgEngine {
    /// Create an adapter on top of an opened pool
    pub fn new(pool: PgPool) -> Self {
        let (host, port) = split_endpoint(pool.endpoint());
        Self {
            pool,
            dialect: PostgresDialect,
            host,
            port,
        }
    }

    /// The pool this adapter issues statements through
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(&self, sql: &str, kind: ObjectKind, name: &str, log_sql: bool) -> Result<()> {
        let client = self.pool.get().await?;
        if log_sql {
            debug!(sql = %sql, "Executing statement");
        }
        client
            .batch_execute(sql)
            .await
            .map_err(|e| classify_object_error(e, kind, name, log_sql.then_some(sql)))
    }

    async fn create(
        &self,
        sql: &str,
        kind: ObjectKind,
        name: &str,
        log_sql: bool,
    ) -> Result<Provisioned> {
        match self.run(sql, kind, name, log_sql).await {
            Ok(()) => {
                info!(kind = %kind, name = %name, "Created");
                Ok(Provisioned::Created)
            }
            Err(e) if e.is_already_exists() => {
                debug!(kind = %kind, name = %name, "Already exists");
                Ok(Provisioned::AlreadyExisted)
            }
            Err(e) => Err(e),
        }
    }

    async fn drop_object(&self, sql: &str, kind: ObjectKind, name: &str) -> Result<()> {
        match self.run(sql, kind, name, true).await {
            Ok(()) => {
                info!(kind = %kind, name = %name, "Dropped");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = %kind, name = %name, "Already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn split_endpoint(endpoint: &str) -> (String, u16) {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(DEFAULT_PORT)),
        None => (endpoint.to_string(), DEFAULT_PORT),
    }
}

#[async_trait]
impl EngineAdapter for PgEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn create_database(&self, name: &str) -> Result<Provisioned> {
        let sql = self.dialect.create_database_sql(name)?;
        self.create(&sql, ObjectKind::Database, name, true).await
    }

    async fn create_owner_role(&self, role: &str) -> Result<Provisioned> {
        let sql = self.dialect.create_role_sql(role)?;
        self.create(&sql, ObjectKind::Role, role, true).await
    }

    async fn create_user(&self, name: &str, password: &SecretString) -> Result<Provisioned> {
        let sql = self.dialect.create_user_sql(name, password.expose_secret())?;
        self.create(&sql, ObjectKind::User, name, false).await
    }

    async fn grant_database_ownership(&self, database: &str, role: &str) -> Result<()> {
        let sql = self.dialect.grant_database_sql(database, role)?;
        self.run(&sql, ObjectKind::Grant, role, true).await?;
        info!(database = %database, role = %role, "Granted database privileges");
        Ok(())
    }

    async fn list_role_members(&self, role: &str) -> Result<BTreeSet<String>> {
        let client = self.pool.get().await?;
        let sql = self.dialect.role_members_sql();
        let rows = client
            .query(sql, &[&role])
            .await
            .map_err(|e| classify_object_error(e, ObjectKind::Role, role, Some(sql)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<_, String>(0).map_err(|e| Error::Query {
                    message: format!("unexpected membership row: {}", e),
                    sql: Some(sql.to_string()),
                    source: None,
                })
            })
            .collect()
    }

    async fn grant_membership(&self, role: &str, users: &[String]) -> Result<()> {
        if users.is_empty() {
            return Ok(());
        }
        let grantees: Vec<&str> = users.iter().map(String::as_str).collect();
        let sql = self.dialect.grant_membership_sql(role, &grantees)?;
        self.run(&sql, ObjectKind::Grant, role, true).await?;
        info!(role = %role, users = ?users, "Granted role membership");
        Ok(())
    }

    async fn revoke_membership(&self, role: &str, user: &str) -> Result<()> {
        let sql = self.dialect.revoke_membership_sql(role, user)?;
        self.run(&sql, ObjectKind::Grant, role, true).await?;
        info!(role = %role, user = %user, "Revoked role membership");
        Ok(())
    }

    async fn drop_user(&self, name: &str) -> Result<()> {
        let sql = self.dialect.drop_user_sql(name)?;
        self.drop_object(&sql, ObjectKind::User, name).await
    }

    async fn drop_role(&self, role: &str) -> Result<()> {
        let sql = self.dialect.drop_role_sql(role)?;
        self.drop_object(&sql, ObjectKind::Role, role).await
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        let sql = self.dialect.drop_database_sql(name)?;
        self.drop_object(&sql, ObjectKind::Database, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_absorbable() {
        assert_eq!(
            category_for_sqlstate(&SqlState::DUPLICATE_DATABASE),
            ErrorCategory::AlreadyExists
        );
        assert_eq!(
            category_for_sqlstate(&SqlState::DUPLICATE_OBJECT),
            ErrorCategory::AlreadyExists
        );
        assert_eq!(
            category_for_sqlstate(&SqlState::UNDEFINED_OBJECT),
            ErrorCategory::NotFound
        );
        assert_eq!(
            category_for_sqlstate(&SqlState::INVALID_CATALOG_NAME),
            ErrorCategory::NotFound
        );
    }

    #[test]
    fn test_sqlstate_transient() {
        assert!(category_for_sqlstate(&SqlState::T_R_DEADLOCK_DETECTED).is_retriable());
        assert!(category_for_sqlstate(&SqlState::LOCK_NOT_AVAILABLE).is_retriable());
        assert!(category_for_sqlstate(&SqlState::ADMIN_SHUTDOWN).is_retriable());
        assert!(category_for_sqlstate(&SqlState::OBJECT_IN_USE).is_retriable());
    }

    #[test]
    fn test_sqlstate_fatal() {
        assert_eq!(
            category_for_sqlstate(&SqlState::SYNTAX_ERROR),
            ErrorCategory::Query
        );
        assert_eq!(
            category_for_sqlstate(&SqlState::INSUFFICIENT_PRIVILEGE),
            ErrorCategory::Query
        );
    }

    #[test]
    fn test_split_endpoint() {
        assert_eq!(split_endpoint("db:6432"), ("db".to_string(), 6432));
        assert_eq!(split_endpoint("db"), ("db".to_string(), 5432));
    }

    #[tokio::test]
    async fn test_engine_reports_pool_endpoint() {
        let settings = crate::ConnectionSettings::new("pg.internal", "admin").with_port(6543);
        let engine = PgEngine::new(PgPool::build(&settings).unwrap());
        assert_eq!(engine.host(), "pg.internal");
        assert_eq!(engine.port(), 6543);
        assert_eq!(engine.kind(), EngineKind::Postgres);
    }
}
