//! Process-wide connection pool
//!
//! The pool is opened once at startup from [`ConnectionSettings`] and closed
//! once at shutdown. Adapters borrow a connection per statement; nothing opens
//! connections on demand outside the pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use dbward_rdbc::prelude::*;
//!
//! let pool = PgPool::open(&ConnectionSettings::new("localhost", "postgres")).await?;
//! let engine = PgEngine::new(pool.clone());
//! // ... run the operator ...
//! pool.close();
//! ```

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info};

use crate::connection::ConnectionSettings;
use crate::error::{Error, Result};
use crate::postgres::classify_pg_error;

/// Shared PostgreSQL connection pool
#[derive(Clone)]
pub struct PgPool {
    pool: Pool,
    endpoint: String,
}

impl PgPool {
    /// Build the pool and verify the server is reachable
    pub async fn open(settings: &ConnectionSettings) -> Result<Self> {
        let pool = Self::build(settings)?;

        // Fail fast on bad credentials or an unreachable host
        let client = pool.get().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| classify_pg_error(e, None))?;
        drop(client);

        info!(
            endpoint = %pool.endpoint,
            max_size = settings.pool_size,
            "Database connection pool opened"
        );
        Ok(pool)
    }

    /// Build the pool without connecting; the first statement connects lazily
    pub fn build(settings: &ConnectionSettings) -> Result<Self> {
        settings.validate()?;

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .dbname(&settings.database)
            .application_name(&settings.application_name)
            .connect_timeout(settings.connect_timeout());
        if !settings.password.is_empty() {
            pg_config.password(&settings.password);
        }

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(manager)
            .max_size(settings.pool_size)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(settings.connect_timeout()))
            .create_timeout(Some(settings.connect_timeout()))
            .build()
            .map_err(|e| Error::config(format!("failed to build connection pool: {}", e)))?;

        Ok(Self {
            pool,
            endpoint: settings.endpoint(),
        })
    }

    /// Borrow a connection
    pub async fn get(&self) -> Result<Object> {
        let conn = self.pool.get().await?;
        debug!(endpoint = %self.endpoint, "Borrowed pooled connection");
        Ok(conn)
    }

    /// `host:port` of the server behind this pool
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Close the pool; outstanding connections are dropped when returned
    pub fn close(&self) {
        self.pool.close();
        info!(endpoint = %self.endpoint, "Database connection pool closed");
    }

    /// Whether [`PgPool::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(kind) => {
                Error::pool_exhausted(format!("timed out waiting for connection ({:?})", kind))
            }
            PoolError::Backend(e) => classify_pg_error(e, None),
            PoolError::Closed => Error::connection("connection pool is closed"),
            other => Error::connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_is_lazy() {
        // Nothing listens here; building must not connect
        let settings = ConnectionSettings::new("127.0.0.1", "admin")
            .with_port(1)
            .with_pool_size(2);
        let pool = PgPool::build(&settings).unwrap();

        assert_eq!(pool.endpoint(), "127.0.0.1:1");
        assert!(!pool.is_closed());
    }

    #[tokio::test]
    async fn test_close() {
        let pool = PgPool::build(&ConnectionSettings::new("127.0.0.1", "admin")).unwrap();
        assert!(!pool.is_closed());
        pool.close();
        assert!(pool.is_closed());
        assert!(pool.get().await.is_err());
    }

    #[test]
    fn test_build_rejects_invalid_settings() {
        assert!(PgPool::build(&ConnectionSettings::new("", "admin")).is_err());
    }
}
