//! Connection settings for dbward-rdbc
//!
//! The operator holds exactly one administrative connection target. Settings
//! are deserialized from the operator config file and overridden from the
//! command line, then handed to the pool once at process start.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Administrative connection target for an engine
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    /// Server hostname or IP address
    #[serde(default, alias = "dbHost")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port", alias = "dbPort")]
    pub port: u16,

    /// Administrative user
    #[serde(default, alias = "dbUser")]
    pub user: String,

    /// Administrative password
    #[serde(default, alias = "dbPassword", skip_serializing)]
    pub password: String,

    /// Maintenance database the administrative session connects to
    #[serde(default = "default_database", alias = "dbDatabase")]
    pub database: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Connection and pool wait timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Application name reported to the server
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_application_name() -> String {
    "dbward-operator".to_string()
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("application_name", &self.application_name)
            .finish()
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            database: default_database(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            application_name: default_application_name(),
        }
    }
}

impl ConnectionSettings {
    /// Create settings for a host and user
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the maintenance database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the pool size
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Connection timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `host:port` endpoint clients should use
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that the settings can open a pool
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("database host is required"));
        }
        if self.user.trim().is_empty() {
            return Err(Error::config("database user is required"));
        }
        if self.database.trim().is_empty() {
            return Err(Error::config("maintenance database is required"));
        }
        if self.pool_size == 0 {
            return Err(Error::config("pool size must be at least 1"));
        }
        if self.port == 0 {
            return Err(Error::config("database port must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let settings = ConnectionSettings::new("db", "admin").with_password("hunter2");
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_endpoint() {
        let settings = ConnectionSettings::new("pg.internal", "admin").with_port(6432);
        assert_eq!(settings.endpoint(), "pg.internal:6432");
    }

    #[test]
    fn test_validate() {
        assert!(ConnectionSettings::new("db", "admin").validate().is_ok());
        assert!(ConnectionSettings::new("", "admin").validate().is_err());
        assert!(ConnectionSettings::new("db", "").validate().is_err());
        assert!(ConnectionSettings::new("db", "admin")
            .with_pool_size(0)
            .validate()
            .is_err());
    }
}
