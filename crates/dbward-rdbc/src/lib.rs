//! # dbward-rdbc
//!
//! Database engine adapters for the dbward operator.
//!
//! This crate owns everything that talks to an external relational engine on
//! behalf of a `Database` resource: the adapter capability, the SQL that
//! creates and drops databases, roles and users, role membership reads and
//! writes, and credential generation.
//!
//! ## Features
//!
//! - **Engine Adapter**: [`EngineAdapter`] with idempotent create/drop primitives
//! - **PostgreSQL**: [`postgres::PgEngine`] over a shared `deadpool-postgres` pool
//! - **SQL Safety**: identifier validation and quoting for DDL that cannot be parameterized
//! - **Error Taxonomy**: SQLSTATE-based classification into retriable, absorbable and fatal
//! - **Credentials**: CSPRNG password generation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbward_rdbc::prelude::*;
//!
//! let pool = PgPool::open(&ConnectionSettings::new("localhost", "postgres")).await?;
//! let engine = PgEngine::new(pool.clone());
//!
//! engine.create_database("orders").await?;
//! engine.create_owner_role(&owner_role_name("orders")).await?;
//! let members = engine.list_role_members("orders_owners").await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `postgres` (default) - PostgreSQL support via tokio-postgres and deadpool-postgres

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod password;
pub mod security;

#[cfg(feature = "postgres")]
pub mod pool;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use adapter::{owner_role_name, EngineAdapter, EngineKind, Provisioned, OWNER_ROLE_SUFFIX};
pub use connection::ConnectionSettings;
pub use error::{Error, ErrorCategory, ObjectKind, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{
        owner_role_name, EngineAdapter, EngineKind, Provisioned, OWNER_ROLE_SUFFIX,
    };
    pub use crate::connection::ConnectionSettings;
    pub use crate::dialect::{PostgresDialect, SqlDialect};
    pub use crate::error::{Error, ErrorCategory, ObjectKind, Result};
    pub use crate::password::{generate_password, DEFAULT_PASSWORD_LENGTH};
    pub use crate::security::{
        checked_identifier, escape_string_literal, quote_identifier, validate_identifier,
    };

    #[cfg(feature = "postgres")]
    pub use crate::pool::PgPool;
    #[cfg(feature = "postgres")]
    pub use crate::postgres::PgEngine;
}
