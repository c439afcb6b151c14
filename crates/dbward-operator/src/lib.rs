//! # dbward Kubernetes Operator
//!
//! Kubernetes operator that keeps a database, its owning role and the
//! role's member users in an external relational engine in sync with a
//! declarative `Database` resource.
//!
//! ## Features
//!
//! - **Custom Resource Definition**: `Database` CRD with schema validation
//! - **Idempotent Provisioning**: database, `<name>_owners` role and login user
//!   created once, safe to re-run after any partial failure
//! - **Membership Sync**: role membership diffed against `desiredUsers` on
//!   every pass, revokes before grants
//! - **Guarded Deletion**: a finalizer keeps the resource until the database,
//!   role and user are dropped, or skips the drops for protected resources
//! - **Credential Secrets**: the generated password is written once to
//!   `<name>-db-secret`
//! - **Observability**: Prometheus-compatible operator metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dbward_operator::prelude::*;
//! use dbward_rdbc::prelude::{ConnectionSettings, PgEngine, PgPool};
//! use kube::Client;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::try_default().await?;
//!     let pool = PgPool::open(&ConnectionSettings::new("localhost", "postgres")).await?;
//!
//!     let reconciler = Reconciler::new(
//!         EngineRegistry::new().with(Arc::new(PgEngine::new(pool))),
//!         Arc::new(KubeResourceStore::new(client.clone())),
//!         Arc::new(KubeSecretSink::new(client.clone())),
//!         NamespaceFilter::all(),
//!     );
//!
//!     let ctx = Arc::new(ControllerContext::new(reconciler, Some(ControllerMetrics::new())));
//!     run_controller(client, ctx).await
//! }
//! ```
//!
//! ## Custom Resource Definition
//!
//! ```yaml
//! apiVersion: db.dbward.io/v1alpha1
//! kind: Database
//! metadata:
//!   name: orders
//! spec:
//!   engineType: postgres
//!   deletionProtected: false
//!   desiredUsers: [alice, bob]
//! ```
//!
//! ## Metrics
//!
//! - `dbward_database_reconciliations_total` - Total reconciliation attempts
//! - `dbward_database_reconciliation_errors_total` - Reconciliation errors
//! - `dbward_database_reconciliation_duration_seconds` - Reconciliation latency
//! - `dbward_database_credentials_minted_total` - Credentials written to secrets
//! - `dbward_database_membership_changes_total` - Grants and revokes applied
//! - `dbward_database_finalized_total` - Finalizers released

pub mod config;
pub mod controller;
pub mod crd;
pub mod engines;
pub mod error;
pub mod finalizer;
pub mod grants;
pub mod reconciler;
pub mod secret;
pub mod store;

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::config::{NamespaceFilter, OperatorConfig};
    pub use crate::controller::{run_controller, ControllerContext, ControllerMetrics};
    pub use crate::crd::{Database, DatabasePhase, DatabaseSpec, DatabaseStatus};
    pub use crate::engines::{Dispatch, EngineRegistry};
    pub use crate::error::{OperatorError, Result};
    pub use crate::finalizer::{Cleanup, Lifecycle, FINALIZER};
    pub use crate::grants::{sync_membership, GrantDiff};
    pub use crate::reconciler::{ConvergeReport, Outcome, Reconciler};
    pub use crate::secret::{secret_name, Credential, SecretRecord};
    pub use crate::store::{KubeResourceStore, KubeSecretSink, ResourceStore, SecretSink};
}
