//! Reconciliation state machine for `Database` resources
//!
//! One call to [`Reconciler::reconcile`] is one pass over one resource:
//!
//! 1. Resources outside the namespace filter are ignored.
//! 2. A live resource without the finalizer marker gets it before any engine
//!    mutation.
//! 3. The spec is validated and dispatched on its engine type. Unknown
//!    engines end in `Unsupported`, engines without an adapter in `Error`,
//!    and neither touches an engine.
//! 4. Served engines are converged: first-time provisioning creates the
//!    database, owning role and login user, later passes only diff and
//!    repair role membership.
//! 5. Observed state is persisted when it changed.
//!
//! A resource being deleted runs the finalizer cleanup instead, and the
//! marker is released only when cleanup succeeded.

use dbward_rdbc::password::{generate_password, DEFAULT_PASSWORD_LENGTH};
use dbward_rdbc::EngineAdapter;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::NamespaceFilter;
use crate::crd::{Database, DatabasePhase, DatabaseStatus};
use crate::engines::{Dispatch, EngineRegistry};
use crate::error::{OperatorError, Result};
use crate::finalizer::{self, Cleanup, Lifecycle};
use crate::grants::{sync_membership, GrantDiff};
use crate::secret::{Credential, SecretRecord};
use crate::store::{namespace_of, ResourceStore, SecretSink};

/// Result of a successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The namespace is not watched
    Ignored,
    /// Provisioning converged
    Converged(ConvergeReport),
    /// The resource cannot be provisioned as declared; waits for a spec change
    Inert(DatabasePhase),
    /// Cleanup finished and the marker was released
    Finalized(Cleanup),
    /// Deletion in progress and the marker is already gone
    Released,
}

/// What a converge pass changed in the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergeReport {
    /// The first-time provisioning sequence ran
    pub provisioned: bool,
    /// A login user was created and its credential written
    pub credential_minted: bool,
    /// Membership changes applied by a diff pass
    pub membership: GrantDiff,
}

/// Drives `Database` resources towards their declared state
#[derive(Clone)]
pub struct Reconciler {
    engines: EngineRegistry,
    store: Arc<dyn ResourceStore>,
    secrets: Arc<dyn SecretSink>,
    namespaces: NamespaceFilter,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(
        engines: EngineRegistry,
        store: Arc<dyn ResourceStore>,
        secrets: Arc<dyn SecretSink>,
        namespaces: NamespaceFilter,
    ) -> Self {
        Self {
            engines,
            store,
            secrets,
            namespaces,
        }
    }

    /// Namespaces this reconciler acts on
    pub fn namespaces(&self) -> &NamespaceFilter {
        &self.namespaces
    }

    /// Run one pass over `db`
    #[instrument(skip(self, db), fields(name = %db.name_any(), namespace = db.namespace()))]
    pub async fn reconcile(&self, db: &Database) -> Result<Outcome> {
        if !self.namespaces.allows(&namespace_of(db)) {
            debug!("Namespace not watched, ignoring");
            return Ok(Outcome::Ignored);
        }

        match Lifecycle::of(&db.metadata) {
            Lifecycle::Released => Ok(Outcome::Released),
            Lifecycle::Finalizing => self.finalize(db).await,
            Lifecycle::Unguarded => {
                self.store.attach_finalizer(db).await?;
                info!("Finalizer added");
                self.apply(db).await
            }
            Lifecycle::Guarded => self.apply(db).await,
        }
    }

    async fn finalize(&self, db: &Database) -> Result<Outcome> {
        let engine = if db.spec.deletion_protected {
            None
        } else {
            self.cleanup_adapter(db)?
        };

        let cleanup = finalizer::cleanup(db, engine.as_deref(), self.secrets.as_ref()).await?;
        self.store.release_finalizer(db).await?;

        info!(cleanup = ?cleanup, "Finalizer removed");
        Ok(Outcome::Finalized(cleanup))
    }

    /// Adapter that owns the objects to drop
    ///
    /// A resource that reached `Created` is cleaned up in the engine it was
    /// provisioned in, whatever its spec says now. When that engine has no
    /// adapter the pass fails and the marker stays.
    fn cleanup_adapter(&self, db: &Database) -> Result<Option<Arc<dyn EngineAdapter>>> {
        let provisioned = db.provisioned_engine();
        let kind = provisioned.clone().unwrap_or_else(|| db.engine());

        match self.engines.dispatch(kind) {
            Dispatch::Adapter(engine) => Ok(Some(engine)),
            Dispatch::Unimplemented(kind) | Dispatch::Unsupported(kind) if provisioned.is_some() => {
                Err(OperatorError::FinalizerError(format!(
                    "database was provisioned in engine '{}', which has no adapter",
                    kind
                )))
            }
            Dispatch::Unimplemented(_) | Dispatch::Unsupported(_) => Ok(None),
        }
    }

    async fn apply(&self, db: &Database) -> Result<Outcome> {
        if let Err(message) = db.check() {
            warn!(errors = %message, "Database spec validation failed");
            return self.settle_inert(db, DatabasePhase::Error, message).await;
        }

        let engine = match self.engines.dispatch(db.engine()) {
            Dispatch::Adapter(engine) => engine,
            Dispatch::Unimplemented(kind) => {
                info!(engine = %kind, "Engine not supported yet");
                return self
                    .settle_inert(
                        db,
                        DatabasePhase::Error,
                        format!("engine '{}' is not supported yet", kind),
                    )
                    .await;
            }
            Dispatch::Unsupported(kind) => {
                info!(engine = %kind, "Unsupported engine");
                return self
                    .settle_inert(
                        db,
                        DatabasePhase::Unsupported,
                        format!("engine '{}' is not supported", kind),
                    )
                    .await;
            }
        };

        let report = if db.is_created() {
            ConvergeReport {
                membership: sync_membership(
                    engine.as_ref(),
                    &db.owner_role(),
                    &db.desired_members(),
                )
                .await?,
                ..Default::default()
            }
        } else {
            self.provision(db, engine.as_ref()).await?
        };

        let status = DatabaseStatus {
            phase: Some(DatabasePhase::Created),
            last_error: None,
            server_endpoint: Some(format!("{}:{}", engine.host(), engine.port())),
            observed_generation: db.metadata.generation,
            provisioned_engine: Some(engine.kind().to_string()),
        };
        self.persist_if_changed(db, status).await?;

        Ok(Outcome::Converged(report))
    }

    /// First-time provisioning
    ///
    /// Every step is idempotent, so a pass that failed halfway is simply run
    /// again from the top.
    async fn provision(&self, db: &Database, engine: &dyn EngineAdapter) -> Result<ConvergeReport> {
        let name = db.database_name();
        let role = db.owner_role();
        let login = db.login_user();

        engine.create_database(&name).await?;
        engine.create_owner_role(&role).await?;

        let password = generate_password(DEFAULT_PASSWORD_LENGTH);
        let credential_minted = engine.create_user(&login, &password).await?.was_created();
        if credential_minted {
            let record = SecretRecord::project(
                db,
                engine.host(),
                engine.port(),
                Credential {
                    username: login.clone(),
                    password,
                },
            );
            if let Err(e) = self.secrets.upsert(&record).await {
                // The password only exists in memory; without the secret
                // nobody can log in, so drop the user and mint again next pass
                warn!(user = %login, error = %e, "Credential secret write failed, dropping user");
                if let Err(drop_err) = engine.drop_user(&login).await {
                    warn!(user = %login, error = %drop_err, "Failed to drop user");
                }
                return Err(e);
            }
        } else {
            debug!(user = %login, "Login user already exists, keeping its credential");
        }

        engine.grant_database_ownership(&name, &role).await?;

        let members: Vec<String> = db.desired_members().into_iter().collect();
        engine.grant_membership(&role, &members).await?;

        info!(
            database = %name,
            role = %role,
            user = %login,
            members = members.len(),
            "Database provisioned"
        );

        Ok(ConvergeReport {
            provisioned: true,
            credential_minted,
            membership: GrantDiff {
                to_revoke: Default::default(),
                to_grant: members.into_iter().collect(),
            },
        })
    }

    async fn settle_inert(
        &self,
        db: &Database,
        phase: DatabasePhase,
        message: String,
    ) -> Result<Outcome> {
        let existing = db.status.clone().unwrap_or_default();
        let status = DatabaseStatus {
            phase: Some(phase),
            last_error: Some(message),
            server_endpoint: existing.server_endpoint,
            observed_generation: db.metadata.generation,
            provisioned_engine: existing.provisioned_engine,
        };
        self.persist_if_changed(db, status).await?;
        Ok(Outcome::Inert(phase))
    }

    async fn persist_if_changed(&self, db: &Database, status: DatabaseStatus) -> Result<()> {
        if db.status.as_ref() == Some(&status) {
            debug!("Status unchanged");
            return Ok(());
        }
        self.store.persist_status(db, &status).await
    }
}
