//! Writes to the system of record
//!
//! The reconciler never talks to the API server directly. Finalizer edits and
//! status updates go through [`ResourceStore`], credential secrets through
//! [`SecretSink`]; the Kubernetes-backed implementations live here.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, info};

use crate::crd::{Database, DatabaseStatus};
use crate::error::{OperatorError, Result};
use crate::finalizer::{with_marker, without_marker};
use crate::secret::{SecretRecord, MANAGER_NAME};

/// Metadata and status writes for `Database` resources
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Attach the operator's finalizer marker
    async fn attach_finalizer(&self, db: &Database) -> Result<()>;

    /// Remove the operator's finalizer marker
    async fn release_finalizer(&self, db: &Database) -> Result<()>;

    /// Replace the observed state
    async fn persist_status(&self, db: &Database, status: &DatabaseStatus) -> Result<()>;
}

/// Upsert-style sink for credential records
#[async_trait]
pub trait SecretSink: Send + Sync {
    /// Create or overwrite the record
    async fn upsert(&self, record: &SecretRecord) -> Result<()>;

    /// Remove the record; a missing record is not an error
    async fn remove(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Namespace of `db`, `default` when unset
pub(crate) fn namespace_of(db: &Database) -> String {
    db.namespace().unwrap_or_else(|| "default".to_string())
}

/// [`ResourceStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    /// Create a store using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, db: &Database) -> Api<Database> {
        Api::namespaced(self.client.clone(), &namespace_of(db))
    }

    /// Merge-patch the finalizer list, guarded by the resource version the
    /// list was read at
    async fn patch_finalizers(&self, db: &Database, finalizers: Vec<String>) -> Result<()> {
        let name = db.name_any();
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": db.resource_version(),
            }
        });

        self.api(db)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(OperatorError::from)?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn attach_finalizer(&self, db: &Database) -> Result<()> {
        debug!(name = %db.name_any(), "Adding finalizer");
        self.patch_finalizers(db, with_marker(db.finalizers())).await
    }

    async fn release_finalizer(&self, db: &Database) -> Result<()> {
        debug!(name = %db.name_any(), "Removing finalizer");
        self.patch_finalizers(db, without_marker(db.finalizers()))
            .await
    }

    async fn persist_status(&self, db: &Database, status: &DatabaseStatus) -> Result<()> {
        let name = db.name_any();

        debug!(
            name = %name,
            phase = ?status.phase,
            "Updating database status"
        );

        let patch = serde_json::json!({
            "status": status
        });

        self.api(db)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(OperatorError::from)?;

        Ok(())
    }
}

/// Refuse to overwrite a secret another manager owns
fn verify_ownership<K: Resource>(existing: &K) -> Result<()> {
    let labels = existing.meta().labels.as_ref();
    let managed_by = labels.and_then(|l| l.get("app.kubernetes.io/managed-by"));
    match managed_by {
        Some(manager) if manager == MANAGER_NAME => Ok(()),
        other => {
            let name = existing.meta().name.as_deref().unwrap_or("<unknown>");
            Err(OperatorError::InvalidConfig(format!(
                "secret '{}' is managed by '{}', not {}; refusing to overwrite it",
                name,
                other.map(String::as_str).unwrap_or("<nobody>"),
                MANAGER_NAME
            )))
        }
    }
}

/// [`SecretSink`] writing Kubernetes `Secret`s
#[derive(Clone)]
pub struct KubeSecretSink {
    client: Client,
}

impl KubeSecretSink {
    /// Create a sink using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretSink for KubeSecretSink {
    async fn upsert(&self, record: &SecretRecord) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &record.namespace);

        if let Some(existing) = api.get_opt(&record.name).await? {
            verify_ownership(&existing)?;
        }

        let patch_params = PatchParams::apply(MANAGER_NAME).force();
        api.patch(&record.name, &patch_params, &Patch::Apply(&record.to_secret()))
            .await
            .map_err(|e| OperatorError::SecretError {
                name: record.name.clone(),
                namespace: record.namespace.clone(),
                message: e.to_string(),
            })?;

        info!(
            name = %record.name,
            namespace = %record.namespace,
            user = %record.credential.username,
            "Credential secret written"
        );
        Ok(())
    }

    async fn remove(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        let Some(existing) = api.get_opt(name).await? else {
            debug!(name = %name, namespace = %namespace, "Credential secret already absent");
            return Ok(());
        };
        if verify_ownership(&existing).is_err() {
            debug!(name = %name, namespace = %namespace, "Secret not managed by operator, leaving it");
            return Ok(());
        }

        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(name = %name, namespace = %namespace, "Credential secret deleted");
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(OperatorError::SecretError {
                name: name.to_string(),
                namespace: namespace.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn secret_with_manager(manager: Option<&str>) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("orders-db-secret".to_string()),
                labels: manager.map(|m| {
                    BTreeMap::from([(
                        "app.kubernetes.io/managed-by".to_string(),
                        m.to_string(),
                    )])
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_verify_ownership() {
        assert!(verify_ownership(&secret_with_manager(Some(MANAGER_NAME))).is_ok());
        assert!(verify_ownership(&secret_with_manager(Some("helm"))).is_err());
        assert!(verify_ownership(&secret_with_manager(None)).is_err());
    }
}
