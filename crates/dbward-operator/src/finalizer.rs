//! Deletion guard
//!
//! A `Database` carries the [`FINALIZER`] marker for as long as external
//! cleanup is still owed. The marker is attached before the first engine
//! mutation and removed only after cleanup reports success, so the API
//! server cannot forget a resource whose database still exists.

use dbward_rdbc::EngineAdapter;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{info, warn};

use crate::crd::Database;
use crate::error::Result;
use crate::secret::secret_name;
use crate::store::{namespace_of, SecretSink};

/// Finalizer marker owned by the operator
pub const FINALIZER: &str = "db.dbward.io/finalizer";

/// Where a resource stands with respect to the deletion guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Live, marker not attached yet
    Unguarded,
    /// Live, marker attached
    Guarded,
    /// Deletion requested, cleanup still owed
    Finalizing,
    /// Deletion requested, nothing left for this operator to do
    Released,
}

impl Lifecycle {
    /// Derive the lifecycle state from object metadata
    pub fn of(meta: &ObjectMeta) -> Self {
        let marked = meta
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|s| s == FINALIZER));
        match (meta.deletion_timestamp.is_some(), marked) {
            (false, false) => Lifecycle::Unguarded,
            (false, true) => Lifecycle::Guarded,
            (true, true) => Lifecycle::Finalizing,
            (true, false) => Lifecycle::Released,
        }
    }
}

/// Finalizer list with the marker added (no duplicates)
pub fn with_marker(finalizers: &[String]) -> Vec<String> {
    let mut list = finalizers.to_vec();
    if !list.iter().any(|f| f == FINALIZER) {
        list.push(FINALIZER.to_string());
    }
    list
}

/// Finalizer list with the marker removed; other finalizers are kept
pub fn without_marker(finalizers: &[String]) -> Vec<String> {
    finalizers
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .cloned()
        .collect()
}

/// What cleanup did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Database, owning role, login user and secret were dropped
    Dropped,
    /// `deletionProtected` was set; nothing was touched
    Protected,
    /// The resource never reached `Created` and no adapter serves its engine
    NothingProvisioned,
}

/// Run external cleanup for a resource that is being deleted
///
/// Drops happen in a fixed order, database then owning role then login
/// user, and the credential secret goes last. The first failure aborts the
/// pass with the marker still in place.
pub async fn cleanup(
    db: &Database,
    engine: Option<&dyn EngineAdapter>,
    secrets: &dyn SecretSink,
) -> Result<Cleanup> {
    let name = db.name_any();

    if db.spec.deletion_protected {
        info!(
            name = %name,
            "Deletion protected, keeping database, role and user"
        );
        return Ok(Cleanup::Protected);
    }

    let Some(engine) = engine else {
        warn!(
            name = %name,
            engine = %db.engine(),
            "No adapter for engine and nothing provisioned, nothing to drop"
        );
        return Ok(Cleanup::NothingProvisioned);
    };

    let role = db.owner_role();
    let user = db.login_user();

    engine.drop_database(&name).await?;
    engine.drop_role(&role).await?;
    engine.drop_user(&user).await?;

    secrets.remove(&namespace_of(db), &secret_name(&name)).await?;

    info!(name = %name, role = %role, user = %user, "Dropped database, role and user");
    Ok(Cleanup::Dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn meta(deleting: bool, finalizers: &[&str]) -> ObjectMeta {
        ObjectMeta {
            name: Some("orders".to_string()),
            deletion_timestamp: deleting.then(|| Time(Default::default())),
            finalizers: Some(finalizers.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_lifecycle_states() {
        assert_eq!(Lifecycle::of(&meta(false, &[])), Lifecycle::Unguarded);
        assert_eq!(Lifecycle::of(&meta(false, &[FINALIZER])), Lifecycle::Guarded);
        assert_eq!(Lifecycle::of(&meta(true, &[FINALIZER])), Lifecycle::Finalizing);
        assert_eq!(Lifecycle::of(&meta(true, &[])), Lifecycle::Released);
        assert_eq!(
            Lifecycle::of(&ObjectMeta::default()),
            Lifecycle::Unguarded
        );
    }

    #[test]
    fn test_foreign_finalizer_is_not_ours() {
        assert_eq!(
            Lifecycle::of(&meta(true, &["example.com/other"])),
            Lifecycle::Released
        );
    }

    #[test]
    fn test_marker_edits_keep_other_finalizers() {
        let list = vec!["example.com/other".to_string()];

        let added = with_marker(&list);
        assert_eq!(added, vec!["example.com/other".to_string(), FINALIZER.to_string()]);
        assert_eq!(with_marker(&added), added);

        assert_eq!(without_marker(&added), list);
    }
}
