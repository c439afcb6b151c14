//! Database Controller
//!
//! Watches `Database` resources and feeds each change to the
//! [`Reconciler`]. Failed passes are retried with exponential backoff; a
//! converged resource is revisited periodically so membership drift in the
//! engine gets repaired.

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::crd::Database;
use crate::error::{OperatorError, Result};
use crate::reconciler::{Outcome, Reconciler};
use crate::store::namespace_of;

/// Requeue interval for converged resources
const DEFAULT_REQUEUE_SECONDS: u64 = 300; // 5 minutes

/// Requeue interval for error cases (base for exponential backoff)
const ERROR_REQUEUE_SECONDS: u64 = 30;

/// Maximum requeue delay for error backoff
const MAX_ERROR_REQUEUE_SECONDS: u64 = 600;

/// Context passed to the controller
pub struct ControllerContext {
    /// Per-resource reconciliation logic
    pub reconciler: Reconciler,
    /// Metrics recorder
    pub metrics: Option<ControllerMetrics>,
    /// Per-resource error retry counts for exponential backoff
    pub error_counts: dashmap::DashMap<String, u32>,
}

impl ControllerContext {
    /// Create a context around `reconciler`
    pub fn new(reconciler: Reconciler, metrics: Option<ControllerMetrics>) -> Self {
        Self {
            reconciler,
            metrics,
            error_counts: dashmap::DashMap::new(),
        }
    }
}

/// Metrics for the controller
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Counter for reconciliation attempts
    pub reconciliations: metrics::Counter,
    /// Counter for reconciliation errors
    pub errors: metrics::Counter,
    /// Histogram for reconciliation duration
    pub duration: metrics::Histogram,
    /// Counter for credentials written to secrets
    pub credentials_minted: metrics::Counter,
    /// Counter for membership grants and revokes applied
    pub membership_changes: metrics::Counter,
    /// Counter for resources whose finalizer was released
    pub finalized: metrics::Counter,
}

impl ControllerMetrics {
    /// Create new controller metrics
    pub fn new() -> Self {
        Self {
            reconciliations: metrics::counter!("dbward_database_reconciliations_total"),
            errors: metrics::counter!("dbward_database_reconciliation_errors_total"),
            duration: metrics::histogram!("dbward_database_reconciliation_duration_seconds"),
            credentials_minted: metrics::counter!("dbward_database_credentials_minted_total"),
            membership_changes: metrics::counter!("dbward_database_membership_changes_total"),
            finalized: metrics::counter!("dbward_database_finalized_total"),
        }
    }

    fn observe(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Converged(report) => {
                if report.credential_minted {
                    self.credentials_minted.increment(1);
                }
                self.membership_changes
                    .increment(report.membership.len() as u64);
            }
            Outcome::Finalized(_) => self.finalized.increment(1),
            _ => {}
        }
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the Database controller
///
/// With exactly one watched namespace the watch is namespaced; otherwise it
/// is cluster-wide and the reconciler skips namespaces outside the filter.
/// Returns once a termination signal has been received and in-flight passes
/// have finished.
pub async fn run_controller(client: Client, ctx: Arc<ControllerContext>) -> Result<()> {
    let filter = ctx.reconciler.namespaces().clone();
    let databases: Api<Database> = match filter.single() {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    info!(namespaces = %filter, "Starting Database controller");

    Controller::new(databases, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(
                        name = obj.name,
                        namespace = obj.namespace,
                        ?action,
                        "Reconciliation completed"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation failed");
                }
            }
        })
        .await;

    info!("Database controller stopped");
    Ok(())
}

/// Key used for per-resource backoff
fn backoff_key(db: &Database) -> String {
    format!("{}/{}", namespace_of(db), db.name_any())
}

/// Main reconciliation function
#[instrument(skip(db, ctx), fields(name = %db.name_any(), namespace = db.namespace()))]
async fn reconcile(db: Arc<Database>, ctx: Arc<ControllerContext>) -> Result<Action> {
    let start = std::time::Instant::now();

    if let Some(ref metrics) = ctx.metrics {
        metrics.reconciliations.increment(1);
    }

    let result = ctx.reconciler.reconcile(&db).await;

    if let Some(ref metrics) = ctx.metrics {
        metrics.duration.record(start.elapsed().as_secs_f64());
    }

    match result {
        Ok(outcome) => {
            // Reset error backoff counter on success
            ctx.error_counts.remove(&backoff_key(&db));
            if let Some(ref metrics) = ctx.metrics {
                metrics.observe(&outcome);
            }
            Ok(action_for(&outcome))
        }
        Err(e) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.errors.increment(1);
            }
            Err(e)
        }
    }
}

/// Follow-up action for a successful pass
pub fn action_for(outcome: &Outcome) -> Action {
    match outcome {
        Outcome::Converged(_) => Action::requeue(Duration::from_secs(DEFAULT_REQUEUE_SECONDS)),
        Outcome::Ignored | Outcome::Inert(_) | Outcome::Finalized(_) | Outcome::Released => {
            Action::await_change()
        }
    }
}

/// Exponential backoff delay for the `retries`-th consecutive failure
///
/// 30s → 60s → 120s → 240s → 480s → 600s (capped)
pub fn backoff_delay(retries: u32) -> Duration {
    let base = Duration::from_secs(ERROR_REQUEUE_SECONDS);
    let backoff = base * 2u32.saturating_pow(retries.saturating_sub(1).min(5));
    backoff.min(Duration::from_secs(MAX_ERROR_REQUEUE_SECONDS))
}

/// Error policy for the controller
fn error_policy(db: Arc<Database>, error: &OperatorError, ctx: Arc<ControllerContext>) -> Action {
    let key = backoff_key(&db);
    let retries = {
        let mut entry = ctx.error_counts.entry(key.clone()).or_insert(0);
        *entry += 1;
        *entry
    };

    let delay = error
        .requeue_delay()
        .unwrap_or_else(|| backoff_delay(retries));

    warn!(
        error = %error,
        retryable = error.is_retryable(),
        retry = retries,
        delay_secs = delay.as_secs(),
        "Reconciliation error for '{}', will retry",
        key
    );

    Action::requeue(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::DatabasePhase;
    use crate::finalizer::Cleanup;
    use crate::reconciler::ConvergeReport;

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_secs(30));
        assert_eq!(backoff_delay(2), Duration::from_secs(60));
        assert_eq!(backoff_delay(3), Duration::from_secs(120));
        assert_eq!(backoff_delay(5), Duration::from_secs(480));
        assert_eq!(backoff_delay(6), Duration::from_secs(600));
        assert_eq!(backoff_delay(60), Duration::from_secs(600));
        assert_eq!(backoff_delay(0), Duration::from_secs(30));
    }

    #[test]
    fn test_action_for_outcome() {
        assert_eq!(
            action_for(&Outcome::Converged(ConvergeReport::default())),
            Action::requeue(Duration::from_secs(DEFAULT_REQUEUE_SECONDS))
        );
        assert_eq!(
            action_for(&Outcome::Inert(DatabasePhase::Unsupported)),
            Action::await_change()
        );
        assert_eq!(
            action_for(&Outcome::Finalized(Cleanup::Protected)),
            Action::await_change()
        );
        assert_eq!(action_for(&Outcome::Ignored), Action::await_change());
    }
}
