//! Plan garbage collection reconciler
//!
//! Deletes a plan once the broker catalog sync has marked it as withdrawn and
//! no ServiceInstance references it any more. Every pass looks only at the
//! current state, so running it repeatedly for the same key is harmless.
//!
//! The dependency check and the delete are two separate calls: an instance
//! created in between is not seen. Instance admission is expected to reject
//! new instances of withdrawn plans.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};
use crate::key::ObjectKey;

/// Point-in-time view of a plan as far as garbage collection cares
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanSnapshot {
    pub key: ObjectKey,
    pub removed_from_broker_catalog: bool,
}

/// What a successful reconcile pass did.
///
/// A failed pass is the `Err` of [`PlanReconciler::reconcile_key`] and is
/// reported under the `error` outcome label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Plan is still offered by its broker
    NoOp,
    /// Plan is withdrawn but instances still reference it
    WaitingOnDependents,
    /// Plan was deleted, or was already gone when the delete landed
    Deleted,
    /// Plan no longer exists in the cache
    NotFound,
}

impl ReconcileOutcome {
    /// Outcome label for a failed pass
    pub const ERROR_LABEL: &'static str = "error";

    /// Metric label for the outcome
    pub fn as_str(self) -> &'static str {
        match self {
            ReconcileOutcome::NoOp => "noop",
            ReconcileOutcome::WaitingOnDependents => "waiting_on_dependents",
            ReconcileOutcome::Deleted => "deleted",
            ReconcileOutcome::NotFound => "not_found",
        }
    }
}

/// Cached lookup of plans by key
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlanReader: Send + Sync {
    /// Current state of the plan, `None` if it does not exist
    async fn get_plan(&self, key: &ObjectKey) -> Result<Option<PlanSnapshot>>;
}

/// Finds instances that reference a plan
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DependencyQuery: Send + Sync {
    /// Keys of every instance referencing the plan. A namespaced plan can
    /// only be referenced from its own namespace.
    ///
    /// Must return the complete matching set or an error.
    async fn find_dependents(&self, plan: &ObjectKey) -> Result<Vec<ObjectKey>>;
}

/// Deletes plans from the backing store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlanDeleter: Send + Sync {
    /// Delete the plan. Returns [`Error::NotFound`] if it was already gone.
    async fn delete_plan(&self, plan: &ObjectKey) -> Result<()>;
}

/// Decides whether a withdrawn plan can be deleted
pub struct PlanReconciler<R, D, X> {
    reader: R,
    dependents: D,
    deleter: X,
}

impl<R, D, X> PlanReconciler<R, D, X>
where
    R: PlanReader,
    D: DependencyQuery,
    X: PlanDeleter,
{
    pub fn new(reader: R, dependents: D, deleter: X) -> Self {
        Self {
            reader,
            dependents,
            deleter,
        }
    }

    /// Reconcile the plan named by a queue key
    #[instrument(skip(self))]
    pub async fn reconcile_key(&self, key: &str) -> Result<ReconcileOutcome> {
        let plan_key = ObjectKey::decode(key)?;

        let plan = match self.reader.get_plan(&plan_key).await {
            Ok(Some(plan)) => plan,
            Ok(None) | Err(Error::NotFound(_)) => {
                info!(plan = %plan_key, "Not doing work because the plan has been deleted");
                return Ok(ReconcileOutcome::NotFound);
            }
            Err(e) => {
                info!(plan = %plan_key, error = %e, "Unable to retrieve plan");
                return Err(e);
            }
        };

        self.reconcile_plan(&plan).await
    }

    /// Reconcile an already loaded plan
    pub async fn reconcile_plan(&self, plan: &PlanSnapshot) -> Result<ReconcileOutcome> {
        debug!(plan = %plan.key, "Processing plan");

        if !plan.removed_from_broker_catalog {
            return Ok(ReconcileOutcome::NoOp);
        }

        info!(
            plan = %plan.key,
            "Plan has been removed from the broker catalog; determining whether there are instances remaining"
        );

        let instances = self.dependents.find_dependents(&plan.key).await?;
        if !instances.is_empty() {
            debug!(
                plan = %plan.key,
                instances = instances.len(),
                "Plan still has instances, not deleting"
            );
            return Ok(ReconcileOutcome::WaitingOnDependents);
        }

        info!(
            plan = %plan.key,
            "Plan has been removed from the broker catalog and has zero instances remaining; deleting"
        );
        match self.deleter.delete_plan(&plan.key).await {
            Ok(()) => Ok(ReconcileOutcome::Deleted),
            Err(Error::NotFound(_)) => {
                debug!(plan = %plan.key, "Plan was already deleted");
                Ok(ReconcileOutcome::Deleted)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn snapshot(key: &str, removed: bool) -> PlanSnapshot {
        PlanSnapshot {
            key: ObjectKey::decode(key).unwrap(),
            removed_from_broker_catalog: removed,
        }
    }

    fn reader_returning(plan: Option<PlanSnapshot>) -> MockPlanReader {
        let mut reader = MockPlanReader::new();
        reader
            .expect_get_plan()
            .times(1)
            .returning(move |_| Ok(plan.clone()));
        reader
    }

    fn untouched_dependents() -> MockDependencyQuery {
        let mut dependents = MockDependencyQuery::new();
        dependents.expect_find_dependents().times(0);
        dependents
    }

    fn untouched_deleter() -> MockPlanDeleter {
        let mut deleter = MockPlanDeleter::new();
        deleter.expect_delete_plan().times(0);
        deleter
    }

    #[tokio::test]
    async fn active_plan_is_left_alone() {
        let reconciler = PlanReconciler::new(
            reader_returning(Some(snapshot("ns/p1", false))),
            untouched_dependents(),
            untouched_deleter(),
        );

        let outcome = reconciler.reconcile_key("ns/p1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NoOp);
    }

    #[tokio::test]
    async fn withdrawn_plan_with_instances_waits() {
        let mut dependents = MockDependencyQuery::new();
        dependents
            .expect_find_dependents()
            .with(eq(ObjectKey::namespaced("ns", "p1")))
            .times(1)
            .returning(|_| Ok(vec![ObjectKey::namespaced("ns", "db")]));

        let reconciler = PlanReconciler::new(
            reader_returning(Some(snapshot("ns/p1", true))),
            dependents,
            untouched_deleter(),
        );

        let outcome = reconciler.reconcile_key("ns/p1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::WaitingOnDependents);
    }

    #[tokio::test]
    async fn withdrawn_plan_without_instances_is_deleted() {
        let mut dependents = MockDependencyQuery::new();
        dependents
            .expect_find_dependents()
            .times(1)
            .returning(|_| Ok(vec![]));
        let mut deleter = MockPlanDeleter::new();
        deleter
            .expect_delete_plan()
            .with(eq(ObjectKey::namespaced("ns", "p1")))
            .times(1)
            .returning(|_| Ok(()));

        let reconciler = PlanReconciler::new(
            reader_returning(Some(snapshot("ns/p1", true))),
            dependents,
            deleter,
        );

        let outcome = reconciler.reconcile_key("ns/p1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Deleted);
    }

    #[tokio::test]
    async fn missing_plan_is_not_an_error() {
        let reconciler = PlanReconciler::new(
            reader_returning(None),
            untouched_dependents(),
            untouched_deleter(),
        );

        let outcome = reconciler.reconcile_key("ns/p1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotFound);
    }

    #[tokio::test]
    async fn dependency_query_failure_propagates() {
        let mut dependents = MockDependencyQuery::new();
        dependents
            .expect_find_dependents()
            .times(1)
            .returning(|_| Err(Error::store("connection refused")));

        let reconciler = PlanReconciler::new(
            reader_returning(Some(snapshot("ns/p1", true))),
            dependents,
            untouched_deleter(),
        );

        let err = reconciler.reconcile_key("ns/p1").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn delete_racing_another_actor_counts_as_deleted() {
        let mut dependents = MockDependencyQuery::new();
        dependents.expect_find_dependents().returning(|_| Ok(vec![]));
        let mut deleter = MockPlanDeleter::new();
        deleter
            .expect_delete_plan()
            .times(1)
            .returning(|key| Err(Error::NotFound(key.to_string())));

        let reconciler = PlanReconciler::new(
            reader_returning(Some(snapshot("ns/p1", true))),
            dependents,
            deleter,
        );

        let outcome = reconciler.reconcile_key("ns/p1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Deleted);
    }

    #[tokio::test]
    async fn delete_failure_propagates() {
        let mut dependents = MockDependencyQuery::new();
        dependents.expect_find_dependents().returning(|_| Ok(vec![]));
        let mut deleter = MockPlanDeleter::new();
        deleter
            .expect_delete_plan()
            .times(1)
            .returning(|_| Err(Error::store("etcd unavailable")));

        let reconciler = PlanReconciler::new(
            reader_returning(Some(snapshot("ns/p1", true))),
            dependents,
            deleter,
        );

        let err = reconciler.reconcile_key("ns/p1").await.unwrap_err();
        assert!(err.to_string().contains("etcd unavailable"));
    }

    #[tokio::test]
    async fn reader_failure_propagates_without_further_calls() {
        let mut reader = MockPlanReader::new();
        reader
            .expect_get_plan()
            .times(1)
            .returning(|_| Err(Error::store("cache unavailable")));

        let reconciler =
            PlanReconciler::new(reader, untouched_dependents(), untouched_deleter());

        assert!(reconciler.reconcile_key("ns/p1").await.is_err());
    }

    #[tokio::test]
    async fn malformed_key_fails_before_any_lookup() {
        let mut reader = MockPlanReader::new();
        reader.expect_get_plan().times(0);

        let reconciler =
            PlanReconciler::new(reader, untouched_dependents(), untouched_deleter());

        let err = reconciler.reconcile_key("a/b/c").await.unwrap_err();
        assert!(matches!(err, Error::MalformedKey(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn cluster_scoped_key_is_passed_through() {
        let mut reader = MockPlanReader::new();
        reader
            .expect_get_plan()
            .with(eq(ObjectKey::cluster("gold")))
            .returning(|key| {
                Ok(Some(PlanSnapshot {
                    key: key.clone(),
                    removed_from_broker_catalog: true,
                }))
            });
        let mut dependents = MockDependencyQuery::new();
        dependents.expect_find_dependents().returning(|_| Ok(vec![]));
        let mut deleter = MockPlanDeleter::new();
        deleter
            .expect_delete_plan()
            .with(eq(ObjectKey::cluster("gold")))
            .times(1)
            .returning(|_| Ok(()));

        let reconciler = PlanReconciler::new(reader, dependents, deleter);
        assert_eq!(
            reconciler.reconcile_key("gold").await.unwrap(),
            ReconcileOutcome::Deleted
        );
    }

    #[test]
    fn outcome_labels_are_distinct_from_error() {
        let labels: std::collections::HashSet<_> = [
            ReconcileOutcome::NoOp,
            ReconcileOutcome::WaitingOnDependents,
            ReconcileOutcome::Deleted,
            ReconcileOutcome::NotFound,
        ]
        .into_iter()
        .map(ReconcileOutcome::as_str)
        .chain([ReconcileOutcome::ERROR_LABEL])
        .collect();
        assert_eq!(labels.len(), 5);
    }
}
