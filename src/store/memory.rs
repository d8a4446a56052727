//! In-memory execution store
//!
//! DashMap-backed implementation of the store contracts, with an explicit
//! awaiting-status index so poller discovery does not scan historical
//! records. Suitable for tests and single-process deployments.

use super::{ExecutionStore, StoreError, StoreResult};
use crate::models::Execution;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    records: DashMap<Uuid, Execution>,
    awaiting: DashSet<Uuid>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self, execution: &Execution) {
        if execution.status.is_awaiting() {
            self.awaiting.insert(execution.execution_id);
        } else {
            self.awaiting.remove(&execution.execution_id);
        }
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn get(&self, execution_id: Uuid) -> StoreResult<Option<Execution>> {
        Ok(self.records.get(&execution_id).map(|r| r.clone()))
    }

    async fn create(&self, execution: Execution) -> StoreResult<()> {
        let id = execution.execution_id;
        if self.records.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        self.index(&execution);
        self.records.insert(id, execution);
        Ok(())
    }

    async fn update(&self, mut execution: Execution) -> StoreResult<Execution> {
        let id = execution.execution_id;
        // The entry guard serializes the compare-and-swap per record.
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;

        if entry.version != execution.version {
            return Err(StoreError::VersionConflict {
                execution_id: id,
                expected: execution.version,
                found: entry.version,
            });
        }

        execution.version += 1;
        execution.updated_at = Utc::now();
        *entry = execution.clone();
        drop(entry);

        self.index(&execution);
        Ok(execution)
    }

    async fn list_awaiting(&self, page: usize, page_size: usize) -> StoreResult<Vec<Uuid>> {
        // Sorted for deterministic pagination across calls.
        let mut ids: Vec<Uuid> = self.awaiting.iter().map(|id| *id).collect();
        ids.sort_unstable();
        Ok(ids
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionKind, FailurePolicy, PlanWave, RecoveryPlan};
    use crate::state_machine::ExecutionStatus;

    fn sample_execution() -> Execution {
        let plan = RecoveryPlan {
            id: "plan-1".to_string(),
            name: "fleet".to_string(),
            failure_policy: FailurePolicy::Lenient,
            waves: vec![PlanWave {
                number: 1,
                name: "w1".to_string(),
                depends_on: vec![],
                pause_before: false,
                server_ids: vec!["s-1".to_string()],
            }],
        };
        Execution::from_plan(&plan, ExecutionKind::Drill, "operator")
    }

    #[tokio::test]
    async fn test_create_get_round_trip() {
        let store = InMemoryExecutionStore::new();
        let execution = sample_execution();
        let id = execution.execution_id;

        store.create(execution).await.unwrap();
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.execution_id, id);
        assert_eq!(loaded.version, 0);

        assert!(matches!(
            store.create(loaded).await.unwrap_err(),
            StoreError::AlreadyExists(_)
        ));
    }

    #[tokio::test]
    async fn test_conditional_update_bumps_version() {
        let store = InMemoryExecutionStore::new();
        let execution = sample_execution();
        let id = execution.execution_id;
        store.create(execution).await.unwrap();

        let mut loaded = store.get(id).await.unwrap().unwrap();
        loaded.status = ExecutionStatus::Launching;
        let stored = store.update(loaded).await.unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_stale_writer_gets_version_conflict() {
        let store = InMemoryExecutionStore::new();
        let execution = sample_execution();
        let id = execution.execution_id;
        store.create(execution).await.unwrap();

        let stale = store.get(id).await.unwrap().unwrap();
        let mut fresh = store.get(id).await.unwrap().unwrap();
        fresh.status = ExecutionStatus::Cancelled;
        store.update(fresh).await.unwrap();

        let mut stale_write = stale;
        stale_write.status = ExecutionStatus::Polling;
        let err = store.update(stale_write).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // The cancel won; the stale status advance was discarded.
        let current = store.get(id).await.unwrap().unwrap();
        assert_eq!(current.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_awaiting_index_tracks_status() {
        let store = InMemoryExecutionStore::new();
        let execution = sample_execution();
        let id = execution.execution_id;
        store.create(execution).await.unwrap();

        // Pending executions are not awaiting.
        assert!(store.list_awaiting(0, 10).await.unwrap().is_empty());

        let mut loaded = store.get(id).await.unwrap().unwrap();
        loaded.status = ExecutionStatus::Polling;
        store.update(loaded).await.unwrap();
        assert_eq!(store.list_awaiting(0, 10).await.unwrap(), vec![id]);

        let mut loaded = store.get(id).await.unwrap().unwrap();
        loaded.status = ExecutionStatus::Completed;
        store.update(loaded).await.unwrap();
        assert!(store.list_awaiting(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_awaiting_index_pagination() {
        let store = InMemoryExecutionStore::new();
        for _ in 0..5 {
            let mut execution = sample_execution();
            execution.status = ExecutionStatus::Polling;
            store.create(execution).await.unwrap();
        }
        let first = store.list_awaiting(0, 2).await.unwrap();
        let second = store.list_awaiting(1, 2).await.unwrap();
        let third = store.list_awaiting(2, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(third.len(), 1);
        assert!(first.iter().all(|id| !second.contains(id)));
    }
}
