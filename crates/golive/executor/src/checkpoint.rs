//! Execution checkpoints
//!
//! Step 0 is the baseline captured before the first step. Step `k` is the
//! enablement state right after step `k` was applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use golive_types::{EnablementState, ExecutionId, PlanId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Captured registry enablement at one point of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub execution_id: ExecutionId,
    pub plan_id: PlanId,
    pub step_index: usize,
    pub captured_state: EnablementState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        execution_id: ExecutionId,
        plan_id: PlanId,
        step_index: usize,
        captured_state: EnablementState,
    ) -> Self {
        Self {
            execution_id,
            plan_id,
            step_index,
            captured_state,
            created_at: Utc::now(),
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.step_index == 0
    }
}

/// Checkpoint persistence.
///
/// `save` must be atomic per checkpoint: either the whole checkpoint is
/// stored or the call fails.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Highest step index recorded for the execution.
    async fn latest(&self, execution_id: &ExecutionId) -> Result<Option<Checkpoint>>;

    async fn get(&self, execution_id: &ExecutionId, step_index: usize) -> Result<Option<Checkpoint>>;

    /// Every checkpoint of the execution, ascending by step.
    async fn list(&self, execution_id: &ExecutionId) -> Result<Vec<Checkpoint>>;

    /// Drop every checkpoint of the execution.
    async fn discard(&self, execution_id: &ExecutionId) -> Result<()>;
}

/// In-memory checkpoint store (for testing and single-process deployments).
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: DashMap<ExecutionId, Vec<Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions with at least one checkpoint.
    pub fn execution_count(&self) -> usize {
        self.checkpoints.len()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut entries = self
            .checkpoints
            .entry(checkpoint.execution_id.clone())
            .or_default();

        // Re-saving a step replaces it
        entries.retain(|c| c.step_index != checkpoint.step_index);
        entries.push(checkpoint);
        entries.sort_by_key(|c| c.step_index);
        Ok(())
    }

    async fn latest(&self, execution_id: &ExecutionId) -> Result<Option<Checkpoint>> {
        Ok(self
            .checkpoints
            .get(execution_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn get(&self, execution_id: &ExecutionId, step_index: usize) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.get(execution_id).and_then(|entries| {
            entries
                .iter()
                .find(|c| c.step_index == step_index)
                .cloned()
        }))
    }

    async fn list(&self, execution_id: &ExecutionId) -> Result<Vec<Checkpoint>> {
        Ok(self
            .checkpoints
            .get(execution_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }

    async fn discard(&self, execution_id: &ExecutionId) -> Result<()> {
        self.checkpoints.remove(execution_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, bool)]) -> EnablementState {
        pairs.iter().map(|(id, on)| ((*id).into(), *on)).collect()
    }

    #[tokio::test]
    async fn test_latest_is_highest_step() {
        let store = InMemoryCheckpointStore::new();
        let exec = ExecutionId::generate();
        let plan = PlanId::generate();

        for step in [0, 2, 1] {
            store
                .save(Checkpoint::new(exec.clone(), plan.clone(), step, state(&[("a", step > 0)])))
                .await
                .unwrap();
        }

        let latest = store.latest(&exec).await.unwrap().unwrap();
        assert_eq!(latest.step_index, 2);

        let steps: Vec<usize> = store.list(&exec).await.unwrap().iter().map(|c| c.step_index).collect();
        assert_eq!(steps, vec![0, 1, 2]);
        assert!(store.get(&exec, 0).await.unwrap().unwrap().is_baseline());
    }

    #[tokio::test]
    async fn test_discard() {
        let store = InMemoryCheckpointStore::new();
        let exec = ExecutionId::generate();
        store
            .save(Checkpoint::new(exec.clone(), PlanId::generate(), 0, EnablementState::new()))
            .await
            .unwrap();
        assert_eq!(store.execution_count(), 1);

        store.discard(&exec).await.unwrap();
        assert!(store.latest(&exec).await.unwrap().is_none());
        assert_eq!(store.execution_count(), 0);
    }
}
