//! Workflow persistence (C9 supplement, §5).
//!
//! The original coordination engine persists workflow state through a
//! pluggable store interface even though its default is in-memory; this
//! crate carries that as a narrow `Store` trait with an `InMemoryStore`
//! default, matching the scope of the distillation's "don't invent a new
//! persistence layer" non-goal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Workflow, WorkflowId};
use crate::error::OrchestratorError;

#[async_trait]
pub trait Store: Send + Sync {
    async fn save(&self, workflow: Workflow) -> Result<(), OrchestratorError>;
    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, OrchestratorError>;
    async fn list(&self) -> Result<Vec<Workflow>, OrchestratorError>;
    async fn delete(&self, id: WorkflowId) -> Result<(), OrchestratorError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    workflows: Arc<RwLock<HashMap<WorkflowId, Workflow>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save(&self, workflow: Workflow) -> Result<(), OrchestratorError> {
        self.workflows.write().await.insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(&self, id: WorkflowId) -> Result<Option<Workflow>, OrchestratorError> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Workflow>, OrchestratorError> {
        Ok(self.workflows.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: WorkflowId) -> Result<(), OrchestratorError> {
        self.workflows.write().await.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeploymentMethod, WorkflowStatus};
    use uuid::Uuid;

    fn workflow() -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            incident_id: Uuid::new_v4(),
            status: WorkflowStatus::Pending,
            deployment_method: DeploymentMethod::Manual,
            affected_layers: vec![],
            steps: vec![],
            checkpoints: vec![],
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn saved_workflow_is_retrievable_by_id() {
        let store = InMemoryStore::new();
        let w = workflow();
        let id = w.id;
        store.save(w).await.unwrap();
        let fetched = store.get(id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn unknown_id_returns_none_not_error() {
        let store = InMemoryStore::new();
        let fetched = store.get(Uuid::new_v4()).await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn delete_removes_from_list() {
        let store = InMemoryStore::new();
        let w = workflow();
        let id = w.id;
        store.save(w).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
