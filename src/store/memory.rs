//! In-memory workflow store implementation.
//!
//! This module provides [`MemoryWorkflowStore`], a thread-safe in-memory
//! implementation of [`WorkflowStore`] suitable for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::WorkflowStore;
use crate::{HeddleError, Result, State, StateRegistry, TransitionGraph, WorkflowDefinition};

/// An in-memory implementation of [`WorkflowStore`].
///
/// This implementation uses `Arc<RwLock<...>>` internally, making it
/// safe to clone and share across async tasks. Each mutation holds the
/// write guard for its whole duration, which makes it atomic with respect
/// to every other caller.
///
/// # Example
///
/// ```
/// use heddle::{seed, MemoryWorkflowStore, WorkflowStore};
///
/// # async fn example() -> heddle::Result<()> {
/// let mut store = MemoryWorkflowStore::new();
/// let workflow = seed::default_workflow("board-1")?;
/// store.save_definition("board-1", &workflow.definition()).await?;
///
/// let loaded = store.load_definition("board-1").await?;
/// assert!(loaded.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkflowStore {
    workflows: Arc<RwLock<HashMap<String, WorkflowDefinition>>>,
}

impl MemoryWorkflowStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of workflows currently stored.
    ///
    /// Useful for testing.
    pub async fn workflow_count(&self) -> usize {
        self.workflows.read().await.len()
    }

    /// Clears all stored data.
    pub async fn clear(&self) {
        self.workflows.write().await.clear();
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn save_definition(
        &mut self,
        workflow_id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<()> {
        definition.validate()?;
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow_id.to_string(), definition.clone());
        debug!(workflow_id, states = definition.states.len(), "saved definition");
        Ok(())
    }

    async fn load_definition(&self, workflow_id: &str) -> Result<Option<WorkflowDefinition>> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(workflow_id).cloned())
    }

    async fn replace_outgoing(
        &mut self,
        workflow_id: &str,
        from: &str,
        to: &[String],
    ) -> Result<()> {
        let mut workflows = self.workflows.write().await;
        let definition = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| HeddleError::WorkflowNotFound(workflow_id.to_string()))?;

        // Work on a copy so a rejected replacement leaves the stored edges alone.
        let registry = StateRegistry::from_states(definition.states.iter().cloned())?;
        let mut graph =
            TransitionGraph::from_transitions(&registry, definition.transitions.iter().cloned())?;
        graph.replace_outgoing(&registry, from, to)?;

        definition.transitions = graph.transitions().to_vec();
        Ok(())
    }

    async fn upsert_state(&mut self, workflow_id: &str, state: &State) -> Result<()> {
        let mut workflows = self.workflows.write().await;
        let definition = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| HeddleError::WorkflowNotFound(workflow_id.to_string()))?;

        match definition.states.iter_mut().find(|s| s.key == state.key) {
            Some(existing) => *existing = state.clone(),
            None => definition.states.push(state.clone()),
        }
        Ok(())
    }

    async fn remove_state(&mut self, workflow_id: &str, key: &str) -> Result<usize> {
        let mut workflows = self.workflows.write().await;
        let definition = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| HeddleError::WorkflowNotFound(workflow_id.to_string()))?;

        let index = definition
            .states
            .iter()
            .position(|s| s.key == key)
            .ok_or_else(|| HeddleError::StateNotFound(key.to_string()))?;
        definition.states.remove(index);

        let before = definition.transitions.len();
        definition
            .transitions
            .retain(|t| t.from != key && t.to != key);
        Ok(before - definition.transitions.len())
    }

    async fn delete_workflow(&mut self, workflow_id: &str) -> Result<()> {
        self.workflows.write().await.remove(workflow_id);
        Ok(())
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let workflows = self.workflows.read().await;
        let mut ids: Vec<String> = workflows.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{seed, Transition};

    async fn seeded() -> MemoryWorkflowStore {
        let mut store = MemoryWorkflowStore::new();
        let workflow = seed::default_workflow("wf-1").unwrap();
        store
            .save_definition("wf-1", &workflow.definition())
            .await
            .unwrap();
        store
    }

    fn outgoing(definition: &WorkflowDefinition, from: &str) -> Vec<String> {
        definition
            .transitions
            .iter()
            .filter(|t| t.from == from)
            .map(|t| t.to.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = MemoryWorkflowStore::new();
        assert_eq!(store.workflow_count().await, 0);
        assert!(store.list_workflows().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = seeded().await;
        let definition = store.load_definition("wf-1").await.unwrap().unwrap();
        assert_eq!(definition.states.len(), 4);
        assert_eq!(definition.transitions.len(), 12);
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_definition() {
        let mut store = seeded().await;
        let before = store.load_definition("wf-1").await.unwrap().unwrap();

        let duplicate = WorkflowDefinition {
            states: vec![
                State::new("a", "A", crate::StatusCategory::Todo, 0),
                State::new("a", "A2", crate::StatusCategory::Done, 1),
            ],
            transitions: vec![],
        };
        let result = store.save_definition("wf-1", &duplicate).await;
        assert!(matches!(result, Err(HeddleError::DuplicateState(k)) if k == "a"));

        let self_loop = WorkflowDefinition {
            states: vec![State::new("a", "A", crate::StatusCategory::Todo, 0)],
            transitions: vec![Transition::new("a", "a")],
        };
        let result = store.save_definition("bad", &self_loop).await;
        assert!(matches!(result, Err(HeddleError::SelfTransition(_))));

        // nothing was written
        assert!(store.load_definition("bad").await.unwrap().is_none());
        assert_eq!(store.load_definition("wf-1").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let store = MemoryWorkflowStore::new();
        assert!(store.load_definition("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_outgoing() {
        let mut store = seeded().await;
        store
            .replace_outgoing("wf-1", "todo", &["done".to_string()])
            .await
            .unwrap();

        let definition = store.load_definition("wf-1").await.unwrap().unwrap();
        assert_eq!(outgoing(&definition, "todo"), vec!["done"]);
        assert_eq!(definition.transitions.len(), 10);
    }

    #[tokio::test]
    async fn test_replace_outgoing_unknown_target_is_atomic() {
        let mut store = seeded().await;
        let before = store.load_definition("wf-1").await.unwrap().unwrap();

        let result = store
            .replace_outgoing(
                "wf-1",
                "todo",
                &["done".to_string(), "archived".to_string()],
            )
            .await;
        assert!(matches!(result, Err(HeddleError::StateNotFound(k)) if k == "archived"));

        let after = store.load_definition("wf-1").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_replace_outgoing_missing_workflow() {
        let mut store = MemoryWorkflowStore::new();
        let result = store.replace_outgoing("nope", "todo", &[]).await;
        assert!(matches!(result, Err(HeddleError::WorkflowNotFound(_))));
    }

    #[tokio::test]
    async fn test_upsert_state() {
        let mut store = seeded().await;
        let mut state = store.load_definition("wf-1").await.unwrap().unwrap().states[0].clone();
        state.name = "Backlog".to_string();
        store.upsert_state("wf-1", &state).await.unwrap();

        let archived = State::new("archived", "Archived", crate::StatusCategory::Done, 9);
        store.upsert_state("wf-1", &archived).await.unwrap();

        let definition = store.load_definition("wf-1").await.unwrap().unwrap();
        assert_eq!(definition.states.len(), 5);
        assert_eq!(definition.states[0].name, "Backlog");
    }

    #[tokio::test]
    async fn test_remove_state_cascades() {
        let mut store = seeded().await;
        let removed = store.remove_state("wf-1", "in_review").await.unwrap();
        assert_eq!(removed, 6);

        let definition = store.load_definition("wf-1").await.unwrap().unwrap();
        assert_eq!(definition.states.len(), 3);
        assert!(!definition
            .transitions
            .iter()
            .any(|t| t.from == "in_review" || t.to == "in_review"));

        let result = store.remove_state("wf-1", "in_review").await;
        assert!(matches!(result, Err(HeddleError::StateNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let mut store = seeded().await;
        store
            .save_definition("wf-0", &WorkflowDefinition::default())
            .await
            .unwrap();
        assert_eq!(store.list_workflows().await.unwrap(), vec!["wf-0", "wf-1"]);

        store.delete_workflow("wf-1").await.unwrap();
        store.delete_workflow("never-existed").await.unwrap();
        assert_eq!(store.list_workflows().await.unwrap(), vec!["wf-0"]);
    }

    #[tokio::test]
    async fn test_store_is_clone() {
        let store1 = seeded().await;
        let mut store2 = store1.clone();
        store2
            .replace_outgoing("wf-1", "done", &[])
            .await
            .unwrap();

        let definition = store1.load_definition("wf-1").await.unwrap().unwrap();
        assert!(outgoing(&definition, "done").is_empty());
    }

    #[tokio::test]
    async fn test_store_trait_object() {
        let mut store: Box<dyn WorkflowStore> = Box::new(MemoryWorkflowStore::new());
        let definition = WorkflowDefinition {
            states: vec![
                State::new("a", "A", crate::StatusCategory::Todo, 0),
                State::new("b", "B", crate::StatusCategory::Done, 1),
            ],
            transitions: vec![Transition::new("a", "b")],
        };
        store.save_definition("wf-2", &definition).await.unwrap();
        store
            .replace_outgoing("wf-2", "b", &["a".to_string()])
            .await
            .unwrap();

        let loaded = store.load_definition("wf-2").await.unwrap().unwrap();
        assert_eq!(loaded.transitions.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_replacements_do_not_interleave() {
        let store = seeded().await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let mut store = store.clone();
            handles.push(tokio::spawn(async move {
                let targets = if i % 2 == 0 {
                    vec!["done".to_string()]
                } else {
                    vec!["in_review".to_string(), "in_progress".to_string()]
                };
                store.replace_outgoing("wf-1", "todo", &targets).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let definition = store.load_definition("wf-1").await.unwrap().unwrap();
        let todo = outgoing(&definition, "todo");
        assert!(
            todo == vec!["done".to_string()]
                || todo == vec!["in_review".to_string(), "in_progress".to_string()]
        );
    }
}
