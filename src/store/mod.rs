//! Persistence for workflow definitions.
//!
//! This module provides the [`WorkflowStore`] trait, along with concrete
//! implementations:
//!
//! - [`MemoryWorkflowStore`]: Thread-safe in-memory storage for testing/development
//! - `SqliteWorkflowStore`: SQLite-backed storage (requires the `sqlite` feature)
//!
//! Every mutating call is a single atomic unit. In particular
//! [`WorkflowStore::replace_outgoing`] swaps a source's edges in one step, so
//! two editors saving the same source concurrently can never interleave
//! their deletes and inserts.
//!
//! # Example
//!
//! ```
//! use heddle::{seed, MemoryWorkflowStore, Workflow, WorkflowStore};
//!
//! # async fn example() -> heddle::Result<()> {
//! let mut store = MemoryWorkflowStore::new();
//! let workflow = seed::default_workflow("board-1")?;
//! workflow.save(&mut store).await?;
//!
//! store
//!     .replace_outgoing("board-1", "todo", &["done".to_string()])
//!     .await?;
//!
//! let reloaded = Workflow::load(&store, "board-1").await?;
//! assert_eq!(reloaded.outgoing_of("todo"), vec!["done"]);
//! # Ok(())
//! # }
//! ```

mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryWorkflowStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWorkflowStore;

use async_trait::async_trait;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::{HeddleError, Result, State, WorkflowDefinition};

/// A trait for persisting workflow definitions.
///
/// # Object Safety
///
/// This trait is object-safe, allowing for dynamic dispatch with
/// `dyn WorkflowStore`. Backends can be chosen at runtime with
/// [`open_store`].
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Saves a complete definition, replacing any previous one with the
    /// same ID.
    ///
    /// # Errors
    ///
    /// Returns the registry or graph error if the definition is invalid, in
    /// which case nothing is written, or a store error if it cannot be saved.
    async fn save_definition(
        &mut self,
        workflow_id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<()>;

    /// Loads a definition.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(definition))` if the workflow exists, `Ok(None)` if
    /// not found, or an error if retrieval fails.
    async fn load_definition(&self, workflow_id: &str) -> Result<Option<WorkflowDefinition>>;

    /// Atomically replaces every outgoing transition of `from`.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::WorkflowNotFound`] if the workflow is unknown,
    /// [`HeddleError::StateNotFound`] if `from` or a destination no longer
    /// exists, and [`HeddleError::SelfTransition`] if `to` contains `from`.
    /// On error the stored transitions are unchanged.
    async fn replace_outgoing(&mut self, workflow_id: &str, from: &str, to: &[String])
        -> Result<()>;

    /// Inserts a state or overwrites the stored state with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::WorkflowNotFound`] if the workflow is unknown.
    async fn upsert_state(&mut self, workflow_id: &str, state: &State) -> Result<()>;

    /// Removes a state and every transition incident to it.
    ///
    /// # Returns
    ///
    /// The number of transitions removed with the state.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::WorkflowNotFound`] or
    /// [`HeddleError::StateNotFound`] if either is unknown.
    async fn remove_state(&mut self, workflow_id: &str, key: &str) -> Result<usize>;

    /// Deletes a workflow and everything it owns. Unknown IDs are a no-op.
    async fn delete_workflow(&mut self, workflow_id: &str) -> Result<()>;

    /// Lists all stored workflow IDs in ascending order.
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// Opens the store selected by configuration.
///
/// # Errors
///
/// Returns [`HeddleError::Config`] if the SQLite backend is selected
/// without a path, or if the crate was built without the `sqlite` feature.
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn WorkflowStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!(backend = "memory", "opening workflow store");
            Ok(Box::new(MemoryWorkflowStore::new()))
        }
        StoreBackend::Sqlite => open_sqlite(config).await,
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(config: &StoreConfig) -> Result<Box<dyn WorkflowStore>> {
    let path = config
        .path
        .as_ref()
        .ok_or_else(|| HeddleError::Config("store.path is required for sqlite".to_string()))?;
    info!(backend = "sqlite", path = %path.display(), "opening workflow store");
    Ok(Box::new(SqliteWorkflowStore::open(path).await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_config: &StoreConfig) -> Result<Box<dyn WorkflowStore>> {
    Err(HeddleError::Config(
        "sqlite backend requires the `sqlite` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_store() {
        let config = StoreConfig::default();
        let store = open_store(&config).await.unwrap();
        assert!(store.list_workflows().await.unwrap().is_empty());
    }

    #[cfg(not(feature = "sqlite"))]
    #[tokio::test]
    async fn test_open_sqlite_without_feature() {
        let config = StoreConfig {
            backend: StoreBackend::Sqlite,
            path: Some("heddle.db".into()),
        };
        let result = open_store(&config).await;
        assert!(matches!(result, Err(HeddleError::Config(_))));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_open_sqlite_requires_path() {
        let config = StoreConfig {
            backend: StoreBackend::Sqlite,
            path: None,
        };
        let result = open_store(&config).await;
        assert!(matches!(result, Err(HeddleError::Config(_))));
    }
}
