//! SQLite-backed workflow store implementation.
//!
//! This module provides [`SqliteWorkflowStore`], a persistent implementation
//! of [`WorkflowStore`] backed by SQLite.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::WorkflowStore;
use crate::{
    HeddleError, Result, State, StateRegistry, StatusCategory, Transition, TransitionGraph,
    WorkflowDefinition,
};

/// Schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

const CREATE_WORKFLOWS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS workflows (
        id TEXT NOT NULL PRIMARY KEY,
        updated_at TEXT NOT NULL
    )
"#;

const CREATE_STATES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS states (
        workflow_id TEXT NOT NULL REFERENCES workflows (id) ON DELETE CASCADE,
        key TEXT NOT NULL,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        color TEXT NOT NULL,
        ord INTEGER NOT NULL,
        PRIMARY KEY (workflow_id, key)
    )
"#;

/// Rows are read back in `id` order, which is insertion order.
const CREATE_TRANSITIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS transitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        workflow_id TEXT NOT NULL,
        from_key TEXT NOT NULL,
        to_key TEXT NOT NULL,
        UNIQUE (workflow_id, from_key, to_key),
        FOREIGN KEY (workflow_id, from_key) REFERENCES states (workflow_id, key) ON DELETE CASCADE,
        FOREIGN KEY (workflow_id, to_key) REFERENCES states (workflow_id, key) ON DELETE CASCADE
    )
"#;

const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    )
"#;

const CREATE_TRANSITION_FROM_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_transitions_from
    ON transitions (workflow_id, from_key)
"#;

/// A SQLite-backed implementation of [`WorkflowStore`].
///
/// Every mutation runs in a single transaction, so a failed or concurrent
/// [`WorkflowStore::replace_outgoing`] never leaves a half-replaced set of
/// edges behind.
///
/// # Thread Safety
///
/// The store wraps the SQLite connection in a `Mutex` and uses
/// `spawn_blocking` for all database operations, making it safe
/// for use in async contexts.
///
/// # Example
///
/// ```rust,ignore
/// use heddle::SqliteWorkflowStore;
///
/// let store = SqliteWorkflowStore::open("workflows.db").await?;
/// let store = SqliteWorkflowStore::open_in_memory().await?;
/// ```
#[derive(Clone)]
pub struct SqliteWorkflowStore {
    conn: Arc<Mutex<Connection>>,
}

fn join_err(e: tokio::task::JoinError) -> HeddleError {
    HeddleError::Store(format!("spawn_blocking failed: {}", e))
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> HeddleError {
    move |e| HeddleError::Store(format!("{}: {}", context, e))
}

fn parse_category(value: &str) -> rusqlite::Result<StatusCategory> {
    match value {
        "todo" => Ok(StatusCategory::Todo),
        "in_progress" => Ok(StatusCategory::InProgress),
        "done" => Ok(StatusCategory::Done),
        other => Err(rusqlite::Error::InvalidColumnType(
            0,
            format!("category {:?}", other),
            rusqlite::types::Type::Text,
        )),
    }
}

fn workflow_exists(conn: &Connection, workflow_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM workflows WHERE id = ?1)",
        params![workflow_id],
        |row| row.get(0),
    )
}

fn read_definition(conn: &Connection, workflow_id: &str) -> rusqlite::Result<WorkflowDefinition> {
    let mut stmt = conn.prepare(
        "SELECT key, name, category, color, ord FROM states WHERE workflow_id = ?1 ORDER BY rowid",
    )?;
    let states = stmt
        .query_map(params![workflow_id], |row| {
            let category: String = row.get(2)?;
            Ok(State {
                key: row.get(0)?,
                name: row.get(1)?,
                category: parse_category(&category)?,
                color: row.get(3)?,
                order: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT from_key, to_key FROM transitions WHERE workflow_id = ?1 ORDER BY id",
    )?;
    let transitions = stmt
        .query_map(params![workflow_id], |row| {
            Ok(Transition::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(WorkflowDefinition {
        states,
        transitions,
    })
}

fn insert_state(conn: &Connection, workflow_id: &str, state: &State) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO states (workflow_id, key, name, category, color, ord)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (workflow_id, key) DO UPDATE SET
            name = excluded.name,
            category = excluded.category,
            color = excluded.color,
            ord = excluded.ord",
        params![
            workflow_id,
            state.key,
            state.name,
            state.category.as_str(),
            state.color,
            state.order
        ],
    )?;
    Ok(())
}

fn insert_transition(conn: &Connection, workflow_id: &str, from: &str, to: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO transitions (workflow_id, from_key, to_key) VALUES (?1, ?2, ?3)",
        params![workflow_id, from, to],
    )?;
    Ok(())
}

fn touch_workflow(conn: &Connection, workflow_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE workflows SET updated_at = ?2 WHERE id = ?1",
        params![workflow_id, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl SqliteWorkflowStore {
    /// Opens a SQLite database at the given path.
    ///
    /// Creates the database and schema if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the
    /// schema cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let conn = tokio::task::spawn_blocking(move || Connection::open(&path))
            .await
            .map_err(join_err)?
            .map_err(db_err("failed to open database"))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.run_migrations().await?;
        Ok(store)
    }

    /// Opens an in-memory SQLite database.
    ///
    /// Useful for testing. The database is lost when the store is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(Connection::open_in_memory)
            .await
            .map_err(join_err)?
            .map_err(db_err("failed to open in-memory database"))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();

            // Per-connection setting, cascades depend on it.
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
            conn.execute(CREATE_SCHEMA_VERSION_TABLE, [])?;

            let version: Option<i32> = conn
                .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                    row.get(0)
                })
                .optional()?;

            if version.is_none_or(|v| v < SCHEMA_VERSION) {
                conn.execute(CREATE_WORKFLOWS_TABLE, [])?;
                conn.execute(CREATE_STATES_TABLE, [])?;
                conn.execute(CREATE_TRANSITIONS_TABLE, [])?;
                conn.execute(CREATE_TRANSITION_FROM_INDEX, [])?;

                conn.execute("DELETE FROM schema_version", [])?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )?;
            }

            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(join_err)?
        .map_err(db_err("migration failed"))
    }

    /// Checks if the required tables exist.
    ///
    /// Useful for testing that the schema was created correctly.
    pub async fn tables_exist(&self) -> Result<bool> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();

            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('workflows', 'states', 'transitions', 'schema_version')",
                [],
                |row| row.get(0),
            )?;

            Ok::<bool, rusqlite::Error>(count == 4)
        })
        .await
        .map_err(join_err)?
        .map_err(db_err("table check failed"))
    }
}

// Debug implementation that doesn't expose connection details
impl std::fmt::Debug for SqliteWorkflowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWorkflowStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl WorkflowStore for SqliteWorkflowStore {
    async fn save_definition(
        &mut self,
        workflow_id: &str,
        definition: &WorkflowDefinition,
    ) -> Result<()> {
        definition.validate()?;
        let conn = Arc::clone(&self.conn);
        let workflow_id = workflow_id.to_string();
        let definition = definition.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO workflows (id, updated_at) VALUES (?1, ?2)
                 ON CONFLICT (id) DO UPDATE SET updated_at = excluded.updated_at",
                params![workflow_id, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.execute(
                "DELETE FROM transitions WHERE workflow_id = ?1",
                params![workflow_id],
            )?;
            tx.execute("DELETE FROM states WHERE workflow_id = ?1", params![workflow_id])?;

            for state in &definition.states {
                insert_state(&tx, &workflow_id, state)?;
            }
            for t in &definition.transitions {
                insert_transition(&tx, &workflow_id, &t.from, &t.to)?;
            }

            tx.commit()?;
            debug!(
                workflow_id = %workflow_id,
                states = definition.states.len(),
                "saved definition"
            );
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(join_err)?
        .map_err(db_err("save failed"))
    }

    async fn load_definition(&self, workflow_id: &str) -> Result<Option<WorkflowDefinition>> {
        let conn = Arc::clone(&self.conn);
        let workflow_id = workflow_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();

            if !workflow_exists(&conn, &workflow_id)? {
                return Ok(None);
            }
            read_definition(&conn, &workflow_id).map(Some)
        })
        .await
        .map_err(join_err)?
        .map_err(db_err("query failed"))
    }

    async fn replace_outgoing(
        &mut self,
        workflow_id: &str,
        from: &str,
        to: &[String],
    ) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let workflow_id = workflow_id.to_string();
        let from = from.to_string();
        let to = to.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction().map_err(db_err("transaction failed"))?;

            if !workflow_exists(&tx, &workflow_id).map_err(db_err("query failed"))? {
                return Err(HeddleError::WorkflowNotFound(workflow_id));
            }

            // Validate against the stored definition inside the transaction.
            let definition = read_definition(&tx, &workflow_id).map_err(db_err("query failed"))?;
            let registry = StateRegistry::from_states(definition.states)?;
            let mut graph = TransitionGraph::from_transitions(&registry, definition.transitions)?;
            let added = graph.replace_outgoing(&registry, &from, &to)?;

            tx.execute(
                "DELETE FROM transitions WHERE workflow_id = ?1 AND from_key = ?2",
                params![workflow_id, from],
            )
            .map_err(db_err("delete failed"))?;
            for dest in &added {
                insert_transition(&tx, &workflow_id, &from, dest)
                    .map_err(db_err("insert failed"))?;
            }
            touch_workflow(&tx, &workflow_id).map_err(db_err("update failed"))?;

            tx.commit().map_err(db_err("commit failed"))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn upsert_state(&mut self, workflow_id: &str, state: &State) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let workflow_id = workflow_id.to_string();
        let state = state.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction().map_err(db_err("transaction failed"))?;

            if !workflow_exists(&tx, &workflow_id).map_err(db_err("query failed"))? {
                return Err(HeddleError::WorkflowNotFound(workflow_id));
            }
            insert_state(&tx, &workflow_id, &state).map_err(db_err("insert failed"))?;
            touch_workflow(&tx, &workflow_id).map_err(db_err("update failed"))?;

            tx.commit().map_err(db_err("commit failed"))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn remove_state(&mut self, workflow_id: &str, key: &str) -> Result<usize> {
        let conn = Arc::clone(&self.conn);
        let workflow_id = workflow_id.to_string();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction().map_err(db_err("transaction failed"))?;

            if !workflow_exists(&tx, &workflow_id).map_err(db_err("query failed"))? {
                return Err(HeddleError::WorkflowNotFound(workflow_id));
            }

            let removed = tx
                .execute(
                    "DELETE FROM transitions WHERE workflow_id = ?1 AND (from_key = ?2 OR to_key = ?2)",
                    params![workflow_id, key],
                )
                .map_err(db_err("delete failed"))?;
            let deleted = tx
                .execute(
                    "DELETE FROM states WHERE workflow_id = ?1 AND key = ?2",
                    params![workflow_id, key],
                )
                .map_err(db_err("delete failed"))?;
            if deleted == 0 {
                // Dropping the transaction rolls back.
                return Err(HeddleError::StateNotFound(key));
            }
            touch_workflow(&tx, &workflow_id).map_err(db_err("update failed"))?;

            tx.commit().map_err(db_err("commit failed"))?;
            Ok(removed)
        })
        .await
        .map_err(join_err)?
    }

    async fn delete_workflow(&mut self, workflow_id: &str) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let workflow_id = workflow_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            // states and transitions follow via ON DELETE CASCADE
            conn.execute("DELETE FROM workflows WHERE id = ?1", params![workflow_id])?;
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(join_err)?
        .map_err(db_err("delete failed"))
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT id FROM workflows ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<String>>>()
        })
        .await
        .map_err(join_err)?
        .map_err(db_err("query failed"))
    }
}
