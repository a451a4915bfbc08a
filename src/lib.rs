//! # Heddle
//!
//! Workflow statuses, the allowed moves between them, and a staged editor
//! for changing those moves.
//!
//! A [`Workflow`] owns a [`StateRegistry`] (the statuses, e.g. "To Do",
//! "In Review", "Done") and a [`TransitionGraph`] (directed edges saying
//! which status may move to which). The graph is edited one source at a
//! time through a [`TransitionEditor`]: open a source, toggle destinations,
//! commit. Commits replace the source's outgoing edges in one step, and
//! stores persist that replacement atomically.
//!
//! Workflows are rendered through [`TransitionTable`] (a "From / Transition
//! / To" view that collapses "may move anywhere" into a single `All` row)
//! and [`Diagram`].
//!
//! ## Quick Example
//!
//! ```
//! use heddle::{seed, RowTarget, TransitionEditor, TransitionTable};
//!
//! # fn main() -> heddle::Result<()> {
//! let mut workflow = seed::default_workflow("board-1")?;
//!
//! let mut editor = TransitionEditor::new();
//! editor.open(&workflow, "done")?;
//! editor.toggle_all()?; // every candidate was selected, so this clears them
//! editor.toggle("todo")?;
//! editor.commit(&mut workflow)?;
//!
//! assert_eq!(workflow.outgoing_of("done"), vec!["todo"]);
//!
//! let table = TransitionTable::project(&workflow);
//! assert_eq!(table.rows_from("todo").next().map(|r| &r.target), Some(&RowTarget::All));
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! The name comes from the **heddle**, the loom part that decides which warp
//! threads lift for each pass. Here the heddle decides which statuses a work
//! item may pass to next.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod editor;
pub mod error;
pub mod event;
pub mod graph;
pub mod projection;
pub mod seed;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod workflow;


pub use config::{EventsConfig, HeddleConfig, LoggingConfig, StoreBackend, StoreConfig};
pub use editor::{Commit, EditSession, EditorState, TransitionEditor};
pub use error::{HeddleError, Result};
pub use event::WorkflowEvent;
pub use graph::{Transition, TransitionGraph};
pub use projection::{to_dot, Diagram, DiagramNode, RowTarget, TransitionRow, TransitionTable};
pub use state::{State, StatePatch, StateRegistry, StatusCategory};
pub use store::{open_store, MemoryWorkflowStore, WorkflowStore};
pub use workflow::{Workflow, WorkflowBuilder, WorkflowDefinition};

#[cfg(feature = "sqlite")]
pub use store::SqliteWorkflowStore;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
