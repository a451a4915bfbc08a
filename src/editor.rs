//! The staged transition editor.
//!
//! [`TransitionEditor`] lets an operator pick one source state, toggle the
//! destinations it may move to, and then commit the whole selection at once.
//! Nothing touches the workflow until [`TransitionEditor::commit`]; a
//! [`TransitionEditor::cancel`] drops the staged selection.
//!
//! ```text
//! Closed --open(from)--> Open(prefilled) --toggle / toggle_all--> Open
//!   ^                        |
//!   +------ commit/cancel ---+
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::{HeddleError, Result, Workflow};

/// A staged edit of one source state's outgoing transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    workflow_id: String,
    from: String,
    candidates: Vec<String>,
    selected: HashSet<String>,
    opened_at: DateTime<Utc>,
}

impl EditSession {
    fn open(workflow: &Workflow, from: &str) -> Self {
        let candidates: Vec<String> = workflow
            .list_states()
            .into_iter()
            .filter(|s| s.key != from)
            .map(|s| s.key.clone())
            .collect();
        let selected = workflow
            .outgoing_of(from)
            .into_iter()
            .map(str::to_string)
            .collect();

        Self {
            workflow_id: workflow.id().to_string(),
            from: from.to_string(),
            candidates,
            selected,
            opened_at: Utc::now(),
        }
    }

    /// The workflow this session edits.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// The source state being edited.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// When the session was opened.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Every state except the source, in display order.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Returns true if `key` is in the working selection.
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.contains(key)
    }

    /// Returns true if every candidate is selected.
    ///
    /// This drives the checked state of an "All" checkbox. With no
    /// candidates it is vacuously true.
    pub fn all_selected(&self) -> bool {
        self.candidates.iter().all(|c| self.selected.contains(c))
    }

    /// The working selection in candidate order.
    pub fn selection(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .filter(|c| self.selected.contains(c.as_str()))
            .map(|c| c.as_str())
            .collect()
    }

    fn toggle(&mut self, key: &str) -> Result<bool> {
        if !self.candidates.iter().any(|c| c == key) {
            return Err(HeddleError::NotACandidate {
                from: self.from.clone(),
                to: key.to_string(),
            });
        }
        if self.selected.remove(key) {
            Ok(false)
        } else {
            self.selected.insert(key.to_string());
            Ok(true)
        }
    }

    fn toggle_all(&mut self) -> bool {
        if self.all_selected() {
            self.selected.clear();
            false
        } else {
            self.selected = self.candidates.iter().cloned().collect();
            true
        }
    }
}

/// The editor's lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditorState {
    /// No session is open.
    #[default]
    Closed,

    /// A session is staging changes.
    Open(EditSession),
}

/// The result of a successful commit.
///
/// This is what a host persists: the source and its complete new set of
/// destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// The workflow that was changed.
    pub workflow_id: String,
    /// The source state.
    pub from: String,
    /// The new destinations, in display order.
    pub to: Vec<String>,
    /// When the commit happened.
    pub committed_at: DateTime<Utc>,
}

/// Interactive editor for one source state's outgoing transitions.
///
/// # Example
///
/// ```
/// use heddle::{seed, TransitionEditor};
///
/// let mut workflow = seed::default_workflow("board")?;
/// let mut editor = TransitionEditor::new();
///
/// editor.open(&workflow, "in_review")?;
/// assert!(editor.session().unwrap().all_selected());
///
/// editor.toggle("done")?;
/// let commit = editor.commit(&mut workflow)?;
///
/// assert_eq!(commit.to, vec!["todo", "in_progress"]);
/// assert_eq!(workflow.outgoing_of("in_review"), vec!["todo", "in_progress"]);
/// # Ok::<(), heddle::HeddleError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransitionEditor {
    state: EditorState,
}

impl TransitionEditor {
    /// Creates a closed editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Returns true if a session is open.
    pub fn is_open(&self) -> bool {
        matches!(self.state, EditorState::Open(_))
    }

    /// Returns the open session, if any.
    pub fn session(&self) -> Option<&EditSession> {
        match &self.state {
            EditorState::Open(session) => Some(session),
            EditorState::Closed => None,
        }
    }

    /// Opens a session for `from`, pre-selecting its current destinations.
    ///
    /// Any session already open is discarded first.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if `from` is unknown; the
    /// editor is left closed.
    pub fn open(&mut self, workflow: &Workflow, from: &str) -> Result<&EditSession> {
        if let EditorState::Open(previous) = &self.state {
            debug!(from = %previous.from, "discarding open session");
        }
        self.state = EditorState::Closed;

        if workflow.find_state(from).is_none() {
            return Err(HeddleError::StateNotFound(from.to_string()));
        }

        let session = EditSession::open(workflow, from);
        debug!(
            workflow_id = %session.workflow_id,
            from = %from,
            selected = session.selected.len(),
            "editor opened"
        );
        self.state = EditorState::Open(session);
        self.session().ok_or(HeddleError::EditorClosed)
    }

    /// Returns the candidate destinations of the open session.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::EditorClosed`] if no session is open.
    pub fn candidates(&self) -> Result<&[String]> {
        Ok(self.open_session()?.candidates())
    }

    /// Flips one destination in or out of the working selection.
    ///
    /// Returns whether `key` is selected afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::EditorClosed`] if no session is open and
    /// [`HeddleError::NotACandidate`] if `key` is the source or unknown.
    pub fn toggle(&mut self, key: &str) -> Result<bool> {
        self.open_session_mut()?.toggle(key)
    }

    /// Selects every candidate, or clears the selection if every candidate
    /// is already selected.
    ///
    /// Returns whether every candidate is selected afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::EditorClosed`] if no session is open.
    pub fn toggle_all(&mut self) -> Result<bool> {
        Ok(self.open_session_mut()?.toggle_all())
    }

    /// Writes the working selection to the workflow and closes the editor.
    ///
    /// Selected destinations that were removed from the workflow since the
    /// session opened are dropped. The editor is closed whether or not the
    /// commit succeeds.
    ///
    /// # Errors
    ///
    /// - [`HeddleError::EditorClosed`] if no session is open
    /// - [`HeddleError::InvalidWorkflow`] if `workflow` is not the one the
    ///   session was opened on
    /// - [`HeddleError::StateNotFound`] if the source state no longer
    ///   exists; the workflow is untouched
    pub fn commit(&mut self, workflow: &mut Workflow) -> Result<Commit> {
        let session = match std::mem::take(&mut self.state) {
            EditorState::Open(session) => session,
            EditorState::Closed => return Err(HeddleError::EditorClosed),
        };

        if session.workflow_id != workflow.id() {
            warn!(
                expected = %session.workflow_id,
                actual = %workflow.id(),
                "commit against a different workflow"
            );
            return Err(HeddleError::InvalidWorkflow(format!(
                "session for {} committed to {}",
                session.workflow_id,
                workflow.id()
            )));
        }

        if workflow.find_state(&session.from).is_none() {
            warn!(from = %session.from, "source state removed before commit");
            return Err(HeddleError::StateNotFound(session.from));
        }

        let targets: Vec<&str> = session
            .selection()
            .into_iter()
            .filter(|key| {
                let present = workflow.find_state(key).is_some();
                if !present {
                    debug!(to = %key, "dropping removed destination");
                }
                present
            })
            .collect();

        let to = workflow.replace_outgoing(&session.from, targets)?;
        info!(from = %session.from, count = to.len(), "editor committed");

        Ok(Commit {
            workflow_id: session.workflow_id,
            from: session.from,
            to,
            committed_at: Utc::now(),
        })
    }

    /// Discards the working selection and closes the editor.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::EditorClosed`] if no session is open.
    pub fn cancel(&mut self) -> Result<()> {
        match std::mem::take(&mut self.state) {
            EditorState::Open(session) => {
                debug!(from = %session.from, "editor discarded");
                Ok(())
            }
            EditorState::Closed => Err(HeddleError::EditorClosed),
        }
    }

    fn open_session(&self) -> Result<&EditSession> {
        self.session().ok_or(HeddleError::EditorClosed)
    }

    fn open_session_mut(&mut self) -> Result<&mut EditSession> {
        match &mut self.state {
            EditorState::Open(session) => Ok(session),
            EditorState::Closed => Err(HeddleError::EditorClosed),
        }
    }
}
