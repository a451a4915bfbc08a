//! The default workflow new boards start from.

use crate::{Result, State, StatusCategory, Workflow};

/// Returns the four default states in display order.
pub fn default_states() -> Vec<State> {
    vec![
        State::new("todo", "To Do", StatusCategory::Todo, 0).with_color("#6b7280"),
        State::new("in_review", "In Review", StatusCategory::InProgress, 1).with_color("#f59e0b"),
        State::new("in_progress", "In Progress", StatusCategory::InProgress, 2)
            .with_color("#3b82f6"),
        State::new("done", "Done", StatusCategory::Done, 3).with_color("#10b981"),
    ]
}

/// Builds the default workflow, in which every state may move to every
/// other state.
///
/// # Errors
///
/// Returns [`crate::HeddleError::InvalidWorkflow`] if `id` is empty.
pub fn default_workflow(id: impl Into<String>) -> Result<Workflow> {
    let states = default_states();
    let keys: Vec<String> = states.iter().map(|s| s.key.clone()).collect();

    let mut builder = Workflow::builder(id).states(states);
    for from in &keys {
        for to in keys.iter().filter(|to| *to != from) {
            builder = builder.transition(from.clone(), to.clone());
        }
    }
    builder.build()
}
