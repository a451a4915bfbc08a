//! Workflow change events.
//!
//! This module provides [`WorkflowEvent`] for observing changes to a
//! workflow definition. Events are broadcast through a channel; a host view
//! subscribes to know when to re-project its table or diagram, and a
//! persistence layer subscribes to know what to write.

use chrono::{DateTime, Utc};

/// An event emitted when a workflow definition changes.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum WorkflowEvent {
    /// All outgoing transitions of a state were replaced.
    TransitionsReplaced {
        /// The workflow's identifier.
        workflow_id: String,
        /// The source state.
        from: String,
        /// The new destinations, de-duplicated.
        to: Vec<String>,
        /// When the replacement happened.
        at: DateTime<Utc>,
    },

    /// A state was added to the registry.
    StateAdded {
        /// The workflow's identifier.
        workflow_id: String,
        /// The new state's key.
        key: String,
    },

    /// A state's presentation fields changed.
    StateUpdated {
        /// The workflow's identifier.
        workflow_id: String,
        /// The state key.
        key: String,
    },

    /// A state was removed together with its incident transitions.
    StateRemoved {
        /// The workflow's identifier.
        workflow_id: String,
        /// The removed state's key.
        key: String,
        /// How many transitions were dropped with it.
        removed_transitions: usize,
    },
}

impl WorkflowEvent {
    /// Returns the workflow ID for this event.
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::TransitionsReplaced { workflow_id, .. }
            | Self::StateAdded { workflow_id, .. }
            | Self::StateUpdated { workflow_id, .. }
            | Self::StateRemoved { workflow_id, .. } => workflow_id,
        }
    }

    /// Returns the state key the event is about.
    pub fn state_key(&self) -> &str {
        match self {
            Self::TransitionsReplaced { from, .. } => from,
            Self::StateAdded { key, .. }
            | Self::StateUpdated { key, .. }
            | Self::StateRemoved { key, .. } => key,
        }
    }

    /// Returns true if the event changed the transition graph.
    pub fn changes_transitions(&self) -> bool {
        match self {
            Self::TransitionsReplaced { .. } => true,
            Self::StateRemoved {
                removed_transitions,
                ..
            } => *removed_transitions > 0,
            Self::StateAdded { .. } | Self::StateUpdated { .. } => false,
        }
    }
}
