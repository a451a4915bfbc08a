//! Workflow states and the registry that holds them.
//!
//! A [`State`] is a named node in the workflow graph. The [`StateRegistry`]
//! keeps states keyed and ordered; every other component resolves keys
//! through it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{HeddleError, Result};

/// Semantic classification of a state.
///
/// Categories only group states for presentation; they carry no graph
/// semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Work that has not started.
    Todo,

    /// Work that is underway.
    InProgress,

    /// Work that is finished.
    Done,
}

impl StatusCategory {
    /// Returns the wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Todo => "todo",
            StatusCategory::InProgress => "in_progress",
            StatusCategory::Done => "done",
        }
    }
}

/// A workflow status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Unique, stable identifier.
    pub key: String,

    /// Human-readable label.
    pub name: String,

    /// Presentation grouping.
    pub category: StatusCategory,

    /// Display color, e.g. `#3b82f6`.
    pub color: String,

    /// Default display position; lower sorts first.
    pub order: u32,
}

impl State {
    /// Creates a new state with an empty color.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        category: StatusCategory,
        order: u32,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            category,
            color: String::new(),
            order,
        }
    }

    /// Sets the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A partial update to a [`State`].
///
/// The key is deliberately absent: keys are stable for the lifetime of the
/// workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePatch {
    /// New label.
    pub name: Option<String>,
    /// New category.
    pub category: Option<StatusCategory>,
    /// New color.
    pub color: Option<String>,
    /// New display position.
    pub order: Option<u32>,
}

impl StatePatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.category.is_none() && self.color.is_none() && self.order.is_none()
    }

    fn apply(self, state: &mut State) {
        if let Some(name) = self.name {
            state.name = name;
        }
        if let Some(category) = self.category {
            state.category = category;
        }
        if let Some(color) = self.color {
            state.color = color;
        }
        if let Some(order) = self.order {
            state.order = order;
        }
    }
}

/// The ordered, keyed set of workflow states.
///
/// States are stored in insertion order; [`list_states`](Self::list_states)
/// presents them by `order`. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateRegistry {
    states: Vec<State>,
}

impl StateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of states.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::DuplicateState`] if two states share a key.
    pub fn from_states(states: impl IntoIterator<Item = State>) -> Result<Self> {
        let mut registry = Self::new();
        for state in states {
            registry.insert(state)?;
        }
        Ok(registry)
    }

    /// Adds a state.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::DuplicateState`] if the key is already taken.
    pub fn insert(&mut self, state: State) -> Result<()> {
        if self.contains(&state.key) {
            return Err(HeddleError::DuplicateState(state.key));
        }
        self.states.push(state);
        Ok(())
    }

    /// Applies a patch to an existing state and returns the updated state.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if the key is absent.
    pub fn update(&mut self, key: &str, patch: StatePatch) -> Result<&State> {
        let state = self
            .states
            .iter_mut()
            .find(|s| s.key == key)
            .ok_or_else(|| HeddleError::StateNotFound(key.to_string()))?;
        patch.apply(state);
        Ok(&*state)
    }

    /// Removes a state, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if the key is absent.
    pub fn remove(&mut self, key: &str) -> Result<State> {
        let index = self
            .states
            .iter()
            .position(|s| s.key == key)
            .ok_or_else(|| HeddleError::StateNotFound(key.to_string()))?;
        Ok(self.states.remove(index))
    }

    /// Returns all states sorted by `order`.
    ///
    /// States with equal `order` keep their insertion order.
    pub fn list_states(&self) -> Vec<&State> {
        let mut states: Vec<&State> = self.states.iter().collect();
        states.sort_by_key(|s| s.order);
        states
    }

    /// Looks up a state by key.
    pub fn find_state(&self, key: &str) -> Option<&State> {
        self.states.iter().find(|s| s.key == key)
    }

    /// Returns the display name for a key, or an empty string if unknown.
    pub fn label(&self, key: &str) -> &str {
        self.find_state(key).map(|s| s.name.as_str()).unwrap_or("")
    }

    /// Returns true if a state with the given key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.states.iter().any(|s| s.key == key)
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.key.as_str())
    }

    /// Returns the number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if there are no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns the states in insertion order.
    pub fn states(&self) -> &[State] {
        &self.states
    }
}
