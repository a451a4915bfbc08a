//! The workflow aggregate.
//!
//! This module provides [`Workflow`] and [`WorkflowBuilder`]. A workflow owns
//! one [`StateRegistry`] and one [`TransitionGraph`] and keeps them
//! consistent: every transition references a registered state, and removing
//! a state removes the transitions that touch it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn};

use crate::{
    HeddleError, Result, State, StatePatch, StateRegistry, Transition, TransitionGraph,
    WorkflowEvent, WorkflowStore,
};

/// Default channel capacity for workflow events.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// A plain snapshot of a workflow: its states and transitions.
///
/// This is the exchange format between a workflow, its stores and any host
/// that supplies or persists definitions as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// States in insertion order.
    pub states: Vec<State>,
    /// Transitions in insertion order.
    pub transitions: Vec<Transition>,
}

impl WorkflowDefinition {
    /// Checks that the snapshot describes a valid workflow.
    ///
    /// # Errors
    ///
    /// - [`HeddleError::DuplicateState`] if two states share a key
    /// - [`HeddleError::StateNotFound`] if a transition references an
    ///   unknown state
    /// - [`HeddleError::SelfTransition`] if a transition is a self-loop
    pub fn validate(&self) -> Result<()> {
        let registry = StateRegistry::from_states(self.states.iter().cloned())?;
        TransitionGraph::from_transitions(&registry, self.transitions.iter().cloned())?;
        Ok(())
    }
}

/// A workflow definition: ordered states plus the transitions between them.
///
/// # Construction
///
/// ```
/// use heddle::{State, StatusCategory, Workflow};
///
/// let workflow = Workflow::builder("support")
///     .state(State::new("open", "Open", StatusCategory::Todo, 0))
///     .state(State::new("closed", "Closed", StatusCategory::Done, 1))
///     .transition("open", "closed")
///     .build()?;
///
/// assert_eq!(workflow.outgoing_of("open"), vec!["closed"]);
/// # Ok::<(), heddle::HeddleError>(())
/// ```
pub struct Workflow {
    id: String,
    registry: StateRegistry,
    graph: TransitionGraph,
    event_tx: broadcast::Sender<WorkflowEvent>,
    event_capacity: usize,
}

impl Workflow {
    /// Creates a new workflow builder.
    pub fn builder(id: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }

    /// Builds a workflow from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot has duplicate keys, dangling
    /// transitions or self-transitions.
    pub fn from_definition(id: impl Into<String>, definition: WorkflowDefinition) -> Result<Self> {
        Self::builder(id).definition(definition).build()
    }

    /// Parses a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::Serialization`] for malformed JSON and the
    /// errors of [`Workflow::from_definition`] otherwise.
    pub fn from_json(id: impl Into<String>, json: &str) -> Result<Self> {
        let definition: WorkflowDefinition = serde_json::from_str(json)?;
        Self::from_definition(id, definition)
    }

    /// Returns a snapshot of the current definition.
    pub fn definition(&self) -> WorkflowDefinition {
        WorkflowDefinition {
            states: self.registry.states().to_vec(),
            transitions: self.graph.transitions().to_vec(),
        }
    }

    /// Serializes the current definition as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.definition())?)
    }

    /// Returns the workflow's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the state registry.
    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    /// Returns the transition graph.
    pub fn graph(&self) -> &TransitionGraph {
        &self.graph
    }

    /// Returns the capacity of the event channel.
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    /// Subscribes to change events.
    ///
    /// Events are not persisted; if the receiver is too slow, events may be
    /// dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors (no subscribers).
    fn emit(&self, event: WorkflowEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns all states sorted by display order.
    pub fn list_states(&self) -> Vec<&State> {
        self.registry.list_states()
    }

    /// Looks up a state by key.
    pub fn find_state(&self, key: &str) -> Option<&State> {
        self.registry.find_state(key)
    }

    /// Returns the display name for a key, or an empty string if unknown.
    pub fn label(&self, key: &str) -> &str {
        self.registry.label(key)
    }

    /// Returns the destinations reachable directly from `from`.
    pub fn outgoing_of(&self, from: &str) -> Vec<&str> {
        self.graph.outgoing_of(from)
    }

    /// Returns the sources that may move directly to `to`.
    pub fn incoming_of(&self, to: &str) -> Vec<&str> {
        self.graph.incoming_of(to)
    }

    /// Groups destinations by source in insertion order.
    pub fn group_by_from(&self) -> Vec<(&str, Vec<&str>)> {
        self.graph.group_by_from()
    }

    /// Returns true if `to_keys` names every state except `from`.
    pub fn maps_to_all<S: AsRef<str>>(&self, from: &str, to_keys: &[S]) -> bool {
        TransitionGraph::maps_to_all(&self.registry, from, to_keys)
    }

    /// Returns the states with no outgoing transitions.
    pub fn terminal_states(&self) -> Vec<&str> {
        self.graph.terminal_states(&self.registry)
    }

    /// Returns every state reachable from `from`.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if `from` is unknown.
    pub fn reachable_from(&self, from: &str) -> Result<Vec<&str>> {
        self.graph.reachable_from(&self.registry, from)
    }

    /// Replaces every outgoing transition of `from`.
    ///
    /// On success a [`WorkflowEvent::TransitionsReplaced`] event is broadcast
    /// and the written destinations are returned.
    ///
    /// # Errors
    ///
    /// See [`TransitionGraph::replace_outgoing`]. The graph is unchanged on
    /// error.
    pub fn replace_outgoing<I, S>(&mut self, from: &str, to_keys: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let span = info_span!("replace_outgoing", workflow_id = %self.id, from = %from);
        let _guard = span.enter();

        let written = match self.graph.replace_outgoing(&self.registry, from, to_keys) {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, "replacement rejected");
                return Err(e);
            }
        };

        info!(count = written.len(), "transitions replaced");
        self.emit(WorkflowEvent::TransitionsReplaced {
            workflow_id: self.id.clone(),
            from: from.to_string(),
            to: written.clone(),
            at: Utc::now(),
        });
        Ok(written)
    }

    /// Adds a state with no transitions.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::DuplicateState`] if the key is taken.
    pub fn add_state(&mut self, state: State) -> Result<()> {
        let key = state.key.clone();
        self.registry.insert(state)?;
        debug!(workflow_id = %self.id, key = %key, "state added");
        self.emit(WorkflowEvent::StateAdded {
            workflow_id: self.id.clone(),
            key,
        });
        Ok(())
    }

    /// Updates a state's presentation fields.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if the key is absent.
    pub fn update_state(&mut self, key: &str, patch: StatePatch) -> Result<&State> {
        self.registry.update(key, patch)?;
        debug!(workflow_id = %self.id, key = %key, "state updated");
        self.emit(WorkflowEvent::StateUpdated {
            workflow_id: self.id.clone(),
            key: key.to_string(),
        });
        self.registry
            .find_state(key)
            .ok_or_else(|| HeddleError::StateNotFound(key.to_string()))
    }

    /// Removes a state and every transition that starts or ends at it.
    ///
    /// Returns the number of transitions removed.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if the key is absent.
    pub fn remove_state(&mut self, key: &str) -> Result<usize> {
        self.registry.remove(key)?;
        let removed = self.graph.remove_incident(key);
        info!(workflow_id = %self.id, key = %key, removed, "state removed");
        self.emit(WorkflowEvent::StateRemoved {
            workflow_id: self.id.clone(),
            key: key.to_string(),
            removed_transitions: removed,
        });
        Ok(removed)
    }

    /// Loads a workflow from a store.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::WorkflowNotFound`] if the store has no such
    /// workflow, or any error from the store or from validation.
    pub async fn load<S: WorkflowStore + ?Sized>(store: &S, workflow_id: &str) -> Result<Self> {
        Self::load_with_capacity(store, workflow_id, DEFAULT_EVENT_CHANNEL_CAPACITY).await
    }

    /// Loads a workflow from a store with the given event channel capacity.
    ///
    /// # Errors
    ///
    /// As [`Workflow::load`], plus [`HeddleError::InvalidWorkflow`] if
    /// `event_capacity` is zero.
    pub async fn load_with_capacity<S: WorkflowStore + ?Sized>(
        store: &S,
        workflow_id: &str,
        event_capacity: usize,
    ) -> Result<Self> {
        let definition = store
            .load_definition(workflow_id)
            .await?
            .ok_or_else(|| HeddleError::WorkflowNotFound(workflow_id.to_string()))?;
        debug!(
            workflow_id,
            states = definition.states.len(),
            transitions = definition.transitions.len(),
            "loaded workflow"
        );
        Self::builder(workflow_id)
            .definition(definition)
            .event_capacity(event_capacity)
            .build()
    }

    /// Writes the whole definition to a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub async fn save<S: WorkflowStore + ?Sized>(&self, store: &mut S) -> Result<()> {
        store.save_definition(&self.id, &self.definition()).await
    }

    /// Writes the current outgoing transitions of `from` to a store in one
    /// atomic call.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if `from` is not in this
    /// workflow, or any error from the store.
    pub async fn persist_outgoing<S: WorkflowStore + ?Sized>(
        &self,
        store: &mut S,
        from: &str,
    ) -> Result<()> {
        if !self.registry.contains(from) {
            return Err(HeddleError::StateNotFound(from.to_string()));
        }
        let targets: Vec<String> = self
            .graph
            .outgoing_of(from)
            .into_iter()
            .map(str::to_string)
            .collect();
        store.replace_outgoing(&self.id, from, &targets).await
    }
}

impl Clone for Workflow {
    /// Clones the definition. The clone gets its own event channel of the
    /// same capacity.
    fn clone(&self) -> Self {
        let (event_tx, _) = broadcast::channel(self.event_capacity);
        Self {
            id: self.id.clone(),
            registry: self.registry.clone(),
            graph: self.graph.clone(),
            event_tx,
            event_capacity: self.event_capacity,
        }
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("states", &self.registry.len())
            .field("transitions", &self.graph.len())
            .finish()
    }
}

/// Builder for constructing a [`Workflow`].
///
/// States and transitions are collected first and validated together in
/// [`build`](Self::build), so transitions may be declared in any order
/// relative to the states they reference.
#[derive(Debug)]
pub struct WorkflowBuilder {
    id: String,
    states: Vec<State>,
    transitions: Vec<Transition>,
    event_capacity: usize,
}

impl WorkflowBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            event_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Adds a state.
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    /// Adds several states.
    pub fn states(mut self, states: impl IntoIterator<Item = State>) -> Self {
        self.states.extend(states);
        self
    }

    /// Permits moving from `from` to `to`.
    pub fn transition(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.transitions.push(Transition::new(from, to));
        self
    }

    /// Adds the states and transitions of a snapshot.
    pub fn definition(self, definition: WorkflowDefinition) -> Self {
        self.states(definition.states)
            .transitions(definition.transitions)
    }

    /// Adds several transitions.
    pub fn transitions(mut self, transitions: impl IntoIterator<Item = Transition>) -> Self {
        self.transitions.extend(transitions);
        self
    }

    /// Sets the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Builds the workflow.
    ///
    /// # Errors
    ///
    /// - [`HeddleError::InvalidWorkflow`] if the ID is empty or the event
    ///   capacity is zero
    /// - [`HeddleError::DuplicateState`] if two states share a key
    /// - [`HeddleError::StateNotFound`] if a transition references an
    ///   unknown state
    /// - [`HeddleError::SelfTransition`] if a transition is a self-loop
    pub fn build(self) -> Result<Workflow> {
        if self.id.trim().is_empty() {
            return Err(HeddleError::InvalidWorkflow(
                "workflow id must not be empty".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(HeddleError::InvalidWorkflow(
                "event channel capacity must be positive".to_string(),
            ));
        }

        let registry = StateRegistry::from_states(self.states)?;
        let graph = TransitionGraph::from_transitions(&registry, self.transitions)?;
        let (event_tx, _) = broadcast::channel(self.event_capacity);

        Ok(Workflow {
            id: self.id,
            registry,
            graph,
            event_tx,
            event_capacity: self.event_capacity,
        })
    }
}
