//! The directed transition graph between workflow states.
//!
//! Edges are kept in insertion order with set semantics: a state either can
//! or cannot move to another, and no pair appears twice. The only mutation
//! exposed to editors is [`TransitionGraph::replace_outgoing`], which swaps a
//! source's whole outgoing set at once.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::{HeddleError, Result, State, StateRegistry};

/// A directed permission edge between two states.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    /// Source state key.
    pub from: String,
    /// Destination state key.
    pub to: String,
}

impl Transition {
    /// Creates a new transition.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// The set of transitions for one workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionGraph {
    edges: Vec<Transition>,
}

impl TransitionGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a list of transitions, validated against the
    /// registry. Duplicate pairs are collapsed to their first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] for an unknown key and
    /// [`HeddleError::SelfTransition`] for a self-loop.
    pub fn from_transitions(
        registry: &StateRegistry,
        transitions: impl IntoIterator<Item = Transition>,
    ) -> Result<Self> {
        let mut graph = Self::new();
        for transition in transitions {
            validate_edge(registry, &transition.from, &transition.to)?;
            if !graph.contains(&transition.from, &transition.to) {
                graph.edges.push(transition);
            }
        }
        Ok(graph)
    }

    /// Returns all transitions in insertion order.
    pub fn transitions(&self) -> &[Transition] {
        &self.edges
    }

    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the graph has no transitions.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns true if `from -> to` is permitted.
    pub fn contains(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|t| t.from == from && t.to == to)
    }

    /// Returns the destinations reachable directly from `from`.
    ///
    /// Empty if `from` has no outgoing transitions or is unknown.
    pub fn outgoing_of(&self, from: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|t| t.from == from)
            .map(|t| t.to.as_str())
            .collect()
    }

    /// Returns the sources that may move directly to `to`.
    pub fn incoming_of(&self, to: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|t| t.to == to)
            .map(|t| t.from.as_str())
            .collect()
    }

    /// Groups destinations by source.
    ///
    /// Sources appear in the order they were first seen; destinations keep
    /// their edge insertion order.
    pub fn group_by_from(&self) -> Vec<(&str, Vec<&str>)> {
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for edge in &self.edges {
            match positions.get(edge.from.as_str()) {
                Some(&index) => groups[index].1.push(edge.to.as_str()),
                None => {
                    positions.insert(edge.from.as_str(), groups.len());
                    groups.push((edge.from.as_str(), vec![edge.to.as_str()]));
                }
            }
        }

        groups
    }

    /// Returns true if `to_keys` names every state except `from`.
    ///
    /// The rule is exact: `to_keys` must have `N - 1` entries for `N` states
    /// and every state other than `from` must be among them.
    pub fn maps_to_all<S: AsRef<str>>(
        registry: &StateRegistry,
        from: &str,
        to_keys: &[S],
    ) -> bool {
        if to_keys.len() + 1 != registry.len() {
            return false;
        }
        registry
            .keys()
            .all(|key| key == from || to_keys.iter().any(|t| t.as_ref() == key))
    }

    /// Replaces every outgoing transition of `from` with `to_keys`.
    ///
    /// The new edges are appended after all other edges. Duplicates in
    /// `to_keys` are dropped. The whole input is validated before anything
    /// changes, so on error the graph is untouched.
    ///
    /// Returns the de-duplicated destinations that were written.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if `from` or any destination is
    /// unknown, and [`HeddleError::SelfTransition`] if `to_keys` contains
    /// `from`.
    pub fn replace_outgoing<I, S>(
        &mut self,
        registry: &StateRegistry,
        from: &str,
        to_keys: I,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !registry.contains(from) {
            return Err(HeddleError::StateNotFound(from.to_string()));
        }

        let mut targets: Vec<String> = Vec::new();
        for key in to_keys {
            let key = key.as_ref();
            validate_edge(registry, from, key)?;
            if !targets.iter().any(|t| t == key) {
                targets.push(key.to_string());
            }
        }

        let before = self.edges.len();
        self.edges.retain(|t| t.from != from);
        let removed = before - self.edges.len();
        self.edges
            .extend(targets.iter().map(|to| Transition::new(from, to.clone())));

        debug!(from = %from, removed, added = targets.len(), "replaced outgoing transitions");
        Ok(targets)
    }

    /// Removes every transition that starts or ends at `key`.
    ///
    /// Returns the number of removed transitions.
    pub fn remove_incident(&mut self, key: &str) -> usize {
        let before = self.edges.len();
        self.edges.retain(|t| t.from != key && t.to != key);
        before - self.edges.len()
    }

    /// Returns the states with no outgoing transitions, in display order.
    pub fn terminal_states<'a>(&self, registry: &'a StateRegistry) -> Vec<&'a str> {
        registry
            .list_states()
            .into_iter()
            .filter(|s| !self.edges.iter().any(|t| t.from == s.key))
            .map(|s| s.key.as_str())
            .collect()
    }

    /// Returns every state reachable from `from` through one or more
    /// transitions, in breadth-first order. `from` itself is excluded.
    ///
    /// # Errors
    ///
    /// Returns [`HeddleError::StateNotFound`] if `from` is unknown.
    pub fn reachable_from<'a>(
        &self,
        registry: &'a StateRegistry,
        from: &str,
    ) -> Result<Vec<&'a str>> {
        let (graph, index) = self.to_digraph(registry);
        let start = *index
            .get(from)
            .ok_or_else(|| HeddleError::StateNotFound(from.to_string()))?;

        let mut reachable = Vec::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            if node != start {
                let state: &'a State = graph[node];
                reachable.push(state.key.as_str());
            }
        }
        Ok(reachable)
    }

    /// Builds a petgraph view of the workflow.
    ///
    /// Nodes are added in display order. Edges whose endpoints are missing
    /// from the registry are skipped.
    pub fn to_digraph<'a>(
        &self,
        registry: &'a StateRegistry,
    ) -> (DiGraph<&'a State, ()>, HashMap<&'a str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for state in registry.list_states() {
            let node = graph.add_node(state);
            index.insert(state.key.as_str(), node);
        }

        for edge in &self.edges {
            if let (Some(&a), Some(&b)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) {
                graph.add_edge(a, b, ());
            }
        }

        (graph, index)
    }
}

fn validate_edge(registry: &StateRegistry, from: &str, to: &str) -> Result<()> {
    if !registry.contains(from) {
        return Err(HeddleError::StateNotFound(from.to_string()));
    }
    if !registry.contains(to) {
        return Err(HeddleError::StateNotFound(to.to_string()));
    }
    if from == to {
        return Err(HeddleError::SelfTransition(from.to_string()));
    }
    Ok(())
}
