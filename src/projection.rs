//! Read-only projections of a workflow for rendering.
//!
//! [`TransitionTable`] is the "From / Transition / To" view: one row per
//! edge, or a single "All" row when a state may move to every other state.
//! [`Diagram`] lists nodes with their outgoing targets and can render
//! Graphviz DOT.

use petgraph::dot::{Config, Dot};
use std::fmt;

use crate::{StatusCategory, Workflow};

/// Label shown in place of enumerating every destination.
pub const ALL_LABEL: &str = "All";

/// The destination column of a table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTarget {
    /// The source may move to every other state.
    All,

    /// A single destination.
    State {
        /// Destination key.
        key: String,
        /// Destination label, empty if the key is unknown.
        label: String,
    },
}

impl RowTarget {
    /// Returns the text shown in the "To" column.
    pub fn label(&self) -> &str {
        match self {
            RowTarget::All => ALL_LABEL,
            RowTarget::State { label, .. } => label,
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRow {
    /// Source key.
    pub from_key: String,
    /// Source label, empty if the key is unknown.
    pub from_label: String,
    /// Destination column.
    pub target: RowTarget,
}

/// The "From / Transition / To" table.
///
/// Rows follow the first-seen order of each source and, within a source,
/// the insertion order of its transitions. States without outgoing
/// transitions produce no row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTable {
    rows: Vec<TransitionRow>,
}

impl TransitionTable {
    /// Projects a workflow into table rows.
    pub fn project(workflow: &Workflow) -> Self {
        let mut rows = Vec::new();

        for (from, to_keys) in workflow.group_by_from() {
            let from_label = workflow.label(from).to_string();

            if workflow.maps_to_all(from, &to_keys) {
                rows.push(TransitionRow {
                    from_key: from.to_string(),
                    from_label,
                    target: RowTarget::All,
                });
                continue;
            }

            for to in to_keys {
                rows.push(TransitionRow {
                    from_key: from.to_string(),
                    from_label: from_label.clone(),
                    target: RowTarget::State {
                        key: to.to_string(),
                        label: workflow.label(to).to_string(),
                    },
                });
            }
        }

        Self { rows }
    }

    /// Returns the rows.
    pub fn rows(&self) -> &[TransitionRow] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the rows whose source is `from`.
    pub fn rows_from<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a TransitionRow> + 'a {
        self.rows.iter().filter(move |r| r.from_key == from)
    }
}

impl fmt::Display for TransitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from_width = self
            .rows
            .iter()
            .map(|r| r.from_label.chars().count())
            .max()
            .unwrap_or(0)
            .max("From".len());

        writeln!(f, "{:<from_width$}  {:<10}  To", "From", "Transition")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<from_width$}  {:<10}  {}",
                row.from_label,
                "->",
                row.target.label()
            )?;
        }
        Ok(())
    }
}

/// A node of the workflow diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramNode {
    /// State key.
    pub key: String,
    /// State label.
    pub name: String,
    /// Presentation grouping.
    pub category: StatusCategory,
    /// Display color.
    pub color: String,
    /// Outgoing destinations in insertion order.
    pub targets: Vec<String>,
}

/// Nodes of the workflow diagram in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagram {
    nodes: Vec<DiagramNode>,
}

impl Diagram {
    /// Projects a workflow into diagram nodes.
    pub fn project(workflow: &Workflow) -> Self {
        let nodes = workflow
            .list_states()
            .into_iter()
            .map(|state| DiagramNode {
                key: state.key.clone(),
                name: state.name.clone(),
                category: state.category,
                color: state.color.clone(),
                targets: workflow
                    .outgoing_of(&state.key)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();
        Self { nodes }
    }

    /// Returns the nodes.
    pub fn nodes(&self) -> &[DiagramNode] {
        &self.nodes
    }

    /// Returns the node for `key`.
    pub fn node(&self, key: &str) -> Option<&DiagramNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Returns the number of edges drawn.
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.targets.len()).sum()
    }
}

/// Renders a workflow as a Graphviz DOT digraph labelled with state names.
pub fn to_dot(workflow: &Workflow) -> String {
    let (graph, _) = workflow.graph().to_digraph(workflow.registry());
    let graph = graph.map(|_, state| *state, |_, _| "");
    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}
