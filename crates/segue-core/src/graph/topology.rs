//! Graph construction and edge mutation.

use std::sync::Arc;

use super::node::{GraphNode, NodeId};
use super::patchbay::{Patchbay, UnitId};

/// Errors returned by graph mutations. A failed call leaves the graph and the
/// unit-level routing untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The specified node is not part of this graph.
    NodeNotFound(NodeId),
    /// No edge exists between these nodes.
    EdgeNotFound(NodeId, NodeId),
    /// An edge already exists between these nodes.
    DuplicateEdge(NodeId, NodeId),
    /// The connection is structurally invalid (e.g. a self-loop).
    InvalidConnection(String),
    /// A rewire index is out of range for the node's neighbour lists.
    InvalidRewire(String),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node {id} not found"),
            Self::EdgeNotFound(a, b) => write!(f, "no edge from {a} to {b}"),
            Self::DuplicateEdge(a, b) => write!(f, "edge from {a} to {b} already exists"),
            Self::InvalidConnection(msg) => write!(f, "invalid connection: {msg}"),
            Self::InvalidRewire(msg) => write!(f, "invalid rewire: {msg}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// A directed processing graph with one input and one output node.
///
/// The graph owns its nodes; the units they wrap belong to the
/// [`Patchbay`]. Dropping the graph hands every unit back through
/// [`Patchbay::release_units`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use segue_core::graph::{Graph, Patchbay, UnitId};
///
/// struct Null;
/// impl Patchbay for Null {
///     fn connect_units(&self, _: UnitId, _: UnitId) {}
///     fn disconnect_units(&self, _: UnitId, _: UnitId) {}
///     fn release_units(&self, _: &[UnitId]) {}
/// }
///
/// let graph = Graph::new(Arc::new(Null), UnitId::from_raw(1), UnitId::from_raw(0));
/// assert!(graph.has_edge(graph.input(), graph.output()));
/// ```
pub struct Graph {
    patchbay: Arc<dyn Patchbay>,
    nodes: Vec<GraphNode>,
    input: NodeId,
    output: NodeId,
}

impl Graph {
    /// Creates a graph whose input node wraps `input_unit` and output node
    /// wraps `output_unit`, connected directly.
    pub fn new(patchbay: Arc<dyn Patchbay>, input_unit: UnitId, output_unit: UnitId) -> Self {
        let mut graph = Self {
            patchbay,
            nodes: Vec::new(),
            input: NodeId(0),
            output: NodeId(1),
        };
        graph.input = graph.add_node(input_unit);
        graph.output = graph.add_node(output_unit);
        graph.link(graph.input, graph.output);
        graph
    }

    /// Adds an unconnected node wrapping `unit`.
    pub fn add_node(&mut self, unit: UnitId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(GraphNode::new(id, unit));
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_add: node {id} wrapping {unit}");
        id
    }

    /// Connects `from → to`, at the unit level first and then in the
    /// adjacency lists.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.node_ref(from)?;
        self.node_ref(to)?;
        if from == to {
            return Err(GraphError::InvalidConnection(format!(
                "self-loop on {from}"
            )));
        }
        if self.has_edge(from, to) {
            return Err(GraphError::DuplicateEdge(from, to));
        }
        self.link(from, to);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_connect: {from} → {to}");
        Ok(())
    }

    /// Removes the `from → to` edge, at the unit level and in the adjacency
    /// lists.
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.node_ref(from)?;
        self.node_ref(to)?;
        if !self.has_edge(from, to) {
            return Err(GraphError::EdgeNotFound(from, to));
        }
        self.patchbay
            .disconnect_units(self.nodes[from.0 as usize].unit, self.nodes[to.0 as usize].unit);
        self.nodes[from.0 as usize].outbound.retain(|&n| n != to);
        self.nodes[to.0 as usize].inbound.retain(|&n| n != from);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_disconnect: {from} → {to}");
        Ok(())
    }

    /// Returns `true` if `from → to` exists.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.nodes
            .get(from.0 as usize)
            .is_some_and(|n| n.outbound.contains(&to))
    }

    /// The designated input node.
    pub fn input(&self) -> NodeId {
        self.input
    }

    /// The designated output node.
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Looks up a node by handle.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.0 as usize)
    }

    /// The unit wrapped by `id`.
    pub fn unit(&self, id: NodeId) -> Option<UnitId> {
        self.node(id).map(GraphNode::unit)
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// Number of nodes, including input and output.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every edge as `(from, to)`, grouped by source node.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .flat_map(|n| n.outbound.iter().map(move |&to| (n.id, to)))
            .collect()
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> Result<&GraphNode, GraphError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn link(&mut self, from: NodeId, to: NodeId) {
        self.patchbay
            .connect_units(self.nodes[from.0 as usize].unit, self.nodes[to.0 as usize].unit);
        self.nodes[from.0 as usize].outbound.push(to);
        self.nodes[to.0 as usize].inbound.push(from);
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        let units: Vec<UnitId> = self.nodes.iter().map(GraphNode::unit).collect();
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_drop: releasing {} units", units.len());
        self.patchbay.release_units(&units);
    }
}

impl core::fmt::Debug for Graph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
