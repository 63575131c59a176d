//! Splice helpers for live graphs.
//!
//! Both helpers validate everything up front and only then mutate, so an
//! error never leaves the graph half-rewired.

use super::node::NodeId;
use super::topology::{Graph, GraphError};

/// Which neighbours to bridge when a node is removed: the node's
/// `inbound[inbound]` is connected to its `outbound[outbound]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rewire {
    /// Index into the removed node's inbound list.
    pub inbound: usize,
    /// Index into the removed node's outbound list.
    pub outbound: usize,
}

/// Splices `node` into the existing edge `a → b`, leaving `a → node → b`.
///
/// Requires `a → b` to exist and `node` to be distinct from both ends and not
/// already wired to them.
pub fn insert_node_between(
    graph: &mut Graph,
    node: NodeId,
    a: NodeId,
    b: NodeId,
) -> Result<(), GraphError> {
    graph.node_ref(node)?;
    graph.node_ref(a)?;
    graph.node_ref(b)?;
    if !graph.has_edge(a, b) {
        return Err(GraphError::EdgeNotFound(a, b));
    }
    if node == a || node == b {
        return Err(GraphError::InvalidConnection(format!(
            "cannot insert {node} into its own edge {a} → {b}"
        )));
    }
    if graph.has_edge(a, node) {
        return Err(GraphError::DuplicateEdge(a, node));
    }
    if graph.has_edge(node, b) {
        return Err(GraphError::DuplicateEdge(node, b));
    }

    graph.disconnect(a, b)?;
    graph.connect(a, node)?;
    graph.connect(node, b)
}

/// Detaches `node` from every neighbour.
///
/// With `rewire`, the selected inbound neighbour is first connected to the
/// selected outbound neighbour (skipped when that edge already exists), so
/// the signal keeps flowing around the removed stage. Without it, the caller
/// owns the resulting topology. The node itself stays in the arena,
/// unconnected.
pub fn remove_node(
    graph: &mut Graph,
    node: NodeId,
    rewire: Option<Rewire>,
) -> Result<(), GraphError> {
    let target = graph.node_ref(node)?;
    let inbound = target.inbound.clone();
    let outbound = target.outbound.clone();

    let bridge = match rewire {
        Some(Rewire {
            inbound: i,
            outbound: o,
        }) => {
            let from = *inbound.get(i).ok_or_else(|| {
                GraphError::InvalidRewire(format!(
                    "{node} has {} inbound edges, index {i} requested",
                    inbound.len()
                ))
            })?;
            let to = *outbound.get(o).ok_or_else(|| {
                GraphError::InvalidRewire(format!(
                    "{node} has {} outbound edges, index {o} requested",
                    outbound.len()
                ))
            })?;
            if from == to {
                return Err(GraphError::InvalidRewire(format!("bridging {from} to itself")));
            }
            Some((from, to))
        }
        None => None,
    };

    if let Some((from, to)) = bridge {
        if !graph.has_edge(from, to) {
            graph.connect(from, to)?;
        }
    }
    for from in inbound {
        graph.disconnect(from, node)?;
    }
    for to in outbound {
        graph.disconnect(node, to)?;
    }
    #[cfg(feature = "tracing")]
    tracing::debug!("graph_remove: detached {node}");
    Ok(())
}
