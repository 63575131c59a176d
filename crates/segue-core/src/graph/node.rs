//! Graph node handles and adjacency lists.

/// Stable handle for a node in one [`Graph`](super::Graph).
///
/// Handles are assigned sequentially and never reused within a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A node wrapping one processing unit.
///
/// The neighbour lists are associations only: the graph owns every node, and
/// `a` appears in `b.inbound()` exactly when `b` appears in `a.outbound()`.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub(crate) id: NodeId,
    pub(crate) unit: super::UnitId,
    pub(crate) inbound: Vec<NodeId>,
    pub(crate) outbound: Vec<NodeId>,
}

impl GraphNode {
    pub(crate) fn new(id: NodeId, unit: super::UnitId) -> Self {
        Self {
            id,
            unit,
            inbound: Vec::new(),
            outbound: Vec::new(),
        }
    }

    /// This node's handle.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The wrapped unit.
    pub fn unit(&self) -> super::UnitId {
        self.unit
    }

    /// Nodes with an edge into this one, in connection order.
    pub fn inbound(&self) -> &[NodeId] {
        &self.inbound
    }

    /// Nodes this one has an edge into, in connection order.
    pub fn outbound(&self) -> &[NodeId] {
        &self.outbound
    }
}
