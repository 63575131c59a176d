//! Mutable directed processing graph over clock-owned units.
//!
//! A [`Graph`] is the per-segment signal path: a designated input node (the
//! segment's buffer source), a designated output node (the clock's
//! destination), and whatever stages callers splice in between. Nodes live in
//! an arena addressed by [`NodeId`]; each node wraps an opaque [`UnitId`]
//! handed out by the playback clock.
//!
//! Every edge mutation is mirrored at the unit level through the
//! [`Patchbay`] the graph was built with, so the audible routing always
//! matches the graph's adjacency lists.
//!
//! ```text
//!   input ──▶ output              (after Graph::new)
//!   input ──▶ gain ──▶ output     (after insert_node_between)
//! ```
//!
//! # Modules
//!
//! - `node`: [`NodeId`] and [`GraphNode`] adjacency bookkeeping
//! - `patchbay`: [`UnitId`] and the [`Patchbay`] wiring interface
//! - `topology`: [`Graph`] and [`GraphError`]
//! - [`utils`]: splice helpers built on `connect`/`disconnect`

mod node;
mod patchbay;
mod topology;
pub mod utils;

pub use node::{GraphNode, NodeId};
pub use patchbay::{Patchbay, UnitId};
pub use topology::{Graph, GraphError};
pub use utils::{Rewire, insert_node_between, remove_node};
