//! **hgrid-hpa** — hierarchical pathfinding (HPA*) on grid maps.
//!
//! This crate computes shortest paths on large grid-like maps through a
//! two-tier abstraction:
//!
//! - a fine-grained [`ConcreteMap`] over every grid cell, with per-tile
//!   passability and movement cost for four tiling models ([`TileType`]);
//! - a coarse [`HierarchicalMap`] over *clusters* of the grid, connected
//!   through boundary *entrances*, built once by
//!   [`HierarchicalMapBuilder`].
//!
//! Both tiers expose the same [`SearchSpace`] interface and are searched by
//! one generic best-first engine ([`AStar`], unidirectional and
//! bidirectional). A query ([`hierarchical_search`]) inserts transient
//! start/goal nodes into the abstract graph, searches it, refines each
//! abstract edge into a concrete sub-path using per-cluster caches, and
//! rolls the insertions back.
//!
//! All costs are non-negative integers in fixed-point units of
//! [`COST_ONE`]; diagonal steps are scaled by 34/24 ≈ √2.

pub mod builder;
pub mod cluster;
pub mod concrete;
pub mod hierarchical;
pub mod search;
pub mod solver;

pub use builder::{EntranceStyle, HierarchicalMapBuilder};
pub use cluster::{Cluster, ClusterId, EntrancePoint};
pub use concrete::{Concrete, ConcreteMap, ConcreteNodeId, ConcreteNodeInfo, Passability, TileType};
pub use hierarchical::{
    Abstract, AbstractEdgeInfo, AbstractNodeId, AbstractNodeInfo, HierarchicalMap,
};
pub use search::{AStar, Connection, Path, SearchSpace, find_bidirectional_path};
pub use solver::{ConcretePath, QueryError, hierarchical_search};

/// One orthogonal movement step, in fixed-point cost units.
pub const COST_ONE: i32 = 100;

/// Cost of a diagonal step for a tile whose orthogonal cost is `cost`
/// (scaled by 34/24, an integer approximation of √2).
#[inline]
pub(crate) fn diagonal_cost(cost: i32) -> i32 {
    cost * 34 / 24
}
