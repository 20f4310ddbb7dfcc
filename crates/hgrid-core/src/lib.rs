//! **hgrid-core** — foundational types for hierarchical grid pathfinding.
//!
//! This crate provides the building blocks shared across the *hgrid*
//! workspace: integer geometry primitives, strongly-typed node identifiers,
//! and a generic dense graph addressed by those identifiers.

pub mod geom;
pub mod graph;
pub mod id;

pub use geom::{Point, Range};
pub use graph::{Edge, Graph, Node};
pub use id::NodeId;
