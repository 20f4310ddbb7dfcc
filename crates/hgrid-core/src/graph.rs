//! Generic dense directed graph addressed by [`NodeId`].
//!
//! Nodes live in a flat array implicitly indexed by their id: identifier `i`
//! occupies slot `i`. This makes lookups cheap but restricts removal to the
//! most-recently-appended node ([`Graph::remove_last_node`]), which is all
//! the pathfinding layer needs when rolling back transient insertions.

use std::collections::BTreeMap;

use crate::NodeId;

/// An owned outgoing edge: target id plus an edge payload.
#[derive(Clone, Debug)]
pub struct Edge<K, E> {
    target: NodeId<K>,
    info: E,
}

impl<K, E> Edge<K, E> {
    /// The node this edge points at.
    #[inline]
    pub fn target(&self) -> NodeId<K> {
        self.target
    }

    /// The edge payload.
    #[inline]
    pub fn info(&self) -> &E {
        &self.info
    }
}

/// A node: id, node payload, and outgoing edges keyed by target id.
///
/// Keying edges by target means there is at most one edge per direction;
/// adding an edge to an existing target replaces it. A `BTreeMap` keeps
/// edge iteration deterministic.
#[derive(Clone, Debug)]
pub struct Node<K, N, E> {
    id: NodeId<K>,
    info: N,
    edges: BTreeMap<NodeId<K>, Edge<K, E>>,
}

impl<K, N, E> Node<K, N, E> {
    /// The node's identifier.
    #[inline]
    pub fn id(&self) -> NodeId<K> {
        self.id
    }

    /// The node payload.
    #[inline]
    pub fn info(&self) -> &N {
        &self.info
    }

    /// Iterate over the outgoing edges, ordered by target id.
    pub fn edges(&self) -> impl Iterator<Item = &Edge<K, E>> {
        self.edges.values()
    }

    /// The outgoing edge to `target`, if any.
    pub fn edge_to(&self, target: NodeId<K>) -> Option<&Edge<K, E>> {
        self.edges.get(&target)
    }

    /// Number of outgoing edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// A set of nodes connected with directed edges, stored densely by id.
#[derive(Clone, Debug, Default)]
pub struct Graph<K, N, E> {
    nodes: Vec<Node<K, N, E>>,
}

impl<K, N, E> Graph<K, N, E> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The id the next appended node will receive.
    #[inline]
    pub fn next_id(&self) -> NodeId<K> {
        NodeId::new(self.nodes.len() as u32)
    }

    /// Add a node, or replace its payload if `id` already exists.
    ///
    /// # Panics
    ///
    /// Panics if `id` would leave a gap in the dense array (growth is
    /// append-only).
    pub fn add_node(&mut self, id: NodeId<K>, info: N) {
        if id.index() < self.nodes.len() {
            self.nodes[id.index()].info = info;
            return;
        }
        assert_eq!(
            id.index(),
            self.nodes.len(),
            "node id {} would leave a gap in the dense node array",
            id.value(),
        );
        self.nodes.push(Node {
            id,
            info,
            edges: BTreeMap::new(),
        });
    }

    /// Add an edge from `source` to `target`, replacing any existing edge
    /// in that direction.
    pub fn add_edge(&mut self, source: NodeId<K>, target: NodeId<K>, info: E) {
        self.nodes[source.index()]
            .edges
            .insert(target, Edge { target, info });
    }

    /// Remove the edge from `source` to `target`, if present.
    pub fn remove_edge(&mut self, source: NodeId<K>, target: NodeId<K>) {
        self.nodes[source.index()].edges.remove(&target);
    }

    /// Detach `id` from the graph: drop its outgoing edges and the reverse
    /// edges its neighbours hold back to it.
    pub fn remove_edges_from_and_to_node(&mut self, id: NodeId<K>) {
        let targets: Vec<NodeId<K>> = self.nodes[id.index()].edges.keys().copied().collect();
        for target in targets {
            self.nodes[target.index()].edges.remove(&id);
        }
        self.nodes[id.index()].edges.clear();
    }

    /// Remove the most-recently-appended node.
    ///
    /// The caller is responsible for detaching its edges first and for only
    /// ever removing the last slot, so identifier-to-slot correspondence is
    /// preserved for all remaining nodes.
    pub fn remove_last_node(&mut self) {
        self.nodes.pop();
    }

    /// The node with the given id.
    #[inline]
    pub fn node(&self, id: NodeId<K>) -> &Node<K, N, E> {
        &self.nodes[id.index()]
    }

    /// The payload of the node with the given id.
    #[inline]
    pub fn node_info(&self, id: NodeId<K>) -> &N {
        &self.nodes[id.index()].info
    }

    /// Mutable payload of the node with the given id.
    #[inline]
    pub fn node_info_mut(&mut self, id: NodeId<K>) -> &mut N {
        &mut self.nodes[id.index()].info
    }

    /// Iterate over all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<K, N, E>> {
        self.nodes.iter()
    }
}
