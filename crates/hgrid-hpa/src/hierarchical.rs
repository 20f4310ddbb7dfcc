//! The hierarchical (abstract) map: clusters, the abstract graph, and
//! transient node management.
//!
//! Abstract nodes stand at entrance cells; abstract edges are either
//! *intra*-cluster (cost from a validated local search) or *inter*-cluster
//! (one movement step across the shared border). Query endpoints are
//! inserted as transient entrances and rolled back afterwards through an
//! explicit undo log of [`NodeBackup`] records.

use std::collections::HashMap;

use hgrid_core::{Graph, NodeId, Point};

use crate::cluster::{Cluster, ClusterId};
use crate::concrete::{ConcreteMap, ConcreteNodeId, TileType};
use crate::search::{Connection, SearchSpace};
use crate::COST_ONE;

/// Kind marker for abstract (entrance) nodes.
pub enum Abstract {}

/// Identifier of an abstract node.
pub type AbstractNodeId = NodeId<Abstract>;

/// Payload of an abstract node: hierarchy tier (1 for leaf), owning
/// cluster, grid position and the backing concrete cell.
#[derive(Clone, Debug)]
pub struct AbstractNodeInfo {
    pub level: i32,
    pub cluster: ClusterId,
    pub position: Point,
    pub concrete_node: ConcreteNodeId,
}

/// Payload of an abstract edge: cost and whether it crosses a cluster
/// boundary.
#[derive(Clone, Debug)]
pub struct AbstractEdgeInfo {
    pub cost: i32,
    pub inter: bool,
}

/// The abstract graph over entrance and transient query nodes.
pub type AbstractGraph = Graph<Abstract, AbstractNodeInfo, AbstractEdgeInfo>;

// Undo-log record for a pre-existing node borrowed as a query endpoint:
// enough state to restore its level and edge set exactly.
struct NodeBackup {
    level: i32,
    edges: Vec<(AbstractNodeId, AbstractEdgeInfo)>,
}

/// The abstraction built over a concrete map: owns all clusters, the
/// abstract graph, and the concrete-to-abstract node mapping.
pub struct HierarchicalMap {
    width: i32,
    height: i32,
    tile_type: TileType,
    cluster_size: i32,
    max_level: i32,
    graph: AbstractGraph,
    clusters: Vec<Cluster>,
    concrete_to_abstract: HashMap<ConcreteNodeId, AbstractNodeId>,
    backups: HashMap<AbstractNodeId, NodeBackup>,
}

impl HierarchicalMap {
    pub(crate) fn new(concrete: &ConcreteMap, cluster_size: i32, max_level: i32) -> Self {
        Self {
            width: concrete.width(),
            height: concrete.height(),
            tile_type: concrete.tile_type(),
            cluster_size,
            max_level,
            graph: AbstractGraph::new(),
            clusters: Vec::new(),
            concrete_to_abstract: HashMap::new(),
            backups: HashMap::new(),
        }
    }

    /// Grid width in cells.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in cells.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// The tiling model of the underlying concrete map.
    #[inline]
    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    /// Side length of the cluster tiling.
    #[inline]
    pub fn cluster_size(&self) -> i32 {
        self.cluster_size
    }

    /// Number of hierarchy tiers (construction currently builds tier 1).
    #[inline]
    pub fn max_level(&self) -> i32 {
        self.max_level
    }

    /// The abstract graph.
    #[inline]
    pub fn graph(&self) -> &AbstractGraph {
        &self.graph
    }

    /// All clusters, in row-major cluster-grid order.
    #[inline]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// The cluster with the given id.
    #[inline]
    pub fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.clusters[id.index()]
    }

    /// The abstract node backing the given concrete cell, if any.
    pub fn abstract_node_at(&self, concrete: ConcreteNodeId) -> Option<AbstractNodeId> {
        self.concrete_to_abstract.get(&concrete).copied()
    }

    /// The id of the cluster whose rectangle contains `pos`.
    pub fn find_cluster_for(&self, pos: Point) -> ClusterId {
        let per_row = (self.width + self.cluster_size - 1) / self.cluster_size;
        let cx = pos.x / self.cluster_size;
        let cy = pos.y / self.cluster_size;
        ClusterId::new((cy * per_row + cx) as u32)
    }

    /// The concrete node id of the cell at `pos`.
    #[inline]
    pub fn concrete_id_at(&self, pos: Point) -> ConcreteNodeId {
        NodeId::new((pos.y * self.width + pos.x) as u32)
    }

    pub(crate) fn add_cluster(&mut self, cluster: Cluster) {
        self.clusters.push(cluster);
    }

    pub(crate) fn cluster_mut(&mut self, id: ClusterId) -> &mut Cluster {
        &mut self.clusters[id.index()]
    }

    pub(crate) fn add_abstract_node(&mut self, info: AbstractNodeInfo) -> AbstractNodeId {
        let id = self.graph.next_id();
        self.concrete_to_abstract.insert(info.concrete_node, id);
        self.graph.add_node(id, info);
        id
    }

    pub(crate) fn add_abstract_edge(
        &mut self,
        a: AbstractNodeId,
        b: AbstractNodeId,
        cost: i32,
        inter: bool,
    ) {
        self.graph.add_edge(a, b, AbstractEdgeInfo { cost, inter });
        self.graph.add_edge(b, a, AbstractEdgeInfo { cost, inter });
    }

    // -----------------------------------------------------------------------
    // Transient node management
    // -----------------------------------------------------------------------

    /// Insert a query endpoint at `pos`.
    ///
    /// If the position already backs a live abstract node, that node is
    /// reused: its level and edge list are snapshotted for restoration and
    /// its id returned. Otherwise a transient entrance is registered in the
    /// owning cluster, its pairwise connectivity computed incrementally,
    /// and a new level-1 abstract node wired to every entrance of the
    /// cluster it can reach.
    pub fn insert_node(&mut self, pos: Point) -> AbstractNodeId {
        let concrete = self.concrete_id_at(pos);
        if let Some(&existing) = self.concrete_to_abstract.get(&concrete) {
            let node = self.graph.node(existing);
            let backup = NodeBackup {
                level: node.info().level,
                edges: node
                    .edges()
                    .map(|e| (e.target(), e.info().clone()))
                    .collect(),
            };
            self.backups.insert(existing, backup);
            log::trace!("insert at {pos}: reusing abstract node {existing}");
            return existing;
        }

        let cluster_id = self.find_cluster_for(pos);
        let id = self.graph.next_id();
        let cluster = &mut self.clusters[cluster_id.index()];
        let relative = pos - cluster.rect().min;
        cluster.add_entrance(id, relative);
        cluster.update_paths_for_local_entrance(id);

        self.graph.add_node(
            id,
            AbstractNodeInfo {
                level: 1,
                cluster: cluster_id,
                position: pos,
                concrete_node: concrete,
            },
        );
        self.concrete_to_abstract.insert(concrete, id);

        let cluster = &self.clusters[cluster_id.index()];
        let reachable: Vec<(AbstractNodeId, i32)> = cluster
            .entrances()
            .iter()
            .filter(|e| e.abstract_node != id)
            .filter_map(|e| cluster.distance(id, e.abstract_node).map(|d| (e.abstract_node, d)))
            .collect();
        for (target, cost) in reachable {
            self.add_abstract_edge(id, target, cost, false);
        }
        log::trace!("insert at {pos}: new transient abstract node {id}");
        id
    }

    /// Remove a query endpoint inserted by [`insert_node`](Self::insert_node).
    ///
    /// A borrowed pre-existing node has its original level and edge list
    /// restored from the undo log. A genuinely transient node is detached
    /// from its neighbours, unregistered from its cluster, and dropped from
    /// the dense node array.
    ///
    /// # Panics
    ///
    /// Panics when a transient node is not the most-recently-appended one:
    /// transient nodes must be removed in the reverse order of insertion,
    /// or identifier-to-slot correspondence would break for later nodes.
    pub fn remove_node(&mut self, node: AbstractNodeId) {
        if let Some(backup) = self.backups.remove(&node) {
            self.graph.remove_edges_from_and_to_node(node);
            self.graph.node_info_mut(node).level = backup.level;
            for (target, info) in backup.edges {
                self.graph.add_edge(node, target, info.clone());
                self.graph.add_edge(target, node, info);
            }
            log::trace!("remove {node}: restored pre-existing node from backup");
            return;
        }

        assert_eq!(
            node.index(),
            self.graph.len() - 1,
            "transient abstract nodes must be removed in reverse insertion order",
        );
        let info = self.graph.node_info(node).clone();
        self.clusters[info.cluster.index()].remove_entrance(node);
        self.graph.remove_edges_from_and_to_node(node);
        self.concrete_to_abstract.remove(&info.concrete_node);
        self.graph.remove_last_node();
        log::trace!("remove {node}: dropped transient node");
    }
}

impl SearchSpace for HierarchicalMap {
    type Kind = Abstract;

    fn node_count(&self) -> usize {
        self.graph.len()
    }

    fn connections(&self, node: AbstractNodeId, buf: &mut Vec<Connection<Abstract>>) {
        for edge in self.graph.node(node).edges() {
            buf.push(Connection {
                target: edge.target(),
                cost: edge.info().cost,
            });
        }
    }

    /// Manhattan distance scaled by [`COST_ONE`]. Coarse but admissible
    /// for every supported tiling at the abstract tier.
    fn heuristic(&self, from: AbstractNodeId, to: AbstractNodeId) -> i32 {
        let a = self.graph.node_info(from).position;
        let b = self.graph.node_info(to).position;
        ((a.x - b.x).abs() + (a.y - b.y).abs()) * COST_ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EntranceStyle, HierarchicalMapBuilder};
    use crate::concrete::ConcreteMap;

    fn open_map() -> ConcreteMap {
        ConcreteMap::new(TileType::OctileUnicost, 8, 8, &|_| Some(COST_ONE))
    }

    fn build(concrete: &ConcreteMap) -> HierarchicalMap {
        HierarchicalMapBuilder::new(4, EntranceStyle::EndEntrance).build(concrete)
    }

    fn edge_snapshot(map: &HierarchicalMap, node: AbstractNodeId) -> Vec<(AbstractNodeId, i32)> {
        map.graph()
            .node(node)
            .edges()
            .map(|e| (e.target(), e.info().cost))
            .collect()
    }

    #[test]
    fn find_cluster_for_is_row_major() {
        let concrete = open_map();
        let map = build(&concrete);
        assert_eq!(map.find_cluster_for(Point::new(0, 0)), ClusterId::new(0));
        assert_eq!(map.find_cluster_for(Point::new(5, 2)), ClusterId::new(1));
        assert_eq!(map.find_cluster_for(Point::new(2, 5)), ClusterId::new(2));
        assert_eq!(map.find_cluster_for(Point::new(7, 7)), ClusterId::new(3));
    }

    #[test]
    fn transient_insert_and_remove_restore_the_graph() {
        let concrete = open_map();
        let mut map = build(&concrete);
        let nodes_before = map.graph().len();
        let cluster_id = map.find_cluster_for(Point::new(1, 1));
        let entrances_before = map.cluster(cluster_id).entrances().len();

        let id = map.insert_node(Point::new(1, 1));
        assert_eq!(map.graph().len(), nodes_before + 1);
        assert!(map.graph().node(id).edge_count() > 0);
        assert_eq!(map.cluster(cluster_id).entrances().len(), entrances_before + 1);

        map.remove_node(id);
        assert_eq!(map.graph().len(), nodes_before);
        assert_eq!(map.cluster(cluster_id).entrances().len(), entrances_before);
        assert!(map.abstract_node_at(map.concrete_id_at(Point::new(1, 1))).is_none());
    }

    #[test]
    fn reusing_an_existing_entrance_is_idempotent() {
        let concrete = open_map();
        let mut map = build(&concrete);

        // Pick an existing entrance node and use its position as endpoint.
        let existing = NodeId::new(0);
        let pos = map.graph().node_info(existing).position;
        let before = edge_snapshot(&map, existing);

        let id = map.insert_node(pos);
        assert_eq!(id, existing);
        // A second transient endpoint nearby may rewire edges.
        let other = map.insert_node(Point::new(pos.x, (pos.y + 1).min(7)));
        map.remove_node(other);
        map.remove_node(id);

        assert_eq!(edge_snapshot(&map, existing), before);
        assert_eq!(map.graph().node_info(existing).level, 1);
    }

    #[test]
    #[should_panic(expected = "reverse insertion order")]
    fn out_of_order_removal_is_rejected() {
        let concrete = open_map();
        let mut map = build(&concrete);
        let first = map.insert_node(Point::new(1, 1));
        let _second = map.insert_node(Point::new(2, 2));
        map.remove_node(first);
    }

    #[test]
    fn abstract_heuristic_is_manhattan() {
        let concrete = open_map();
        let mut map = build(&concrete);
        let a = map.insert_node(Point::new(0, 0));
        let b = map.insert_node(Point::new(2, 2));
        assert_eq!(map.heuristic(a, b), 4 * COST_ONE);
        map.remove_node(b);
        map.remove_node(a);
    }
}
