//! Clusters: rectangular partitions of the concrete map.
//!
//! Each cluster owns a locally-addressed slice of the grid and memoizes
//! pairwise connectivity between its entrance points. The cache is keyed
//! by the canonical (sorted) unordered pair of abstract node ids; a present
//! entry with `None` records that the pair was attempted and found
//! disconnected inside the cluster, which is valid domain data rather than
//! an error.

use std::collections::HashMap;

use hgrid_core::{Point, Range};

use crate::concrete::{ConcreteMap, ConcreteNodeId};
use crate::hierarchical::AbstractNodeId;
use crate::search::AStar;

/// Identifier of a cluster within its hierarchical map.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterId(u32);

impl ClusterId {
    /// Wrap a raw cluster index.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw index as a `usize`.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A point inside a cluster that belongs to an entrance, referencing the
/// abstract node standing at it.
#[derive(Clone, Debug)]
pub struct EntrancePoint {
    pub abstract_node: AbstractNodeId,
    pub relative_pos: Point,
}

type PairKey = (AbstractNodeId, AbstractNodeId);

// Cached outcome for an entrance pair: cost plus the local concrete path
// from the lower to the higher id of the pair, or `None` when disconnected.
type CacheEntry = Option<(i32, Vec<ConcreteNodeId>)>;

fn pair_key(a: AbstractNodeId, b: AbstractNodeId) -> PairKey {
    if a <= b { (a, b) } else { (b, a) }
}

/// A rectangular partition of the concrete map, owning a local sub-map,
/// the entrance points on its boundary, and a cache of pairwise
/// intra-cluster distances and paths.
pub struct Cluster {
    id: ClusterId,
    cluster_x: i32,
    cluster_y: i32,
    rect: Range,
    sub_map: ConcreteMap,
    entrances: Vec<EntrancePoint>,
    cache: HashMap<PairKey, CacheEntry>,
}

impl Cluster {
    /// Create a cluster over `rect`, slicing its local search space out of
    /// the global map.
    pub fn new(
        concrete: &ConcreteMap,
        id: ClusterId,
        cluster_x: i32,
        cluster_y: i32,
        rect: Range,
    ) -> Self {
        Self {
            id,
            cluster_x,
            cluster_y,
            rect,
            sub_map: concrete.slice(rect),
            entrances: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// The cluster's identifier.
    #[inline]
    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Grid coordinates of this cluster in the cluster tiling.
    #[inline]
    pub fn grid_pos(&self) -> (i32, i32) {
        (self.cluster_x, self.cluster_y)
    }

    /// The sub-rectangle of the global grid this cluster covers.
    #[inline]
    pub fn rect(&self) -> Range {
        self.rect
    }

    /// The registered entrance points.
    #[inline]
    pub fn entrances(&self) -> &[EntrancePoint] {
        &self.entrances
    }

    /// Append an entrance point. Does not compute any distances by itself.
    pub fn add_entrance(&mut self, abstract_node: AbstractNodeId, relative_pos: Point) {
        self.entrances.push(EntrancePoint {
            abstract_node,
            relative_pos,
        });
    }

    /// Whether `abstract_node` already has an entrance point here.
    pub fn has_entrance(&self, abstract_node: AbstractNodeId) -> bool {
        self.entrances.iter().any(|e| e.abstract_node == abstract_node)
    }

    /// Translate a local sub-map node id back to a global grid position.
    #[inline]
    pub fn to_global(&self, local: ConcreteNodeId) -> Point {
        self.rect.min + self.sub_map.position_of(local)
    }

    /// Run a local search for every pair of distinct entrance points not
    /// yet attempted, caching distance and path on success and recording
    /// disconnection on failure. Calling this twice is a no-op the second
    /// time.
    pub fn compute_intra_cluster_edges(&mut self) {
        for i in 0..self.entrances.len() {
            for j in 0..self.entrances.len() {
                self.compute_entrance_pair(i, j);
            }
        }
    }

    /// Incremental variant of [`compute_intra_cluster_edges`]: only
    /// attempts pairs involving `abstract_node`, used when a transient
    /// start/goal entrance is inserted.
    ///
    /// [`compute_intra_cluster_edges`]: Self::compute_intra_cluster_edges
    pub fn update_paths_for_local_entrance(&mut self, abstract_node: AbstractNodeId) {
        let Some(new_idx) = self
            .entrances
            .iter()
            .position(|e| e.abstract_node == abstract_node)
        else {
            return;
        };
        for other in 0..self.entrances.len() {
            self.compute_entrance_pair(new_idx, other);
        }
    }

    fn compute_entrance_pair(&mut self, i: usize, j: usize) {
        let a = self.entrances[i].abstract_node;
        let b = self.entrances[j].abstract_node;
        if a == b {
            return;
        }
        let key = pair_key(a, b);
        if self.cache.contains_key(&key) {
            return;
        }
        // Search from the lower-id side so the cached path direction
        // matches the canonical key.
        let (from, to) = if a <= b { (i, j) } else { (j, i) };
        let start = self.local_node(&self.entrances[from]);
        let goal = self.local_node(&self.entrances[to]);
        let found = AStar::new(&self.sub_map, start, goal).find_path();
        self.cache.insert(key, found.map(|p| (p.cost, p.nodes)));
    }

    /// Cached distance between two entrance nodes, or `None` if the pair
    /// is disconnected inside this cluster.
    ///
    /// # Panics
    ///
    /// Panics if the pair was never attempted; callers must run one of the
    /// compute steps first.
    pub fn distance(&self, a: AbstractNodeId, b: AbstractNodeId) -> Option<i32> {
        match self.cache.get(&pair_key(a, b)) {
            Some(entry) => entry.as_ref().map(|(cost, _)| *cost),
            None => panic!(
                "intra-cluster distance {a} <-> {b} was never computed in cluster {:?}",
                self.id
            ),
        }
    }

    /// Cached local concrete path from `a` to `b`, or `None` if the pair
    /// is disconnected inside this cluster.
    ///
    /// # Panics
    ///
    /// Panics if the pair was never attempted.
    pub fn path(&self, a: AbstractNodeId, b: AbstractNodeId) -> Option<Vec<ConcreteNodeId>> {
        let key = pair_key(a, b);
        match self.cache.get(&key) {
            Some(entry) => entry.as_ref().map(|(_, nodes)| {
                if a == key.0 {
                    nodes.clone()
                } else {
                    nodes.iter().rev().copied().collect()
                }
            }),
            None => panic!(
                "intra-cluster path {a} <-> {b} was never computed in cluster {:?}",
                self.id
            ),
        }
    }

    /// Drop the entrance point for `abstract_node` and every cache entry
    /// involving it. Used when rolling back a transient insertion.
    pub fn remove_entrance(&mut self, abstract_node: AbstractNodeId) {
        self.entrances.retain(|e| e.abstract_node != abstract_node);
        self.cache
            .retain(|&(a, b), _| a != abstract_node && b != abstract_node);
    }

    /// Number of attempted entrance pairs (for tests and diagnostics).
    pub fn cached_pair_count(&self) -> usize {
        self.cache.len()
    }

    fn local_node(&self, entrance: &EntrancePoint) -> ConcreteNodeId {
        self.sub_map.node_id_at(entrance.relative_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::TileType;
    use crate::COST_ONE;
    use hgrid_core::NodeId;

    fn abs(v: u32) -> AbstractNodeId {
        NodeId::new(v)
    }

    fn open_cluster() -> Cluster {
        let map = ConcreteMap::new(TileType::OctileUnicost, 8, 8, &|_| Some(COST_ONE));
        Cluster::new(&map, ClusterId::new(0), 0, 0, Range::new(0, 0, 4, 4))
    }

    #[test]
    fn pairs_are_cached_under_the_unordered_key() {
        let mut cluster = open_cluster();
        cluster.add_entrance(abs(0), Point::new(0, 0));
        cluster.add_entrance(abs(1), Point::new(3, 3));
        cluster.compute_intra_cluster_edges();

        assert_eq!(cluster.cached_pair_count(), 1);
        assert_eq!(cluster.distance(abs(0), abs(1)), Some(3 * COST_ONE));
        assert_eq!(cluster.distance(abs(1), abs(0)), Some(3 * COST_ONE));
    }

    #[test]
    fn path_direction_follows_the_query() {
        let mut cluster = open_cluster();
        cluster.add_entrance(abs(0), Point::new(0, 0));
        cluster.add_entrance(abs(1), Point::new(3, 0));
        cluster.compute_intra_cluster_edges();

        let forward = cluster.path(abs(0), abs(1)).unwrap();
        let back = cluster.path(abs(1), abs(0)).unwrap();
        assert_eq!(forward.len(), 4);
        assert_eq!(forward.first(), back.last());
        assert_eq!(forward.last(), back.first());
    }

    #[test]
    fn disconnected_pairs_are_recorded_not_raised() {
        // Wall down the middle of the cluster's sub-map.
        let map = ConcreteMap::new(TileType::OctileUnicost, 4, 4, &|p: Point| {
            if p.x == 2 { None } else { Some(COST_ONE) }
        });
        let mut cluster = Cluster::new(&map, ClusterId::new(0), 0, 0, Range::new(0, 0, 4, 4));
        cluster.add_entrance(abs(0), Point::new(0, 0));
        cluster.add_entrance(abs(1), Point::new(3, 3));
        cluster.compute_intra_cluster_edges();

        assert_eq!(cluster.distance(abs(0), abs(1)), None);
        assert_eq!(cluster.path(abs(0), abs(1)), None);
    }

    #[test]
    fn recomputation_is_a_no_op() {
        let mut cluster = open_cluster();
        cluster.add_entrance(abs(0), Point::new(0, 0));
        cluster.add_entrance(abs(1), Point::new(3, 3));
        cluster.add_entrance(abs(2), Point::new(0, 3));
        cluster.compute_intra_cluster_edges();

        let pairs = cluster.cached_pair_count();
        let d01 = cluster.distance(abs(0), abs(1));
        cluster.compute_intra_cluster_edges();
        assert_eq!(cluster.cached_pair_count(), pairs);
        assert_eq!(cluster.distance(abs(0), abs(1)), d01);
    }

    #[test]
    fn incremental_update_only_touches_the_new_entrance() {
        let mut cluster = open_cluster();
        cluster.add_entrance(abs(0), Point::new(0, 0));
        cluster.add_entrance(abs(1), Point::new(3, 0));
        cluster.compute_intra_cluster_edges();
        assert_eq!(cluster.cached_pair_count(), 1);

        cluster.add_entrance(abs(7), Point::new(1, 3));
        cluster.update_paths_for_local_entrance(abs(7));
        assert_eq!(cluster.cached_pair_count(), 3);
        assert!(cluster.distance(abs(7), abs(0)).is_some());
        assert!(cluster.distance(abs(7), abs(1)).is_some());
    }

    #[test]
    fn removing_an_entrance_purges_its_cache_entries() {
        let mut cluster = open_cluster();
        cluster.add_entrance(abs(0), Point::new(0, 0));
        cluster.add_entrance(abs(1), Point::new(3, 0));
        cluster.compute_intra_cluster_edges();
        cluster.add_entrance(abs(7), Point::new(1, 3));
        cluster.update_paths_for_local_entrance(abs(7));

        cluster.remove_entrance(abs(7));
        assert_eq!(cluster.entrances().len(), 2);
        assert_eq!(cluster.cached_pair_count(), 1);
    }

    #[test]
    #[should_panic(expected = "never computed")]
    fn lookup_before_compute_is_a_sequencing_error() {
        let mut cluster = open_cluster();
        cluster.add_entrance(abs(0), Point::new(0, 0));
        cluster.add_entrance(abs(1), Point::new(3, 3));
        let _ = cluster.distance(abs(0), abs(1));
    }
}
