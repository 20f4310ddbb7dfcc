//! One-shot construction of a [`HierarchicalMap`] from a concrete map.
//!
//! The builder partitions the grid into clusters, scans every shared
//! border for entrances (maximal runs of mutually passable cells), creates
//! one abstract node per entrance side, and synthesizes intra-cluster
//! edges from the cluster caches and inter-cluster edges at one crossing
//! step each.

use hgrid_core::{Point, Range};

use crate::cluster::{Cluster, ClusterId};
use crate::concrete::ConcreteMap;
use crate::hierarchical::{AbstractNodeId, AbstractNodeInfo, HierarchicalMap};
use crate::{COST_ONE, diagonal_cost};

/// How entrances are placed along a passable border run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntranceStyle {
    /// Runs longer than the maximum entrance width get an entrance at each
    /// end; shorter runs get a single entrance at their midpoint.
    EndEntrance,
    /// Every run gets a single entrance at its midpoint, regardless of
    /// width.
    MiddleEntrance,
}

/// A run longer than this yields two entrances under
/// [`EntranceStyle::EndEntrance`].
const MAX_ENTRANCE_WIDTH: i32 = 6;

// One detected entrance: a pair of mutually passable border cells, one on
// each side.
struct Entrance {
    cluster1: ClusterId,
    cluster2: ClusterId,
    p1: Point,
    p2: Point,
}

/// Builds the two-tier abstraction: clusters, entrances, abstract nodes
/// and edges.
pub struct HierarchicalMapBuilder {
    cluster_size: i32,
    entrance_style: EntranceStyle,
}

impl HierarchicalMapBuilder {
    /// Configure a builder with the given cluster side length and entrance
    /// placement style.
    pub fn new(cluster_size: i32, entrance_style: EntranceStyle) -> Self {
        Self {
            cluster_size,
            entrance_style,
        }
    }

    /// Build the hierarchical map. Construction order: clusters, entrance
    /// detection, abstract node registration, intra-cluster edges from the
    /// cluster caches, inter-cluster edges.
    pub fn build(&self, concrete: &ConcreteMap) -> HierarchicalMap {
        let mut map = HierarchicalMap::new(concrete, self.cluster_size, 1);

        self.create_clusters(concrete, &mut map);
        let entrances = self.find_entrances(concrete, &map);
        let pairs = self.register_abstract_nodes(&entrances, &mut map);
        self.create_intra_edges(&mut map);
        self.create_inter_edges(&pairs, &mut map);

        log::debug!(
            "built hierarchy: {} clusters, {} entrances, {} abstract nodes",
            map.clusters().len(),
            entrances.len(),
            map.graph().len(),
        );
        map
    }

    fn create_clusters(&self, concrete: &ConcreteMap, map: &mut HierarchicalMap) {
        let cs = self.cluster_size;
        let (w, h) = (concrete.width(), concrete.height());
        let mut id = 0u32;
        for cy in 0..(h + cs - 1) / cs {
            for cx in 0..(w + cs - 1) / cs {
                // Boundary clusters are clipped to the grid edge.
                let rect = Range::new(
                    cx * cs,
                    cy * cs,
                    (cx * cs + cs).min(w),
                    (cy * cs + cs).min(h),
                );
                map.add_cluster(Cluster::new(concrete, ClusterId::new(id), cx, cy, rect));
                id += 1;
            }
        }
    }

    // Scan every border between horizontally and vertically adjacent
    // clusters for maximal runs of cells passable on both sides.
    fn find_entrances(&self, concrete: &ConcreteMap, map: &HierarchicalMap) -> Vec<Entrance> {
        let mut entrances = Vec::new();
        for cluster in map.clusters() {
            let rect = cluster.rect();
            let (cx, cy) = cluster.grid_pos();

            // Border with the right-hand neighbour.
            if rect.max.x < concrete.width() {
                let neighbor = map.find_cluster_for(Point::new(rect.max.x, rect.min.y));
                self.scan_border(
                    concrete,
                    (rect.min.y..rect.max.y).map(|y| {
                        (Point::new(rect.max.x - 1, y), Point::new(rect.max.x, y))
                    }),
                    cluster.id(),
                    neighbor,
                    &mut entrances,
                );
                debug_assert_eq!(map.cluster(neighbor).grid_pos(), (cx + 1, cy));
            }

            // Border with the neighbour below.
            if rect.max.y < concrete.height() {
                let neighbor = map.find_cluster_for(Point::new(rect.min.x, rect.max.y));
                self.scan_border(
                    concrete,
                    (rect.min.x..rect.max.x).map(|x| {
                        (Point::new(x, rect.max.y - 1), Point::new(x, rect.max.y))
                    }),
                    cluster.id(),
                    neighbor,
                    &mut entrances,
                );
                debug_assert_eq!(map.cluster(neighbor).grid_pos(), (cx, cy + 1));
            }
        }
        entrances
    }

    // Walk one shared border, cell pair by cell pair, splitting it into
    // maximal mutually passable runs and placing entrances per the
    // configured style.
    fn scan_border(
        &self,
        concrete: &ConcreteMap,
        pairs: impl Iterator<Item = (Point, Point)>,
        cluster1: ClusterId,
        cluster2: ClusterId,
        entrances: &mut Vec<Entrance>,
    ) {
        let mut run: Vec<(Point, Point)> = Vec::new();
        let mut flush = |run: &mut Vec<(Point, Point)>| {
            if run.is_empty() {
                return;
            }
            let len = run.len() as i32;
            let place = |(p1, p2): (Point, Point)| Entrance {
                cluster1,
                cluster2,
                p1,
                p2,
            };
            if self.entrance_style == EntranceStyle::EndEntrance && len > MAX_ENTRANCE_WIDTH {
                entrances.push(place(run[0]));
                entrances.push(place(run[run.len() - 1]));
            } else {
                entrances.push(place(run[(run.len() - 1) / 2]));
            }
            run.clear();
        };
        for (p1, p2) in pairs {
            if concrete.is_obstacle(p1) || concrete.is_obstacle(p2) {
                flush(&mut run);
            } else {
                run.push((p1, p2));
            }
        }
        flush(&mut run);
    }

    // Register one level-1 abstract node per entrance side (reusing a node
    // when two entrances share a border cell) and record the crossing
    // pairs for inter-edge creation.
    fn register_abstract_nodes(
        &self,
        entrances: &[Entrance],
        map: &mut HierarchicalMap,
    ) -> Vec<(AbstractNodeId, AbstractNodeId, i32)> {
        let mut pairs = Vec::with_capacity(entrances.len());
        for entrance in entrances {
            let n1 = self.node_for(map, entrance.cluster1, entrance.p1);
            let n2 = self.node_for(map, entrance.cluster2, entrance.p2);
            pairs.push((n1, n2, crossing_cost(entrance.p1, entrance.p2)));
        }
        pairs
    }

    fn node_for(&self, map: &mut HierarchicalMap, cluster_id: ClusterId, pos: Point) -> AbstractNodeId {
        let concrete = map.concrete_id_at(pos);
        let id = match map.abstract_node_at(concrete) {
            Some(existing) => existing,
            None => map.add_abstract_node(AbstractNodeInfo {
                level: 1,
                cluster: cluster_id,
                position: pos,
                concrete_node: concrete,
            }),
        };
        let cluster = map.cluster_mut(cluster_id);
        if !cluster.has_entrance(id) {
            let relative = pos - cluster.rect().min;
            cluster.add_entrance(id, relative);
        }
        id
    }

    // Every cached finite intra-cluster distance becomes a pair of
    // directed abstract edges.
    fn create_intra_edges(&self, map: &mut HierarchicalMap) {
        for cluster_idx in 0..map.clusters().len() {
            let id = ClusterId::new(cluster_idx as u32);
            map.cluster_mut(id).compute_intra_cluster_edges();

            let cluster = map.cluster(id);
            let mut edges = Vec::new();
            let entrances = cluster.entrances();
            for i in 0..entrances.len() {
                for j in (i + 1)..entrances.len() {
                    let (a, b) = (entrances[i].abstract_node, entrances[j].abstract_node);
                    if a == b {
                        continue;
                    }
                    if let Some(cost) = cluster.distance(a, b) {
                        edges.push((a, b, cost));
                    }
                }
            }
            for (a, b, cost) in edges {
                map.add_abstract_edge(a, b, cost, false);
            }
        }
    }

    fn create_inter_edges(
        &self,
        pairs: &[(AbstractNodeId, AbstractNodeId, i32)],
        map: &mut HierarchicalMap,
    ) {
        for &(a, b, cost) in pairs {
            map.add_abstract_edge(a, b, cost, true);
        }
    }
}

// Cost of stepping across a shared border: one movement step,
// diagonal-scaled if the crossing is diagonal.
fn crossing_cost(p1: Point, p2: Point) -> i32 {
    if p1.x != p2.x && p1.y != p2.y {
        diagonal_cost(COST_ONE)
    } else {
        COST_ONE
    }
}
