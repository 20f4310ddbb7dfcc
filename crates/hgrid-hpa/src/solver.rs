//! The query entry point: hierarchical search with path refinement.
//!
//! A query inserts the start and goal as transient abstract nodes, searches
//! the abstract graph, refines every abstract edge into a concrete
//! sub-path (cached cluster paths, with a concrete-map local search as
//! fallback), concatenates, and removes the transient nodes in reverse
//! insertion order, restoring the prebuilt structure exactly.

use std::error::Error;
use std::fmt;

use hgrid_core::Point;

use crate::concrete::ConcreteMap;
use crate::hierarchical::{AbstractNodeId, HierarchicalMap};
use crate::search::{AStar, Path};
use crate::Abstract;

/// A refined query result: concrete positions from start to goal, plus
/// total cost in [`crate::COST_ONE`] units.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConcretePath {
    pub positions: Vec<Point>,
    pub cost: i32,
}

/// A query endpoint the search cannot start from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryError {
    /// Coordinates outside the grid bounds.
    OutOfBounds(Point),
    /// An obstacle cell used as start or goal.
    Blocked(Point),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::OutOfBounds(p) => write!(f, "position {p} is outside the grid"),
            QueryError::Blocked(p) => write!(f, "position {p} is an obstacle"),
        }
    }
}

impl Error for QueryError {}

/// Compute a concrete path from `start` to `goal` through the abstract
/// tier.
///
/// Returns `Ok(None)` when no path exists — a normal outcome, not an
/// error. The map's transient bookkeeping is rolled back before returning,
/// so `hier` is restored to its prebuilt state.
pub fn hierarchical_search(
    hier: &mut HierarchicalMap,
    concrete: &ConcreteMap,
    start: Point,
    goal: Point,
) -> Result<Option<ConcretePath>, QueryError> {
    validate_endpoint(concrete, start)?;
    validate_endpoint(concrete, goal)?;

    if start == goal {
        return Ok(Some(ConcretePath {
            positions: vec![start],
            cost: 0,
        }));
    }

    let start_node = hier.insert_node(start);
    let goal_node = hier.insert_node(goal);

    let abstract_path = AStar::new(&*hier, start_node, goal_node).find_path();
    let result = abstract_path.map(|path| ConcretePath {
        positions: refine(hier, concrete, &path),
        cost: path.cost,
    });
    log::debug!(
        "query {start} -> {goal}: {}",
        match &result {
            Some(p) => format!("cost {} over {} cells", p.cost, p.positions.len()),
            None => "no path".to_string(),
        }
    );

    // Reverse insertion order keeps the dense abstract node array valid.
    hier.remove_node(goal_node);
    hier.remove_node(start_node);

    Ok(result)
}

fn validate_endpoint(concrete: &ConcreteMap, pos: Point) -> Result<(), QueryError> {
    if !concrete.bounds().contains(pos) {
        return Err(QueryError::OutOfBounds(pos));
    }
    if concrete.is_obstacle(pos) {
        return Err(QueryError::Blocked(pos));
    }
    Ok(())
}

// Expand an abstract path into concrete positions. Inter-cluster edges
// contribute the single cell on the far side; intra-cluster edges are
// looked up in their cluster's path cache.
fn refine(hier: &HierarchicalMap, concrete: &ConcreteMap, path: &Path<Abstract>) -> Vec<Point> {
    let graph = hier.graph();
    let mut positions = vec![graph.node_info(path.nodes[0]).position];

    for pair in path.nodes.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let intra = graph
            .node(a)
            .edge_to(b)
            .is_some_and(|edge| !edge.info().inter);
        if !intra {
            positions.push(graph.node_info(b).position);
            continue;
        }

        let cluster = hier.cluster(graph.node_info(a).cluster);
        match cluster.path(a, b) {
            Some(local) => {
                positions.extend(local.iter().skip(1).map(|&id| cluster.to_global(id)));
            }
            None => {
                // Cache miss for a live intra edge; fall back to a local
                // search on the concrete map.
                positions.extend(concrete_segment(hier, concrete, a, b));
            }
        }
    }
    positions
}

fn concrete_segment(
    hier: &HierarchicalMap,
    concrete: &ConcreteMap,
    a: AbstractNodeId,
    b: AbstractNodeId,
) -> Vec<Point> {
    let graph = hier.graph();
    let from = graph.node_info(a).concrete_node;
    let to = graph.node_info(b).concrete_node;
    match AStar::new(concrete, from, to).find_path() {
        Some(path) => path
            .nodes
            .iter()
            .skip(1)
            .map(|&id| concrete.position_of(id))
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EntranceStyle, HierarchicalMapBuilder};
    use crate::concrete::TileType;
    use crate::COST_ONE;

    fn open_map(w: i32, h: i32) -> ConcreteMap {
        ConcreteMap::new(TileType::OctileUnicost, w, h, &|_| Some(COST_ONE))
    }

    fn build(concrete: &ConcreteMap) -> HierarchicalMap {
        HierarchicalMapBuilder::new(4, EntranceStyle::EndEntrance).build(concrete)
    }

    fn assert_valid_walk(concrete: &ConcreteMap, path: &ConcretePath, start: Point, goal: Point) {
        assert_eq!(path.positions.first(), Some(&start));
        assert_eq!(path.positions.last(), Some(&goal));
        for pair in path.positions.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(!concrete.is_obstacle(b), "walk enters obstacle at {b}");
            let step = b - a;
            assert!(
                step.x.abs() <= 1 && step.y.abs() <= 1 && a != b,
                "non-adjacent step {a} -> {b}"
            );
        }
    }

    #[test]
    fn open_grid_query_is_refined_and_rolled_back() {
        let concrete = open_map(8, 8);
        let mut hier = build(&concrete);
        let nodes_before = hier.graph().len();

        let start = Point::new(0, 0);
        let goal = Point::new(7, 7);
        let path = hierarchical_search(&mut hier, &concrete, start, goal)
            .unwrap()
            .unwrap();
        assert_valid_walk(&concrete, &path, start, goal);

        // Flat concrete search is the lower bound; the abstraction may
        // only add detour cost.
        let flat = AStar::new(&concrete, concrete.node_id_at(start), concrete.node_id_at(goal))
            .find_path()
            .unwrap();
        assert_eq!(flat.cost, 7 * COST_ONE);
        assert!(path.cost >= flat.cost);

        assert_eq!(hier.graph().len(), nodes_before);
    }

    #[test]
    fn same_cluster_query_uses_the_local_cache() {
        let concrete = open_map(8, 8);
        let mut hier = build(&concrete);
        let start = Point::new(0, 0);
        let goal = Point::new(3, 2);
        let path = hierarchical_search(&mut hier, &concrete, start, goal)
            .unwrap()
            .unwrap();
        assert_valid_walk(&concrete, &path, start, goal);
        assert_eq!(path.cost, 3 * COST_ONE);
    }

    #[test]
    fn wall_split_returns_no_path() {
        let concrete = ConcreteMap::new(TileType::OctileUnicost, 8, 8, &|p: Point| {
            if p.x == 4 { None } else { Some(COST_ONE) }
        });
        let mut hier = build(&concrete);
        let result =
            hierarchical_search(&mut hier, &concrete, Point::new(0, 0), Point::new(7, 7)).unwrap();
        assert_eq!(result, None);
        // Bookkeeping must be rolled back after a failed query too.
        let again =
            hierarchical_search(&mut hier, &concrete, Point::new(0, 0), Point::new(7, 7)).unwrap();
        assert_eq!(again, None);
    }

    #[test]
    fn invalid_endpoints_are_rejected_before_searching() {
        let concrete = ConcreteMap::new(TileType::OctileUnicost, 8, 8, &|p: Point| {
            if p == Point::new(2, 2) { None } else { Some(COST_ONE) }
        });
        let mut hier = build(&concrete);

        let oob = hierarchical_search(&mut hier, &concrete, Point::new(-1, 0), Point::new(7, 7));
        assert_eq!(oob, Err(QueryError::OutOfBounds(Point::new(-1, 0))));

        let blocked = hierarchical_search(&mut hier, &concrete, Point::new(0, 0), Point::new(2, 2));
        assert_eq!(blocked, Err(QueryError::Blocked(Point::new(2, 2))));
    }

    #[test]
    fn start_equals_goal_short_circuits() {
        let concrete = open_map(8, 8);
        let mut hier = build(&concrete);
        let p = Point::new(3, 3);
        let path = hierarchical_search(&mut hier, &concrete, p, p).unwrap().unwrap();
        assert_eq!(path.positions, vec![p]);
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn querying_from_an_existing_entrance_preserves_it() {
        let concrete = open_map(8, 8);
        let mut hier = build(&concrete);
        let entrance = hgrid_core::NodeId::new(0);
        let entrance_pos = hier.graph().node_info(entrance).position;
        let edges_before: Vec<_> = hier
            .graph()
            .node(entrance)
            .edges()
            .map(|e| (e.target(), e.info().cost, e.info().inter))
            .collect();

        let path = hierarchical_search(&mut hier, &concrete, entrance_pos, Point::new(7, 7))
            .unwrap()
            .unwrap();
        assert_valid_walk(&concrete, &path, entrance_pos, Point::new(7, 7));

        let edges_after: Vec<_> = hier
            .graph()
            .node(entrance)
            .edges()
            .map(|e| (e.target(), e.info().cost, e.info().inter))
            .collect();
        assert_eq!(edges_before, edges_after);
    }

    #[test]
    fn repeated_queries_are_deterministic() {
        let concrete = ConcreteMap::new(TileType::Octile, 16, 16, &|p: Point| {
            if p.x == 5 && p.y != 12 { None } else { Some(COST_ONE) }
        });
        let mut hier = HierarchicalMapBuilder::new(8, EntranceStyle::EndEntrance).build(&concrete);
        let start = Point::new(1, 1);
        let goal = Point::new(14, 14);
        let first = hierarchical_search(&mut hier, &concrete, start, goal).unwrap();
        let second = hierarchical_search(&mut hier, &concrete, start, goal).unwrap();
        assert_eq!(first, second);
        let path = first.unwrap();
        assert_valid_walk(&concrete, &path, start, goal);
        // The only gap in the wall is at (5, 12).
        assert!(path.positions.contains(&Point::new(5, 12)));
    }
}

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;
    use crate::builder::EntranceStyle;
    use crate::concrete::TileType;
    use crate::COST_ONE;

    #[test]
    fn concrete_path_round_trip() {
        let path = ConcretePath {
            positions: vec![Point::new(0, 0), Point::new(1, 1), Point::new(2, 1)],
            cost: 2 * COST_ONE + COST_ONE * 34 / 24,
        };
        let json = serde_json::to_string(&path).unwrap();
        let back: ConcretePath = serde_json::from_str(&json).unwrap();
        assert_eq!(path, back);
    }

    #[test]
    fn config_enums_round_trip() {
        for tile_type in [
            TileType::Hex,
            TileType::Octile,
            TileType::OctileUnicost,
            TileType::Tile,
        ] {
            let json = serde_json::to_string(&tile_type).unwrap();
            let back: TileType = serde_json::from_str(&json).unwrap();
            assert_eq!(tile_type, back);
        }
        for style in [EntranceStyle::EndEntrance, EntranceStyle::MiddleEntrance] {
            let json = serde_json::to_string(&style).unwrap();
            let back: EntranceStyle = serde_json::from_str(&json).unwrap();
            assert_eq!(style, back);
        }
    }
}
