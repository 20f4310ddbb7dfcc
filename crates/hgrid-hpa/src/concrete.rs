//! The concrete map: a grid graph with per-tile passability and cost.
//!
//! Nodes are laid out row-major (`id = y * width + x`). Movement edges are
//! synthesized once at construction for the map's tiling model; obstacle
//! filtering and the corner-cutting rule are applied at query time in
//! [`ConcreteMap::connections`].

use hgrid_core::{Graph, NodeId, Point, Range};

use crate::search::{Connection, SearchSpace};
use crate::{COST_ONE, diagonal_cost};

/// Tiling models supported by the concrete map.
///
/// The tiling drives both neighbour generation and the heuristic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TileType {
    /// Hexagonal cells in offset columns, 6 neighbours.
    Hex,
    /// 8-directional movement, diagonals cost 34/24 of an orthogonal step.
    Octile,
    /// 8-directional movement with uniform cost for all steps.
    OctileUnicost,
    /// 4-directional movement.
    Tile,
}

/// Kind marker for concrete (grid-cell) nodes.
pub enum Concrete {}

/// Identifier of a concrete grid cell.
pub type ConcreteNodeId = NodeId<Concrete>;

/// Per-cell payload: position, passability and base entry cost.
#[derive(Clone, Debug)]
pub struct ConcreteNodeInfo {
    pub position: Point,
    pub is_obstacle: bool,
    pub cost: i32,
}

/// Edge payload: precomputed cost of entering the target cell.
#[derive(Clone, Debug)]
pub struct ConcreteEdgeInfo {
    pub cost: i32,
}

/// The concrete grid graph.
pub type ConcreteGraph = Graph<Concrete, ConcreteNodeInfo, ConcreteEdgeInfo>;

/// A source of per-tile passability, consumed once per cell at map
/// construction time. Map generators, file loaders and procedural sources
/// are all interchangeable behind this trait.
pub trait Passability {
    /// Movement cost to enter `pos`, or `None` if the cell is blocked.
    fn can_enter(&self, pos: Point) -> Option<i32>;
}

impl<F: Fn(Point) -> Option<i32>> Passability for F {
    fn can_enter(&self, pos: Point) -> Option<i32> {
        self(pos)
    }
}

/// A grid of tiles with movement connections and tiling-specific
/// heuristics. Backs both the global map and each cluster's local sub-map.
pub struct ConcreteMap {
    tile_type: TileType,
    width: i32,
    height: i32,
    graph: ConcreteGraph,
}

impl ConcreteMap {
    /// Build a map of `width × height` cells, querying `passability` once
    /// per cell.
    pub fn new(
        tile_type: TileType,
        width: i32,
        height: i32,
        passability: &impl Passability,
    ) -> Self {
        let mut map = Self {
            tile_type,
            width,
            height,
            graph: ConcreteGraph::new(),
        };
        map.create_nodes(passability);
        map.create_edges();
        map
    }

    /// The tiling model this map was built with.
    #[inline]
    pub fn tile_type(&self) -> TileType {
        self.tile_type
    }

    /// Map width in cells.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Map height in cells.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// The map rectangle, anchored at the origin.
    #[inline]
    pub fn bounds(&self) -> Range {
        Range::new(0, 0, self.width, self.height)
    }

    /// The id of the cell at `(x, y)`.
    #[inline]
    pub fn node_id_at(&self, pos: Point) -> ConcreteNodeId {
        NodeId::new((pos.y * self.width + pos.x) as u32)
    }

    /// The position of the cell with the given id.
    #[inline]
    pub fn position_of(&self, id: ConcreteNodeId) -> Point {
        let v = id.value() as i32;
        Point::new(v % self.width, v / self.width)
    }

    /// Whether the cell at `pos` blocks occupancy.
    #[inline]
    pub fn is_obstacle(&self, pos: Point) -> bool {
        self.graph.node_info(self.node_id_at(pos)).is_obstacle
    }

    /// Read access to the per-cell payload.
    #[inline]
    pub fn node_info(&self, id: ConcreteNodeId) -> &ConcreteNodeInfo {
        self.graph.node_info(id)
    }

    /// Produce an independent map over the sub-rectangle `rect`, copying
    /// obstacle and cost data and reindexing to local coordinates. Each
    /// cluster uses a slice as its locally-addressed search space.
    pub fn slice(&self, rect: Range) -> ConcreteMap {
        let origin = rect.min;
        let copy = |local: Point| {
            let info = self.graph.node_info(self.node_id_at(origin + local));
            if info.is_obstacle {
                None
            } else {
                Some(info.cost)
            }
        };
        ConcreteMap::new(self.tile_type, rect.width(), rect.height(), &copy)
    }

    fn create_nodes(&mut self, passability: &impl Passability) {
        for pos in self.bounds() {
            let id = self.node_id_at(pos);
            let info = match passability.can_enter(pos) {
                Some(cost) => ConcreteNodeInfo {
                    position: pos,
                    is_obstacle: false,
                    cost,
                },
                None => ConcreteNodeInfo {
                    position: pos,
                    is_obstacle: true,
                    cost: COST_ONE,
                },
            };
            self.graph.add_node(id, info);
        }
    }

    fn create_edges(&mut self) {
        for pos in self.bounds() {
            let id = self.node_id_at(pos);
            let (x, y) = (pos.x, pos.y);

            self.add_edge(id, Point::new(x, y - 1), false);
            self.add_edge(id, Point::new(x, y + 1), false);
            self.add_edge(id, Point::new(x - 1, y), false);
            self.add_edge(id, Point::new(x + 1, y), false);

            match self.tile_type {
                TileType::Octile => {
                    self.add_edge(id, Point::new(x + 1, y + 1), true);
                    self.add_edge(id, Point::new(x - 1, y + 1), true);
                    self.add_edge(id, Point::new(x + 1, y - 1), true);
                    self.add_edge(id, Point::new(x - 1, y - 1), true);
                }
                TileType::OctileUnicost => {
                    self.add_edge(id, Point::new(x + 1, y + 1), false);
                    self.add_edge(id, Point::new(x - 1, y + 1), false);
                    self.add_edge(id, Point::new(x + 1, y - 1), false);
                    self.add_edge(id, Point::new(x - 1, y - 1), false);
                }
                TileType::Hex => {
                    // Offset columns: even columns connect up-diagonally,
                    // odd columns down-diagonally.
                    if x % 2 == 0 {
                        self.add_edge(id, Point::new(x + 1, y - 1), false);
                        self.add_edge(id, Point::new(x - 1, y - 1), false);
                    } else {
                        self.add_edge(id, Point::new(x + 1, y + 1), false);
                        self.add_edge(id, Point::new(x - 1, y + 1), false);
                    }
                }
                TileType::Tile => {}
            }
        }
    }

    fn add_edge(&mut self, source: ConcreteNodeId, target: Point, diagonal: bool) {
        if !self.bounds().contains(target) {
            return;
        }
        let target_id = self.node_id_at(target);
        let cost = self.graph.node_info(target_id).cost;
        let cost = if diagonal { diagonal_cost(cost) } else { cost };
        self.graph.add_edge(source, target_id, ConcreteEdgeInfo { cost });
    }

    /// Whether a straight or diagonal move between two adjacent cells is
    /// permitted. Diagonal moves on octile tilings may not "cut a corner":
    /// the move is disallowed when *both* flanking orthogonal cells are
    /// obstacles. The two checked cells are invariant under swapping `p1`
    /// and `p2`, so permission is symmetric.
    pub fn can_jump(&self, p1: Point, p2: Point) -> bool {
        if self.tile_type != TileType::Octile && self.tile_type != TileType::OctileUnicost {
            return true;
        }
        if p1.aligned_with(p2) {
            return true;
        }
        let corner_a = self.graph.node_info(self.node_id_at(Point::new(p2.x, p1.y)));
        let corner_b = self.graph.node_info(self.node_id_at(Point::new(p1.x, p2.y)));
        !(corner_a.is_obstacle && corner_b.is_obstacle)
    }
}

impl SearchSpace for ConcreteMap {
    type Kind = Concrete;

    fn node_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    fn connections(&self, node: ConcreteNodeId, buf: &mut Vec<Connection<Concrete>>) {
        let from = self.graph.node_info(node).position;
        for edge in self.graph.node(node).edges() {
            let target = edge.target();
            let info = self.graph.node_info(target);
            if info.is_obstacle || !self.can_jump(from, info.position) {
                continue;
            }
            buf.push(Connection {
                target,
                cost: edge.info().cost,
            });
        }
    }

    fn heuristic(&self, from: ConcreteNodeId, to: ConcreteNodeId) -> i32 {
        let start = self.graph.node_info(from).position;
        let target = self.graph.node_info(to).position;
        let diff_x = (target.x - start.x).abs();
        let diff_y = (target.y - start.y).abs();
        match self.tile_type {
            TileType::Hex => {
                // Vancouver distance (P. Yap, Grid-based Path-Finding,
                // LNAI 2338), with the column-parity correction.
                let mut correction = 0;
                if diff_x % 2 != 0 {
                    if target.y < start.y {
                        correction = target.x % 2;
                    } else if target.y > start.y {
                        correction = start.x % 2;
                    }
                }
                (diff_y - diff_x / 2 - correction).max(0) + diff_x
            }
            TileType::OctileUnicost => diff_x.max(diff_y) * COST_ONE,
            TileType::Octile => {
                let max = diff_x.max(diff_y);
                let min = diff_x.min(diff_y);
                min * COST_ONE * 34 / 24 + (max - min) * COST_ONE
            }
            TileType::Tile => (diff_x + diff_y) * COST_ONE,
        }
    }
}
