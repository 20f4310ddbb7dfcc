//! Generic best-first search over any [`SearchSpace`].
//!
//! The same engine serves concrete-level, cluster-local and abstract-level
//! searches: it only asks its space for a node count, outgoing connections
//! and a heuristic estimate. Costs are integers; as long as the heuristic
//! never overestimates, [`AStar::find_path`] returns a lowest-cost path.

use std::collections::BinaryHeap;

use hgrid_core::NodeId;

/// An outgoing connection: target node and traversal cost.
#[derive(Clone, Copy, Debug)]
pub struct Connection<K> {
    pub target: NodeId<K>,
    pub cost: i32,
}

/// The map capability interface consumed by the search engine.
///
/// Implemented by [`crate::ConcreteMap`] (and therefore every cluster's
/// sliced sub-map) and by [`crate::HierarchicalMap`].
pub trait SearchSpace {
    /// Kind marker of the node ids this space is addressed by.
    type Kind;

    /// Number of nodes; ids are `0..node_count`.
    fn node_count(&self) -> usize;

    /// Append the reachable neighbours of `node` with per-edge cost into
    /// `buf`. The caller clears `buf` before calling.
    fn connections(&self, node: NodeId<Self::Kind>, buf: &mut Vec<Connection<Self::Kind>>);

    /// Admissible lower bound on the cost from `from` to `to`.
    fn heuristic(&self, from: NodeId<Self::Kind>, to: NodeId<Self::Kind>) -> i32;
}

/// A found path: node sequence from start to goal, plus total cost.
#[derive(Clone, Debug)]
pub struct Path<K> {
    pub nodes: Vec<NodeId<K>>,
    pub cost: i32,
}

// Per-node search state. A node absent from the lookup is unvisited; the
// root is its own parent.
struct SearchNode<K> {
    parent: NodeId<K>,
    g: i32,
    h: i32,
    closed: bool,
}

// Frontier entry, ordered for a min-heap on `f`, with insertion order
// (`seq`) breaking ties FIFO. Entries are lazily invalidated: an entry
// whose `f` no longer matches the node's current `g + h` is stale and
// skipped on pop.
struct OpenEntry<K> {
    id: NodeId<K>,
    f: i32,
    seq: u64,
}

impl<K> PartialEq for OpenEntry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}

impl<K> Eq for OpenEntry<K> {}

impl<K> PartialOrd for OpenEntry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for OpenEntry<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so BinaryHeap (a max-heap) pops smallest f first;
        // earlier insertion wins among equal f.
        other.f.cmp(&self.f).then(other.seq.cmp(&self.seq))
    }
}

/// One A* search instance over a borrowed space.
///
/// [`expand`](Self::expand) is exposed separately from
/// [`find_path`](Self::find_path) so callers can interleave two instances
/// (see [`find_bidirectional_path`]) or impose external step caps.
pub struct AStar<'a, S: SearchSpace> {
    space: &'a S,
    target: NodeId<S::Kind>,
    open: BinaryHeap<OpenEntry<S::Kind>>,
    nodes: Vec<Option<SearchNode<S::Kind>>>,
    nbuf: Vec<Connection<S::Kind>>,
    seq: u64,
}

impl<'a, S: SearchSpace> AStar<'a, S> {
    /// Set up a search from `start` toward `target`. The start node enters
    /// the frontier with `g = 0` and itself as parent.
    pub fn new(space: &'a S, start: NodeId<S::Kind>, target: NodeId<S::Kind>) -> Self {
        let mut nodes: Vec<Option<SearchNode<S::Kind>>> =
            std::iter::repeat_with(|| None).take(space.node_count()).collect();
        let h = space.heuristic(start, target);
        nodes[start.index()] = Some(SearchNode {
            parent: start,
            g: 0,
            h,
            closed: false,
        });
        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            id: start,
            f: h,
            seq: 0,
        });
        Self {
            space,
            target,
            open,
            nodes,
            nbuf: Vec::with_capacity(8),
            seq: 0,
        }
    }

    /// Whether the frontier still holds entries.
    ///
    /// May report `true` when only stale entries remain; a subsequent
    /// [`expand`](Self::expand) then returns `None`.
    pub fn can_expand(&self) -> bool {
        !self.open.is_empty()
    }

    /// Whether `node` has been finalized by this instance.
    pub fn node_is_closed(&self, node: NodeId<S::Kind>) -> bool {
        matches!(&self.nodes[node.index()], Some(n) if n.closed)
    }

    /// Pop the minimum-`f` open node, close it, and relax its neighbours.
    ///
    /// Returns the closed node, or `None` once the frontier is exhausted.
    /// Closed nodes are never reopened (consistent-heuristic assumption).
    pub fn expand(&mut self) -> Option<NodeId<S::Kind>> {
        let (id, g) = loop {
            let entry = self.open.pop()?;
            let node = self.nodes[entry.id.index()]
                .as_mut()
                .expect("open entry for unvisited node");
            if node.closed || node.g + node.h != entry.f {
                continue; // stale entry
            }
            node.closed = true;
            break (entry.id, node.g);
        };

        let mut nbuf = std::mem::take(&mut self.nbuf);
        nbuf.clear();
        self.space.connections(id, &mut nbuf);

        for conn in &nbuf {
            let tentative_g = g + conn.cost;
            match &mut self.nodes[conn.target.index()] {
                Some(n) => {
                    if n.closed || tentative_g >= n.g {
                        continue;
                    }
                    n.g = tentative_g;
                    n.parent = id;
                    self.seq += 1;
                    self.open.push(OpenEntry {
                        id: conn.target,
                        f: tentative_g + n.h,
                        seq: self.seq,
                    });
                }
                slot @ None => {
                    let h = self.space.heuristic(conn.target, self.target);
                    *slot = Some(SearchNode {
                        parent: id,
                        g: tentative_g,
                        h,
                        closed: false,
                    });
                    self.seq += 1;
                    self.open.push(OpenEntry {
                        id: conn.target,
                        f: tentative_g + h,
                        seq: self.seq,
                    });
                }
            }
        }

        self.nbuf = nbuf;
        Some(id)
    }

    /// Run the search to completion.
    ///
    /// Returns the lowest-cost path from start to target, or `None` if the
    /// frontier empties first (no path exists).
    pub fn find_path(mut self) -> Option<Path<S::Kind>> {
        while let Some(id) = self.expand() {
            if id == self.target {
                return Some(self.reconstruct_from(id));
            }
        }
        None
    }

    // Follow parent links back to the root (which parents itself) and
    // reverse. `node` must have been visited.
    fn reconstruct_from(&self, node: NodeId<S::Kind>) -> Path<S::Kind> {
        let cost = self.nodes[node.index()].as_ref().unwrap().g;
        let mut nodes = Vec::new();
        let mut current = node;
        loop {
            nodes.push(current);
            let parent = self.nodes[current.index()].as_ref().unwrap().parent;
            if parent == current {
                break;
            }
            current = parent;
        }
        nodes.reverse();
        Path { nodes, cost }
    }
}

/// Bidirectional A*: two instances run toward each other, alternating one
/// expansion each; when one closes a node the other has already closed,
/// the two half paths are joined at that meeting node.
///
/// Returns `None` once either frontier empties without a meeting.
pub fn find_bidirectional_path<S: SearchSpace>(
    space: &S,
    start: NodeId<S::Kind>,
    target: NodeId<S::Kind>,
) -> Option<Path<S::Kind>> {
    let mut forward = AStar::new(space, start, target);
    let mut backward = AStar::new(space, target, start);

    loop {
        let frontier = forward.expand()?;
        if backward.node_is_closed(frontier) {
            return Some(join_at(&forward, &backward, frontier));
        }
        let frontier = backward.expand()?;
        if forward.node_is_closed(frontier) {
            return Some(join_at(&forward, &backward, frontier));
        }
    }
}

// The forward half runs start -> meeting; the backward half, reconstructed
// goal -> meeting, is reversed and appended without repeating the meeting
// node.
fn join_at<S: SearchSpace>(
    forward: &AStar<'_, S>,
    backward: &AStar<'_, S>,
    meeting: NodeId<S::Kind>,
) -> Path<S::Kind> {
    let mut path = forward.reconstruct_from(meeting);
    let half = backward.reconstruct_from(meeting);
    path.cost += half.cost;
    path.nodes.extend(half.nodes.into_iter().rev().skip(1));
    path
}
