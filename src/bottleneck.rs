//! Bottleneck distances inside the extension tree.
//!
//! The bottleneck distance between two tree vertices is the largest cost of a segment of
//! their tree path, where a segment runs between vertices that can't be skipped: the
//! endpoints, vertices of tree degree other than 2, and terminals. For prize-collecting
//! graphs terminals can be skipped too, and their prize is subtracted from the segment.
//! If some connection is cheaper than a segment, the segment can be replaced.

use crate::ext_tree::TreeNodes;
use crate::graph::{Graph, Vertex};
use crate::Cost;

/// Segments of a path that ends at the cell's vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    /// Largest finished segment
    closed: Cost,
    /// Segment still running into the vertex
    open: Cost,
}

impl Cell {
    const START: Cell = Cell {
        closed: 0.0,
        open: 0.0,
    };

    fn value(&self) -> Cost {
        self.closed.max(self.open)
    }

    /// Extends the path by the edge from `child` to its parent.
    fn step(self, graph: &Graph, tree: &TreeNodes, child: Vertex, child_is_end: bool) -> Cell {
        let cost = tree.parent_cost(child);
        if !child_is_end && is_skippable(graph, tree, child) {
            Cell {
                closed: self.closed,
                open: self.open + cost - graph.prize(child),
            }
        } else {
            Cell {
                closed: self.value(),
                open: cost,
            }
        }
    }
}

fn is_skippable(graph: &Graph, tree: &TreeNodes, v: Vertex) -> bool {
    tree.deg(v) == 2 && (graph.is_pc() || !graph.is_term(v))
}

/// Per-vertex cache of bottlenecks towards one marked vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct BottleneckMarks {
    cells: Vec<Option<Cell>>,
}

impl BottleneckMarks {
    pub fn new(n: usize) -> Self {
        Self {
            cells: vec![None; n],
        }
    }

    /// Marks the path from `vertex` to the tree root. The marks are removed when the
    /// returned guard is dropped.
    pub fn mark_root_path<'a>(
        &'a mut self,
        graph: &'a Graph,
        tree: &'a TreeNodes,
        vertex: Vertex,
    ) -> MarkedRootPath<'a> {
        assert!(tree.in_tree(vertex), "{vertex} is not in the tree");
        debug_assert!(self.is_clean());
        let mut cell = Cell::START;
        self.cells[vertex] = Some(cell);
        let mut child = vertex;
        while let Some(p) = tree.parent(child) {
            cell = cell.step(graph, tree, child, child == vertex);
            self.cells[p] = Some(cell);
            child = p;
        }
        MarkedRootPath {
            marks: self,
            graph,
            tree,
            vertex,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }
}

pub struct MarkedRootPath<'a> {
    marks: &'a mut BottleneckMarks,
    graph: &'a Graph,
    tree: &'a TreeNodes,
    vertex: Vertex,
}

impl MarkedRootPath<'_> {
    pub fn marked_vertex(&self) -> Vertex {
        self.vertex
    }

    /// Bottleneck distance between the marked vertex and `other`.
    pub fn bottleneck_dist(&self, other: Vertex) -> Cost {
        let cells = &self.marks.cells;
        if let Some(cell) = cells[other] {
            // other is on the marked path
            return cell.value();
        }
        let mut cell = Cell::START;
        let mut child = other;
        loop {
            let p = self
                .tree
                .parent(child)
                .unwrap_or_else(|| panic!("{other} is not in the tree of {}", self.vertex));
            cell = cell.step(self.graph, self.tree, child, child == other);
            if let Some(marked) = cells[p] {
                if p == self.vertex {
                    return cell.value();
                }
                // p is the lowest common ancestor and inside the path
                return if is_skippable(self.graph, self.tree, p) {
                    let joined = cell.open + marked.open - self.graph.prize(p);
                    cell.closed.max(marked.closed).max(joined)
                } else {
                    cell.value().max(marked.value())
                };
            }
            child = p;
        }
    }
}

impl Drop for MarkedRootPath<'_> {
    fn drop(&mut self) {
        let mut v = self.vertex;
        self.marks.cells[v] = None;
        while let Some(p) = self.tree.parent(v) {
            self.marks.cells[p] = None;
            v = p;
        }
    }
}

/// Whether a connection of cost `sd` makes a tree path with bottleneck `bottleneck`, or
/// the extension edge of cost `ext_edge_cost`, redundant. Absent distances never do,
/// and neither do equal ones.
pub fn is_dominated(sd: Option<Cost>, bottleneck: Cost, ext_edge_cost: Option<Cost>) -> bool {
    // TODO: equality could dominate too once ties between tree paths are broken consistently
    match sd {
        None => false,
        Some(sd) => ext_edge_cost.map_or(false, |c| sd < c) || sd < bottleneck,
    }
}
