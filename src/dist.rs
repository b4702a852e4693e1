//! Special distances: cheap upper bounds on the cost of connecting two vertices.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::{Graph, Vertex};
use crate::Cost;

pub trait SpecialDistance {
    /// Upper bound on the cost of some path from u to v, if one is known. Never negative.
    /// `None` means nothing is known and must never be read as 0.
    fn sd(&self, u: Vertex, v: Vertex) -> Option<Cost>;
    /// Like [SpecialDistance::sd], also trying from v to u.
    fn sd_double(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        self.sd(u, v).or_else(|| self.sd(v, u))
    }
}

impl<T: SpecialDistance + ?Sized> SpecialDistance for &T {
    fn sd(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        (**self).sd(u, v)
    }
    fn sd_double(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        (**self).sd_double(u, v)
    }
}

/// Smaller of two optional distances, where `None` is infinite.
pub fn min_sd(a: Option<Cost>, b: Option<Cost>) -> Option<Cost> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Debug, Clone)]
pub struct DistParams {
    /// Vertices settled per Dijkstra run, the start excluded.
    pub close_nodes_max: usize,
    /// Edges scanned per Dijkstra run.
    pub edge_limit: usize,
}

impl Default for DistParams {
    fn default() -> Self {
        Self {
            close_nodes_max: 32,
            edge_limit: 512,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Item {
    d: Cost,
    v: Vertex,
}

impl PartialEq for Item {
    fn eq(&self, o: &Self) -> bool {
        self.cmp(o) == Ordering::Equal
    }
}

impl Eq for Item {}

// Reversed, BinaryHeap is a max heap.
impl Ord for Item {
    fn cmp(&self, o: &Self) -> Ordering {
        o.d.total_cmp(&self.d).then_with(|| o.v.cmp(&self.v))
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, o: &Self) -> Option<Ordering> {
        Some(self.cmp(o))
    }
}

/// For every vertex, the distances to its closest vertices, found by a Dijkstra run
/// bounded by [DistParams]. A bounded run from u may reach v while the run from v
/// doesn't reach u, so the distances are asymmetric.
#[derive(Debug, Clone)]
pub struct DistData {
    /// close nodes of v are in close_start[v]..close_start[v + 1], sorted by id
    close_start: Vec<usize>,
    close_ids: Vec<Vertex>,
    close_dists: Vec<Cost>,
}

impl DistData {
    pub fn new(graph: &Graph, params: &DistParams) -> Self {
        let n = graph.n_vertices();
        let mut dd = Self {
            close_start: Vec::with_capacity(n + 1),
            close_ids: vec![],
            close_dists: vec![],
        };
        let mut dist: Vec<Option<Cost>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut touched = vec![];
        let mut heap = BinaryHeap::new();
        let mut found: Vec<(Vertex, Cost)> = vec![];
        dd.close_start.push(0);
        for s in 0..n {
            if graph.is_alive(s) {
                Self::close_nodes(
                    graph,
                    params,
                    s,
                    &mut dist,
                    &mut settled,
                    &mut touched,
                    &mut heap,
                    &mut found,
                );
                found.sort_unstable_by_key(|&(v, _)| v);
                for &(v, d) in &found {
                    dd.close_ids.push(v);
                    dd.close_dists.push(d);
                }
                for v in touched.drain(..) {
                    dist[v] = None;
                    settled[v] = false;
                }
                heap.clear();
                found.clear();
            }
            dd.close_start.push(dd.close_ids.len());
        }
        log::debug!(
            "computed {} close nodes for {} vertices",
            dd.close_ids.len(),
            n
        );
        dd
    }

    #[allow(clippy::too_many_arguments)]
    fn close_nodes(
        graph: &Graph,
        params: &DistParams,
        s: Vertex,
        dist: &mut [Option<Cost>],
        settled: &mut [bool],
        touched: &mut Vec<Vertex>,
        heap: &mut BinaryHeap<Item>,
        found: &mut Vec<(Vertex, Cost)>,
    ) {
        let mut scanned = 0;
        dist[s] = Some(0.0);
        touched.push(s);
        heap.push(Item { d: 0.0, v: s });
        while let Some(Item { d, v }) = heap.pop() {
            if settled[v] {
                continue;
            }
            settled[v] = true;
            if v != s {
                found.push((v, d));
                if found.len() >= params.close_nodes_max {
                    break;
                }
            }
            for e in graph.out_edges(v) {
                scanned += 1;
                if scanned > params.edge_limit {
                    return;
                }
                let w = graph.head(e);
                let nd = d + graph.cost(e);
                if dist[w].map_or(true, |old| nd < old) {
                    if dist[w].is_none() {
                        touched.push(w);
                    }
                    dist[w] = Some(nd);
                    heap.push(Item { d: nd, v: w });
                }
            }
        }
    }

    /// Close nodes of `v` and their distances, sorted by vertex id.
    pub fn close_nodes_of(&self, v: Vertex) -> impl Iterator<Item = (Vertex, Cost)> + '_ {
        let range = self.close_start[v]..self.close_start[v + 1];
        self.close_ids[range.clone()]
            .iter()
            .copied()
            .zip(self.close_dists[range].iter().copied())
    }
}

impl SpecialDistance for DistData {
    fn sd(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        if u == v {
            return Some(0.0);
        }
        let range = self.close_start[u]..self.close_start[u + 1];
        let ids = &self.close_ids[range.clone()];
        ids.binary_search(&v)
            .ok()
            .map(|i| self.close_dists[range.start + i])
    }
}

/// Prize-collecting tightening of special distances from a start vertex, using paths
/// of two edges through a vertex with positive prize. Marks are only reachable through
/// a [PcSdScope], which clears them when dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct PcSdMarks {
    bound: Vec<Option<Cost>>,
    touched: Vec<Vertex>,
}

impl PcSdMarks {
    pub fn new(n: usize) -> Self {
        Self {
            bound: vec![None; n],
            touched: vec![],
        }
    }

    /// Marks the two-hop bounds from `start`:
    /// `max(c(start, w), c(w, x), c(start, w) + c(w, x) - prize(w))` for every prized
    /// neighbour `w` of `start` and neighbour `x` of `w`.
    pub fn mark<'a>(&'a mut self, graph: &Graph, start: Vertex) -> PcSdScope<'a> {
        debug_assert!(self.is_clean());
        for e in graph.out_edges(start) {
            let w = graph.head(e);
            let prize = graph.prize(w);
            if prize <= 0.0 {
                continue;
            }
            let c1 = graph.cost(e);
            for f in graph.out_edges(w) {
                let x = graph.head(f);
                if x == start {
                    continue;
                }
                let c2 = graph.cost(f);
                let b = c1.max(c2).max(c1 + c2 - prize);
                match self.bound[x] {
                    Some(old) if old <= b => {}
                    Some(_) => self.bound[x] = Some(b),
                    None => {
                        self.touched.push(x);
                        self.bound[x] = Some(b);
                    }
                }
            }
        }
        PcSdScope { marks: self, start }
    }

    pub fn is_clean(&self) -> bool {
        self.touched.is_empty() && self.bound.iter().all(Option::is_none)
    }
}

pub struct PcSdScope<'a> {
    marks: &'a mut PcSdMarks,
    start: Vertex,
}

impl PcSdScope<'_> {
    pub fn start(&self) -> Vertex {
        self.start
    }

    /// The two-hop bound to `v`, if any.
    pub fn bound(&self, v: Vertex) -> Option<Cost> {
        self.marks.bound[v]
    }

    /// Special distance from the start to `v`, tightened by the two-hop bound.
    pub fn sd(&self, oracle: &impl SpecialDistance, v: Vertex) -> Option<Cost> {
        min_sd(oracle.sd_double(self.start, v), self.bound(v))
    }
}

impl Drop for PcSdScope<'_> {
    fn drop(&mut self) {
        for v in self.marks.touched.drain(..) {
            self.marks.bound[v] = None;
        }
    }
}
