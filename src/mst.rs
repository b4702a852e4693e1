//! Minimum spanning trees in compressed sparse row form, and their incremental update
//! when a node is added.

use crate::Cost;

pub mod depot;

pub use depot::CsrDepot;

/// Undirected graph in CSR form. Every edge is stored in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Csr {
    start: Vec<usize>,
    head: Vec<usize>,
    cost: Vec<Cost>,
}

impl Default for Csr {
    fn default() -> Self {
        Self::new()
    }
}

impl Csr {
    /// Graph without nodes.
    pub fn new() -> Self {
        Self {
            start: vec![0],
            head: vec![],
            cost: vec![],
        }
    }

    pub fn from_edges(n_nodes: usize, edges: &[(usize, usize, Cost)]) -> Self {
        let mut csr = Self::new();
        csr.fill_from_edges(n_nodes, edges);
        csr
    }

    /// Replaces the content, reusing the buffers.
    pub fn fill_from_edges(&mut self, n_nodes: usize, edges: &[(usize, usize, Cost)]) {
        self.start.clear();
        self.start.resize(n_nodes + 1, 0);
        for &(u, v, _) in edges {
            assert!(u < n_nodes && v < n_nodes && u != v);
            self.start[u + 1] += 1;
            self.start[v + 1] += 1;
        }
        for i in 0..n_nodes {
            self.start[i + 1] += self.start[i];
        }
        let m = 2 * edges.len();
        self.head.clear();
        self.head.resize(m, 0);
        self.cost.clear();
        self.cost.resize(m, 0.0);
        // start[i] is used as the insertion point of i, then shifted back
        for &(u, v, c) in edges {
            for (a, b) in [(u, v), (v, u)] {
                let pos = self.start[a];
                self.head[pos] = b;
                self.cost[pos] = c;
                self.start[a] += 1;
            }
        }
        for i in (1..=n_nodes).rev() {
            self.start[i] = self.start[i - 1];
        }
        self.start[0] = 0;
    }

    pub fn view(&self) -> CsrView<'_> {
        CsrView {
            start: &self.start,
            head: &self.head,
            cost: &self.cost,
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.view().n_nodes()
    }

    pub fn weight(&self) -> Cost {
        self.view().weight()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CsrView<'a> {
    start: &'a [usize],
    head: &'a [usize],
    cost: &'a [Cost],
}

impl<'a> CsrView<'a> {
    pub fn n_nodes(&self) -> usize {
        self.start.len() - 1
    }

    /// Number of directed edges, twice the number of undirected ones.
    pub fn n_edges(&self) -> usize {
        self.head.len()
    }

    pub fn neighbours(&self, u: usize) -> impl Iterator<Item = (usize, Cost)> + 'a {
        let (head, cost): (&'a [usize], &'a [Cost]) = (self.head, self.cost);
        let range = self.start[u]..self.start[u + 1];
        head[range.clone()]
            .iter()
            .copied()
            .zip(cost[range].iter().copied())
    }

    /// Each undirected edge once, as `(u, v, cost)` with `u < v`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, Cost)> + 'a {
        let view = *self;
        (0..view.n_nodes()).flat_map(move |u| {
            view.neighbours(u)
                .filter(move |&(v, _)| u < v)
                .map(move |(v, c)| (u, v, c))
        })
    }

    /// Total cost. Computed on every call.
    pub fn weight(&self) -> Cost {
        self.edges().map(|(_, _, c)| c).sum()
    }

    pub fn to_csr(&self) -> Csr {
        Csr {
            start: self.start.to_vec(),
            head: self.head.to_vec(),
            cost: self.cost.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    parent: usize,
    parent_cost: Cost,
    next: usize,
}

type WEdge = (usize, usize, Cost);

/// Dynamic MST computations, with buffers reused between calls.
#[derive(Debug, Default)]
pub struct Dcmst {
    stack: Vec<Frame>,
    /// Per node, the heaviest edge on its path to the new node that is not yet decided.
    pending: Vec<WEdge>,
    edges: Vec<WEdge>,
    key: Vec<Cost>,
    pred: Vec<usize>,
    done: Vec<bool>,
}

impl Dcmst {
    const NONE: usize = usize::MAX;

    pub fn new() -> Self {
        Self::default()
    }

    /// Writes to `out` the MST of `parent` plus a new node `parent.n_nodes()`, connected to
    /// each node `i` of `parent` with cost `adj_costs[i]`. `parent` must be a spanning tree.
    ///
    /// Linear time: every edge of the new MST is in `parent` or adjacent to the new node,
    /// so a DFS over `parent` only has to break the cycle each tree edge closes with the
    /// new node.
    pub fn add_node(&mut self, parent: CsrView<'_>, adj_costs: &[Cost], out: &mut Csr) {
        let n = parent.n_nodes();
        let z = n;
        assert_eq!(adj_costs.len(), n);
        assert_eq!(parent.n_edges(), 2 * n.saturating_sub(1), "parent is not a tree");
        self.edges.clear();
        if n > 0 {
            self.pending.clear();
            self.pending
                .extend(adj_costs.iter().enumerate().map(|(v, &c)| (z, v, c)));
            self.stack.clear();
            self.stack.push(Frame {
                node: 0,
                parent: Self::NONE,
                parent_cost: 0.0,
                next: parent.start[0],
            });
            while let Some(&top) = self.stack.last() {
                let v = top.node;
                if top.next < parent.start[v + 1] {
                    let idx = top.next;
                    if let Some(f) = self.stack.last_mut() {
                        f.next += 1;
                    }
                    let w = parent.head[idx];
                    if w != top.parent {
                        self.stack.push(Frame {
                            node: w,
                            parent: v,
                            parent_cost: parent.cost[idx],
                            next: parent.start[w],
                        });
                    }
                    continue;
                }
                self.stack.pop();
                let t = self.pending[v];
                if top.parent == Self::NONE {
                    self.edges.push(t);
                    continue;
                }
                let p = top.parent;
                // Cycle: (p, v), v ~> z, z ~> p. Its heaviest edge is dropped.
                let tree_edge = (p, v, top.parent_cost);
                let (heavy, light) = if t.2 > tree_edge.2 {
                    (t, tree_edge)
                } else {
                    (tree_edge, t)
                };
                self.edges.push(light);
                if heavy.2 < self.pending[p].2 {
                    self.pending[p] = heavy;
                }
            }
        }
        debug_assert_eq!(self.edges.len(), n);
        out.fill_from_edges(n + 1, &self.edges);
    }

    /// MST of the complete graph on `n` nodes from scratch, Prim in O(n^2).
    pub fn build_from_dense(
        &mut self,
        n: usize,
        cost: impl Fn(usize, usize) -> Cost,
        out: &mut Csr,
    ) {
        self.edges.clear();
        self.key.clear();
        self.key.resize(n, Cost::INFINITY);
        self.pred.clear();
        self.pred.resize(n, Self::NONE);
        self.done.clear();
        self.done.resize(n, false);
        if n > 0 {
            self.key[0] = 0.0;
        }
        for _ in 0..n {
            let u = (0..n)
                .filter(|&u| !self.done[u])
                .min_by(|&a, &b| self.key[a].total_cmp(&self.key[b]))
                .unwrap_or(Self::NONE);
            if u == Self::NONE {
                break;
            }
            self.done[u] = true;
            if self.pred[u] != Self::NONE {
                self.edges.push((self.pred[u], u, self.key[u]));
            }
            for v in 0..n {
                if !self.done[v] {
                    let c = cost(u, v);
                    if c < self.key[v] {
                        self.key[v] = c;
                        self.pred[v] = u;
                    }
                }
            }
        }
        out.fill_from_edges(n, &self.edges);
    }
}
