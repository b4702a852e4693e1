//! Edge-list graph store.
//!
//! Every undirected edge is a pair of directed edges `e` and `e ^ 1`, allocated and
//! freed together. Each vertex keeps a doubly-linked list of its outgoing and of its
//! incoming edges, so edges can be linked and unlinked in O(1). Edge ids stay stable
//! until [Graph::pack].

use std::fmt::{Debug, Formatter};

use debug_tree::TreeBuilder;
use derivative::Derivative;

use crate::Cost;

pub mod provenance;

pub use provenance::Provenance;

pub type Vertex = usize;
pub type EdgeId = usize;

fn idx_fmt(u: &usize, f: &mut Formatter) -> std::fmt::Result {
    if *u == Graph::EMPTY {
        write!(f, "∅")
    } else {
        write!(f, "{u}")
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
struct VertexData {
    term: bool,
    removed: bool,
    degree: usize,
    /// First outgoing edge
    #[derivative(Debug(format_with = "idx_fmt"))]
    outbeg: EdgeId,
    /// First incoming edge
    #[derivative(Debug(format_with = "idx_fmt"))]
    inpbeg: EdgeId,
    /// Ancestors of edges contracted into this vertex
    ancestors: Provenance,
}

impl VertexData {
    fn new(term: bool) -> Self {
        Self {
            term,
            removed: false,
            degree: 0,
            outbeg: Graph::EMPTY,
            inpbeg: Graph::EMPTY,
            ancestors: Provenance::empty(),
        }
    }
}

#[derive(Derivative, Clone, Copy)]
#[derivative(Debug)]
struct EdgeData {
    tail: Vertex,
    head: Vertex,
    cost: Cost,
    /// Next outgoing edge of tail
    #[derivative(Debug(format_with = "idx_fmt"))]
    oeat: EdgeId,
    #[derivative(Debug(format_with = "idx_fmt"))]
    oprev: EdgeId,
    /// Next incoming edge of head
    #[derivative(Debug(format_with = "idx_fmt"))]
    ieat: EdgeId,
    #[derivative(Debug(format_with = "idx_fmt"))]
    iprev: EdgeId,
}

impl EdgeData {
    fn new(tail: Vertex, head: Vertex, cost: Cost) -> Self {
        Self {
            tail,
            head,
            cost,
            oeat: Graph::EMPTY,
            oprev: Graph::EMPTY,
            ieat: Graph::EMPTY,
            iprev: Graph::EMPTY,
        }
    }
}

/// Data shared by both directions of an edge.
#[derive(Debug, Clone)]
struct PairData {
    free: bool,
    ancestors: Provenance,
    pseudo_ancestors: Provenance,
}

/// Old to new ids after [Graph::pack]. `None` for discarded vertices and edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackMap {
    pub vertices: Vec<Option<Vertex>>,
    pub edges: Vec<Option<EdgeId>>,
}

#[derive(Clone)]
pub struct Graph {
    vertices: Vec<VertexData>,
    edges: Vec<EdgeData>,
    pairs: Vec<PairData>,
    /// Only for prize-collecting graphs.
    prizes: Option<Vec<Cost>>,
    n_live_pairs: usize,
    next_ancestor: usize,
    next_pseudo_ancestor: usize,
}

impl Graph {
    /// Returned when there is no such vertex or edge.
    pub const EMPTY: usize = usize::MAX;

    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    pub fn with_capacity(n_vertices: usize, n_edges: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(n_vertices),
            edges: Vec::with_capacity(n_edges),
            pairs: Vec::with_capacity(n_edges / 2),
            prizes: None,
            n_live_pairs: 0,
            next_ancestor: 0,
            next_pseudo_ancestor: 0,
        }
    }

    /// New prize-collecting graph. All vertices start with prize 0.
    pub fn new_pc() -> Self {
        Self {
            prizes: Some(vec![]),
            ..Self::new()
        }
    }

    pub fn add_vertex(&mut self, term: bool) -> Vertex {
        let v = self.vertices.len();
        self.vertices.push(VertexData::new(term));
        if let Some(prizes) = &mut self.prizes {
            prizes.push(0.0);
        }
        v
    }

    /// Adds an edge pair. Returns `e`, with `tail -> head` costing `cost` and its twin
    /// `e + 1` (`head -> tail`) costing `cost_rev`.
    pub fn add_edge(&mut self, tail: Vertex, head: Vertex, cost: Cost, cost_rev: Cost) -> EdgeId {
        assert_ne!(tail, head, "self loops are not supported");
        assert!(self.is_alive(tail) && self.is_alive(head));
        assert!(cost >= 0.0 && cost_rev >= 0.0);
        let e = self.edges.len();
        self.edges.push(EdgeData::new(tail, head, cost));
        self.edges.push(EdgeData::new(head, tail, cost_rev));
        self.link(e);
        self.link(e + 1);
        self.vertices[tail].degree += 1;
        self.vertices[head].degree += 1;
        self.pairs.push(PairData {
            free: false,
            ancestors: Provenance::single(self.next_ancestor),
            pseudo_ancestors: Provenance::single(self.next_pseudo_ancestor),
        });
        self.next_ancestor += 1;
        self.next_pseudo_ancestor += 1;
        self.n_live_pairs += 1;
        e
    }

    /// Deletes both directions of `e`. Returns false if the edge was already deleted.
    pub fn delete_edge(&mut self, e: EdgeId) -> bool {
        let e = e & !1;
        let pair = &mut self.pairs[e / 2];
        if pair.free {
            return false;
        }
        pair.free = true;
        pair.ancestors = Provenance::empty();
        pair.pseudo_ancestors = Provenance::empty();
        self.unlink(e);
        self.unlink(e + 1);
        let EdgeData { tail, head, .. } = self.edges[e];
        self.vertices[tail].degree -= 1;
        self.vertices[head].degree -= 1;
        self.n_live_pairs -= 1;
        true
    }

    /// Deletes all edges of `v` and marks it as removed.
    pub fn delete_vertex(&mut self, v: Vertex) {
        while self.vertices[v].outbeg != Self::EMPTY {
            self.delete_edge(self.vertices[v].outbeg);
        }
        debug_assert_eq!(self.vertices[v].degree, 0);
        self.vertices[v].removed = true;
    }

    /// Merges `remove` into `keep`.
    ///
    /// Edges between the two are contracted and their ancestors move to `keep`.
    /// Parallel edges that appear keep the cheaper cost per direction, and the
    /// ancestors of every edge that provided a surviving cost.
    pub fn contract_vertices(&mut self, keep: Vertex, remove: Vertex) {
        assert_ne!(keep, remove);
        assert!(self.is_alive(keep) && self.is_alive(remove));
        assert!(
            self.degree(keep) > 0 || self.degree(remove) > 0,
            "cannot contract two isolated vertices"
        );
        let mut merged = self.vertices[keep]
            .ancestors
            .merge(&self.vertices[remove].ancestors);
        while let Some(e) = self.find_edge(remove, keep) {
            merged = merged.merge(&self.pairs[e / 2].ancestors);
            self.delete_edge(e);
        }
        let edges: Vec<EdgeId> = self.out_edges(remove).collect();
        for e in edges {
            let w = self.head(e);
            match self.find_edge(keep, w) {
                Some(f) => self.merge_parallel(f, e),
                None => self.rehome(e, keep),
            }
        }
        debug_assert_eq!(self.degree(remove), 0);
        log::trace!("contracted {remove} into {keep}");

        let term = self.vertices[remove].term;
        let vk = &mut self.vertices[keep];
        vk.term |= term;
        vk.ancestors = merged;
        let vr = &mut self.vertices[remove];
        vr.removed = true;
        vr.ancestors = Provenance::empty();
        if let Some(prizes) = &mut self.prizes {
            let prize = std::mem::take(&mut prizes[remove]);
            prizes[keep] += prize;
        }
    }

    /// `f` and `e` connect the same endpoints in the same direction. Keeps `f` with the
    /// cheaper costs, and deletes `e`.
    fn merge_parallel(&mut self, f: EdgeId, e: EdgeId) {
        let fwd_wins = self.cost(e) < self.cost(f);
        let bwd_wins = self.cost(e ^ 1) < self.cost(f ^ 1);
        if fwd_wins || bwd_wins {
            let (pf, pe) = (&self.pairs[f / 2], &self.pairs[e / 2]);
            let (ancestors, pseudo_ancestors) = if fwd_wins && bwd_wins {
                (pe.ancestors.clone(), pe.pseudo_ancestors.clone())
            } else {
                (
                    pf.ancestors.merge(&pe.ancestors),
                    pf.pseudo_ancestors.merge(&pe.pseudo_ancestors),
                )
            };
            if fwd_wins {
                self.edges[f].cost = self.edges[e].cost;
            }
            if bwd_wins {
                self.edges[f ^ 1].cost = self.edges[e ^ 1].cost;
            }
            let pf = &mut self.pairs[f / 2];
            pf.ancestors = ancestors;
            pf.pseudo_ancestors = pseudo_ancestors;
        }
        self.delete_edge(e);
    }

    /// Moves the tail of `e` (and head of its twin) to `v`.
    fn rehome(&mut self, e: EdgeId, v: Vertex) {
        let old = self.edges[e].tail;
        self.unlink(e);
        self.unlink(e ^ 1);
        self.edges[e].tail = v;
        self.edges[e ^ 1].head = v;
        self.link(e);
        self.link(e ^ 1);
        self.vertices[old].degree -= 1;
        self.vertices[v].degree += 1;
    }

    /// Renumbers live vertices and edges contiguously, dropping removed vertices and
    /// deleted edges. Relative order is preserved.
    pub fn pack(&mut self) -> PackMap {
        let mut vmap = vec![None; self.vertices.len()];
        let old_vertices = std::mem::take(&mut self.vertices);
        let old_edges = std::mem::take(&mut self.edges);
        let old_pairs = std::mem::take(&mut self.pairs);
        let old_prizes = self.prizes.take();
        let mut prizes = old_prizes.as_ref().map(|_| vec![]);
        for (v, data) in old_vertices.into_iter().enumerate() {
            if data.removed {
                continue;
            }
            vmap[v] = Some(self.vertices.len());
            self.vertices.push(VertexData {
                degree: 0,
                outbeg: Self::EMPTY,
                inpbeg: Self::EMPTY,
                ..data
            });
            if let (Some(new), Some(old)) = (&mut prizes, &old_prizes) {
                new.push(old[v]);
            }
        }
        self.prizes = prizes;
        let mut emap = vec![None; old_edges.len()];
        for (p, pair) in old_pairs.into_iter().enumerate() {
            if pair.free {
                continue;
            }
            let old_e = 2 * p;
            let new_e = self.edges.len();
            for d in 0..2 {
                let EdgeData {
                    tail, head, cost, ..
                } = old_edges[old_e + d];
                let (tail, head) = (
                    vmap[tail].expect("live edge on removed vertex"),
                    vmap[head].expect("live edge on removed vertex"),
                );
                self.edges.push(EdgeData::new(tail, head, cost));
                self.link(new_e + d);
                emap[old_e + d] = Some(new_e + d);
            }
            let EdgeData { tail, head, .. } = self.edges[new_e];
            self.vertices[tail].degree += 1;
            self.vertices[head].degree += 1;
            self.pairs.push(pair);
        }
        debug_assert_eq!(self.pairs.len(), self.n_live_pairs);
        log::debug!(
            "packed graph to {} vertices and {} edges",
            self.vertices.len(),
            self.edges.len()
        );
        PackMap {
            vertices: vmap,
            edges: emap,
        }
    }

    // Adds e in front of the out list of its tail and of the in list of its head.
    fn link(&mut self, e: EdgeId) {
        let EdgeData { tail, head, .. } = self.edges[e];
        let ob = self.vertices[tail].outbeg;
        self.edges[e].oeat = ob;
        self.edges[e].oprev = Self::EMPTY;
        if ob != Self::EMPTY {
            self.edges[ob].oprev = e;
        }
        self.vertices[tail].outbeg = e;

        let ib = self.vertices[head].inpbeg;
        self.edges[e].ieat = ib;
        self.edges[e].iprev = Self::EMPTY;
        if ib != Self::EMPTY {
            self.edges[ib].iprev = e;
        }
        self.vertices[head].inpbeg = e;
    }

    fn unlink(&mut self, e: EdgeId) {
        let EdgeData {
            tail,
            head,
            oeat,
            oprev,
            ieat,
            iprev,
            ..
        } = self.edges[e];
        if oprev == Self::EMPTY {
            self.vertices[tail].outbeg = oeat;
        } else {
            self.edges[oprev].oeat = oeat;
        }
        if oeat != Self::EMPTY {
            self.edges[oeat].oprev = oprev;
        }
        if iprev == Self::EMPTY {
            self.vertices[head].inpbeg = ieat;
        } else {
            self.edges[iprev].ieat = ieat;
        }
        if ieat != Self::EMPTY {
            self.edges[ieat].iprev = iprev;
        }
        let data = &mut self.edges[e];
        data.oeat = Self::EMPTY;
        data.oprev = Self::EMPTY;
        data.ieat = Self::EMPTY;
        data.iprev = Self::EMPTY;
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edge slots, deleted ones included.
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of undirected edges that are not deleted.
    pub fn n_live_edges(&self) -> usize {
        self.n_live_pairs
    }

    pub fn degree(&self, v: Vertex) -> usize {
        self.vertices[v].degree
    }

    pub fn is_term(&self, v: Vertex) -> bool {
        self.vertices[v].term
    }

    pub fn set_terminal(&mut self, v: Vertex, term: bool) {
        self.vertices[v].term = term;
    }

    pub fn is_alive(&self, v: Vertex) -> bool {
        v < self.vertices.len() && !self.vertices[v].removed
    }

    pub fn is_pc(&self) -> bool {
        self.prizes.is_some()
    }

    /// Prize of `v`, 0 for graphs that are not prize-collecting.
    pub fn prize(&self, v: Vertex) -> Cost {
        self.prizes.as_ref().map_or(0.0, |p| p[v])
    }

    pub fn prizes(&self) -> Option<&[Cost]> {
        self.prizes.as_deref()
    }

    pub fn set_prize(&mut self, v: Vertex, prize: Cost) {
        assert!(prize >= 0.0);
        let prizes = self
            .prizes
            .as_mut()
            .expect("prizes only exist on prize-collecting graphs");
        prizes[v] = prize;
    }

    pub fn tail(&self, e: EdgeId) -> Vertex {
        self.edges[e].tail
    }

    pub fn head(&self, e: EdgeId) -> Vertex {
        self.edges[e].head
    }

    pub fn cost(&self, e: EdgeId) -> Cost {
        self.edges[e].cost
    }

    /// The antiparallel edge of `e`.
    pub fn twin(e: EdgeId) -> EdgeId {
        e ^ 1
    }

    pub fn is_free(&self, e: EdgeId) -> bool {
        self.pairs[e / 2].free
    }

    pub fn ancestors(&self, e: EdgeId) -> &Provenance {
        &self.pairs[e / 2].ancestors
    }

    pub fn pseudo_ancestors(&self, e: EdgeId) -> &Provenance {
        &self.pairs[e / 2].pseudo_ancestors
    }

    /// Adds the pseudo-ancestors of `from` to those of `e`, so that the two edges conflict.
    pub fn copy_pseudo_ancestors(&mut self, e: EdgeId, from: EdgeId) {
        assert!(!self.is_free(e) && !self.is_free(from));
        let merged = self.pairs[e / 2]
            .pseudo_ancestors
            .merge(&self.pairs[from / 2].pseudo_ancestors);
        self.pairs[e / 2].pseudo_ancestors = merged;
    }

    /// Number of pseudo-ancestor ids handed out so far. All ids are below this.
    pub fn n_pseudo_ancestor_ids(&self) -> usize {
        self.next_pseudo_ancestor
    }

    pub fn vertex_ancestors(&self, v: Vertex) -> &Provenance {
        &self.vertices[v].ancestors
    }

    /// Some edge from u to v.
    pub fn find_edge(&self, u: Vertex, v: Vertex) -> Option<EdgeId> {
        self.out_edges(u).find(|&e| self.head(e) == v)
    }

    pub fn out_edges(&self, v: Vertex) -> OutEdges<'_> {
        OutEdges {
            g: self,
            e: self.vertices[v].outbeg,
        }
    }

    pub fn in_edges(&self, v: Vertex) -> InEdges<'_> {
        InEdges {
            g: self,
            e: self.vertices[v].inpbeg,
        }
    }

    /// One id per live undirected edge: the even edge of each pair.
    pub fn live_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.pairs.len())
            .filter(|&p| !self.pairs[p].free)
            .map(|p| 2 * p)
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = Vertex> + '_ {
        (0..self.vertices.len()).filter(|&v| !self.vertices[v].removed)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Graph {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let builder = TreeBuilder::new();
        let _b = builder.add_branch(&format!(
            "Graph ({} vertices, {} edges)",
            self.vertices.len(),
            self.n_live_pairs
        ));
        for v in self.vertex_ids() {
            let _v = builder.add_branch(&format!(
                "[{v}]{} degree {} prize {}",
                if self.is_term(v) { " terminal" } else { "" },
                self.degree(v),
                self.prize(v),
            ));
            for e in self.out_edges(v) {
                builder.add_leaf(&format!("{e}: -> {} ({})", self.head(e), self.cost(e)));
            }
        }
        writeln!(f, "{}", builder.string())
    }
}

pub struct OutEdges<'a> {
    g: &'a Graph,
    e: EdgeId,
}

impl Iterator for OutEdges<'_> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<EdgeId> {
        if self.e == Graph::EMPTY {
            return None;
        }
        let e = self.e;
        self.e = self.g.edges[e].oeat;
        Some(e)
    }
}

pub struct InEdges<'a> {
    g: &'a Graph,
    e: EdgeId,
}

impl Iterator for InEdges<'_> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<EdgeId> {
        if self.e == Graph::EMPTY {
            return None;
        }
        let e = self.e;
        self.e = self.g.edges[e].ieat;
        Some(e)
    }
}

/// Counts how often each pseudo-ancestor is used by a set of edges, so that adding an
/// edge whose pseudo-ancestors are already used can be detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoAncestorHash {
    counts: Vec<u32>,
}

impl PseudoAncestorHash {
    pub fn new(graph: &Graph) -> Self {
        Self {
            counts: vec![0; graph.n_pseudo_ancestor_ids()],
        }
    }

    pub fn hash_edge(&mut self, graph: &Graph, e: EdgeId) {
        for id in graph.pseudo_ancestors(e).iter() {
            self.counts[id] += 1;
        }
    }

    pub fn unhash_edge(&mut self, graph: &Graph, e: EdgeId) {
        for id in graph.pseudo_ancestors(e).iter() {
            assert!(self.counts[id] > 0, "unhashing edge {e} that was not hashed");
            self.counts[id] -= 1;
        }
    }

    pub fn is_hashed(&self, id: usize) -> bool {
        self.counts[id] > 0
    }

    /// Whether a pseudo-ancestor of the hashed edge `e` is also used by another hashed
    /// edge.
    pub fn edge_has_conflict(&self, graph: &Graph, e: EdgeId) -> bool {
        graph.pseudo_ancestors(e).iter().any(|id| self.counts[id] > 1)
    }

    pub fn is_clean(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }
}
