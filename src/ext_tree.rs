//! The extension tree and its level protocol.
//!
//! The tree starts at a root and grows one level at a time. A level attaches a component
//! (a set of edges) to a vertex `x` that became a leaf on the previous level. Writing
//! `B` for the leaves before the level minus `x`, and `N` for the leaves the level
//! creates, a level goes through:
//!
//! 1. [ExtensionTree::level_init]: the MST over `B` is derived from the previous level and
//!    the component is attached.
//! 2. [ExtensionTree::level_vertical_add_leaf] for each leaf of `N`: special distances to
//!    `B`, ruling out if some distance beats a bottleneck of the tree.
//! 3. [ExtensionTree::level_horizontal_add]: special distances among `N`, same test.
//! 4. [ExtensionTree::level_close]: MST over `B ∪ N` from the MST over `B`.
//! 5. [ExtensionTree::rule_out_periphery]: that MST against the tree cost.
//!
//! [ExtensionTree::level_remove] undoes a level in any state. [ExtensionTree::push_level]
//! and [ExtensionTree::try_extend] wrap it in a guard so that it always happens.

use std::fmt::{Debug, Formatter};

use debug_tree::TreeBuilder;
use scopeguard::ScopeGuard;

use crate::bottleneck::{is_dominated, BottleneckMarks};
use crate::dist::{PcSdMarks, SpecialDistance};
use crate::graph::{EdgeId, Graph, PseudoAncestorHash, Vertex};
use crate::mldists::MultiLevelDists;
use crate::mst::{Csr, CsrDepot, CsrView, Dcmst};
use crate::{Cost, FARAWAY, STP_EXT_MAXGRAD};

/// Per-vertex tree structure.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNodes {
    root: Option<Vertex>,
    deg: Vec<usize>,
    parent: Vec<Option<Vertex>>,
    parent_edge: Vec<Option<EdgeId>>,
    parent_cost: Vec<Cost>,
}

impl TreeNodes {
    pub fn new(n: usize) -> Self {
        Self {
            root: None,
            deg: vec![0; n],
            parent: vec![None; n],
            parent_edge: vec![None; n],
            parent_cost: vec![0.0; n],
        }
    }

    /// Sets the root of an empty tree, or empties a tree that is only a root.
    pub fn set_root(&mut self, root: Option<Vertex>) {
        if let Some(old) = self.root {
            assert_eq!(self.deg[old], 0, "root still has children");
        }
        self.root = root;
    }

    pub fn root(&self) -> Option<Vertex> {
        self.root
    }

    pub fn deg(&self, v: Vertex) -> usize {
        self.deg[v]
    }

    pub fn parent(&self, v: Vertex) -> Option<Vertex> {
        self.parent[v]
    }

    pub fn parent_edge(&self, v: Vertex) -> Option<EdgeId> {
        self.parent_edge[v]
    }

    pub fn parent_cost(&self, v: Vertex) -> Cost {
        self.parent_cost[v]
    }

    pub fn in_tree(&self, v: Vertex) -> bool {
        self.root == Some(v) || self.parent[v].is_some()
    }

    /// Adds the head of `e` to the tree, as a child of its tail.
    pub fn attach(&mut self, graph: &Graph, e: EdgeId) {
        let (t, h) = (graph.tail(e), graph.head(e));
        assert!(self.in_tree(t), "{t} is not in the tree");
        assert!(!self.in_tree(h), "{h} is already in the tree");
        assert!(self.deg[t] < STP_EXT_MAXGRAD, "{t} has maximum degree");
        self.parent[h] = Some(t);
        self.parent_edge[h] = Some(e);
        self.parent_cost[h] = graph.cost(e);
        self.deg[h] = 1;
        self.deg[t] += 1;
    }

    /// Removes the leaf `v` from the tree.
    pub fn detach(&mut self, v: Vertex) {
        let p = self.parent[v].unwrap_or_else(|| panic!("{v} has no parent"));
        assert_eq!(self.deg[v], 1, "{v} is not a leaf");
        self.deg[p] -= 1;
        self.deg[v] = 0;
        self.parent[v] = None;
        self.parent_edge[v] = None;
        self.parent_cost[v] = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelState {
    /// Component attached, no leaf checked yet.
    #[default]
    Init,
    LeafAdded,
    VerticalClosed,
    HorizontalComputed,
    MstBuilt,
    Committed,
    RuledOut,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct LevelRecord {
    /// None for the root level
    extnode: Option<Vertex>,
    edges: Vec<EdgeId>,
    /// Leaves created by this level, in slot order
    new_leaves: Vec<Vertex>,
    /// Number of base leaves of this level
    n_base: usize,
    /// Where extnode was in the leaves, if it stopped being a leaf
    extnode_leaf_pos: Option<usize>,
    n_leaves_before: usize,
    tree_cost_before: Cost,
    inner_prize_before: Cost,
    horizontal_pushed: bool,
    state: LevelState,
}

impl LevelRecord {
    fn reset(&mut self) {
        self.extnode = None;
        self.edges.clear();
        self.new_leaves.clear();
        self.n_base = 0;
        self.extnode_leaf_pos = None;
        self.n_leaves_before = 0;
        self.tree_cost_before = 0.0;
        self.inner_prize_before = 0.0;
        self.horizontal_pushed = false;
        self.state = LevelState::Init;
    }
}

/// Everything a level push and pop must leave unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSnapshot {
    nodes: TreeNodes,
    leaves: Vec<Vertex>,
    tree_cost: Cost,
    inner_prize: Cost,
    levels: Vec<LevelRecord>,
    base_leaves: Vec<Vertex>,
    sds_vertical: MultiLevelDists,
    sds_horizontal: MultiLevelDists,
    msts_levelbase: CsrDepot,
    bottleneck: BottleneckMarks,
    pc_marks: PcSdMarks,
    pseudo_hash: PseudoAncestorHash,
}

/// Removes the top level when dropped.
pub type LevelGuard<'t, 'a, D> =
    ScopeGuard<&'t mut ExtensionTree<'a, D>, fn(&mut ExtensionTree<'a, D>)>;

pub enum Extension<'t, 'a, D: SpecialDistance> {
    /// The level was dominated and has already been removed.
    RuledOut,
    /// The level survived all checks. It is removed when the guard is dropped.
    Committed(LevelGuard<'t, 'a, D>),
}

impl<D: SpecialDistance> Extension<'_, '_, D> {
    pub fn is_ruled_out(&self) -> bool {
        matches!(self, Extension::RuledOut)
    }
}

fn pop_level<D: SpecialDistance>(tree: &mut ExtensionTree<'_, D>) {
    tree.level_remove();
}

pub struct ExtensionTree<'a, D: SpecialDistance> {
    graph: &'a Graph,
    dist: D,
    nodes: TreeNodes,
    leaves: Vec<Vertex>,
    tree_cost: Cost,
    /// Prizes of tree vertices that are not leaves
    inner_prize: Cost,
    /// Records of levels 0..depth; records above are kept for reuse.
    levels: Vec<LevelRecord>,
    depth: usize,
    /// Base leaves of every level: those of level d are a prefix of those of level d + 1.
    base_leaves: Vec<Vertex>,
    sds_vertical: MultiLevelDists,
    sds_horizontal: MultiLevelDists,
    /// MST over the base leaves of each level
    msts_levelbase: CsrDepot,
    bottleneck: BottleneckMarks,
    pc_marks: PcSdMarks,
    pseudo_hash: PseudoAncestorHash,
    dcmst: Dcmst,
    comp_mst: Csr,
    mst_out: Csr,
    mst_tmp: Csr,
    sd_buffer: Vec<Option<Cost>>,
    adj_buffer: Vec<Cost>,
}

impl<'a, D: SpecialDistance> ExtensionTree<'a, D> {
    pub fn new(graph: &'a Graph, dist: D) -> Self {
        let n = graph.n_vertices();
        Self {
            graph,
            dist,
            nodes: TreeNodes::new(n),
            leaves: Vec::with_capacity(n),
            tree_cost: 0.0,
            inner_prize: 0.0,
            levels: vec![],
            depth: 0,
            base_leaves: vec![],
            sds_vertical: MultiLevelDists::new(),
            sds_horizontal: MultiLevelDists::new(),
            msts_levelbase: CsrDepot::new(),
            bottleneck: BottleneckMarks::new(n),
            pc_marks: PcSdMarks::new(n),
            pseudo_hash: PseudoAncestorHash::new(graph),
            dcmst: Dcmst::new(),
            comp_mst: Csr::new(),
            mst_out: Csr::new(),
            mst_tmp: Csr::new(),
            sd_buffer: vec![],
            adj_buffer: vec![],
        }
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Number of levels, the root level included.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn root(&self) -> Option<Vertex> {
        self.nodes.root()
    }

    pub fn nodes(&self) -> &TreeNodes {
        &self.nodes
    }

    pub fn leaves(&self) -> &[Vertex] {
        &self.leaves
    }

    pub fn tree_cost(&self) -> Cost {
        self.tree_cost
    }

    /// Cost the leaves' MST has to beat: the tree cost minus the prizes of inner vertices.
    pub fn periphery_cost(&self) -> Cost {
        self.tree_cost - self.inner_prize
    }

    pub fn tree_deg(&self, v: Vertex) -> usize {
        self.nodes.deg(v)
    }

    pub fn in_tree(&self, v: Vertex) -> bool {
        self.nodes.in_tree(v)
    }

    /// Leaves created by the top level.
    pub fn top_new_leaves(&self) -> &[Vertex] {
        &self.top().new_leaves
    }

    pub fn level_state(&self) -> Option<LevelState> {
        self.depth.checked_sub(1).map(|d| self.levels[d].state)
    }

    pub fn base_leaves(&self) -> &[Vertex] {
        &self.base_leaves
    }

    pub fn sds_vertical(&self) -> &MultiLevelDists {
        &self.sds_vertical
    }

    pub fn sds_horizontal(&self) -> &MultiLevelDists {
        &self.sds_horizontal
    }

    pub fn msts_levelbase(&self) -> &CsrDepot {
        &self.msts_levelbase
    }

    /// MST over all current leaves, available between [Self::level_close] and the end of
    /// [Self::rule_out_periphery].
    pub fn component_mst(&self) -> Option<CsrView<'_>> {
        (self.level_state() == Some(LevelState::MstBuilt)).then(|| self.comp_mst.view())
    }

    /// Special distance, for debugging.
    pub fn ext_get_sd(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        self.dist.sd(u, v)
    }

    /// Special distance in either direction, for debugging.
    pub fn ext_get_sd_double(&self, u: Vertex, v: Vertex) -> Option<Cost> {
        self.dist.sd_double(u, v)
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            nodes: self.nodes.clone(),
            leaves: self.leaves.clone(),
            tree_cost: self.tree_cost,
            inner_prize: self.inner_prize,
            levels: self.levels[..self.depth].to_vec(),
            base_leaves: self.base_leaves.clone(),
            sds_vertical: self.sds_vertical.clone(),
            sds_horizontal: self.sds_horizontal.clone(),
            msts_levelbase: self.msts_levelbase.clone(),
            bottleneck: self.bottleneck.clone(),
            pc_marks: self.pc_marks.clone(),
            pseudo_hash: self.pseudo_hash.clone(),
        }
    }

    fn top(&self) -> &LevelRecord {
        assert!(self.depth > 0, "no level");
        &self.levels[self.depth - 1]
    }

    fn top_mut(&mut self) -> &mut LevelRecord {
        assert!(self.depth > 0, "no level");
        &mut self.levels[self.depth - 1]
    }

    fn push_record(&mut self) -> &mut LevelRecord {
        if self.levels.len() == self.depth {
            self.levels.push(LevelRecord::default());
        }
        self.depth += 1;
        let record = &mut self.levels[self.depth - 1];
        record.reset();
        record
    }

    /// New leaves of `level`, copied out so the tree can be mutated meanwhile.
    fn new_leaves_of(&self, level: usize) -> ([Vertex; STP_EXT_MAXGRAD], usize) {
        let mut buf = [0; STP_EXT_MAXGRAD];
        let leaves = &self.levels[level].new_leaves;
        buf[..leaves.len()].copy_from_slice(leaves);
        (buf, leaves.len())
    }

    /// Starts the tree at `root`.
    pub fn add_root_level(&mut self, root: Vertex) {
        assert!(self.is_empty(), "root level added twice");
        assert!(self.graph.is_alive(root));
        log::trace!("root level at {root}");
        self.nodes.set_root(Some(root));
        self.leaves.push(root);
        let record = self.push_record();
        record.new_leaves.push(root);
        record.horizontal_pushed = true;
        record.state = LevelState::Committed;
        for sds in [&mut self.sds_vertical, &mut self.sds_horizontal] {
            sds.push_level(1, 0);
            sds.fill_next_slot(root, &[], &[]);
            sds.close_top_level();
        }
        self.msts_levelbase.push(&Csr::new());
        self.msts_levelbase.mark_top_final();
    }

    /// [Self::add_root_level], undone when the guard is dropped.
    pub fn push_root_level(&mut self, root: Vertex) -> LevelGuard<'_, 'a, D> {
        self.add_root_level(root);
        scopeguard::guard(self, pop_level::<D> as fn(&mut ExtensionTree<'a, D>))
    }

    /// Opens a level attaching `edges` to `extnode`, which must be a leaf created by the
    /// committed top level.
    pub fn level_init(&mut self, extnode: Vertex, edges: &[EdgeId]) {
        let top = self.top();
        assert_eq!(
            top.state,
            LevelState::Committed,
            "extending a level that is not committed"
        );
        assert!(
            top.new_leaves.contains(&extnode),
            "{extnode} is not a leaf of the top level"
        );
        assert!(!edges.is_empty());
        assert!(
            self.nodes.deg(extnode) + edges.len() <= STP_EXT_MAXGRAD,
            "extension of {extnode} exceeds the maximum degree"
        );
        log::trace!("level {} at {extnode} with {edges:?}", self.depth);
        let parent_level = self.depth - 1;
        self.build_base_mst(parent_level, extnode);
        let n_base = self.base_leaves.len();

        let (n_leaves_before, tree_cost_before, inner_prize_before) =
            (self.leaves.len(), self.tree_cost, self.inner_prize);
        let extnode_leaf_pos = self.leaves.iter().position(|&l| l == extnode);
        assert!(extnode_leaf_pos.is_some(), "{extnode} is not a leaf");
        let becomes_inner = self.nodes.deg(extnode) + edges.len() >= 2;
        let extnode_leaf_pos = extnode_leaf_pos.filter(|_| becomes_inner);
        if let Some(pos) = extnode_leaf_pos {
            self.leaves.remove(pos);
            self.inner_prize += self.graph.prize(extnode);
        }
        for &e in edges {
            assert_eq!(self.graph.tail(e), extnode);
            assert!(!self.graph.is_free(e), "edge {e} is deleted");
            self.nodes.attach(self.graph, e);
            self.pseudo_hash.hash_edge(self.graph, e);
            self.tree_cost += self.graph.cost(e);
            self.leaves.push(self.graph.head(e));
        }

        let graph = self.graph;
        let record = self.push_record();
        record.extnode = Some(extnode);
        record.edges.extend_from_slice(edges);
        if !becomes_inner {
            record.new_leaves.push(extnode);
        }
        record
            .new_leaves
            .extend(edges.iter().map(|&e| graph.head(e)));
        record.n_base = n_base;
        record.extnode_leaf_pos = extnode_leaf_pos;
        record.n_leaves_before = n_leaves_before;
        record.tree_cost_before = tree_cost_before;
        record.inner_prize_before = inner_prize_before;
        let n_new = record.new_leaves.len();
        self.sds_vertical.push_level(n_new, n_base);
    }

    /// Pushes the MST over the base leaves of the level above `parent_level` extended at
    /// `extnode`: those of `parent_level` plus its new leaves other than `extnode`.
    fn build_base_mst(&mut self, parent_level: usize, extnode: Vertex) {
        let (new_leaves, k) = self.new_leaves_of(parent_level);
        let mut inserts = [0; STP_EXT_MAXGRAD];
        let mut n = 0;
        for &v in new_leaves[..k].iter().filter(|&&v| v != extnode) {
            inserts[n] = v;
            n += 1;
        }
        if n == 0 {
            self.msts_levelbase.push_copy_of_top();
        } else {
            self.extend_level_mst(parent_level, &inserts[..n]);
            self.msts_levelbase.push(&self.mst_out);
        }
        self.msts_levelbase.mark_top_final();
        self.base_leaves.extend_from_slice(&inserts[..n]);
    }

    /// Writes to `mst_out` the MST over the base leaves of `level` followed by `inserts`,
    /// which must be new leaves of `level`, by one-node insertions into the level's base
    /// MST. Reads the closed distance levels of `level`.
    fn extend_level_mst(&mut self, level: usize, inserts: &[Vertex]) {
        let Self {
            msts_levelbase,
            sds_vertical,
            sds_horizontal,
            dcmst,
            mst_out,
            mst_tmp,
            adj_buffer,
            ..
        } = self;
        let base = msts_levelbase.entry(level);
        debug_assert_eq!(base.n_nodes(), sds_vertical.level_n_targets(level));
        for (i, &v) in inserts.iter().enumerate() {
            let slot = sds_vertical
                .slot_of(level, v)
                .unwrap_or_else(|| panic!("{v} is not a new leaf of level {level}"));
            assert!(sds_vertical.is_closed(level) && sds_horizontal.is_closed(level));
            adj_buffer.clear();
            adj_buffer.extend(
                sds_vertical
                    .level_dists(level, slot)
                    .iter()
                    .map(|d| d.unwrap_or(FARAWAY)),
            );
            adj_buffer.extend(
                inserts[..i]
                    .iter()
                    .map(|&w| sds_horizontal.target_dist(level, v, w).unwrap_or(FARAWAY)),
            );
            if i == 0 {
                dcmst.add_node(base, adj_buffer, mst_out);
            } else {
                dcmst.add_node(mst_out.view(), adj_buffer, mst_tmp);
                std::mem::swap(mst_out, mst_tmp);
            }
        }
    }

    fn ext_edge_cost(&self, leaf: Vertex) -> Option<Cost> {
        let top = self.top();
        (self.nodes.parent(leaf).is_some() && self.nodes.parent(leaf) == top.extnode)
            .then(|| self.nodes.parent_cost(leaf))
    }

    fn rule_out_top(&mut self, why: &str) -> bool {
        log::debug!(
            "ruled out level {} at {:?} ({why})",
            self.depth - 1,
            self.top().extnode
        );
        self.top_mut().state = LevelState::RuledOut;
        true
    }

    /// Computes the special distances from `leaf` to `targets` into `sd_buffer`.
    fn fill_sd_buffer(&mut self, leaf: Vertex, targets: &[Vertex]) {
        self.sd_buffer.clear();
        if self.graph.is_pc() {
            let scope = self.pc_marks.mark(self.graph, leaf);
            self.sd_buffer
                .extend(targets.iter().map(|&t| scope.sd(&self.dist, t)));
        } else {
            let dist = &self.dist;
            self.sd_buffer
                .extend(targets.iter().map(|&t| dist.sd_double(leaf, t)));
        }
    }

    /// Whether some distance in `sd_buffer` from `leaf` to `targets` dominates the tree.
    fn sd_buffer_dominates(&mut self, leaf: Vertex, targets: &[Vertex]) -> bool {
        let ext_cost = self.ext_edge_cost(leaf);
        let marked = self
            .bottleneck
            .mark_root_path(self.graph, &self.nodes, leaf);
        targets
            .iter()
            .zip(&self.sd_buffer)
            .any(|(&t, &sd)| is_dominated(sd, marked.bottleneck_dist(t), ext_cost))
    }

    /// Checks the next new leaf of the top level against the base leaves. Returns whether
    /// the level is ruled out; if so the leaf's slot stays empty.
    pub fn level_vertical_add_leaf(&mut self, leaf: Vertex) -> bool {
        let d = self.depth - 1;
        let top = self.top();
        assert!(
            matches!(top.state, LevelState::Init | LevelState::LeafAdded),
            "adding a leaf in state {:?}",
            top.state
        );
        let slot = self.sds_vertical.level_n_slots(d);
        assert_eq!(top.new_leaves[slot], leaf, "leaves must be added in order");
        let n_base = top.n_base;
        if let Some(e) = self.nodes.parent_edge(leaf) {
            if self.pseudo_hash.edge_has_conflict(self.graph, e) {
                return self.rule_out_top("pseudo-ancestor conflict");
            }
        }
        let base = std::mem::take(&mut self.base_leaves);
        self.fill_sd_buffer(leaf, &base[..n_base]);
        let dominated = self.sd_buffer_dominates(leaf, &base[..n_base]);
        if !dominated {
            self.sds_vertical
                .fill_next_slot(leaf, &base[..n_base], &self.sd_buffer);
        }
        self.base_leaves = base;
        if dominated {
            return self.rule_out_top("vertical bottleneck");
        }
        self.top_mut().state = LevelState::LeafAdded;
        false
    }

    pub fn level_vertical_close(&mut self) {
        assert_eq!(self.top().state, LevelState::LeafAdded);
        self.sds_vertical.close_top_level();
        self.top_mut().state = LevelState::VerticalClosed;
    }

    /// Computes the special distances between the new leaves of the top level. Returns
    /// whether the level is ruled out.
    pub fn level_horizontal_add(&mut self) -> bool {
        assert_eq!(self.top().state, LevelState::VerticalClosed);
        let (new_leaves, k) = self.new_leaves_of(self.depth - 1);
        self.sds_horizontal.push_level(k, k - 1);
        self.top_mut().horizontal_pushed = true;
        let mut siblings = [0; STP_EXT_MAXGRAD];
        for i in 0..k {
            let leaf = new_leaves[i];
            let mut n = 0;
            for &w in new_leaves[..k].iter().filter(|&&w| w != leaf) {
                siblings[n] = w;
                n += 1;
            }
            self.fill_sd_buffer(leaf, &siblings[..n]);
            if self.sd_buffer_dominates(leaf, &siblings[..n]) {
                return self.rule_out_top("horizontal bottleneck");
            }
            self.sds_horizontal
                .fill_next_slot(leaf, &siblings[..n], &self.sd_buffer);
        }
        self.top_mut().state = LevelState::HorizontalComputed;
        false
    }

    /// Closes the horizontal distances and builds the MST over all leaves.
    pub fn level_close(&mut self) {
        assert_eq!(self.top().state, LevelState::HorizontalComputed);
        self.sds_horizontal.close_top_level();
        let d = self.depth - 1;
        let (new_leaves, k) = self.new_leaves_of(d);
        self.extend_level_mst(d, &new_leaves[..k]);
        std::mem::swap(&mut self.comp_mst, &mut self.mst_out);
        self.top_mut().state = LevelState::MstBuilt;
    }

    /// Runs the remaining checks of the top level. Returns whether it is ruled out;
    /// otherwise the level is committed and can be extended.
    pub fn rule_out_periphery(&mut self) -> bool {
        let state = self.top().state;
        match state {
            LevelState::RuledOut => return true,
            LevelState::Committed => return false,
            LevelState::Init | LevelState::LeafAdded => {
                let (new_leaves, k) = self.new_leaves_of(self.depth - 1);
                let filled = self.sds_vertical.level_n_slots(self.depth - 1);
                for &leaf in &new_leaves[filled..k] {
                    if self.level_vertical_add_leaf(leaf) {
                        return true;
                    }
                }
                self.level_vertical_close();
            }
            _ => {}
        }
        if self.top().state == LevelState::VerticalClosed && self.level_horizontal_add() {
            return true;
        }
        if self.top().state == LevelState::HorizontalComputed {
            self.level_close();
        }
        debug_assert_eq!(self.top().state, LevelState::MstBuilt);
        let weight = self.comp_mst.weight();
        if !self.has_inner_terminal() && weight < self.periphery_cost() {
            return self.rule_out_top("leaves MST");
        }
        self.top_mut().state = LevelState::Committed;
        false
    }

    /// Whether a terminal that can't be left out is inside the tree. Prize-collecting
    /// terminals can, at the cost of their prize.
    fn has_inner_terminal(&self) -> bool {
        !self.graph.is_pc()
            && self.levels[..self.depth].iter().any(|l| {
                l.extnode_leaf_pos.is_some() && l.extnode.is_some_and(|x| self.graph.is_term(x))
            })
    }

    /// Removes the top level, whatever its state, restoring the tree to how it was before
    /// the level was added.
    pub fn level_remove(&mut self) {
        let d = self.depth - 1;
        log::trace!("removing level {d}");
        let record = &self.levels[d];
        if record.horizontal_pushed {
            self.sds_horizontal.remove_top_level();
        }
        self.sds_vertical.remove_top_level();
        self.msts_levelbase.remove_top();
        let Some(extnode) = record.extnode else {
            debug_assert_eq!(d, 0);
            self.leaves.clear();
            self.nodes.set_root(None);
            self.depth = 0;
            return;
        };
        for &e in record.edges.iter().rev() {
            self.pseudo_hash.unhash_edge(self.graph, e);
            self.nodes.detach(self.graph.head(e));
        }
        let removed = record.extnode_leaf_pos.is_some() as usize;
        self.leaves.truncate(record.n_leaves_before - removed);
        if let Some(pos) = record.extnode_leaf_pos {
            self.leaves.insert(pos, extnode);
        }
        self.tree_cost = record.tree_cost_before;
        self.inner_prize = record.inner_prize_before;
        self.base_leaves.truncate(self.levels[d - 1].n_base);
        self.depth -= 1;
    }

    /// [Self::level_init], undone when the guard is dropped.
    pub fn push_level(&mut self, extnode: Vertex, edges: &[EdgeId]) -> LevelGuard<'_, 'a, D> {
        self.level_init(extnode, edges);
        scopeguard::guard(self, pop_level::<D> as fn(&mut ExtensionTree<'a, D>))
    }

    /// Adds a level and runs all its checks. A ruled out level is removed right away.
    pub fn try_extend(&mut self, extnode: Vertex, edges: &[EdgeId]) -> Extension<'_, 'a, D> {
        let mut level = self.push_level(extnode, edges);
        if level.rule_out_periphery() {
            Extension::RuledOut
        } else {
            Extension::Committed(level)
        }
    }

    fn subtree_dbg(&self, v: Vertex, builder: &TreeBuilder) {
        let _b = builder.add_branch(&format!(
            "[{v}] deg {} cost {}",
            self.nodes.deg(v),
            self.nodes.parent_cost(v)
        ));
        for w in 0..self.graph.n_vertices() {
            if self.nodes.parent(w) == Some(v) {
                self.subtree_dbg(w, builder);
            }
        }
    }
}

impl<D: SpecialDistance> Debug for ExtensionTree<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let builder = TreeBuilder::new();
        let _b = builder.add_branch(&format!(
            "ExtensionTree depth {} cost {} leaves {:?} state {:?}",
            self.depth,
            self.tree_cost,
            self.leaves,
            self.level_state()
        ));
        if let Some(root) = self.nodes.root() {
            self.subtree_dbg(root, &builder);
        }
        writeln!(f, "{}", builder.string())
    }
}
