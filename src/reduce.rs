//! Edge deletion by extension: an edge can be deleted if every tree that contains it and
//! reaches far enough is dominated.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::dist::{DistData, DistParams, SpecialDistance};
use crate::ext_tree::{Extension, ExtensionTree};
use crate::graph::{EdgeId, Graph, Vertex};
use crate::STP_EXT_MAXGRAD;

/// Limits of the extension search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtParams {
    /// Number of extension levels on top of the root level.
    pub max_depth: usize,
    /// Largest number of edges attached to a leaf at once. Leaves with more candidate
    /// edges are never extended.
    pub max_ext_size: usize,
}

impl Default for ExtParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_ext_size: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    ZeroDepth,
    ExtSizeOutOfRange(usize),
}

impl Display for ParamsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamsError::ZeroDepth => write!(f, "max_depth must be at least 1"),
            ParamsError::ExtSizeOutOfRange(size) => write!(
                f,
                "max_ext_size is {size}, must be between 1 and {}",
                STP_EXT_MAXGRAD - 1
            ),
        }
    }
}

impl Error for ParamsError {}

impl ExtParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.max_depth == 0 {
            return Err(ParamsError::ZeroDepth);
        }
        if self.max_ext_size == 0 || self.max_ext_size >= STP_EXT_MAXGRAD {
            return Err(ParamsError::ExtSizeOutOfRange(self.max_ext_size));
        }
        Ok(())
    }
}

/// Checks edges of a fixed graph, reusing one extension tree.
pub struct ExtReducer<'a> {
    graph: &'a Graph,
    params: ExtParams,
    tree: ExtensionTree<'a, &'a DistData>,
}

impl<'a> ExtReducer<'a> {
    pub fn new(
        graph: &'a Graph,
        dist: &'a DistData,
        params: ExtParams,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            graph,
            params,
            tree: ExtensionTree::new(graph, dist),
        })
    }

    /// Whether every extension of `e` up to the depth limit is ruled out, in which case
    /// some optimal solution does not use `e`.
    pub fn check_edge(&mut self, e: EdgeId) -> bool {
        let Self {
            graph,
            params,
            tree,
        } = self;
        assert!(!graph.is_free(e), "edge {e} is deleted");
        debug_assert!(tree.is_empty());
        let mut root_level = tree.push_root_level(graph.tail(e));
        let deletable = match root_level.try_extend(graph.tail(e), &[e]) {
            Extension::RuledOut => true,
            Extension::Committed(mut level) => rule_out_subtree(&mut level, graph, params),
        };
        log::trace!("edge {e} ({}, {}) deletable: {deletable}", graph.tail(e), graph.head(e));
        deletable
    }
}

/// Whether a solution may want `v` as a leaf: terminals, and vertices whose prize pays
/// for their connection.
fn must_keep(graph: &Graph, v: Vertex) -> bool {
    graph.is_term(v) || (graph.is_pc() && graph.prize(v) > 0.0)
}

/// Whether some leaf created by the top level has all its extensions ruled out.
fn rule_out_subtree<D: SpecialDistance>(
    tree: &mut ExtensionTree<'_, D>,
    graph: &Graph,
    params: &ExtParams,
) -> bool {
    // The root level does not count.
    if tree.depth() > params.max_depth {
        return false;
    }
    let mut leaves = [0; STP_EXT_MAXGRAD];
    let k = tree.top_new_leaves().len();
    leaves[..k].copy_from_slice(tree.top_new_leaves());
    for &leaf in &leaves[..k] {
        if must_keep(graph, leaf) || graph.degree(leaf) > STP_EXT_MAXGRAD {
            continue;
        }
        let mut candidates = [0; STP_EXT_MAXGRAD];
        let mut n = 0;
        for e in graph.out_edges(leaf) {
            let w = graph.head(e);
            if tree.in_tree(w) {
                continue;
            }
            // Some optimal solution uses only the cheapest of parallel edges.
            match candidates[..n].iter().position(|&f| graph.head(f) == w) {
                Some(i) if graph.cost(e) < graph.cost(candidates[i]) => candidates[i] = e,
                Some(_) => {}
                None => {
                    candidates[n] = e;
                    n += 1;
                }
            }
        }
        if n == 0 {
            log::trace!("optional leaf {leaf} can't be extended");
            return true;
        }
        if n <= params.max_ext_size
            && all_extensions_ruled_out(tree, graph, params, leaf, &candidates[..n])
        {
            return true;
        }
    }
    false
}

/// Whether attaching each nonempty subset of `candidates` to `leaf` is ruled out, directly
/// or further up.
fn all_extensions_ruled_out<D: SpecialDistance>(
    tree: &mut ExtensionTree<'_, D>,
    graph: &Graph,
    params: &ExtParams,
    leaf: Vertex,
    candidates: &[EdgeId],
) -> bool {
    let mut subset = [0; STP_EXT_MAXGRAD];
    for mask in 1u32..(1 << candidates.len()) {
        let mut size = 0;
        for (i, &e) in candidates.iter().enumerate() {
            if mask & (1 << i) != 0 {
                subset[size] = e;
                size += 1;
            }
        }
        match tree.try_extend(leaf, &subset[..size]) {
            Extension::RuledOut => {}
            Extension::Committed(mut level) => {
                if !rule_out_subtree(&mut level, graph, params) {
                    return false;
                }
            }
        }
    }
    true
}

/// Deletes every edge that [ExtReducer::check_edge] rules out, in one sweep over the edges.
/// Distances are recomputed after each deletion. Returns the number of deleted edges.
pub fn reduce_edges(
    graph: &mut Graph,
    dist_params: &DistParams,
    params: &ExtParams,
) -> Result<usize, ParamsError> {
    params.validate()?;
    let mut n_deleted = 0;
    let mut next = 0;
    loop {
        let dist = DistData::new(graph, dist_params);
        let found = {
            let mut reducer = ExtReducer::new(graph, &dist, params.clone())?;
            graph
                .live_edges()
                .filter(|&e| e >= next)
                .find(|&e| reducer.check_edge(e))
        };
        let Some(e) = found else { break };
        log::debug!("deleting edge ({}, {})", graph.tail(e), graph.head(e));
        graph.delete_edge(e);
        n_deleted += 1;
        next = e + 2;
    }
    log::info!("extension deleted {n_deleted} edges");
    Ok(n_deleted)
}
