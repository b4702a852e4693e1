//! Extension-tree reductions for Steiner tree problems.
//!
//! An extension tree is grown level by level from a root edge. Every level is checked
//! against special distances (cheap upper bounds on connection costs) through
//! bottleneck and MST arguments; a branch whose every extension is dominated can be
//! pruned, and an edge whose every extension tree is pruned can be deleted.

pub mod bottleneck;
pub mod dist;
pub mod ext_tree;
pub mod graph;
pub mod mldists;
pub mod mst;
pub mod reduce;

pub use dist::{DistData, DistParams, SpecialDistance};
pub use ext_tree::{Extension, ExtensionTree, LevelGuard, LevelState, TreeSnapshot};
pub use graph::Graph;
pub use reduce::{reduce_edges, ExtParams, ExtReducer, ParamsError};

/// Edge costs, distances and prizes.
pub type Cost = f64;

/// Anything at or above this is treated as infinite.
pub const FARAWAY: Cost = 1e15;

/// Maximum degree of a vertex inside an extension tree.
pub const STP_EXT_MAXGRAD: usize = 8;

/// Whether `c` should be treated as infinite.
pub fn is_faraway(c: Cost) -> bool {
    c >= FARAWAY
}
