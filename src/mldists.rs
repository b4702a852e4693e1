//! Multi-level distance store.
//!
//! A stack of levels. Each level is a list of slots, and each slot holds the distances
//! from a base vertex to a fixed number of targets. Only the top level can be written,
//! and a level can only be read once it is closed, which happens when all its slots are
//! filled.

use crate::graph::Vertex;
use crate::Cost;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LevelInfo {
    slot_start: usize,
    target_start: usize,
    max_slots: usize,
    n_slots: usize,
    n_targets: usize,
    closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiLevelDists {
    levels: Vec<LevelInfo>,
    /// One per slot
    base_ids: Vec<Vertex>,
    /// n_targets per slot
    target_ids: Vec<Vertex>,
    dists: Vec<Option<Cost>>,
}

impl MultiLevelDists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new top level for `max_slots` slots with `n_targets` targets each.
    pub fn push_level(&mut self, max_slots: usize, n_targets: usize) {
        assert!(
            self.is_top_closed(),
            "pushing a level on top of an open level"
        );
        self.levels.push(LevelInfo {
            slot_start: self.base_ids.len(),
            target_start: self.target_ids.len(),
            max_slots,
            n_slots: 0,
            n_targets,
            closed: false,
        });
    }

    pub fn fill_next_slot(&mut self, base: Vertex, target_ids: &[Vertex], dists: &[Option<Cost>]) {
        let top = self.levels.last_mut().expect("no level to fill");
        assert!(!top.closed, "filling a closed level");
        assert!(top.n_slots < top.max_slots, "level is already full");
        assert_eq!(target_ids.len(), top.n_targets);
        assert_eq!(dists.len(), top.n_targets);
        debug_assert!(dists.iter().flatten().all(|&d| d >= 0.0));
        top.n_slots += 1;
        self.base_ids.push(base);
        self.target_ids.extend_from_slice(target_ids);
        self.dists.extend_from_slice(dists);
    }

    pub fn close_top_level(&mut self) {
        let top = self.levels.last_mut().expect("no level to close");
        assert!(!top.closed, "level closed twice");
        assert_eq!(top.n_slots, top.max_slots, "closing a level that is not full");
        top.closed = true;
    }

    /// Pops the top level, whether it is closed or not.
    pub fn remove_top_level(&mut self) {
        let top = self.levels.pop().expect("no level to remove");
        self.base_ids.truncate(top.slot_start);
        self.target_ids.truncate(top.target_start);
        self.dists.truncate(top.target_start);
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn top_level(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    /// True also if there are no levels.
    pub fn is_top_closed(&self) -> bool {
        self.levels.last().map_or(true, |l| l.closed)
    }

    pub fn is_closed(&self, level: usize) -> bool {
        self.levels[level].closed
    }

    pub fn level_n_slots(&self, level: usize) -> usize {
        self.levels[level].n_slots
    }

    pub fn level_n_targets(&self, level: usize) -> usize {
        self.levels[level].n_targets
    }

    pub fn level_base(&self, level: usize, slot: usize) -> Vertex {
        let l = &self.levels[level];
        assert!(slot < l.n_slots);
        self.base_ids[l.slot_start + slot]
    }

    pub fn level_targets(&self, level: usize, slot: usize) -> &[Vertex] {
        let start = self.slot_target_start(level, slot);
        &self.target_ids[start..start + self.levels[level].n_targets]
    }

    pub fn level_dists(&self, level: usize, slot: usize) -> &[Option<Cost>] {
        let start = self.slot_target_start(level, slot);
        &self.dists[start..start + self.levels[level].n_targets]
    }

    fn slot_target_start(&self, level: usize, slot: usize) -> usize {
        let l = &self.levels[level];
        assert!(slot < l.n_slots);
        l.target_start + slot * l.n_targets
    }

    pub fn slot_of(&self, level: usize, base: Vertex) -> Option<usize> {
        let l = &self.levels[level];
        self.base_ids[l.slot_start..l.slot_start + l.n_slots]
            .iter()
            .position(|&b| b == base)
    }

    /// Distance stored in `level` from `base` to `target`. The level must be closed,
    /// and both `base` and `target` must be in it.
    pub fn target_dist(&self, level: usize, base: Vertex, target: Vertex) -> Option<Cost> {
        assert!(self.levels[level].closed, "reading level {level} before it is closed");
        let slot = self
            .slot_of(level, base)
            .unwrap_or_else(|| panic!("{base} is not a base of level {level}"));
        let i = self
            .level_targets(level, slot)
            .iter()
            .position(|&t| t == target)
            .unwrap_or_else(|| panic!("{target} is not a target of {base} in level {level}"));
        self.level_dists(level, slot)[i]
    }
}
