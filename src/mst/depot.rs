use super::{Csr, CsrView};
use crate::Cost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    start_offset: usize,
    edge_offset: usize,
    n_nodes: usize,
    is_final: bool,
}

impl Entry {
    fn n_edges(&self) -> usize {
        2 * self.n_nodes.saturating_sub(1)
    }
}

/// Stack of trees in CSR form, stored back to back in shared arrays.
///
/// A new top is reserved, filled and then marked final; only final entries can be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsrDepot {
    entries: Vec<Entry>,
    starts: Vec<usize>,
    heads: Vec<usize>,
    costs: Vec<Cost>,
}

/// Writable storage for the newest entry of a [CsrDepot].
pub struct CsrSlotMut<'a> {
    pub start: &'a mut [usize],
    pub head: &'a mut [usize],
    pub cost: &'a mut [Cost],
}

impl CsrSlotMut<'_> {
    pub fn copy_from(&mut self, csr: CsrView<'_>) {
        self.start.copy_from_slice(csr.start);
        self.head.copy_from_slice(csr.head);
        self.cost.copy_from_slice(csr.cost);
    }
}

impl CsrDepot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn is_top_final(&self) -> bool {
        self.entries.last().map_or(true, |e| e.is_final)
    }

    /// Adds a new unfinished top entry of a tree with `n_nodes` nodes.
    pub fn reserve_new_top(&mut self, n_nodes: usize) -> CsrSlotMut<'_> {
        assert!(self.is_top_final(), "previous top is not final");
        let entry = Entry {
            start_offset: self.starts.len(),
            edge_offset: self.heads.len(),
            n_nodes,
            is_final: false,
        };
        self.entries.push(entry);
        self.starts.resize(entry.start_offset + n_nodes + 1, 0);
        self.heads.resize(entry.edge_offset + entry.n_edges(), 0);
        self.costs.resize(entry.edge_offset + entry.n_edges(), 0.0);
        CsrSlotMut {
            start: &mut self.starts[entry.start_offset..],
            head: &mut self.heads[entry.edge_offset..],
            cost: &mut self.costs[entry.edge_offset..],
        }
    }

    /// Adds an unfinished copy of `csr` as the new top.
    pub fn push(&mut self, csr: &Csr) {
        let view = csr.view();
        assert_eq!(view.n_edges(), 2 * view.n_nodes().saturating_sub(1));
        self.reserve_new_top(view.n_nodes()).copy_from(view);
    }

    /// Adds an unfinished copy of the current top as the new top.
    pub fn push_copy_of_top(&mut self) {
        let top = *self.entries.last().expect("no entry to copy");
        assert!(top.is_final);
        let entry = Entry {
            start_offset: self.starts.len(),
            edge_offset: self.heads.len(),
            ..top
        };
        self.starts
            .extend_from_within(top.start_offset..top.start_offset + top.n_nodes + 1);
        self.heads
            .extend_from_within(top.edge_offset..top.edge_offset + top.n_edges());
        self.costs
            .extend_from_within(top.edge_offset..top.edge_offset + top.n_edges());
        self.entries.push(Entry {
            is_final: false,
            ..entry
        });
    }

    pub fn mark_top_final(&mut self) {
        let top = self.entries.last_mut().expect("no entry to mark");
        assert!(!top.is_final, "entry marked final twice");
        top.is_final = true;
    }

    pub fn remove_top(&mut self) {
        let top = self.entries.pop().expect("no entry to remove");
        self.starts.truncate(top.start_offset);
        self.heads.truncate(top.edge_offset);
        self.costs.truncate(top.edge_offset);
    }

    pub fn entry(&self, i: usize) -> CsrView<'_> {
        let e = self.entries[i];
        assert!(e.is_final, "reading entry {i} before it is final");
        CsrView {
            start: &self.starts[e.start_offset..e.start_offset + e.n_nodes + 1],
            head: &self.heads[e.edge_offset..e.edge_offset + e.n_edges()],
            cost: &self.costs[e.edge_offset..e.edge_offset + e.n_edges()],
        }
    }

    /// The most recent final entry.
    pub fn top(&self) -> CsrView<'_> {
        self.entry(self.entries.len() - 1)
    }

    pub fn top_weight(&self) -> Cost {
        self.top().weight()
    }
}
