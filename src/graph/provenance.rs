use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

struct Node {
    id: usize,
    next: Provenance,
}

/// Immutable list of original ids an edge (or vertex) stands for.
///
/// Lists share their tails, so cloning is O(1) and merging only allocates for the ids
/// of the smaller list that the larger one doesn't already contain.
#[derive(Clone, Default)]
pub struct Provenance {
    head: Option<Arc<Node>>,
    len: usize,
}

impl Provenance {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(id: usize) -> Self {
        Self::empty().push(id)
    }

    /// New list with `id` in front of `self`. Doesn't check for duplicates.
    pub fn push(&self, id: usize) -> Self {
        Self {
            head: Some(Arc::new(Node {
                id,
                next: self.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            cur: self.head.as_deref(),
        }
    }

    pub fn contains(&self, id: usize) -> bool {
        self.iter().any(|x| x == id)
    }

    /// O(1), not content equality.
    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Union of both lists. Ids already present in the larger list are not repeated,
    /// and the larger list is shared as the tail of the result.
    pub fn merge(&self, other: &Self) -> Self {
        let (big, small) = if self.len >= other.len {
            (self, other)
        } else {
            (other, self)
        };
        if small.is_empty() || big.same_as(small) {
            return big.clone();
        }
        let mut present: BTreeSet<usize> = big.iter().collect();
        let mut merged = big.clone();
        for id in small.iter() {
            if present.insert(id) {
                merged = merged.push(id);
            }
        }
        merged
    }

    pub fn to_sorted_vec(&self) -> Vec<usize> {
        let mut ids: Vec<_> = self.iter().collect();
        ids.sort_unstable();
        ids
    }
}

impl Debug for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// Long lists would otherwise be dropped recursively.
impl Drop for Provenance {
    fn drop(&mut self) {
        let mut cur = self.head.take();
        while let Some(node) = cur {
            match Arc::try_unwrap(node) {
                Ok(mut node) => cur = node.next.head.take(),
                Err(_) => break,
            }
        }
    }
}

pub struct Iter<'a> {
    cur: Option<&'a Node>,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let node = self.cur?;
        self.cur = node.next.head.as_deref();
        Some(node.id)
    }
}
