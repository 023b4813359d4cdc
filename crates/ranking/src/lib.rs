//! # Ranking - Ordered Click Board
//!
//! The in-memory heart of the engine: every file the system has seen a
//! click for, ordered by descending click count with ties broken by
//! ascending id. The engine's apply worker is the only writer; readers copy
//! out under a shared lock.
//!
//! ## Representation
//!
//! A doubly-linked list held in an arena (`Vec` of nodes addressed by index,
//! with a free list), plus a `HashMap` from file id to node handle. Handles
//! sidestep the cyclic ownership a pointer-based list would need, while
//! keeping neighbor access O(1).
//!
//! A click is a `+1` on one node, which can only move that node *forward*:
//! [`Ranking::hit`] bubbles it toward the head one swap at a time until its
//! predecessor outranks it again. A single increment may leap a whole run of
//! equal-count neighbors, so the swap repeats rather than firing once.
//!
//! ## Key properties
//! - **Total order**: iteration always yields `count` strictly descending,
//!   ties by ascending id.
//! - **Cheap increments**: `hit` on an existing file costs the number of
//!   positions the node actually moves.
//! - **Recovery seeding**: [`Ranking::insert`] places pre-counted records by
//!   scanning from the tail, which is O(1) when records arrive in snapshot
//!   (descending) order.

use codec::FileRecord;
use std::collections::HashMap;

/// Resolves a file id to its display name at first-click time.
///
/// Implemented by the file-metadata keystore. A miss is tolerated: the
/// ranking stores an empty name and the count still accumulates.
pub trait NameLookup: Send + Sync {
    /// Returns the name for `id`, or `None` when the id is unknown.
    fn name_of(&self, id: u64) -> Option<String>;
}

/// A lookup that knows no names. Useful for tests and replay-only tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNames;

impl NameLookup for NoNames {
    fn name_of(&self, _id: u64) -> Option<String> {
        None
    }
}

/// Adapts a closure into a [`NameLookup`].
pub struct LookupFn<F>(pub F);

impl<F> NameLookup for LookupFn<F>
where
    F: Fn(u64) -> Option<String> + Send + Sync,
{
    fn name_of(&self, id: u64) -> Option<String> {
        (self.0)(id)
    }
}

/// Arena slot: one file and its list neighbors.
#[derive(Debug)]
struct Node {
    file: FileRecord,
    prev: Option<usize>,
    next: Option<usize>,
}

/// The ordered ranking structure.
pub struct Ranking {
    arena: Vec<Node>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<u64, usize>,
    lookup: Box<dyn NameLookup>,
}

impl std::fmt::Debug for Ranking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ranking")
            .field("len", &self.index.len())
            .field("arena_slots", &self.arena.len())
            .finish()
    }
}

/// Returns `true` if `a` ranks strictly ahead of `b`.
fn outranks(a: &FileRecord, b: &FileRecord) -> bool {
    a.count > b.count || (a.count == b.count && a.id < b.id)
}

impl Ranking {
    /// Creates an empty ranking that resolves first-click names via `lookup`.
    pub fn new(lookup: Box<dyn NameLookup>) -> Self {
        Self {
            arena: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            lookup,
        }
    }

    /// Number of ranked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` when no file has been clicked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Records one click for `id`.
    ///
    /// A new id is inserted with `count = 1` and its name resolved through
    /// the lookup (empty when unknown). An existing id is incremented and
    /// bubbled forward until the order invariant holds again.
    pub fn hit(&mut self, id: u64) {
        match self.index.get(&id) {
            Some(&handle) => {
                self.arena[handle].file.count += 1;
                self.bubble_forward(handle);
            }
            None => {
                let file_name = self.lookup.name_of(id).unwrap_or_default();
                self.place(FileRecord {
                    id,
                    file_name,
                    count: 1,
                });
            }
        }
    }

    /// Inserts a pre-counted record, positioning it to keep the order.
    ///
    /// Used when seeding from a snapshot. An id already present is left
    /// untouched.
    pub fn insert(&mut self, file: FileRecord) {
        if self.index.contains_key(&file.id) {
            return;
        }
        self.place(file);
    }

    /// Removes `id` from the ranking. No-op when absent.
    pub fn remove(&mut self, id: u64) {
        let Some(handle) = self.index.remove(&id) else {
            return;
        };
        self.unlink(handle);
        self.arena[handle].file = FileRecord {
            id: 0,
            file_name: String::new(),
            count: 0,
        };
        self.free.push(handle);
    }

    /// Returns up to `n` leading records, best first.
    #[must_use]
    pub fn top_n(&self, n: usize) -> Vec<FileRecord> {
        self.iter().take(n).cloned().collect()
    }

    /// Returns every record in ranked order.
    #[must_use]
    pub fn top_all(&self) -> Vec<FileRecord> {
        self.iter().cloned().collect()
    }

    /// Iterates records head-to-tail, i.e. best first.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        RankIter {
            ranking: self,
            cursor: self.head,
        }
    }

    /// Links a fresh record into its ordered position.
    ///
    /// Scans backwards from the tail for the first node that outranks the
    /// newcomer. New files enter with `count = 1` and ids grow over time, so
    /// the scan usually stops immediately at the tail; snapshot seeding in
    /// descending order is O(1) per record for the same reason.
    fn place(&mut self, file: FileRecord) {
        let id = file.id;
        let handle = self.alloc(file);

        let mut after = self.tail;
        while let Some(h) = after {
            if outranks(&self.arena[h].file, &self.arena[handle].file) {
                break;
            }
            after = self.arena[h].prev;
        }
        self.link_after(handle, after);
        self.index.insert(id, handle);
    }

    /// Moves `handle` toward the head while it outranks its predecessor.
    fn bubble_forward(&mut self, handle: usize) {
        while let Some(prev) = self.arena[handle].prev {
            if outranks(&self.arena[handle].file, &self.arena[prev].file) {
                self.swap_with_prev(handle);
            } else {
                break;
            }
        }
    }

    /// Takes a slot from the free list or grows the arena.
    fn alloc(&mut self, file: FileRecord) -> usize {
        let node = Node {
            file,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(handle) => {
                self.arena[handle] = node;
                handle
            }
            None => {
                self.arena.push(node);
                self.arena.len() - 1
            }
        }
    }

    /// Links `handle` immediately after `after` (`None` = new head).
    fn link_after(&mut self, handle: usize, after: Option<usize>) {
        match after {
            None => {
                self.arena[handle].prev = None;
                self.arena[handle].next = self.head;
                if let Some(old_head) = self.head {
                    self.arena[old_head].prev = Some(handle);
                }
                self.head = Some(handle);
                if self.tail.is_none() {
                    self.tail = Some(handle);
                }
            }
            Some(after) => {
                let next = self.arena[after].next;
                self.arena[handle].prev = Some(after);
                self.arena[handle].next = next;
                self.arena[after].next = Some(handle);
                match next {
                    Some(next) => self.arena[next].prev = Some(handle),
                    None => self.tail = Some(handle),
                }
            }
        }
    }

    /// Detaches `handle` from the list, patching its neighbors.
    fn unlink(&mut self, handle: usize) {
        let prev = self.arena[handle].prev;
        let next = self.arena[handle].next;
        match prev {
            Some(prev) => self.arena[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.arena[next].prev = prev,
            None => self.tail = prev,
        }
        self.arena[handle].prev = None;
        self.arena[handle].next = None;
    }

    /// Exchanges `handle` with its predecessor in O(1) pointer surgery.
    fn swap_with_prev(&mut self, handle: usize) {
        let Some(prev) = self.arena[handle].prev else {
            return;
        };
        let before = self.arena[prev].prev;
        let after = self.arena[handle].next;

        match before {
            Some(before) => self.arena[before].next = Some(handle),
            None => self.head = Some(handle),
        }
        match after {
            Some(after) => self.arena[after].prev = Some(prev),
            None => self.tail = Some(prev),
        }

        self.arena[handle].prev = before;
        self.arena[handle].next = Some(prev);
        self.arena[prev].prev = Some(handle);
        self.arena[prev].next = after;
    }
}

struct RankIter<'a> {
    ranking: &'a Ranking,
    cursor: Option<usize>,
}

impl<'a> Iterator for RankIter<'a> {
    type Item = &'a FileRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        self.cursor = self.ranking.arena[handle].next;
        Some(&self.ranking.arena[handle].file)
    }
}

#[cfg(test)]
mod tests;
