//! Extended ("X") record stores: wide, append-only building records plus
//! auxiliary RAM arrays, used only while the database is being built.
//!
//! Two build modes are offered, selected by [`crate::config::StoreMode`]:
//! **Fat**, where every lookup is a direct index into an in-RAM array, and
//! **Slim**, where lookups are funnelled through a small fixed-size
//! positional cache addressed by a caller-chosen slot id — so that two
//! lookups live in the same operation (e.g. "fetch node1 into slot 1, node2
//! into slot 2") without one eviction invalidating the other.
//!
//! Both modes keep their backing records in RAM in this implementation
//! (build-time inputs in this workspace's scale do not require literal
//! memory-mapped paging the way the original's multi-gigabyte planet builds
//! do); Slim mode still honours the caller-chosen-slot discipline so the
//! access pattern a builder routine uses is identical regardless of mode.
//! Query-time compact stores (`crate::compact`) are read fully into RAM too
//! (`routino_io::header::read_framed` does a plain `File::open` + read, not
//! `mmap`) — there is no memory-mapped path anywhere in this workspace yet.

use std::cmp::Ordering;

/// Build-time storage strategy for an [`XStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Direct indexing, no cache bookkeeping.
    Fat,
    /// Lookups go through an `n`-slot positional cache.
    Slim { slots: usize },
}

impl Default for StoreMode {
    fn default() -> Self {
        StoreMode::Slim { slots: 4 }
    }
}

/// An append-only wide-record store used during the build pipeline.
///
/// `T` is the "X" record type (`NodeX`, `SegmentX`, `WayX`, ...). `sort`,
/// `iterate`, `lookup_by_index` and `put_back` are the operations named in
/// the builder design; `lookup_by_id` additionally requires a sorted id
/// index, built with [`XStore::build_id_index`] once the store is sorted by
/// id.
pub struct XStore<T> {
    records: Vec<T>,
    mode: StoreMode,
    id_index: Vec<(i64, u32)>,
    cache_slots: Vec<Option<usize>>,
}

impl<T> XStore<T> {
    pub fn new(mode: StoreMode) -> Self {
        let n_slots = match mode {
            StoreMode::Fat => 0,
            StoreMode::Slim { slots } => slots,
        };
        XStore {
            records: Vec::new(),
            mode,
            id_index: Vec::new(),
            cache_slots: vec![None; n_slots],
        }
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a record, returning its index.
    pub fn append(&mut self, record: T) -> u32 {
        let idx = self.records.len() as u32;
        self.records.push(record);
        idx
    }

    /// Direct positional access. In Slim mode, `slot` records which cache
    /// slot is conceptually holding this index — distinct slots must be used
    /// within one algorithm step when more than one record is alive at once,
    /// matching the original's "look up node1 at slot 1, node2 at slot 2"
    /// discipline.
    pub fn lookup_by_index(&mut self, index: u32, slot: usize) -> &T {
        if let StoreMode::Slim { slots } = self.mode {
            debug_assert!(slot < slots, "slot {slot} out of range ({slots} slots)");
            self.cache_slots[slot] = Some(index as usize);
        }
        &self.records[index as usize]
    }

    pub fn lookup_by_index_mut(&mut self, index: u32, slot: usize) -> &mut T {
        if let StoreMode::Slim { slots } = self.mode {
            debug_assert!(slot < slots, "slot {slot} out of range ({slots} slots)");
            self.cache_slots[slot] = Some(index as usize);
        }
        &mut self.records[index as usize]
    }

    /// Writes the current in-memory value of `slot` back to its origin —
    /// a no-op in this RAM-backed implementation (there is nothing to flush
    /// to disk), kept as an explicit call so builder code reads the same
    /// regardless of mode and a future disk-backed Slim store could hook in.
    pub fn put_back(&mut self, _slot: usize) {}

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.records.iter_mut()
    }

    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.records.sort_by(|a, b| compare(a, b));
        self.id_index.clear();
    }

    /// Builds a sorted-by-id index for [`XStore::lookup_by_id`]. Call after
    /// sorting by id (step 1 of the builder pipeline) or whenever the
    /// records are re-keyed.
    pub fn build_id_index<F>(&mut self, id_of: F)
    where
        F: Fn(&T) -> i64,
    {
        self.id_index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (id_of(r), i as u32))
            .collect();
        self.id_index.sort_by_key(|&(id, _)| id);
    }

    pub fn lookup_by_id(&self, id: i64) -> Option<u32> {
        self.id_index
            .binary_search_by_key(&id, |&(i, _)| i)
            .ok()
            .map(|pos| self.id_index[pos].1)
    }

    /// Consumes the store, optionally keeping the records (`keep = true`) or
    /// discarding them (`keep = false`) — mirrors the X-store `free(keep?)`
    /// operation used to release build-time memory once a phase is done.
    pub fn free(self, keep: bool) -> Option<Vec<T>> {
        if keep {
            Some(self.records)
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.records
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.records
    }

    pub fn into_vec(self) -> Vec<T> {
        self.records
    }
}

pub mod nodes;
pub mod relations;
pub mod segments;
pub mod ways;
