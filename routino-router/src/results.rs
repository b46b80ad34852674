//! The route-search result container (§4.H): a sparse map from
//! `(node, arriving segment)` to the best predecessor/score found so far.
//! `(node, segment)` rather than `node` alone is the search state, so two
//! different approaches to the same junction compete on equal footing
//! instead of one silently overwriting the other.

use std::collections::HashMap;

use routino_common::units::{IndexT, ScoreT};

#[derive(Debug, Clone, Copy)]
pub struct SearchRecord {
    pub prev: Option<(IndexT, IndexT)>,
    pub score: ScoreT,
    pub sortby: ScoreT,
}

/// A min-priority-queue-friendly results set. [`Results::relax`] only ever
/// keeps the best score seen per `(node, segment)`; callers push onto their
/// own heap only when it reports an improvement, which is what gives pops
/// their lazy-stale-pop property (a popped entry whose `sortby` no longer
/// matches the stored record was superseded and is simply dropped).
#[derive(Debug, Default)]
pub struct Results {
    records: HashMap<(IndexT, IndexT), SearchRecord>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: IndexT, segment: IndexT) -> Option<&SearchRecord> {
        self.records.get(&(node, segment))
    }

    /// Records `(node, segment)` with the given predecessor and score if
    /// it improves (or creates) the existing entry. Returns `true` when the
    /// caller should push the new state onto its open-set heap.
    pub fn relax(&mut self, node: IndexT, segment: IndexT, prev: Option<(IndexT, IndexT)>, score: ScoreT, sortby: ScoreT) -> bool {
        match self.records.get(&(node, segment)) {
            Some(existing) if existing.score <= score => false,
            _ => {
                self.records.insert((node, segment), SearchRecord { prev, score, sortby });
                true
            }
        }
    }

    /// All recorded states, for scanning a results set for super-node
    /// terminals or a direct hit on the finish node.
    pub fn iter(&self) -> impl Iterator<Item = (IndexT, IndexT, &SearchRecord)> {
        self.records.iter().map(|(&(node, seg), record)| (node, seg, record))
    }

    /// Walks `prev` pointers from `(node, segment)` back to this results
    /// set's own origin (a state with no predecessor), returning
    /// `(nodes, segments)` in origin-to-`(node, segment)` order, where
    /// `segments[i]` connects `nodes[i]` to `nodes[i + 1]`.
    pub fn path_to(&self, mut node: IndexT, mut segment: IndexT) -> (Vec<IndexT>, Vec<IndexT>) {
        let mut nodes_rev = vec![node];
        let mut segs_rev = Vec::new();

        while let Some(record) = self.get(node, segment) {
            match record.prev {
                Some((prev_node, prev_seg)) => {
                    segs_rev.push(segment);
                    nodes_rev.push(prev_node);
                    node = prev_node;
                    segment = prev_seg;
                }
                None => break,
            }
        }

        nodes_rev.reverse();
        segs_rev.reverse();
        (nodes_rev, segs_rev)
    }
}
