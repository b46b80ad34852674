//! `SegmentsX`: the wide building record for a segment.
//!
//! Carries raw OSM node/way ids until builder step 7 resolves them to
//! indexes (see `crate::builder`), and an undistanced area/oneway flag set
//! until step 7 measures it.

use routino_common::units::{DistanceT, IndexT, NO_NODE, NO_WAY, ONEWAY_1TO2, ONEWAY_2TO1, SEGMENT_NORMAL, SEGMENT_SUPER};

#[derive(Debug, Clone)]
pub struct SegmentX {
    pub node1_id: i64,
    pub node2_id: i64,
    pub way_id: i64,

    pub node1: IndexT,
    pub node2: IndexT,
    pub way: IndexT,

    /// `true` for a zero-distance "area" boundary segment (§3).
    pub area: bool,
    pub oneway_1to2: bool,
    pub oneway_2to1: bool,

    /// Distance in metres, filled in by step 7. Zero until then.
    pub distance: DistanceT,

    pub is_super: bool,
    pub is_normal: bool,

    /// Forward adjacency chain pointer: next segment whose `node2` equals
    /// this segment's `node2`, `NO_SEGMENT`-terminated. Built in step 8.
    pub next2: IndexT,
    /// Symmetric chain for `node1`, used only by the pruning passes
    /// (§4.D.1), which need to walk both directions.
    pub next1: IndexT,

    /// Set once this segment is superseded by a merge/prune (its endpoints
    /// get set to `NO_NODE`); surviving segments are compacted in the final
    /// re-sort-with-deletion pass.
    pub deleted: bool,
}

impl SegmentX {
    pub fn new(node1_id: i64, node2_id: i64, way_id: i64, area: bool, oneway_1to2: bool, oneway_2to1: bool) -> Self {
        SegmentX {
            node1_id,
            node2_id,
            way_id,
            node1: NO_NODE,
            node2: NO_NODE,
            way: NO_WAY,
            area,
            oneway_1to2,
            oneway_2to1,
            distance: 0,
            is_super: false,
            is_normal: true,
            next2: NO_NODE,
            next1: NO_NODE,
            deleted: false,
        }
    }

    /// Ensures `node1 <= node2`, swapping (and flipping oneway direction) if
    /// necessary. Must be re-applied after any renumbering pass.
    pub fn canonicalize_endpoints(&mut self) {
        if self.node1 > self.node2 {
            std::mem::swap(&mut self.node1, &mut self.node2);
            std::mem::swap(&mut self.oneway_1to2, &mut self.oneway_2to1);
        }
    }

    pub fn pack_distance_and_flags(&self) -> DistanceT {
        let mut v = self.distance;
        if self.oneway_1to2 {
            v |= ONEWAY_1TO2;
        }
        if self.oneway_2to1 {
            v |= ONEWAY_2TO1;
        }
        if self.is_super {
            v |= SEGMENT_SUPER;
        }
        if self.is_normal {
            v |= SEGMENT_NORMAL;
        }
        v
    }
}
