//! Fake nodes and segments synthesised for waypoints that don't land exactly
//! on a real node (§4.G).
//!
//! State here has query lifetime: `Fakes::default()` (or `.reset()` on a
//! reused instance) at the start of every route computation, populated by
//! [`Fakes::snap_waypoint`] once per waypoint, then consumed by the router's
//! edge relaxation through the handful of lookup methods below.

use std::collections::HashMap;

use routino_common::units::{self, DistanceT, IndexT, LatLongT};

pub const MIN_SEGMENT_M: f64 = 5.0;

/// A synthetic half-segment linking a real endpoint to a fake node, or a
/// same-way shortcut between two fake nodes (§4.G, last paragraph).
#[derive(Debug, Clone, Copy)]
pub struct FakeSegment {
    /// The real segment this one was cut from, or `NO_SEGMENT` for a
    /// same-segment waypoint-to-waypoint shortcut.
    pub real: IndexT,
    pub node1: IndexT,
    pub node2: IndexT,
    pub way: IndexT,
    pub distance: DistanceT,
    pub oneway_1to2: bool,
    pub oneway_2to1: bool,
}

impl FakeSegment {
    pub fn other_node(&self, n: IndexT) -> IndexT {
        if n == self.node1 {
            self.node2
        } else {
            self.node1
        }
    }

    pub fn allows_forward(&self) -> bool {
        !self.oneway_2to1
    }

    pub fn allows_backward(&self) -> bool {
        !self.oneway_1to2
    }
}

/// The information the nearest-feature search (§4.H) hands to
/// [`Fakes::snap_waypoint`] about the real segment a waypoint landed nearest
/// to.
#[derive(Debug, Clone, Copy)]
pub struct SnappedSegment {
    pub segment_real: IndexT,
    pub node1: IndexT,
    pub node2: IndexT,
    pub way: IndexT,
    pub oneway_1to2: bool,
    pub oneway_2to1: bool,
    /// Distance in metres along the segment from `node1` to the snap point.
    pub d1: f64,
    /// Distance in metres along the segment from `node2` to the snap point.
    pub d2: f64,
    pub lat: LatLongT,
    pub lon: LatLongT,
}

#[derive(Debug, Default)]
pub struct Fakes {
    node_latlon: HashMap<IndexT, (LatLongT, LatLongT)>,
    segments: Vec<FakeSegment>,
    /// node (real or fake) -> ordered list of incident fake-segment indices,
    /// mirroring the real graph's `first_segment`/`next` chain but as a plain
    /// `Vec` since there are at most `4 * NWAYPOINTS + 1` entries total.
    incidence: HashMap<IndexT, Vec<IndexT>>,
    /// (real_node, fake_node) -> the half-segment directly joining them.
    extra: HashMap<(IndexT, IndexT), IndexT>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all state from a previous query.
    pub fn reset(&mut self) {
        self.node_latlon.clear();
        self.segments.clear();
        self.incidence.clear();
        self.extra.clear();
    }

    fn push_segment(&mut self, seg: FakeSegment) -> IndexT {
        let idx = self.segments.len() as IndexT;
        self.segments.push(seg);
        idx
    }

    fn link(&mut self, node: IndexT, seg_index: IndexT) {
        self.incidence.entry(node).or_default().push(seg_index);
    }

    /// Decides how `waypoint_index` attaches to the graph given the nearest
    /// segment found for it, creating a fake node and its two half-segments
    /// if it doesn't snap to a real endpoint. Returns the node id (real or
    /// fake) the router should treat as this waypoint's position.
    ///
    /// `same_segment_as_previous`, when `Some(prev_node)`, indicates the
    /// previous waypoint snapped onto this same real segment; a direct
    /// shortcut segment is added between the two so the router sees them as
    /// neighbours without detouring through a real endpoint.
    pub fn snap_waypoint(&mut self, waypoint_index: usize, info: &SnappedSegment, same_segment_as_previous: Option<(IndexT, f64)>) -> IndexT {
        let near1 = info.d1 < MIN_SEGMENT_M;
        let near2 = info.d2 < MIN_SEGMENT_M;

        let routing_node = match (near1, near2) {
            (true, false) => info.node1,
            (false, true) => info.node2,
            (true, true) => {
                if info.d1 <= info.d2 {
                    info.node1
                } else {
                    info.node2
                }
            }
            (false, false) => self.create_fake_node(waypoint_index, info),
        };

        if let Some((prev_node, prev_d1)) = same_segment_as_previous {
            self.link_same_segment(prev_node, prev_d1, routing_node, info);
        }

        routing_node
    }

    fn create_fake_node(&mut self, waypoint_index: usize, info: &SnappedSegment) -> IndexT {
        let fake_node = units::NODE_FAKE + waypoint_index as IndexT;
        self.node_latlon.insert(fake_node, (info.lat, info.lon));

        // Both halves preserve the original segment's direction flags in
        // their original sense: a half keeps whichever of node1/node2 it
        // still borders, so the flag pair means exactly what it meant on the
        // segment it was cut from.
        let half_to_node1 = FakeSegment {
            real: info.segment_real,
            node1: info.node1,
            node2: fake_node,
            way: info.way,
            distance: info.d1.round() as DistanceT,
            oneway_1to2: info.oneway_1to2,
            oneway_2to1: info.oneway_2to1,
        };
        let half_to_node2 = FakeSegment {
            real: info.segment_real,
            node1: fake_node,
            node2: info.node2,
            way: info.way,
            distance: info.d2.round() as DistanceT,
            oneway_1to2: info.oneway_1to2,
            oneway_2to1: info.oneway_2to1,
        };

        let idx1 = self.push_segment(half_to_node1);
        let idx2 = self.push_segment(half_to_node2);

        self.link(info.node1, idx1);
        self.link(fake_node, idx1);
        self.link(fake_node, idx2);
        self.link(info.node2, idx2);

        self.extra.insert((info.node1, fake_node), idx1);
        self.extra.insert((info.node2, fake_node), idx2);

        fake_node
    }

    /// Synthesises a direct shortcut between two waypoints that both landed
    /// on the same real segment. The original describes this as two
    /// records, one per relative order; since a fake segment isn't required
    /// to keep `node1 <= node2` the way a real one is, one record linked at
    /// both endpoints serves the same purpose and is what's built here.
    fn link_same_segment(&mut self, prev_node: IndexT, prev_d1: f64, curr_node: IndexT, info: &SnappedSegment) {
        if prev_node == curr_node {
            return;
        }
        let distance = (prev_d1 - info.d1).abs().round() as DistanceT;
        let (node1, node2) = if prev_d1 <= info.d1 { (prev_node, curr_node) } else { (curr_node, prev_node) };

        let seg = FakeSegment {
            real: info.segment_real,
            node1,
            node2,
            way: info.way,
            distance,
            oneway_1to2: info.oneway_1to2,
            oneway_2to1: info.oneway_2to1,
        };
        let idx = self.push_segment(seg);
        self.link(node1, idx);
        self.link(node2, idx);
    }

    fn ptr_of(index: IndexT) -> IndexT {
        units::SEGMENT_FAKE + index
    }

    fn index_of_ptr(seg_ptr: IndexT) -> IndexT {
        seg_ptr - units::SEGMENT_FAKE
    }

    pub fn index_of(&self, seg_ptr: IndexT) -> IndexT {
        Self::index_of_ptr(seg_ptr)
    }

    pub fn lookup_fake_segment(&self, seg_ptr: IndexT) -> Option<&FakeSegment> {
        self.segments.get(Self::index_of_ptr(seg_ptr) as usize)
    }

    pub fn first_fake_segment(&self, node: IndexT) -> Option<IndexT> {
        self.incidence.get(&node)?.first().map(|&i| Self::ptr_of(i))
    }

    pub fn next_fake_segment(&self, prev: IndexT, node: IndexT) -> Option<IndexT> {
        let list = self.incidence.get(&node)?;
        let prev_index = Self::index_of_ptr(prev);
        let pos = list.iter().position(|&i| i == prev_index)?;
        list.get(pos + 1).map(|&i| Self::ptr_of(i))
    }

    pub fn extra_fake_segment(&self, real_node: IndexT, fake_node: IndexT) -> Option<IndexT> {
        self.extra.get(&(real_node, fake_node)).map(|&i| Self::ptr_of(i))
    }

    /// `true` iff `seg1` and `seg2` are both fake and were cut from the same
    /// real segment: taking both together is a reversal back along the
    /// segment they share, even though neither one individually equals the
    /// other.
    pub fn is_fake_u_turn(&self, seg1: IndexT, seg2: IndexT) -> bool {
        if seg1 == seg2 || !units::is_fake_segment(seg1) || !units::is_fake_segment(seg2) {
            return false;
        }
        match (self.lookup_fake_segment(seg1), self.lookup_fake_segment(seg2)) {
            (Some(a), Some(b)) => a.real != units::NO_SEGMENT && a.real == b.real,
            _ => false,
        }
    }

    /// The real segment underlying `seg`, or `seg` itself if it's already
    /// real.
    pub fn real(&self, seg: IndexT) -> IndexT {
        if units::is_fake_segment(seg) {
            self.lookup_fake_segment(seg).map(|f| f.real).unwrap_or(units::NO_SEGMENT)
        } else {
            seg
        }
    }

    pub fn fake_lat_long(&self, fake_node: IndexT) -> Option<(LatLongT, LatLongT)> {
        self.node_latlon.get(&fake_node).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(d1: f64, d2: f64) -> SnappedSegment {
        SnappedSegment {
            segment_real: 7,
            node1: 1,
            node2: 2,
            way: 0,
            oneway_1to2: false,
            oneway_2to1: false,
            d1,
            d2,
            lat: 1000,
            lon: 2000,
        }
    }

    #[test]
    fn snaps_to_node1_when_close_to_it() {
        let mut fakes = Fakes::new();
        let node = fakes.snap_waypoint(0, &segment(1.0, 90.0), None);
        assert_eq!(node, 1);
    }

    #[test]
    fn snaps_to_node2_when_close_to_it() {
        let mut fakes = Fakes::new();
        let node = fakes.snap_waypoint(0, &segment(90.0, 1.0), None);
        assert_eq!(node, 2);
    }

    #[test]
    fn creates_fake_node_mid_segment() {
        let mut fakes = Fakes::new();
        let node = fakes.snap_waypoint(3, &segment(30.0, 70.0), None);
        assert!(units::is_fake_node(node));
        assert_eq!(node, units::NODE_FAKE + 3);
        assert_eq!(fakes.first_fake_segment(1).and_then(|s| fakes.lookup_fake_segment(s)).unwrap().distance, 30);
        assert_eq!(fakes.fake_lat_long(node), Some((1000, 2000)));
    }

    #[test]
    fn two_waypoints_on_same_segment_get_a_direct_shortcut() {
        let mut fakes = Fakes::new();
        let first = fakes.snap_waypoint(0, &segment(30.0, 70.0), None);
        let second = fakes.snap_waypoint(1, &segment(60.0, 40.0), Some((first, 30.0)));
        assert!(units::is_fake_node(first) && units::is_fake_node(second));

        let seg_ptr = fakes.first_fake_segment(second).unwrap();
        let mut found_shortcut = false;
        let mut cursor = Some(seg_ptr);
        while let Some(ptr) = cursor {
            let seg = fakes.lookup_fake_segment(ptr).unwrap();
            if seg.other_node(second) == first {
                found_shortcut = true;
                assert_eq!(seg.distance, 30);
            }
            cursor = fakes.next_fake_segment(ptr, second);
        }
        assert!(found_shortcut);
    }
}
