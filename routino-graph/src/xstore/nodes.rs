//! `NodesX`: the wide building record for a node, before pruning and
//! renumbering collapse it down to the compact `Node` of §3.

use routino_common::transport::Transports;
use routino_common::units::{IndexT, LatLongT, NO_NODE};

/// A node as seen during the build pipeline: still keyed by its original OSM
/// id, still carrying a real lat/lon (pruned nodes get `lat = lon =
/// NO_LATLONG` rather than being physically removed until the final
/// compaction pass, so indices stay stable mid-pipeline).
#[derive(Debug, Clone)]
pub struct NodeX {
    pub id: i64,
    pub lat: LatLongT,
    pub lon: LatLongT,
    pub allow: Transports,
    pub flags: NodeXFlags,
    /// Set once §4.D step 2 confirms this node is an endpoint of a
    /// surviving segment. Nodes that stay `false` are dropped in step 3.
    pub used: bool,
    /// Head of the chain of segments with `node1 == this node`, filled in
    /// during step 8. `NO_NODE`-valued until then.
    pub first_segment: IndexT,
    /// Head of the chain of segments with `node2 == this node`. Segments
    /// cannot be threaded into both chains with a single `next` pointer, so
    /// the compact format keeps two independent linked lists (`next1`,
    /// `next2`) rather than relying on sort-order contiguity for one side.
    pub first_segment2: IndexT,
}

bitflags::bitflags! {
    #[derive(Default)]
    pub struct NodeXFlags: u16 {
        const SUPER             = routino_common::units::node_flags::SUPER;
        const UTURN             = routino_common::units::node_flags::UTURN;
        const MINI_ROUNDABOUT   = routino_common::units::node_flags::MINI_ROUNDABOUT;
        const TURN_RESTRICTED   = routino_common::units::node_flags::TURN_RESTRICTED;
        const TURN_RESTRICTED2  = routino_common::units::node_flags::TURN_RESTRICTED2;
    }
}

impl NodeX {
    pub fn new(id: i64, lat: LatLongT, lon: LatLongT, allow: Transports) -> Self {
        NodeX {
            id,
            lat,
            lon,
            allow,
            flags: NodeXFlags::empty(),
            used: false,
            first_segment: NO_NODE,
            first_segment2: NO_NODE,
        }
    }

    pub fn is_pruned(&self) -> bool {
        self.lat == routino_common::units::NO_LATLONG && self.lon == routino_common::units::NO_LATLONG
    }

    pub fn prune(&mut self) {
        self.lat = routino_common::units::NO_LATLONG;
        self.lon = routino_common::units::NO_LATLONG;
    }
}
