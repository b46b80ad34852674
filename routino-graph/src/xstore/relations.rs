//! `RelationsX`: building records for route relations (§4.D step 4) and
//! turn relations (§4.D steps 5 and 9).

use routino_common::transport::Transports;
use routino_common::units::{IndexT, NO_NODE, NO_SEGMENT};

/// A route relation as read from OSM XML: a set of member way ids plus
/// (for super-relations) member relation ids, and the transports-routes
/// bitmask it contributes to its members' `FootRoute`/`BicycleRoute`
/// property bits.
#[derive(Debug, Clone)]
pub struct RouteRelationX {
    pub id: i64,
    pub routes: Transports,
    pub way_ids: Vec<i64>,
    pub relation_ids: Vec<i64>,
    /// Set once this relation has propagated its bitmask to all of
    /// `way_ids` in the current round (§4.D step 4).
    pub resolved: bool,
}

/// A turn relation in its phase-1 form: the via-node's OSM id translated to
/// an index, but the member ways left keyed by OSM id since builder step 6
/// reorders the way store between phase 1 and phase 2 (resolving them now
/// would leave stale indexes behind).
#[derive(Debug, Clone)]
pub struct TurnRelationX {
    pub via_node: IndexT,
    pub from_way_id: i64,
    pub to_way_id: i64,
    /// `true` for a `no_*_turn` restriction; `false` for `only_*_turn`
    /// (which step 9 expands into one "no-turn" record per disallowed
    /// alternative).
    pub is_no_turn: bool,
    pub except: Transports,
}

/// A fully resolved turn relation, keyed by specific segments, as stored in
/// the compact `TurnRelation` array (§3). Produced by builder step 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TurnRelation {
    pub from_segment: IndexT,
    pub via_node: IndexT,
    pub to_segment: IndexT,
    pub except: Transports,
}

impl TurnRelation {
    pub fn forbids(&self, from_segment: IndexT, via_node: IndexT, to_segment: IndexT, transport_bit: Transports) -> bool {
        self.from_segment == from_segment
            && self.via_node == via_node
            && self.to_segment == to_segment
            && !self.except.intersects(transport_bit)
    }

    pub const NONE: TurnRelation = TurnRelation {
        from_segment: NO_SEGMENT,
        via_node: NO_NODE,
        to_segment: NO_SEGMENT,
        except: Transports::empty(),
    };
}

impl RouteRelationX {
    pub fn new(id: i64, routes: Transports, way_ids: Vec<i64>, relation_ids: Vec<i64>) -> Self {
        RouteRelationX {
            id,
            routes,
            way_ids,
            relation_ids,
            resolved: false,
        }
    }
}

impl TurnRelationX {
    pub fn new(via_node: IndexT, from_way_id: i64, to_way_id: i64, is_no_turn: bool, except: Transports) -> Self {
        TurnRelationX {
            via_node,
            from_way_id,
            to_way_id,
            is_no_turn,
            except,
        }
    }
}
