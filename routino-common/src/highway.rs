//! Highway classification and its bitmask companion type.

use serde::{Deserialize, Serialize};

/// The different types of highway a way can be tagged with.
///
/// The discriminants match the order of the original Routino `Highway` enum
/// so that `1 << (Highway as u32 - 1)` produces the matching `Highways` bit
/// (see [`Highway::bit`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Highway {
    Motorway = 1,
    Trunk = 2,
    Primary = 3,
    Secondary = 4,
    Tertiary = 5,
    Unclassified = 6,
    Residential = 7,
    Service = 8,
    Track = 9,
    Cycleway = 10,
    Path = 11,
    Steps = 12,
    Ferry = 13,
}

/// One more than the number of highway types; also the size of per-highway
/// preference/speed tables (`highway[Highway::COUNT]`).
pub const HIGHWAY_COUNT: usize = 14;

impl Highway {
    pub const ALL: [Highway; 13] = [
        Highway::Motorway,
        Highway::Trunk,
        Highway::Primary,
        Highway::Secondary,
        Highway::Tertiary,
        Highway::Unclassified,
        Highway::Residential,
        Highway::Service,
        Highway::Track,
        Highway::Cycleway,
        Highway::Path,
        Highway::Steps,
        Highway::Ferry,
    ];

    /// Total mapping from an OSM `highway=*` tag value to a `Highway`.
    /// Unknown values return `None` — the tagging layer treats that as "not
    /// routable", never as an error (kind-1 malformed input is for things
    /// like dangling references, not unrecognised tag values).
    pub fn from_tag(value: &str) -> Option<Highway> {
        Some(match value {
            "motorway" | "motorway_link" => Highway::Motorway,
            "trunk" | "trunk_link" => Highway::Trunk,
            "primary" | "primary_link" => Highway::Primary,
            "secondary" | "secondary_link" => Highway::Secondary,
            "tertiary" | "tertiary_link" => Highway::Tertiary,
            "unclassified" | "road" => Highway::Unclassified,
            "residential" | "living_street" => Highway::Residential,
            "service" | "services" => Highway::Service,
            "track" | "byway" | "unsurfaced" => Highway::Track,
            "cycleway" => Highway::Cycleway,
            "path" | "footway" | "bridleway" | "pedestrian" => Highway::Path,
            "steps" => Highway::Steps,
            "ferry" => Highway::Ferry,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Highway::Motorway => "motorway",
            Highway::Trunk => "trunk",
            Highway::Primary => "primary",
            Highway::Secondary => "secondary",
            Highway::Tertiary => "tertiary",
            Highway::Unclassified => "unclassified",
            Highway::Residential => "residential",
            Highway::Service => "service",
            Highway::Track => "track",
            Highway::Cycleway => "cycleway",
            Highway::Path => "path",
            Highway::Steps => "steps",
            Highway::Ferry => "ferry",
        }
    }

    /// The bit this highway occupies in a [`Highways`] bitmask.
    #[inline]
    pub fn bit(self) -> u16 {
        1u16 << ((self as u8) - 1)
    }

    /// Index into a `[T; HIGHWAY_COUNT]` table (1-based, slot 0 unused —
    /// matches the original's `highway[Way_Count]` tables indexed by the raw
    /// enum discriminant).
    #[inline]
    pub fn index(self) -> usize {
        self as u8 as usize
    }
}

bitflags::bitflags! {
    /// A bitmask of multiple highway types, as packed into `Way::highways`.
    #[derive(Serialize, Deserialize, PartialOrd, Ord)]
    pub struct Highways: u16 {
        const MOTORWAY     = 1 << 0;
        const TRUNK        = 1 << 1;
        const PRIMARY      = 1 << 2;
        const SECONDARY    = 1 << 3;
        const TERTIARY     = 1 << 4;
        const UNCLASSIFIED = 1 << 5;
        const RESIDENTIAL  = 1 << 6;
        const SERVICE      = 1 << 7;
        const TRACK        = 1 << 8;
        const CYCLEWAY     = 1 << 9;
        const PATH         = 1 << 10;
        const STEPS        = 1 << 11;
        const FERRY        = 1 << 12;
    }
}

impl From<Highway> for Highways {
    fn from(h: Highway) -> Self {
        Highways::from_bits_truncate(h.bit())
    }
}

/// Way-level flag bits overlaid on the highway byte, as in `types.h`
/// (`Way_OneWay = 32`, `Way_Roundabout = 64`).
pub mod way_flags {
    pub const ONEWAY: u8 = 32;
    pub const ROUNDABOUT: u8 = 64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_lookup_total_on_known_values() {
        assert_eq!(Highway::from_tag("residential"), Some(Highway::Residential));
        assert_eq!(Highway::from_tag("not-a-highway"), None);
    }

    #[test]
    fn bits_distinct() {
        let mut seen = std::collections::HashSet::new();
        for h in Highway::ALL {
            assert!(seen.insert(h.bit()), "duplicate bit for {:?}", h);
        }
    }
}
