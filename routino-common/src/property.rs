//! Way properties (surface/lighting/etc) and their bitmask companion type.

use serde::{Deserialize, Serialize};

/// A binary property a way either has or lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Property {
    Paved = 1,
    MultiLane = 2,
    Bridge = 3,
    Tunnel = 4,
    FootRoute = 5,
    BicycleRoute = 6,
}

/// One more than the number of properties.
pub const PROPERTY_COUNT: usize = 7;

impl Property {
    pub const ALL: [Property; 6] = [
        Property::Paved,
        Property::MultiLane,
        Property::Bridge,
        Property::Tunnel,
        Property::FootRoute,
        Property::BicycleRoute,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Property::Paved => "paved",
            Property::MultiLane => "multilane",
            Property::Bridge => "bridge",
            Property::Tunnel => "tunnel",
            Property::FootRoute => "footroute",
            Property::BicycleRoute => "bicycleroute",
        }
    }

    #[inline]
    pub fn bit(self) -> u8 {
        1u8 << ((self as u8) - 1)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as u8 as usize
    }
}

bitflags::bitflags! {
    /// A bitmask of way properties, as stored in `Way::properties`.
    #[derive(Serialize, Deserialize, PartialOrd, Ord)]
    pub struct Properties: u8 {
        const PAVED          = 1 << 0;
        const MULTI_LANE     = 1 << 1;
        const BRIDGE         = 1 << 2;
        const TUNNEL         = 1 << 3;
        const FOOT_ROUTE     = 1 << 4;
        const BICYCLE_ROUTE  = 1 << 5;
    }
}

impl From<Property> for Properties {
    fn from(p: Property) -> Self {
        Properties::from_bits_truncate(p.bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_distinct() {
        let mut seen = std::collections::HashSet::new();
        for p in Property::ALL {
            assert!(seen.insert(p.bit()), "duplicate bit for {:?}", p);
        }
    }
}
