//! Transport modes and their bitmask companion type.

use serde::{Deserialize, Serialize};

/// A mode of transport a profile routes for, or a way allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Transport {
    Foot = 1,
    Horse = 2,
    Wheelchair = 3,
    Bicycle = 4,
    Moped = 5,
    Motorcycle = 6,
    Motorcar = 7,
    Goods = 8,
    Hgv = 9,
    Psv = 10,
}

/// One more than the number of transport modes.
pub const TRANSPORT_COUNT: usize = 11;

impl Transport {
    pub const ALL: [Transport; 10] = [
        Transport::Foot,
        Transport::Horse,
        Transport::Wheelchair,
        Transport::Bicycle,
        Transport::Moped,
        Transport::Motorcycle,
        Transport::Motorcar,
        Transport::Goods,
        Transport::Hgv,
        Transport::Psv,
    ];

    /// Total mapping from an OSM access-tag transport keyword
    /// (`foot`, `bicycle`, `motor_vehicle`, ...) to a `Transport`. Unknown
    /// keywords return `None` and are ignored by the tagging layer.
    pub fn from_tag(value: &str) -> Option<Transport> {
        Some(match value {
            "foot" => Transport::Foot,
            "horse" => Transport::Horse,
            "wheelchair" => Transport::Wheelchair,
            "bicycle" => Transport::Bicycle,
            "moped" | "mofa" => Transport::Moped,
            "motorcycle" => Transport::Motorcycle,
            "motorcar" | "motor_vehicle" => Transport::Motorcar,
            "goods" => Transport::Goods,
            "hgv" => Transport::Hgv,
            "psv" | "bus" => Transport::Psv,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Transport::Foot => "foot",
            Transport::Horse => "horse",
            Transport::Wheelchair => "wheelchair",
            Transport::Bicycle => "bicycle",
            Transport::Moped => "moped",
            Transport::Motorcycle => "motorcycle",
            Transport::Motorcar => "motorcar",
            Transport::Goods => "goods",
            Transport::Hgv => "hgv",
            Transport::Psv => "psv",
        }
    }

    #[inline]
    pub fn bit(self) -> u16 {
        1u16 << ((self as u8) - 1)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as u8 as usize
    }
}

bitflags::bitflags! {
    /// A bitmask of transport modes, as stored in `Way::allow` and
    /// `TurnRelation::except`.
    #[derive(Serialize, Deserialize, PartialOrd, Ord)]
    pub struct Transports: u16 {
        const FOOT       = 1 << 0;
        const HORSE      = 1 << 1;
        const WHEELCHAIR = 1 << 2;
        const BICYCLE    = 1 << 3;
        const MOPED      = 1 << 4;
        const MOTORCYCLE = 1 << 5;
        const MOTORCAR   = 1 << 6;
        const GOODS      = 1 << 7;
        const HGV        = 1 << 8;
        const PSV        = 1 << 9;
    }
}

impl From<Transport> for Transports {
    fn from(t: Transport) -> Self {
        Transports::from_bits_truncate(t.bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_lookup_total_on_known_values() {
        assert_eq!(Transport::from_tag("bicycle"), Some(Transport::Bicycle));
        assert_eq!(Transport::from_tag("spaceship"), None);
    }

    #[test]
    fn bits_distinct() {
        let mut seen = std::collections::HashSet::new();
        for t in Transport::ALL {
            assert!(seen.insert(t.bit()), "duplicate bit for {:?}", t);
        }
    }
}
