//! Comma-joined name lists for a bitmask, used by `--statistics` and the
//! plain-text parts of `--dump-osm` (`AllowedNameList`/`PropertiesNameList`/
//! `HighwaysNameList` in the original dumper).

use routino_common::highway::{Highway, Highways};
use routino_common::property::{Properties, Property};
use routino_common::transport::{Transport, Transports};

pub fn highways_name_list(bits: u16) -> String {
    let set = Highways::from_bits_truncate(bits);
    Highway::ALL
        .iter()
        .filter(|h| set.contains(Highways::from(**h)))
        .map(|h| h.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn allowed_name_list(bits: u16) -> String {
    let set = Transports::from_bits_truncate(bits);
    Transport::ALL
        .iter()
        .filter(|t| set.contains(Transports::from(**t)))
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn properties_name_list(bits: u8) -> String {
    let set = Properties::from_bits_truncate(bits);
    Property::ALL
        .iter()
        .filter(|p| set.contains(Properties::from(**p)))
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_name_list_lists_only_set_bits() {
        let bits = Transports::FOOT | Transports::BICYCLE;
        assert_eq!(allowed_name_list(bits.bits()), "foot, bicycle");
    }

    #[test]
    fn highways_name_list_empty_for_no_bits() {
        assert_eq!(highways_name_list(0), "");
    }
}
