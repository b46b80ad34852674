//! Fixed-width id and measurement types shared by the build and query sides.
//!
//! Mirrors `types.h` from the original Routino C sources: every quantity that
//! ends up on disk is a small fixed-width integer with an explicit scale
//! factor, never a floating-point field, so the binary layout is stable
//! within one build.

/// A node, segment, way or relation index.
pub type IndexT = u32;

/// An undefined index of any kind (`~0u32`).
pub const NO_INDEX: IndexT = IndexT::MAX;

/// An undefined node index.
pub const NO_NODE: IndexT = NO_INDEX;

/// An undefined segment index.
pub const NO_SEGMENT: IndexT = NO_INDEX;

/// An undefined way index.
pub const NO_WAY: IndexT = NO_INDEX;

/// An undefined relation index.
pub const NO_RELATION: IndexT = NO_INDEX;

/// The number of waypoints a single route query may specify.
pub const NWAYPOINTS: usize = 99;

/// The first index in the reserved fake-node range.
///
/// Real node indices must stay below this value; fake nodes synthesised for
/// waypoints are numbered `NODE_FAKE + waypoint_index`.
pub const NODE_FAKE: IndexT = 0xffff_0000;

/// The first index in the reserved fake-segment range.
pub const SEGMENT_FAKE: IndexT = 0xffff_0000;

#[inline]
pub fn is_fake_node(node: IndexT) -> bool {
    node >= NODE_FAKE && node != NO_NODE
}

#[inline]
pub fn is_fake_segment(seg: IndexT) -> bool {
    seg >= SEGMENT_FAKE && seg != NO_SEGMENT
}

/// A node latitude or longitude, scaled-integer radians (`LAT_LONG_SCALE`).
pub type LatLongT = i32;

/// A latitude/longitude bin number.
pub type LlBinT = i16;

/// A latitude/longitude in-bin offset, `0..LAT_LONG_BIN`.
pub type LlOffT = u16;

/// Sentinel for "no location" (used by pruned/collapsed nodes).
pub const NO_LATLONG: LatLongT = i32::MIN + 1; // matches 0x80000001-ish sentinel role

/// Radians-to-integer scale factor (`1024 * 65536`).
pub const LAT_LONG_SCALE: f64 = (1024 * 65536) as f64;

/// Width of one geographic bin in scaled-integer units.
pub const LAT_LONG_BIN: i32 = 65536;

#[inline]
pub fn latlong_to_bin(x: LatLongT) -> LlBinT {
    (x & !(LAT_LONG_BIN - 1)).div_euclid(LAT_LONG_BIN) as LlBinT
}

#[inline]
pub fn bin_to_latlong(bin: LlBinT) -> LatLongT {
    (bin as LatLongT) * LAT_LONG_BIN
}

#[inline]
pub fn latlong_to_off(x: LatLongT) -> LlOffT {
    (x & (LAT_LONG_BIN - 1)) as LlOffT
}

#[inline]
pub fn off_to_latlong(off: LlOffT) -> LatLongT {
    off as LatLongT
}

#[inline]
pub fn radians_to_latlong(radians: f64) -> LatLongT {
    (radians * LAT_LONG_SCALE + 0.5).floor() as LatLongT
}

#[inline]
pub fn latlong_to_radians(x: LatLongT) -> f64 {
    x as f64 / LAT_LONG_SCALE
}

#[inline]
pub fn radians_to_degrees(r: f64) -> f64 {
    r * (180.0 / std::f64::consts::PI)
}

#[inline]
pub fn degrees_to_radians(d: f64) -> f64 {
    d * (std::f64::consts::PI / 180.0)
}

/// A distance in metres, with four high bits reserved for direction/level flags.
pub type DistanceT = u32;

/// A duration, measured in tenths of a second.
pub type DurationT = u32;

/// A routing optimisation score (distance-or-duration divided by preference).
pub type ScoreT = f32;

pub const ONEWAY_1TO2: DistanceT = 0x8000_0000;
pub const ONEWAY_2TO1: DistanceT = 0x4000_0000;
pub const SEGMENT_SUPER: DistanceT = 0x2000_0000;
pub const SEGMENT_NORMAL: DistanceT = 0x1000_0000;

const DISTANCE_FLAGS: DistanceT = ONEWAY_1TO2 | ONEWAY_2TO1 | SEGMENT_SUPER | SEGMENT_NORMAL;

/// Strips the direction/level flag bits, leaving the plain distance in metres.
#[inline]
pub fn distance(x: DistanceT) -> DistanceT {
    x & !DISTANCE_FLAGS
}

/// Retains only the direction/level flag bits.
#[inline]
pub fn distflag(x: DistanceT) -> DistanceT {
    x & DISTANCE_FLAGS
}

/// A very large, "unreachable" distance.
pub const INF_DISTANCE: DistanceT = DistanceT::MAX & !DISTANCE_FLAGS;

/// A very large, "unreachable" score.
pub const INF_SCORE: ScoreT = 1e30;

/// Impassability marker: both the way's and the profile's speed for a
/// highway type are unset. The original C implementation folds this case
/// into a literal ten-hour duration and lets the arithmetic naturally make
/// the edge unattractive; this port instead rejects such edges outright
/// before any arithmetic happens (see `routino-router::profile::Profile::duration`).
pub const IMPASSABLE: Option<DurationT> = None;

#[inline]
pub fn distance_to_km(d: DistanceT) -> f64 {
    d as f64 / 1000.0
}

#[inline]
pub fn km_to_distance(km: f64) -> DistanceT {
    (km * 1000.0) as DistanceT
}

#[inline]
pub fn duration_to_minutes(d: DurationT) -> f64 {
    d as f64 / 600.0
}

#[inline]
pub fn duration_to_hours(d: DurationT) -> f64 {
    d as f64 / 36000.0
}

#[inline]
pub fn hours_to_duration(h: f64) -> DurationT {
    (h * 36000.0) as DurationT
}

/// `distance / speed -> duration`, where speed is km/h.
#[inline]
pub fn distance_speed_to_duration(d: DistanceT, speed_kph: u32) -> DurationT {
    if speed_kph == 0 {
        return INF_DISTANCE;
    }
    ((d as f64 / speed_kph as f64) * 360.0) as DurationT
}

/// Speed in km/h.
pub type SpeedT = u8;
/// Vehicle weight in steps of 0.2 tonnes.
pub type WeightT = u8;
/// Vehicle height in steps of 0.1 metres.
pub type HeightT = u8;
/// Vehicle width in steps of 0.1 metres.
pub type WidthT = u8;
/// Vehicle length in steps of 0.1 metres.
pub type LengthT = u8;

#[inline]
pub fn tonnes_to_weight(t: f64) -> WeightT {
    (t * 5.0).round() as WeightT
}
#[inline]
pub fn weight_to_tonnes(w: WeightT) -> f64 {
    w as f64 / 5.0
}
#[inline]
pub fn metres_to_height(m: f64) -> HeightT {
    (m * 10.0).round() as HeightT
}
#[inline]
pub fn height_to_metres(h: HeightT) -> f64 {
    h as f64 / 10.0
}
#[inline]
pub fn metres_to_width(m: f64) -> WidthT {
    (m * 10.0).round() as WidthT
}
#[inline]
pub fn width_to_metres(w: WidthT) -> f64 {
    w as f64 / 10.0
}
#[inline]
pub fn metres_to_length(m: f64) -> LengthT {
    (m * 10.0).round() as LengthT
}
#[inline]
pub fn length_to_metres(l: LengthT) -> f64 {
    l as f64 / 10.0
}

/// Node flag bits (stored in `Node::flags` in the compact store).
pub mod node_flags {
    pub const SUPER: u16 = 0x8000;
    pub const UTURN: u16 = 0x4000;
    pub const MINI_ROUNDABOUT: u16 = 0x2000;
    pub const TURN_RESTRICTED: u16 = 0x1000;
    pub const TURN_RESTRICTED2: u16 = 0x0800;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_roundtrip() {
        for &deg in &[-179.999, -90.0, -0.1, 0.0, 0.1, 45.333, 89.9, 179.9] {
            let radians = degrees_to_radians(deg);
            let ll = radians_to_latlong(radians);
            let bin = latlong_to_bin(ll);
            let off = latlong_to_off(ll);
            let back = bin_to_latlong(bin) + off_to_latlong(off);
            assert_eq!(ll, back, "roundtrip failed for {deg}");
        }
    }

    #[test]
    fn distance_flag_masking() {
        let d = 1234u32 | ONEWAY_1TO2 | SEGMENT_NORMAL;
        assert_eq!(distance(d), 1234);
        assert_eq!(distflag(d), ONEWAY_1TO2 | SEGMENT_NORMAL);
    }

    #[test]
    fn fake_ranges_disjoint_from_real() {
        assert!(!is_fake_node(0));
        assert!(!is_fake_node(NODE_FAKE - 1));
        assert!(is_fake_node(NODE_FAKE));
        assert!(is_fake_node(NODE_FAKE + 98));
        assert!(!is_fake_node(NO_NODE));
    }
}
