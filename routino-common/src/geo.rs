//! Geographic distance helpers shared by the builder's segment-length pass
//! and the router's nearest-feature search.

use crate::units::{latlong_to_radians, LatLongT};

/// Mean Earth radius in metres (WGS84 authalic radius, as used throughout
/// the original sources for great-circle distance).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Great-circle distance between two points, in metres.
///
/// Takes scaled-integer lat/long pairs directly so callers never need to
/// round-trip through floating-point degrees.
pub fn haversine_distance_m(lat1: LatLongT, lon1: LatLongT, lat2: LatLongT, lon2: LatLongT) -> f64 {
    let lat1 = latlong_to_radians(lat1 as f64);
    let lon1 = latlong_to_radians(lon1 as f64);
    let lat2 = latlong_to_radians(lat2 as f64);
    let lon2 = latlong_to_radians(lon2 as f64);

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Perpendicular distance in metres from point `p` to the great-circle
/// segment `a`-`b`, clamped to the segment's endpoints when the foot of the
/// perpendicular falls outside it.
///
/// Used by the nearest-feature search to rank candidate segments rather than
/// just their endpoint nodes. Approximates the segment as locally flat
/// (equirectangular projection centred on `a`), which is accurate enough at
/// the scale of a single OSM way.
pub fn distance_to_segment_m(
    plat: LatLongT,
    plon: LatLongT,
    alat: LatLongT,
    alon: LatLongT,
    blat: LatLongT,
    blon: LatLongT,
) -> f64 {
    let lat0 = latlong_to_radians(alat as f64);
    let cos_lat0 = lat0.cos();

    let to_xy = |lat: LatLongT, lon: LatLongT| -> (f64, f64) {
        let lat_r = latlong_to_radians(lat as f64);
        let lon_r = latlong_to_radians(lon as f64);
        let x = (lon_r - latlong_to_radians(alon as f64)) * cos_lat0 * EARTH_RADIUS_M;
        let y = (lat_r - lat0) * EARTH_RADIUS_M;
        (x, y)
    };

    let (px, py) = to_xy(plat, plon);
    let (ax, ay) = (0.0, 0.0);
    let (bx, by) = to_xy(blat, blon);

    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;

    let t = if len2 <= f64::EPSILON {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    };

    let cx = ax + t * dx;
    let cy = ay + t * dy;

    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::radians_to_latlong;

    fn ll(deg: f64) -> LatLongT {
        radians_to_latlong(deg.to_radians())
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        let d = haversine_distance_m(ll(51.5), ll(-0.1), ll(51.5), ll(-0.1));
        assert!(d < 1.0);
    }

    #[test]
    fn haversine_one_degree_longitude_at_equator_is_about_111km() {
        let d = haversine_distance_m(ll(0.0), ll(0.0), ll(0.0), ll(1.0));
        assert!((d - 111_319.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn distance_to_segment_zero_on_the_segment() {
        let d = distance_to_segment_m(ll(51.50), ll(-0.10), ll(51.50), ll(-0.10), ll(51.51), ll(-0.10));
        assert!(d < 1.0);
    }

    #[test]
    fn distance_to_segment_clamps_to_endpoint() {
        // Point far beyond `b` along the line should measure from `b`, not
        // extrapolate past it.
        let past_b = distance_to_segment_m(ll(51.52), ll(-0.10), ll(51.50), ll(-0.10), ll(51.51), ll(-0.10));
        let at_b = haversine_distance_m(ll(51.52), ll(-0.10), ll(51.51), ll(-0.10));
        assert!((past_b - at_b).abs() < 1.0, "past_b={past_b} at_b={at_b}");
    }
}
