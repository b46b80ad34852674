//! Nearest-feature search (§4.H): given a query point and a profile, finds
//! the closest routable segment by expanding outward through the bin grid
//! one ring at a time.
//!
//! Grounded on the same bin-grid layout [`routino_graph::compact::nodes`]
//! uses for on-disk storage, and reuses the equirectangular-projection
//! distance approximation from [`routino_common::geo::distance_to_segment_m`]
//! (duplicated here rather than called directly, since the search also needs
//! the interpolation parameter that function doesn't expose).

use std::collections::HashSet;

use routino_common::geo::EARTH_RADIUS_M;
use routino_common::property::Properties;
use routino_common::transport::Transports;
use routino_common::units::{self, IndexT, LatLongT, LlBinT};
use routino_graph::compact::nodes::NodesFile;
use routino_graph::compact::segments::{Segment, SegmentsFile};
use routino_graph::compact::ways::{Way, WaysFile};

use crate::fakes::SnappedSegment;
use crate::profile::Profile;

/// The closest usable segment found, and its perpendicular distance in
/// metres from the query point.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatch {
    pub snapped: SnappedSegment,
    pub distance_m: f64,
}

/// Searches outward from `(lat, lon)` for the nearest segment whose way this
/// `profile` can use, stopping once growing the search ring further cannot
/// possibly improve on the best match found so far, or once `max_distance_m`
/// is exceeded with nothing found.
pub fn find_nearest_segment(
    nodes: &NodesFile,
    segments: &SegmentsFile,
    ways: &WaysFile,
    profile: &Profile,
    lat: LatLongT,
    lon: LatLongT,
    max_distance_m: f64,
) -> Option<NearestMatch> {
    let center_lat_bin = units::latlong_to_bin(lat);
    let center_lon_bin = units::latlong_to_bin(lon);

    let bin_m = bin_size_m(lat).max(1.0);
    let max_ring = ((max_distance_m / bin_m).ceil() as i32 + 1).max(1);

    let mut best: Option<NearestMatch> = None;
    let mut seen_segments: HashSet<IndexT> = HashSet::new();

    for r in 0..=max_ring {
        // Nothing in a bin at ring r can be closer than (r - 1) whole bin
        // widths away from the query point; once that lower bound clears the
        // best match found so far, further rings can't win.
        if let Some(b) = &best {
            let ring_lower_bound_m = ((r - 1).max(0)) as f64 * bin_m;
            if ring_lower_bound_m > b.distance_m {
                break;
            }
        }

        for (lat_bin, lon_bin) in ring_bins(center_lat_bin, center_lon_bin, r) {
            if !bin_in_range(nodes, lat_bin, lon_bin) {
                continue;
            }

            let bin_idx = nodes.bin_index(lat_bin, lon_bin);
            let start = nodes.offsets[bin_idx] as usize;
            let end = nodes.offsets[bin_idx + 1] as usize;

            for node_index in start..end {
                let node = &nodes.nodes[node_index];
                let node_lat = units::bin_to_latlong(lat_bin) + units::off_to_latlong(node.lat_offset);
                let node_lon = units::bin_to_latlong(lon_bin) + units::off_to_latlong(node.lon_offset);

                for (seg_index, seg) in incident_segments(segments, node.first_segment, node.first_segment2) {
                    if !seg.is_normal() || !seen_segments.insert(seg_index) {
                        continue;
                    }

                    let way = &ways.ways[seg.way as usize];
                    if !segment_usable(profile, way) {
                        continue;
                    }

                    let other_node = seg.other_node(node_index as IndexT);
                    let (other_lat, other_lon) = node_latlon(nodes, other_node);
                    let (node1_lat, node1_lon, node2_lat, node2_lon) = if seg.node1 == node_index as IndexT {
                        (node_lat, node_lon, other_lat, other_lon)
                    } else {
                        (other_lat, other_lon, node_lat, node_lon)
                    };

                    let (perp_m, t) = project_point_on_segment(lat, lon, node1_lat, node1_lon, node2_lat, node2_lon);
                    if perp_m > max_distance_m {
                        continue;
                    }
                    if best.as_ref().is_some_and(|b| perp_m >= b.distance_m) {
                        continue;
                    }

                    let distance = seg.distance() as f64;
                    best = Some(NearestMatch {
                        distance_m: perp_m,
                        snapped: SnappedSegment {
                            segment_real: seg_index,
                            node1: seg.node1,
                            node2: seg.node2,
                            way: seg.way,
                            oneway_1to2: seg.is_oneway_1to2(),
                            oneway_2to1: seg.is_oneway_2to1(),
                            d1: t * distance,
                            d2: (1.0 - t) * distance,
                            lat,
                            lon,
                        },
                    });
                }
            }
        }
    }

    best
}

fn bin_in_range(nodes: &NodesFile, lat_bin: LlBinT, lon_bin: LlBinT) -> bool {
    lat_bin >= nodes.header.lat_zero
        && lat_bin < nodes.header.lat_zero + nodes.header.lat_bins as LlBinT
        && lon_bin >= nodes.header.lon_zero
        && lon_bin < nodes.header.lon_zero + nodes.header.lon_bins as LlBinT
}

/// The bins at exactly Chebyshev distance `r` from the centre bin (the
/// centre bin itself when `r == 0`).
fn ring_bins(center_lat_bin: LlBinT, center_lon_bin: LlBinT, r: i32) -> Vec<(LlBinT, LlBinT)> {
    if r == 0 {
        return vec![(center_lat_bin, center_lon_bin)];
    }
    let mut bins = Vec::new();
    for dlat in -r..=r {
        for dlon in -r..=r {
            if dlat.abs() != r && dlon.abs() != r {
                continue;
            }
            bins.push((center_lat_bin + dlat as LlBinT, center_lon_bin + dlon as LlBinT));
        }
    }
    bins
}

fn incident_segments(segments: &SegmentsFile, first1: IndexT, first2: IndexT) -> Vec<(IndexT, &Segment)> {
    let mut out = Vec::new();
    let mut cur = first1;
    while cur != units::NO_SEGMENT {
        let seg = &segments.segments[cur as usize];
        out.push((cur, seg));
        cur = seg.next1;
    }
    let mut cur = first2;
    while cur != units::NO_SEGMENT {
        let seg = &segments.segments[cur as usize];
        out.push((cur, seg));
        cur = seg.next2;
    }
    out
}

fn segment_usable(profile: &Profile, way: &Way) -> bool {
    let way_allow = Transports::from_bits_truncate(way.allow);
    if !profile.allowed_mask.intersects(way_allow) {
        return false;
    }
    if profile.highway_multiplier(way.highway_type() as usize) <= 0.0 {
        return false;
    }
    if profile.violates_vehicle_limits(way) {
        return false;
    }
    let props = Properties::from_bits_truncate(way.properties);
    profile.property_multiplier(props) > 0.0
}

/// The real-world latitude/longitude of node `index`, recovered from its
/// in-bin offset plus the bin that `index` falls in (found by bisecting the
/// bin-offset table, since a `Node` doesn't carry its own bin).
/// Real-node coordinates, resolved from the bin index plus per-node offset
/// (§3). Fake nodes are looked up via [`crate::Fakes::fake_lat_long`]
/// instead.
pub fn node_latlon(nodes: &NodesFile, index: IndexT) -> (LatLongT, LatLongT) {
    let node = &nodes.nodes[index as usize];
    let bin_idx = nodes.offsets.partition_point(|&o| o <= index) - 1;
    let lon_bins = nodes.header.lon_bins as usize;
    let lat_bin = nodes.header.lat_zero + (bin_idx / lon_bins) as LlBinT;
    let lon_bin = nodes.header.lon_zero + (bin_idx % lon_bins) as LlBinT;
    (
        units::bin_to_latlong(lat_bin) + units::off_to_latlong(node.lat_offset),
        units::bin_to_latlong(lon_bin) + units::off_to_latlong(node.lon_offset),
    )
}

fn bin_size_m(lat: LatLongT) -> f64 {
    let bin_radians = units::LAT_LONG_BIN as f64 / units::LAT_LONG_SCALE;
    let lat_size = bin_radians * EARTH_RADIUS_M;
    let lon_size = bin_radians * EARTH_RADIUS_M * units::latlong_to_radians(lat as f64).cos().abs().max(1e-6);
    lat_size.min(lon_size)
}

/// Perpendicular distance in metres from `p` to the great-circle segment
/// `a`-`b`, plus the clamped interpolation parameter `t` (`0` at `a`, `1` at
/// `b`) of the closest point, using the same locally-flat equirectangular
/// approximation as [`routino_common::geo::distance_to_segment_m`].
fn project_point_on_segment(
    plat: LatLongT,
    plon: LatLongT,
    alat: LatLongT,
    alon: LatLongT,
    blat: LatLongT,
    blon: LatLongT,
) -> (f64, f64) {
    let lat0 = units::latlong_to_radians(alat as f64);
    let lon0 = units::latlong_to_radians(alon as f64);
    let cos_lat0 = lat0.cos();

    let to_xy = |lat: LatLongT, lon: LatLongT| -> (f64, f64) {
        let lat_r = units::latlong_to_radians(lat as f64);
        let lon_r = units::latlong_to_radians(lon as f64);
        ((lon_r - lon0) * cos_lat0 * EARTH_RADIUS_M, (lat_r - lat0) * EARTH_RADIUS_M)
    };

    let (px, py) = to_xy(plat, plon);
    let (bx, by) = to_xy(blat, blon);

    let len2 = bx * bx + by * by;
    let t = if len2 <= f64::EPSILON { 0.0 } else { ((px * bx + py * by) / len2).clamp(0.0, 1.0) };

    let cx = t * bx;
    let cy = t * by;
    (((px - cx).powi(2) + (py - cy).powi(2)).sqrt(), t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use routino_common::highway::Highway;
    use routino_common::transport::Transport;
    use routino_common::units::radians_to_latlong;
    use routino_graph::compact::nodes::{Node, NodesHeader};
    use routino_graph::compact::segments::SegmentsHeader;
    use routino_graph::compact::ways::WaysHeader;
    use crate::profile::Optimisation;

    fn ll(deg: f64) -> LatLongT {
        radians_to_latlong(deg.to_radians())
    }

    fn bicycle_profile() -> Profile {
        let mut p = Profile::new("bicycle", Transport::Bicycle, Optimisation::Shortest);
        p.highway_pref[Highway::Residential.index()] = 100.0;
        p.speed[Highway::Residential.index()] = 20.0;
        let mut header = WaysHeader::zeroed();
        header.allow_union = Transports::BICYCLE.bits();
        header.highways_union = Highway::Residential.bit();
        p.normalize(&header).unwrap();
        p
    }

    /// A single residential way, one segment, two nodes 0.001 deg apart,
    /// both in the same bin, found via its own (trivially small) grid.
    fn single_segment_fixtures() -> (NodesFile, SegmentsFile, WaysFile) {
        let lat_a = ll(51.50);
        let lat_b = ll(51.501);
        let lon_ab = ll(-0.10);

        let lat_bin = units::latlong_to_bin(lat_a);
        let lon_bin = units::latlong_to_bin(lon_ab);
        assert_eq!(lat_bin, units::latlong_to_bin(lat_b), "fixture must share one bin");

        let node_a = Node::new(0, units::latlong_to_off(lat_a), units::latlong_to_off(lon_ab), Transports::BICYCLE.bits(), 0, units::NO_INDEX);
        let node_b = Node::new(units::NO_INDEX, units::latlong_to_off(lat_b), units::latlong_to_off(lon_ab), Transports::BICYCLE.bits(), 0, 0);

        let mut nodes_header = NodesHeader::zeroed();
        nodes_header.n_nodes = 2;
        nodes_header.lat_bins = 1;
        nodes_header.lon_bins = 1;
        nodes_header.lat_zero = lat_bin;
        nodes_header.lon_zero = lon_bin;

        let nodes = NodesFile {
            header: nodes_header,
            offsets: vec![0, 2],
            nodes: vec![node_a, node_b],
        };

        let seg = Segment {
            node1: 0,
            node2: 1,
            next1: units::NO_SEGMENT,
            next2: units::NO_SEGMENT,
            way: 0,
            distance_and_flags: 111 | units::SEGMENT_NORMAL,
        };
        let mut seg_header = SegmentsHeader::zeroed();
        seg_header.n_total = 1;
        seg_header.n_normal = 1;
        let segments = SegmentsFile { header: seg_header, segments: vec![seg] };

        let mut way = Way::zeroed();
        way.allow = Transports::BICYCLE.bits();
        way.highway = Highway::Residential.index() as u8;
        way.speed = 20;
        let mut ways_header = WaysHeader::zeroed();
        ways_header.n_ways = 1;
        ways_header.n_original = 1;
        ways_header.allow_union = Transports::BICYCLE.bits();
        ways_header.highways_union = Highway::Residential.bit();
        let ways = WaysFile { header: ways_header, ways: vec![way], name_blob: vec![0] };

        (nodes, segments, ways)
    }

    #[test]
    fn finds_the_only_segment_near_its_midpoint() {
        let (nodes, segments, ways) = single_segment_fixtures();
        let profile = bicycle_profile();

        let query_lat = ll(51.5005);
        let query_lon = ll(-0.10);

        let m = find_nearest_segment(&nodes, &segments, &ways, &profile, query_lat, query_lon, 500.0).unwrap();
        assert_eq!(m.snapped.segment_real, 0);
        assert!(m.distance_m < 5.0, "distance_m = {}", m.distance_m);
        assert!((m.snapped.d1 - m.snapped.d2).abs() < 5.0);
    }

    #[test]
    fn returns_none_when_nothing_within_max_distance() {
        let (nodes, segments, ways) = single_segment_fixtures();
        let profile = bicycle_profile();

        let far_lat = ll(52.0);
        let far_lon = ll(-0.10);
        assert!(find_nearest_segment(&nodes, &segments, &ways, &profile, far_lat, far_lon, 50.0).is_none());
    }
}
