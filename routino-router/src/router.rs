//! The three-phase router (§4.H): `FindStartRoutes`/`FindFinishRoutes` on
//! the normal graph, `FindMiddleRoute` on the super-graph, combined with a
//! direct-path fallback. Drives [`crate::fakes::Fakes`] and
//! [`crate::nearest::find_nearest_segment`] to turn raw waypoints into a
//! routable node/segment path.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use routino_common::geo::haversine_distance_m;
use routino_common::property::Properties;
use routino_common::transport::Transports;
use routino_common::units::{self, DistanceT, IndexT, LatLongT, ScoreT};
use routino_graph::compact::nodes::NodesFile;
use routino_graph::compact::relations::RelationsFile;
use routino_graph::compact::segments::SegmentsFile;
use routino_graph::compact::ways::WaysFile;

use crate::error::{RouteError, RouteResult};
use crate::fakes::Fakes;
use crate::nearest::{find_nearest_segment, node_latlon};
use crate::profile::{Optimisation, Profile};
use crate::results::Results;

/// The graph level an edge relaxation is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Normal,
    Super,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// A fully expanded route leg between two consecutive waypoints: every node
/// and segment actually travelled, not just the super-graph shortcut.
#[derive(Debug, Clone)]
pub struct RouteLeg {
    pub nodes: Vec<IndexT>,
    /// `segments[i]` connects `nodes[i]` to `nodes[i + 1]`; one shorter than
    /// `nodes`.
    pub segments: Vec<IndexT>,
    pub score: ScoreT,
}

/// Borrows the compact stores and the query-scoped fake state needed to
/// answer one route request.
pub struct Router<'a> {
    nodes: &'a NodesFile,
    segments: &'a SegmentsFile,
    ways: &'a WaysFile,
    relations: &'a RelationsFile,
    fakes: &'a Fakes,
}

/// Order by `sortby` only; route scores are always finite, so a `NaN`-less
/// total order is safe.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapKey(ScoreT);
impl Eq for HeapKey {}
impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl<'a> Router<'a> {
    pub fn new(nodes: &'a NodesFile, segments: &'a SegmentsFile, ways: &'a WaysFile, relations: &'a RelationsFile, fakes: &'a Fakes) -> Self {
        Router { nodes, segments, ways, relations, fakes }
    }

    fn node_is_super(&self, node: IndexT) -> bool {
        !units::is_fake_node(node) && self.nodes.nodes[node as usize].is_super()
    }

    fn node_allow(&self, node: IndexT) -> Transports {
        if units::is_fake_node(node) {
            Transports::all()
        } else {
            Transports::from_bits_truncate(self.nodes.nodes[node as usize].allow)
        }
    }

    fn node_latlon(&self, node: IndexT) -> (LatLongT, LatLongT) {
        if units::is_fake_node(node) {
            self.fakes.fake_lat_long(node).unwrap_or((0, 0))
        } else {
            node_latlon(self.nodes, node)
        }
    }

    fn seg_node1(&self, seg: IndexT) -> IndexT {
        if units::is_fake_segment(seg) {
            self.fakes.lookup_fake_segment(seg).unwrap().node1
        } else {
            self.segments.segments[seg as usize].node1
        }
    }

    fn other_node(&self, seg: IndexT, node: IndexT) -> IndexT {
        if units::is_fake_segment(seg) {
            self.fakes.lookup_fake_segment(seg).unwrap().other_node(node)
        } else {
            self.segments.segments[seg as usize].other_node(node)
        }
    }

    fn seg_way(&self, seg: IndexT) -> IndexT {
        if units::is_fake_segment(seg) {
            self.fakes.lookup_fake_segment(seg).unwrap().way
        } else {
            self.segments.segments[seg as usize].way
        }
    }

    fn seg_distance(&self, seg: IndexT) -> DistanceT {
        if units::is_fake_segment(seg) {
            self.fakes.lookup_fake_segment(seg).unwrap().distance
        } else {
            self.segments.segments[seg as usize].distance()
        }
    }

    fn allows_forward(&self, seg: IndexT) -> bool {
        if units::is_fake_segment(seg) {
            self.fakes.lookup_fake_segment(seg).unwrap().allows_forward()
        } else {
            self.segments.segments[seg as usize].allows_forward()
        }
    }

    fn allows_backward(&self, seg: IndexT) -> bool {
        if units::is_fake_segment(seg) {
            self.fakes.lookup_fake_segment(seg).unwrap().allows_backward()
        } else {
            self.segments.segments[seg as usize].allows_backward()
        }
    }

    fn is_normal(&self, seg: IndexT) -> bool {
        units::is_fake_segment(seg) || self.segments.segments[seg as usize].is_normal()
    }

    fn is_super(&self, seg: IndexT) -> bool {
        !units::is_fake_segment(seg) && self.segments.segments[seg as usize].is_super()
    }

    /// The real segment underlying `seg` (itself, if `seg` is already real).
    fn real(&self, seg: IndexT) -> IndexT {
        self.fakes.real(seg)
    }

    /// Every segment incident to `node`, combining the node's own two
    /// adjacency chains (when real) with any fake half-segments registered
    /// against it (whether `node` itself is fake, or a real endpoint a fake
    /// node was cut near).
    fn incident_segments(&self, node: IndexT) -> Vec<IndexT> {
        let mut out = Vec::new();

        if !units::is_fake_node(node) {
            let real = &self.nodes.nodes[node as usize];
            let mut cur = real.first_segment;
            while cur != units::NO_SEGMENT {
                out.push(cur);
                cur = self.segments.segments[cur as usize].next1;
            }
            let mut cur = real.first_segment2;
            while cur != units::NO_SEGMENT {
                out.push(cur);
                cur = self.segments.segments[cur as usize].next2;
            }
        }

        let mut cur = self.fakes.first_fake_segment(node);
        while let Some(seg_ptr) = cur {
            out.push(seg_ptr);
            cur = self.fakes.next_fake_segment(seg_ptr, node);
        }

        out
    }

    /// Rejects or prices one edge out of `node1`, arriving via `segment`
    /// (having previously arrived at `node1` via `seg1`, or `NO_SEGMENT` at
    /// a true start). `direction` lets Phase 2 reuse the exact same rules
    /// while walking edges backwards (§4.H "Edge relaxation").
    fn relax_edge(&self, profile: &Profile, direction: Direction, level: Level, node1: IndexT, seg1: IndexT, segment: IndexT) -> Option<(IndexT, ScoreT)> {
        match level {
            Level::Normal => {
                if !self.is_normal(segment) {
                    return None;
                }
            }
            Level::Super => {
                if !self.is_super(segment) {
                    return None;
                }
            }
        }

        let node2 = self.other_node(segment, node1);

        if profile.obey_oneway {
            let (from, _to) = match direction {
                Direction::Forward => (node1, node2),
                Direction::Backward => (node2, node1),
            };
            let forward_internal = self.seg_node1(segment) == from;
            let allowed = if forward_internal { self.allows_forward(segment) } else { self.allows_backward(segment) };
            if !allowed {
                return None;
            }
        }

        if profile.obey_turns && seg1 != units::NO_SEGMENT {
            let is_u_turn = seg1 == segment
                || seg1 == self.real(segment)
                || self.real(seg1) == segment
                || (self.real(seg1) == self.real(segment) && self.fakes.is_fake_u_turn(seg1, segment));
            if is_u_turn {
                return None;
            }

            if !units::is_fake_node(node1) {
                let transport_bit = profile.transport.bit();
                let forbidden = self
                    .relations
                    .relations_via(node1)
                    .iter()
                    .any(|tr| tr.forbids(self.real(seg1), node1, self.real(segment), transport_bit));
                if forbidden {
                    return None;
                }
            }
        }

        let way_index = self.seg_way(segment);
        let way = &self.ways.ways[way_index as usize];

        let way_allow = Transports::from_bits_truncate(way.allow);
        if !way_allow.contains(Transports::from(profile.transport)) {
            return None;
        }
        if !self.node_allow(node2).contains(Transports::from(profile.transport)) {
            return None;
        }
        if profile.violates_vehicle_limits(way) {
            return None;
        }

        let highway_pref = profile.highway_multiplier(way.highway_type() as usize);
        if highway_pref <= 0.0 {
            return None;
        }
        let property_mult = profile.property_multiplier(Properties::from_bits_truncate(way.properties));
        if property_mult <= 0.0 {
            return None;
        }
        let denom = highway_pref * property_mult;

        let distance = self.seg_distance(segment);
        let base = match profile.optimisation {
            Optimisation::Shortest => distance as f64,
            Optimisation::Quickest => profile.duration(distance, way.speed, way.highway_type() as usize)? as f64,
        };

        Some((node2, (base / denom) as ScoreT))
    }

    fn heuristic(&self, profile: &Profile, node: IndexT, finish_lat: LatLongT, finish_lon: LatLongT) -> ScoreT {
        let (lat, lon) = self.node_latlon(node);
        let straight_m = haversine_distance_m(lat, lon, finish_lat, finish_lon);
        let estimate = match profile.optimisation {
            Optimisation::Shortest => straight_m,
            Optimisation::Quickest => units::distance_speed_to_duration(straight_m.round() as DistanceT, profile.max_speed.round() as u32) as f64,
        };
        (estimate / profile.max_pref) as ScoreT
    }

    /// Dijkstra on the normal graph, absorbing (recording but not expanding
    /// past) every super-node other than `start_node` itself (Phase 1/2,
    /// §4.H).
    fn dijkstra_absorbing(&self, profile: &Profile, direction: Direction, start_node: IndexT, start_seg: IndexT) -> Results {
        let mut results = Results::new();
        let mut heap = BinaryHeap::new();

        results.relax(start_node, start_seg, None, 0.0, 0.0);
        heap.push(Reverse((HeapKey(0.0), start_node, start_seg)));

        while let Some(Reverse((HeapKey(sortby), node, seg))) = heap.pop() {
            let current = match results.get(node, seg) {
                Some(r) => *r,
                None => continue,
            };
            if current.sortby != sortby {
                continue;
            }
            if node != start_node && self.node_is_super(node) {
                continue;
            }

            for edge_seg in self.incident_segments(node) {
                if let Some((node2, cost)) = self.relax_edge(profile, direction, Level::Normal, node, seg, edge_seg) {
                    let new_score = current.score + cost;
                    if results.relax(node2, edge_seg, Some((node, seg)), new_score, new_score) {
                        heap.push(Reverse((HeapKey(new_score), node2, edge_seg)));
                    }
                }
            }
        }

        results
    }

    /// Plain Dijkstra on the normal graph with no super-node absorption,
    /// stopping at the first pop of `target`. Used to re-expand a single
    /// super-segment hop back into real edges when assembling the final
    /// route (§4.H "Combination").
    fn normal_dijkstra_to_target(&self, profile: &Profile, start: IndexT, start_seg: IndexT, target: IndexT) -> Option<(Vec<IndexT>, Vec<IndexT>)> {
        let mut results = Results::new();
        let mut heap = BinaryHeap::new();

        results.relax(start, start_seg, None, 0.0, 0.0);
        heap.push(Reverse((HeapKey(0.0), start, start_seg)));

        let mut best_target_seg: Option<IndexT> = None;
        let mut best_score = ScoreT::INFINITY;

        while let Some(Reverse((HeapKey(sortby), node, seg))) = heap.pop() {
            let current = match results.get(node, seg) {
                Some(r) => *r,
                None => continue,
            };
            if current.sortby != sortby {
                continue;
            }
            if sortby >= best_score {
                break;
            }
            if node == target {
                if current.score < best_score {
                    best_score = current.score;
                    best_target_seg = Some(seg);
                }
                continue;
            }

            for edge_seg in self.incident_segments(node) {
                if let Some((node2, cost)) = self.relax_edge(profile, Direction::Forward, Level::Normal, node, seg, edge_seg) {
                    let new_score = current.score + cost;
                    if results.relax(node2, edge_seg, Some((node, seg)), new_score, new_score) {
                        heap.push(Reverse((HeapKey(new_score), node2, edge_seg)));
                    }
                }
            }
        }

        best_target_seg.map(|seg| results.path_to(target, seg))
    }

    /// A* on the super-graph from every Phase 1 terminal toward the closest
    /// Phase 2 terminal, stopping as soon as no open state can beat the best
    /// combined total found (§4.H "Phase 3").
    fn astar_middle(
        &self,
        profile: &Profile,
        seeds: &[(IndexT, IndexT, ScoreT)],
        targets: &HashMap<IndexT, Vec<(IndexT, ScoreT)>>,
        finish_lat: LatLongT,
        finish_lon: LatLongT,
    ) -> Option<(Results, IndexT, IndexT, ScoreT)> {
        let mut results = Results::new();
        let mut heap = BinaryHeap::new();

        for &(node, seg, score) in seeds {
            let sortby = score + self.heuristic(profile, node, finish_lat, finish_lon);
            if results.relax(node, seg, None, score, sortby) {
                heap.push(Reverse((HeapKey(sortby), node, seg)));
            }
        }

        let mut best: Option<(IndexT, IndexT, ScoreT)> = None;

        while let Some(Reverse((HeapKey(sortby), node, seg))) = heap.pop() {
            let current = match results.get(node, seg) {
                Some(r) => *r,
                None => continue,
            };
            if current.sortby != sortby {
                continue;
            }
            if let Some((_, _, total)) = best {
                if sortby >= total {
                    break;
                }
            }

            if let Some(ends) = targets.get(&node) {
                for &(end_seg, end_score) in ends {
                    let total = current.score + end_score;
                    if best.map_or(true, |(_, _, b)| total < b) {
                        best = Some((node, end_seg, total));
                    }
                }
            }

            for edge_seg in self.incident_segments(node) {
                if let Some((node2, cost)) = self.relax_edge(profile, Direction::Forward, Level::Super, node, seg, edge_seg) {
                    let new_score = current.score + cost;
                    let new_sortby = new_score + self.heuristic(profile, node2, finish_lat, finish_lon);
                    if results.relax(node2, edge_seg, Some((node, seg)), new_score, new_sortby) {
                        heap.push(Reverse((HeapKey(new_sortby), node2, edge_seg)));
                    }
                }
            }
        }

        best.map(|(node, seg, total)| (results, node, seg, total))
    }

    /// Routes between two already-resolved nodes (real or fake), §4.H in
    /// full: start/finish Dijkstra passes, a super-graph A* in between, and
    /// a direct-path fallback when Phase 1 alone already wins.
    pub fn find_leg(&self, profile: &Profile, start_node: IndexT, finish_node: IndexT, start_seg: IndexT, waypoint_from: usize, waypoint_to: usize) -> RouteResult<RouteLeg> {
        let results1 = self.dijkstra_absorbing(profile, Direction::Forward, start_node, start_seg);
        // Dead-end waypoint: the inherited prev_segment constraint rejects
        // the only way out as a U-turn. Retry once, allowing it.
        let results1 = if start_seg != units::NO_SEGMENT && results1.iter().count() <= 1 {
            self.dijkstra_absorbing(profile, Direction::Forward, start_node, units::NO_SEGMENT)
        } else {
            results1
        };

        let direct = results1
            .iter()
            .filter(|&(node, _, _)| node == finish_node)
            .min_by(|a, b| a.2.score.partial_cmp(&b.2.score).unwrap());

        let results2 = self.dijkstra_absorbing(profile, Direction::Backward, finish_node, units::NO_SEGMENT);

        let seeds: Vec<(IndexT, IndexT, ScoreT)> = results1
            .iter()
            .filter(|&(node, _, _)| self.node_is_super(node))
            .map(|(node, seg, record)| (node, seg, record.score))
            .collect();

        let mut targets: HashMap<IndexT, Vec<(IndexT, ScoreT)>> = HashMap::new();
        for (node, seg, record) in results2.iter() {
            if self.node_is_super(node) {
                targets.entry(node).or_default().push((seg, record.score));
            }
        }

        let (finish_lat, finish_lon) = self.node_latlon(finish_node);
        let middle = if seeds.is_empty() || targets.is_empty() {
            None
        } else {
            self.astar_middle(profile, &seeds, &targets, finish_lat, finish_lon)
        };

        // Decide between the fallback and the super-graph route.
        let use_direct = match (&direct, &middle) {
            (Some((_, _, d)), Some((_, _, _, total))) => d.score <= *total,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if use_direct {
            if let Some((node, seg, record)) = direct {
                let (nodes, segments) = results1.path_to(node, seg);
                return Ok(RouteLeg { nodes, segments, score: record.score });
            }
        }

        let (results3, meet_b, end_seg, total) = match middle {
            Some(m) => m,
            None => return Err(RouteError::NotFound { from: waypoint_from, to: waypoint_to }),
        };

        // Phase 1 prefix: start_node .. meet_a (the super-node Phase 3 left from).
        // meet_a is wherever results3's reconstructed path originates -- one
        // of the seeds, recoverable by walking back to a state with no
        // predecessor.
        let (super_nodes, super_segs) = results3.path_to(meet_b, end_seg);
        let meet_a = super_nodes[0];
        let meet_a_seg = seeds.iter().find(|&&(n, _, _)| n == meet_a).map(|&(_, s, _)| s).unwrap_or(units::NO_SEGMENT);

        let (prefix_nodes, prefix_segs) = results1.path_to(meet_a, meet_a_seg);

        let mut nodes = prefix_nodes;
        let mut segments = prefix_segs;

        // Re-expand each super-segment hop into the normal edges it shortcuts.
        for i in 0..super_segs.len() {
            let from = super_nodes[i];
            let to = super_nodes[i + 1];
            match self.normal_dijkstra_to_target(profile, from, units::NO_SEGMENT, to) {
                Some((hop_nodes, hop_segs)) => {
                    nodes.extend_from_slice(&hop_nodes[1..]);
                    segments.extend(hop_segs);
                }
                None => {
                    // Super-segment construction guarantees a normal path
                    // exists; fall back to the super-segment itself rather
                    // than failing the whole route.
                    nodes.push(to);
                    segments.push(super_segs[i]);
                }
            }
        }

        let (mut suffix_nodes, mut suffix_segs) = results2.path_to(meet_b, end_seg);
        suffix_nodes.reverse();
        suffix_segs.reverse();
        nodes.extend_from_slice(&suffix_nodes[1..]);
        segments.extend(suffix_segs);

        Ok(RouteLeg { nodes, segments, score: total })
    }

    /// Picks the incident segment of `node` whose initial bearing is
    /// closest to `heading_degrees`, for the optional heading hint on the
    /// first waypoint (§4.H "Multi-waypoint").
    pub fn pick_segment_by_heading(&self, node: IndexT, heading_degrees: f64) -> Option<IndexT> {
        let (lat, lon) = self.node_latlon(node);
        self.incident_segments(node)
            .into_iter()
            .min_by(|&a, &b| {
                let da = bearing_difference(lat, lon, self.node_latlon(self.other_node(a, node)), heading_degrees);
                let db = bearing_difference(lat, lon, self.node_latlon(self.other_node(b, node)), heading_degrees);
                da.partial_cmp(&db).unwrap()
            })
    }
}

fn bearing_difference(from_lat: LatLongT, from_lon: LatLongT, to: (LatLongT, LatLongT), heading_degrees: f64) -> f64 {
    let lat1 = units::latlong_to_radians(from_lat);
    let lat2 = units::latlong_to_radians(to.0);
    let dlon = units::latlong_to_radians(to.1) - units::latlong_to_radians(from_lon);

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let bearing = units::radians_to_degrees(y.atan2(x)).rem_euclid(360.0);

    let diff = (bearing - heading_degrees).abs() % 360.0;
    diff.min(360.0 - diff)
}

/// Resolves one query waypoint to a routing node (real or fake), via the
/// nearest-feature search and [`Fakes::snap_waypoint`] (§4.G/§4.H).
pub fn resolve_waypoint(
    nodes: &NodesFile,
    segments: &SegmentsFile,
    ways: &WaysFile,
    fakes: &mut Fakes,
    profile: &Profile,
    waypoint_index: usize,
    lat: LatLongT,
    lon: LatLongT,
    max_distance_m: f64,
    same_segment_as_previous: Option<(IndexT, f64)>,
) -> RouteResult<IndexT> {
    let m = find_nearest_segment(nodes, segments, ways, profile, lat, lon, max_distance_m)
        .ok_or(RouteError::NoNearbySegment(waypoint_index))?;
    Ok(fakes.snap_waypoint(waypoint_index, &m.snapped, same_segment_as_previous))
}

/// Resolves every waypoint (snapping or faking each one onto the graph,
/// detecting adjacent waypoints that share a segment along the way) and then
/// routes leg by leg, carrying each leg's final segment forward as the next
/// leg's u-turn/turn-restriction continuity constraint (§4.H
/// "Multi-waypoint").
pub fn find_route(
    nodes: &NodesFile,
    segments: &SegmentsFile,
    ways: &WaysFile,
    relations: &RelationsFile,
    profile: &Profile,
    waypoints: &[(LatLongT, LatLongT)],
    heading_degrees: Option<f64>,
    max_distance_m: f64,
) -> RouteResult<(Vec<RouteLeg>, Fakes)> {
    if waypoints.len() > units::NWAYPOINTS {
        return Err(RouteError::TooManyWaypoints { given: waypoints.len(), max: units::NWAYPOINTS });
    }

    let mut fakes = Fakes::new();
    let mut routing_nodes = Vec::with_capacity(waypoints.len());
    // (routing node, the real segment it snapped to, distance from node1 of
    // that segment) -- kept so the next waypoint can tell whether it shares
    // the same real segment and needs a direct fake shortcut.
    let mut prev_match: Option<(IndexT, IndexT, f64)> = None;

    for (i, &(lat, lon)) in waypoints.iter().enumerate() {
        let m = find_nearest_segment(nodes, segments, ways, profile, lat, lon, max_distance_m).ok_or(RouteError::NoNearbySegment(i))?;
        let same_as_prev = prev_match.filter(|&(_, seg_real, _)| seg_real == m.snapped.segment_real).map(|(node, _, d1)| (node, d1));
        let routing_node = fakes.snap_waypoint(i, &m.snapped, same_as_prev);
        prev_match = Some((routing_node, m.snapped.segment_real, m.snapped.d1));
        routing_nodes.push(routing_node);
    }

    let legs = {
        let router = Router::new(nodes, segments, ways, relations, &fakes);

        let mut prev_seg = match (heading_degrees, routing_nodes.first()) {
            (Some(h), Some(&first_node)) => router.pick_segment_by_heading(first_node, h).unwrap_or(units::NO_SEGMENT),
            _ => units::NO_SEGMENT,
        };

        let mut legs = Vec::with_capacity(routing_nodes.len().saturating_sub(1));
        for w in 0..routing_nodes.len().saturating_sub(1) {
            let leg = router.find_leg(profile, routing_nodes[w], routing_nodes[w + 1], prev_seg, w, w + 1)?;
            prev_seg = leg.segments.last().copied().unwrap_or(units::NO_SEGMENT);
            legs.push(leg);
        }
        legs
    };

    Ok((legs, fakes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use routino_common::highway::Highway;
    use routino_common::transport::Transport;
    use routino_graph::compact::nodes::{Node, NodesHeader};
    use routino_graph::compact::relations::RelationsHeader;
    use routino_graph::compact::segments::SegmentsHeader;
    use routino_graph::compact::ways::{Way, WaysHeader};

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

    fn empty_relations() -> RelationsFile {
        RelationsFile { header: RelationsHeader { n_turn_relations: 0 }, turn_relations: vec![] }
    }

    /// Three nodes in a line, A-B-C, two normal (non-super) segments, one
    /// shared residential way.
    fn line_fixtures() -> (NodesFile, SegmentsFile, WaysFile) {
        let node_a = Node::new(0, 0, 0, Transports::BICYCLE.bits(), 0, units::NO_INDEX);
        let node_b = Node::new(1, 0, 200, Transports::BICYCLE.bits(), 0, 0);
        let node_c = Node::new(units::NO_INDEX, 0, 400, Transports::BICYCLE.bits(), 0, 1);

        let mut nodes_header = NodesHeader::zeroed();
        nodes_header.n_nodes = 3;
        nodes_header.lat_bins = 1;
        nodes_header.lon_bins = 1;

        let nodes = NodesFile { header: nodes_header, offsets: vec![0, 3], nodes: vec![node_a, node_b, node_c] };

        let seg_ab = Segment { node1: 0, node2: 1, next1: units::NO_SEGMENT, next2: units::NO_SEGMENT, way: 0, distance_and_flags: 100 | units::SEGMENT_NORMAL };
        let seg_bc = Segment { node1: 1, node2: 2, next1: units::NO_SEGMENT, next2: units::NO_SEGMENT, way: 0, distance_and_flags: 100 | units::SEGMENT_NORMAL };
        let mut seg_header = SegmentsHeader::zeroed();
        seg_header.n_total = 2;
        seg_header.n_normal = 2;
        let segments = SegmentsFile { header: seg_header, segments: vec![seg_ab, seg_bc] };

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
    fn finds_direct_path_across_two_segments() {
        let (nodes, segments, ways) = line_fixtures();
        let relations = empty_relations();
        let fakes = Fakes::new();
        let profile = bicycle_profile();

        let router = Router::new(&nodes, &segments, &ways, &relations, &fakes);
        let leg = router.find_leg(&profile, 0, 2, units::NO_SEGMENT, 0, 1).unwrap();

        assert_eq!(leg.nodes, vec![0, 1, 2]);
        assert_eq!(leg.segments, vec![0, 1]);
        assert!((leg.score - 200.0).abs() < 1e-3, "score = {}", leg.score);
    }

    #[test]
    fn rejects_oneway_travelling_against_it() {
        let (nodes, segments, ways) = line_fixtures();
        let mut segments = segments;
        // A->B only, travelling B->A is forbidden.
        segments.segments[0].distance_and_flags |= units::ONEWAY_1TO2;

        let relations = empty_relations();
        let fakes = Fakes::new();
        let profile = bicycle_profile();

        let router = Router::new(&nodes, &segments, &ways, &relations, &fakes);
        // B (node 1) to A (node 0): the only edge out of B going that way is
        // oneway-forbidden, and there's no super-graph detour in this tiny
        // fixture, so no route exists.
        let result = router.find_leg(&profile, 1, 0, units::NO_SEGMENT, 0, 1);
        assert!(matches!(result, Err(RouteError::NotFound { .. })));
    }

    #[test]
    fn u_turn_onto_the_arriving_segment_is_rejected() {
        let (nodes, segments, ways) = line_fixtures();
        let relations = empty_relations();
        let fakes = Fakes::new();
        let profile = bicycle_profile();

        let router = Router::new(&nodes, &segments, &ways, &relations, &fakes);
        // Arriving at B via seg_ab (0), relaxing back onto seg_ab itself
        // must be rejected as a u-turn.
        let edge = router.relax_edge(&profile, Direction::Forward, Level::Normal, 1, 0, 0);
        assert!(edge.is_none());
    }
}
