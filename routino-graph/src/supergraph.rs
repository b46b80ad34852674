//! Two-level contraction: super-node selection and super-segment
//! computation (§4.E).
//!
//! A super-node is any node whose removal would change the routable
//! topology in a way a plain distance-weighted shortest path can't see on
//! its own: a turn restriction anchor, a transport-mode boundary, or a
//! junction of genuinely different ways. Super-segments connect pairs of
//! super-nodes with the cumulative distance of the plain-node chain between
//! them, so a long-distance search can skip the chain entirely and only
//! refine the first/last mile around the start and finish.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::info;

use routino_common::transport::Transport;
use routino_common::units::{DistanceT, IndexT};

use crate::builder::Builder;
use crate::error::{BuildError, BuildResult};
use crate::xstore::nodes::NodeXFlags;
use crate::xstore::segments::SegmentX;

/// Whether `node` qualifies as a super-node under any of the four criteria
/// (§4.E): a turn-restriction anchor, a transport-mode narrowing, a meeting
/// of differently-tagged ways sharing a transport, or a junction of three
/// or more segments sharing a transport.
///
/// `incident_ways` is the way id of every segment incident to `node` in
/// whichever graph this call is judging the node against — the full graph
/// for the first round, the previous round's super-segment graph for every
/// round after that (§4.E) — with one entry per incident segment, not
/// deduplicated by way.
fn is_super_node(builder: &Builder, node: IndexT, incident_ways: &[IndexT]) -> bool {
    let record = &builder.nodes.as_slice()[node as usize];
    if record
        .flags
        .intersects(NodeXFlags::TURN_RESTRICTED | NodeXFlags::TURN_RESTRICTED2)
    {
        return true;
    }

    if incident_ways.is_empty() {
        return false;
    }

    for &way in incident_ways {
        let attrs = builder.way_attrs(way);
        if !attrs.allow.difference(record.allow).is_empty() {
            return true;
        }
    }

    for i in 0..incident_ways.len() {
        for j in (i + 1)..incident_ways.len() {
            if incident_ways[i] == incident_ways[j] {
                continue;
            }
            let a = builder.way_attrs(incident_ways[i]);
            let b = builder.way_attrs(incident_ways[j]);
            if a != b && a.allow.intersects(b.allow) {
                return true;
            }
        }
    }

    for t in Transport::ALL {
        let bit = routino_common::transport::Transports::from(t);
        let count = incident_ways.iter().filter(|&&way| builder.way_attrs(way).allow.intersects(bit)).count();
        if count >= 3 {
            return true;
        }
    }

    false
}

/// The way id of every segment incident to `node` in the full (pre-super)
/// graph, one entry per incident segment.
fn full_graph_incident_ways(builder: &Builder, node: IndexT) -> Vec<IndexT> {
    builder
        .incident_segments(node)
        .iter()
        .map(|&s| builder.segments.as_slice()[s as usize].way)
        .collect()
}

/// node -> incident way ids, built from a round's super-segment list, for
/// re-judging super-node membership against the narrowed graph.
fn super_segment_incident_ways(super_segments: &[SegmentX]) -> HashMap<IndexT, Vec<IndexT>> {
    let mut map: HashMap<IndexT, Vec<IndexT>> = HashMap::new();
    for seg in super_segments {
        map.entry(seg.node1).or_default().push(seg.way);
        map.entry(seg.node2).or_default().push(seg.way);
    }
    map
}

fn segment_allows_direction(seg: &SegmentX, from: IndexT) -> bool {
    if from == seg.node1 {
        !seg.oneway_2to1
    } else {
        !seg.oneway_1to2
    }
}

/// A bounded Dijkstra from `start`, along the initial edge `start_seg`, that
/// only advances through non-super intermediate nodes. Returns the distance
/// to every super-node reached this way; the search does not continue past
/// a super-node once found.
fn dijkstra_from(
    builder: &Builder,
    start: IndexT,
    start_seg: IndexT,
    super_nodes: &HashSet<IndexT>,
) -> Vec<(IndexT, DistanceT)> {
    let mut best: HashMap<IndexT, DistanceT> = HashMap::new();
    let mut heap: BinaryHeap<Reverse<(DistanceT, IndexT)>> = BinaryHeap::new();
    let mut results = Vec::new();

    let seg = &builder.segments.as_slice()[start_seg as usize];
    if seg.deleted || !segment_allows_direction(seg, start) {
        return results;
    }
    let first = seg.other_node_idx(start);
    best.insert(first, seg.distance);
    heap.push(Reverse((seg.distance, first)));

    while let Some(Reverse((d, n))) = heap.pop() {
        if d > *best.get(&n).unwrap_or(&DistanceT::MAX) {
            continue;
        }
        if super_nodes.contains(&n) {
            results.push((n, d));
            continue;
        }
        for seg_idx in builder.incident_segments(n) {
            let seg = &builder.segments.as_slice()[seg_idx as usize];
            if seg.deleted || !segment_allows_direction(seg, n) {
                continue;
            }
            let next = seg.other_node_idx(n);
            let nd = d + seg.distance;
            if nd < *best.get(&next).unwrap_or(&DistanceT::MAX) {
                best.insert(next, nd);
                heap.push(Reverse((nd, next)));
            }
        }
    }

    results
}

fn make_super_segment(s: IndexT, t: IndexT, distance: DistanceT, way: IndexT, oneway_1to2: bool, oneway_2to1: bool) -> SegmentX {
    let mut seg = SegmentX::new(0, 0, 0, false, oneway_1to2, oneway_2to1);
    seg.node1 = s;
    seg.node2 = t;
    seg.way = way;
    seg.distance = distance;
    seg.is_super = true;
    seg.is_normal = false;
    seg.canonicalize_endpoints();
    seg
}

/// Keeps, for each unordered node pair, only the shortest of any candidate
/// super-segments computed for it (a pair may be reached via more than one
/// incident way at either endpoint).
fn dedup_keep_shortest(segments: Vec<SegmentX>) -> Vec<SegmentX> {
    let mut index: HashMap<(IndexT, IndexT), usize> = HashMap::new();
    let mut out: Vec<SegmentX> = Vec::new();
    for seg in segments {
        let key = (seg.node1, seg.node2);
        match index.get(&key) {
            Some(&i) => {
                if seg.distance < out[i].distance {
                    out[i] = seg;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(seg);
            }
        }
    }
    out
}

/// Selects super-nodes and computes the super-segments between them,
/// appending the result to `builder.segments` with `is_super = true`
/// (merging into an existing normal segment when one already connects the
/// same pair at the same distance, rather than adding a duplicate row).
///
/// Refinement is capped at `Config.max_iterations`. The first round selects
/// super-nodes from the full graph; every round after that re-runs
/// super-node selection against the previous round's super-segment graph
/// alone, demoting any node that no longer qualifies now that its
/// surroundings have collapsed to super-segments, and only then recomputes
/// super-segments from the narrowed set (§4.E, mirroring `ChooseSuperNodes`
/// being called again each round in the original implementation).
pub(crate) fn build(builder: &mut Builder) -> BuildResult<HashSet<IndexT>> {
    builder.reindex_adjacency();

    let mut super_nodes: HashSet<IndexT> = HashSet::new();
    for i in 0..builder.nodes.len() {
        let idx = i as IndexT;
        if !builder.nodes.as_slice()[i].is_pruned() {
            let incident_ways = full_graph_incident_ways(builder, idx);
            if is_super_node(builder, idx, &incident_ways) {
                super_nodes.insert(idx);
            }
        }
    }

    let max_iterations = builder.config.max_iterations.max(1);
    let mut super_segments: Vec<SegmentX> = Vec::new();
    let mut prev_count = usize::MAX;
    let mut converged = false;

    for iteration in 0..max_iterations {
        if iteration > 0 {
            let ways_by_node = super_segment_incident_ways(&super_segments);
            let empty: Vec<IndexT> = Vec::new();
            super_nodes.retain(|n| {
                let incident_ways = ways_by_node.get(n).unwrap_or(&empty);
                is_super_node(builder, *n, incident_ways)
            });
        }

        let mut found = Vec::new();
        for &s in &super_nodes {
            for seg_idx in builder.incident_segments(s) {
                let seg = builder.segments.as_slice()[seg_idx as usize].clone();
                if seg.deleted {
                    continue;
                }
                let neighbor = seg.other_node_idx(s);
                if super_nodes.contains(&neighbor) {
                    found.push(make_super_segment(s, neighbor, seg.distance, seg.way, seg.oneway_1to2, seg.oneway_2to1));
                    continue;
                }
                for (t, d) in dijkstra_from(builder, s, seg_idx, &super_nodes) {
                    found.push(make_super_segment(s, t, d, seg.way, false, false));
                }
            }
        }

        found = dedup_keep_shortest(found);
        info!(
            iteration = iteration + 1,
            super_nodes = super_nodes.len(),
            super_segments = found.len(),
            "super-graph round"
        );

        let stationary = found.len() == prev_count;
        prev_count = found.len();
        super_segments = found;

        if stationary {
            converged = true;
            break;
        }
    }

    if !converged && max_iterations > 1 {
        return Err(BuildError::SuperGraphDidNotConverge(max_iterations));
    }

    let mut normal_index: HashMap<(IndexT, IndexT, DistanceT), usize> = HashMap::new();
    for i in 0..builder.segments.len() {
        let seg = &builder.segments.as_slice()[i];
        if seg.deleted {
            continue;
        }
        normal_index.insert((seg.node1, seg.node2, seg.distance), i);
    }

    for seg in super_segments {
        let key = (seg.node1, seg.node2, seg.distance);
        if let Some(&i) = normal_index.get(&key) {
            builder.segments.as_mut_slice()[i].is_super = true;
        } else {
            builder.segments.append(seg);
        }
    }

    builder.reindex_adjacency();
    Ok(super_nodes)
}
