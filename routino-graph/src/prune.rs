//! The three optional pruning passes (§4.D.1), run after turn-relation
//! resolution and before super-graph construction. All three mutate the
//! segment store in place and mark removed nodes/segments rather than
//! physically compacting the arrays — the final re-sort-with-deletion
//! happens once, in `Builder::finalize`.
//!
//! Degree lookups and chain-walks go through `Builder::incident_segments`,
//! which depends on the `next1`/`next2` chains being current. Each pass
//! rebuilds them (`Builder::reindex_adjacency`) before it starts and again
//! before it hands control back, since the previous pass may have deleted
//! or rewired segments.

use std::collections::{HashSet, VecDeque};

use tracing::info;

use routino_common::geo::distance_to_segment_m;
use routino_common::units::{DistanceT, IndexT, NO_NODE};

use crate::builder::Builder;
use crate::config::{PruneIsolated, PruneShort, PruneStraight};
use crate::xstore::nodes::NodeXFlags;

fn degree(builder: &Builder, node: IndexT) -> usize {
    builder.incident_segments(node).len()
}

fn node_latlon(builder: &Builder, node: IndexT) -> (i32, i32) {
    let n = &builder.nodes.as_slice()[node as usize];
    (n.lat, n.lon)
}

/// BFS over whole connected components; a component whose summed segment
/// distance is at or below the threshold is pruned entirely. Nodes with an
/// empty transport allowance don't propagate the search (§4.D.1).
pub(crate) fn prune_isolated(builder: &mut Builder) {
    let threshold = match builder.config.prune_isolated {
        PruneIsolated::Threshold { metres } => metres as u64,
        PruneIsolated::Disabled => return,
    };

    builder.reindex_adjacency();

    let n_nodes = builder.nodes.len();
    let mut visited = vec![false; n_nodes];
    let mut regions_pruned = 0u32;

    for start in 0..n_nodes {
        if visited[start] || builder.nodes.as_slice()[start].is_pruned() {
            continue;
        }

        let mut queue = VecDeque::new();
        let mut component_nodes = vec![start as IndexT];
        let mut component_segments = HashSet::new();
        let mut total_distance: u64 = 0;

        visited[start] = true;
        queue.push_back(start as IndexT);

        while let Some(n) = queue.pop_front() {
            if builder.nodes.as_slice()[n as usize].allow.is_empty() {
                continue;
            }
            for seg_idx in builder.incident_segments(n) {
                if !component_segments.insert(seg_idx) {
                    continue;
                }
                let seg = &builder.segments.as_slice()[seg_idx as usize];
                total_distance += seg.distance as u64;
                let other = seg.other_node_idx(n);
                if !visited[other as usize] {
                    visited[other as usize] = true;
                    component_nodes.push(other);
                    queue.push_back(other);
                }
            }
        }

        if total_distance <= threshold {
            regions_pruned += 1;
            for n in component_nodes {
                builder.nodes.as_mut_slice()[n as usize].prune();
            }
            for seg_idx in component_segments {
                builder.segments.as_mut_slice()[seg_idx as usize].deleted = true;
            }
        }
    }

    builder.reindex_adjacency();
    info!("prune-isolated: removed {regions_pruned} region(s) at or under the threshold");
}

fn other_incident(builder: &Builder, node: IndexT, exclude: IndexT) -> Option<IndexT> {
    builder
        .incident_segments(node)
        .into_iter()
        .find(|&s| s != exclude && !builder.segments.as_slice()[s as usize].deleted)
}

fn node_blocks_merge(builder: &Builder, n: IndexT) -> bool {
    let flags = builder.nodes.as_slice()[n as usize].flags;
    flags.intersects(NodeXFlags::MINI_ROUNDABOUT | NodeXFlags::TURN_RESTRICTED | NodeXFlags::TURN_RESTRICTED2)
}

fn replace_endpoint(builder: &mut Builder, seg_idx: IndexT, old: IndexT, new: IndexT, extra_distance: DistanceT) {
    let seg = &mut builder.segments.as_mut_slice()[seg_idx as usize];
    if seg.node1 == old {
        seg.node1 = new;
    } else {
        seg.node2 = new;
    }
    seg.distance += extra_distance;
    seg.canonicalize_endpoints();
}

/// Case (b): both endpoints degree 2. Splits the short segment's distance
/// 50/50 onto its two neighbours via a new midpoint node, then prunes it.
fn try_merge_midpoint(builder: &mut Builder, seg_idx: IndexT, n2: IndexT, n3: IndexT) -> bool {
    if node_blocks_merge(builder, n2) || node_blocks_merge(builder, n3) {
        return false;
    }
    let Some(neighbor2) = other_incident(builder, n2, seg_idx) else { return false };
    let Some(neighbor3) = other_incident(builder, n3, seg_idx) else { return false };
    if neighbor2 == neighbor3 {
        return false; // would collapse a loop
    }

    let seg = builder.segments.as_slice()[seg_idx as usize].clone();
    if seg.oneway_1to2 || seg.oneway_2to1 {
        return false; // direction bookkeeping through the midpoint is not attempted
    }

    let allow = builder.nodes.as_slice()[n2 as usize].allow & builder.nodes.as_slice()[n3 as usize].allow;
    if allow.is_empty() {
        return false;
    }

    let (lat2, lon2) = node_latlon(builder, n2);
    let (lat3, lon3) = node_latlon(builder, n3);
    let mut mid = builder.nodes.as_slice()[n2 as usize].clone();
    mid.lat = (lat2 + lat3) / 2;
    mid.lon = (lon2 + lon3) / 2;
    mid.allow = allow;
    mid.used = true;
    mid.first_segment = NO_NODE;
    mid.first_segment2 = NO_NODE;
    let mid_idx = builder.nodes.append(mid);

    let half = seg.distance / 2;
    replace_endpoint(builder, neighbor2, n2, mid_idx, half);
    replace_endpoint(builder, neighbor3, n3, mid_idx, seg.distance - half);

    builder.segments.as_mut_slice()[seg_idx as usize].deleted = true;
    builder.nodes.as_mut_slice()[n2 as usize].prune();
    builder.nodes.as_mut_slice()[n3 as usize].prune();
    true
}

/// Case (c): one endpoint degree 2, the other degree ≥ 3. Absorbs the short
/// segment into the degree-2 side's other segment when the two ways match.
fn try_absorb(builder: &mut Builder, seg_idx: IndexT, degree2_node: IndexT, other_node: IndexT) -> bool {
    if node_blocks_merge(builder, degree2_node) {
        return false;
    }
    let Some(neighbor) = other_incident(builder, degree2_node, seg_idx) else { return false };

    let seg = builder.segments.as_slice()[seg_idx as usize].clone();
    let neighbor_seg = builder.segments.as_slice()[neighbor as usize].clone();
    if neighbor_seg.way != seg.way {
        return false; // different name/attribute bundle
    }
    if neighbor_seg.other_node_idx(degree2_node) == other_node {
        return false; // would collapse a loop
    }
    if seg.oneway_1to2 || seg.oneway_2to1 || neighbor_seg.oneway_1to2 || neighbor_seg.oneway_2to1 {
        return false;
    }

    replace_endpoint(builder, neighbor, degree2_node, other_node, seg.distance);
    builder.segments.as_mut_slice()[seg_idx as usize].deleted = true;
    builder.nodes.as_mut_slice()[degree2_node as usize].prune();
    true
}

pub(crate) fn prune_short_segments(builder: &mut Builder) {
    let threshold = match builder.config.prune_short {
        PruneShort::Threshold { metres } => metres as DistanceT,
        PruneShort::Disabled => return,
    };

    let mut total_pruned = 0u32;
    for _round in 0..3 {
        builder.reindex_adjacency();
        let mut changed = false;

        for seg_idx in 0..builder.segments.len() {
            let seg = builder.segments.as_slice()[seg_idx].clone();
            if seg.deleted || seg.distance == 0 || seg.distance > threshold {
                continue;
            }

            let (n2, n3) = (seg.node1, seg.node2);
            let deg2 = degree(builder, n2);
            let deg3 = degree(builder, n3);

            let did = if deg2 <= 1 || deg3 <= 1 {
                builder.segments.as_mut_slice()[seg_idx].deleted = true;
                if deg2 <= 1 {
                    builder.nodes.as_mut_slice()[n2 as usize].prune();
                }
                if deg3 <= 1 {
                    builder.nodes.as_mut_slice()[n3 as usize].prune();
                }
                true
            } else if deg2 == 2 && deg3 == 2 {
                try_merge_midpoint(builder, seg_idx as IndexT, n2, n3)
            } else if deg2 == 2 {
                try_absorb(builder, seg_idx as IndexT, n2, n3)
            } else if deg3 == 2 {
                try_absorb(builder, seg_idx as IndexT, n3, n2)
            } else {
                false
            };

            if did {
                total_pruned += 1;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    builder.reindex_adjacency();
    info!("prune-short: removed {total_pruned} short segment(s)");
}

/// Walks outward from `start_seg` in both directions while each new endpoint
/// is degree 2 and the next segment shares `way`, collecting the node and
/// segment sequence. Uses a deque since growth happens from either end, per
/// the design note permitting a simpler structure than the original's
/// hand-rolled two-ended array.
fn walk_chain(builder: &Builder, start_seg: IndexT, way: IndexT) -> (Vec<IndexT>, Vec<IndexT>) {
    let seg0 = builder.segments.as_slice()[start_seg as usize].clone();
    let mut nodes: VecDeque<IndexT> = VecDeque::from([seg0.node1, seg0.node2]);
    let mut segs: VecDeque<IndexT> = VecDeque::from([start_seg]);
    let mut seen_segs: HashSet<IndexT> = HashSet::from([start_seg]);

    loop {
        let tail = *nodes.back().unwrap();
        if degree(builder, tail) != 2 {
            break;
        }
        let last_seg = *segs.back().unwrap();
        let Some(next_seg) = builder
            .incident_segments(tail)
            .into_iter()
            .find(|&s| s != last_seg && !seen_segs.contains(&s) && builder.segments.as_slice()[s as usize].way == way)
        else {
            break;
        };
        let next_node = builder.segments.as_slice()[next_seg as usize].other_node_idx(tail);
        if next_node == *nodes.front().unwrap() {
            break; // closed loop; leave the whole ring alone
        }
        nodes.push_back(next_node);
        segs.push_back(next_seg);
        seen_segs.insert(next_seg);
    }

    loop {
        let head = *nodes.front().unwrap();
        if degree(builder, head) != 2 {
            break;
        }
        let first_seg = *segs.front().unwrap();
        let Some(next_seg) = builder
            .incident_segments(head)
            .into_iter()
            .find(|&s| s != first_seg && !seen_segs.contains(&s) && builder.segments.as_slice()[s as usize].way == way)
        else {
            break;
        };
        let next_node = builder.segments.as_slice()[next_seg as usize].other_node_idx(head);
        if next_node == *nodes.back().unwrap() {
            break;
        }
        nodes.push_front(next_node);
        segs.push_front(next_seg);
        seen_segs.insert(next_seg);
    }

    (nodes.into_iter().collect(), segs.into_iter().collect())
}

/// Collapses maximal chains of degree-2, same-way nodes that stay within
/// `threshold` metres of the straight line between the chain's endpoints
/// into a single segment. Chains carrying a oneway restriction are left
/// alone — splicing a oneway run through a synthesised endpoint needs
/// direction bookkeeping this pass doesn't attempt.
pub(crate) fn prune_straight_runs(builder: &mut Builder) {
    let threshold = match builder.config.prune_straight {
        PruneStraight::Threshold { metres } => metres as f64,
        PruneStraight::Disabled => return,
    };

    builder.reindex_adjacency();

    let n_segments = builder.segments.len();
    let mut visited = vec![false; n_segments];
    let mut collapsed = 0u32;

    for seg_idx in 0..n_segments {
        if visited[seg_idx] || builder.segments.as_slice()[seg_idx].deleted {
            continue;
        }
        let way = builder.segments.as_slice()[seg_idx].way;
        let (nodes, segs) = walk_chain(builder, seg_idx as IndexT, way);
        for &s in &segs {
            visited[s as usize] = true;
        }

        if nodes.len() < 3 || nodes[0] == *nodes.last().unwrap() {
            continue;
        }
        if segs.iter().any(|&s| {
            let seg = &builder.segments.as_slice()[s as usize];
            seg.oneway_1to2 || seg.oneway_2to1
        }) {
            continue;
        }

        let start = nodes[0];
        let end = *nodes.last().unwrap();
        let (start_lat, start_lon) = node_latlon(builder, start);
        let (end_lat, end_lon) = node_latlon(builder, end);

        let within = nodes[1..nodes.len() - 1].iter().all(|&n| {
            let (lat, lon) = node_latlon(builder, n);
            distance_to_segment_m(lat, lon, start_lat, start_lon, end_lat, end_lon) <= threshold
        });
        if !within {
            continue;
        }

        let total_distance: DistanceT = segs.iter().map(|&s| builder.segments.as_slice()[s as usize].distance).sum();
        let area = builder.segments.as_slice()[segs[0] as usize].area;

        let mut merged = builder.segments.as_slice()[segs[0] as usize].clone();
        merged.node1 = start;
        merged.node2 = end;
        merged.distance = total_distance;
        merged.area = area;
        merged.canonicalize_endpoints();
        builder.segments.append(merged);

        for &s in &segs {
            builder.segments.as_mut_slice()[s as usize].deleted = true;
        }
        for &n in &nodes[1..nodes.len() - 1] {
            builder.nodes.as_mut_slice()[n as usize].prune();
        }
        collapsed += 1;
    }

    builder.reindex_adjacency();
    info!("prune-straight: collapsed {collapsed} straight run(s)");
}
