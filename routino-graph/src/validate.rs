//! Invariant checks exercised by the integration test suite (§8, properties
//! #2-#7). These aren't run as part of a normal build; they exist so tests
//! can assert a built or mid-pipeline graph actually has the shape the
//! builder claims to produce, the way the teacher's `tests/verify_astar.rs`
//! independently re-checks router output against a naive baseline.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use routino_common::units::{self, IndexT, LlBinT};

use crate::builder::Builder;
use crate::compact::nodes::Node;
use crate::compact::segments::Segment;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("node {node}: adjacency walk found segment {segment} not incident to it")]
    AdjacencyMismatch { node: usize, segment: usize },

    #[error("node {node}: adjacency walk missed segment {segment}, which lists it as an endpoint")]
    AdjacencyIncomplete { node: usize, segment: usize },

    #[error("node {node}: adjacency walk cycles back to segment {segment}")]
    AdjacencyCycle { node: usize, segment: usize },

    #[error("bin ({bx},{by}): node {node} has lat-bin {actual}, expected {expected}")]
    BinLatMismatch { bx: i32, by: i32, node: usize, actual: i32, expected: i32 },

    #[error("bin ({bx},{by}): node {node} has lon-bin {actual}, expected {expected}")]
    BinLonMismatch { bx: i32, by: i32, node: usize, actual: i32, expected: i32 },

    #[error("pruning pass was not idempotent: second run changed {0}")]
    PruneNotIdempotent(&'static str),

    #[error("no normal-graph path found from super-node {from} to super-node {to}")]
    SuperSegmentUnreachable { from: IndexT, to: IndexT },

    #[error("super-segment {from}-{to} claims distance {claimed} but the shortest normal-graph path is {actual}")]
    SuperSegmentDistanceMismatch { from: IndexT, to: IndexT, claimed: u32, actual: u32 },

    #[error("super-segment {from}-{to}'s shortest normal-graph path passes through interior super-node {via}")]
    SuperSegmentPassesThroughSuperNode { from: IndexT, to: IndexT, via: IndexT },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Property #2/#3: walking `first_segment`/`first_segment2` from every node
/// visits exactly the segments that name it as an endpoint, and every
/// segment visited from node N really does have N as `node1` or `node2`.
pub fn check_adjacency_consistency(nodes: &[Node], segments: &[Segment]) -> ValidationResult<()> {
    let mut expected: Vec<HashSet<usize>> = vec![HashSet::new(); nodes.len()];
    for (i, seg) in segments.iter().enumerate() {
        expected[seg.node1 as usize].insert(i);
        expected[seg.node2 as usize].insert(i);
    }

    for (node_idx, node) in nodes.iter().enumerate() {
        let mut visited: HashSet<usize> = HashSet::new();

        let mut cursor = node.first_segment;
        while cursor != units::NO_SEGMENT {
            let i = cursor as usize;
            if !visited.insert(i) {
                return Err(ValidationError::AdjacencyCycle { node: node_idx, segment: i });
            }
            let seg = &segments[i];
            if seg.node1 as usize != node_idx {
                return Err(ValidationError::AdjacencyMismatch { node: node_idx, segment: i });
            }
            cursor = seg.next1;
        }

        let mut cursor = node.first_segment2;
        while cursor != units::NO_SEGMENT {
            let i = cursor as usize;
            if !visited.insert(i) {
                return Err(ValidationError::AdjacencyCycle { node: node_idx, segment: i });
            }
            let seg = &segments[i];
            if seg.node2 as usize != node_idx {
                return Err(ValidationError::AdjacencyMismatch { node: node_idx, segment: i });
            }
            cursor = seg.next2;
        }

        if visited != expected[node_idx] {
            let missed = expected[node_idx].difference(&visited).next().copied().unwrap_or(usize::MAX);
            if missed != usize::MAX {
                return Err(ValidationError::AdjacencyIncomplete { node: node_idx, segment: missed });
            }
        }
    }

    Ok(())
}

/// Property #4: every node in a bin's offset range actually falls in that
/// bin's (lat, lon) cell.
#[allow(clippy::too_many_arguments)]
pub fn check_bin_ranges(
    nodes: &[Node],
    offsets: &[IndexT],
    lat_bins: i32,
    lon_bins: i32,
    lat_zero: LlBinT,
    lon_zero: LlBinT,
) -> ValidationResult<()> {
    for by in 0..lat_bins {
        for bx in 0..lon_bins {
            let idx = (by * lon_bins + bx) as usize;
            if idx + 1 >= offsets.len() {
                continue;
            }
            let start = offsets[idx] as usize;
            let end = offsets[idx + 1] as usize;
            for node_idx in start..end {
                let node = &nodes[node_idx];
                let lat = units::bin_to_latlong(lat_zero + by as LlBinT) + units::off_to_latlong(node.lat_offset);
                let lon = units::bin_to_latlong(lon_zero + bx as LlBinT) + units::off_to_latlong(node.lon_offset);

                let actual_lat_bin = (units::latlong_to_bin(lat) - lat_zero) as i32;
                if actual_lat_bin != by {
                    return Err(ValidationError::BinLatMismatch { bx, by, node: node_idx, actual: actual_lat_bin, expected: by });
                }
                let actual_lon_bin = (units::latlong_to_bin(lon) - lon_zero) as i32;
                if actual_lon_bin != bx {
                    return Err(ValidationError::BinLonMismatch { bx, by, node: node_idx, actual: actual_lon_bin, expected: bx });
                }
            }
        }
    }

    Ok(())
}

/// Property #6: running a prune pass a second time makes no further change.
/// `pass` is re-invoked twice; `name` is only used to label a failure.
pub fn check_prune_idempotent<F>(builder: &mut Builder, name: &'static str, mut pass: F) -> ValidationResult<()>
where
    F: FnMut(&mut Builder),
{
    pass(builder);
    let nodes_after_first = builder.nodes.as_slice().iter().filter(|n| !n.is_pruned()).count();
    let segments_after_first = builder.segments.as_slice().iter().filter(|s| !s.deleted).count();

    pass(builder);
    let nodes_after_second = builder.nodes.as_slice().iter().filter(|n| !n.is_pruned()).count();
    let segments_after_second = builder.segments.as_slice().iter().filter(|s| !s.deleted).count();

    if nodes_after_first != nodes_after_second || segments_after_first != segments_after_second {
        return Err(ValidationError::PruneNotIdempotent(name));
    }

    Ok(())
}

/// Property #7: for every super-segment (u, v, d), a path exists in the
/// normal-only graph from u to v with summed distance d, with no super-node
/// strictly between u and v on that path. Checked with a plain Dijkstra
/// restricted to non-super interior nodes, mirroring the restriction
/// `crate::supergraph`'s own search applies when it first computed d.
pub fn check_super_segment_consistency(builder: &Builder, super_nodes: &HashSet<IndexT>) -> ValidationResult<()> {
    for i in 0..builder.segments.len() {
        let seg = &builder.segments.as_slice()[i];
        if seg.deleted || !seg.is_super {
            continue;
        }
        let (u, v, claimed) = (seg.node1, seg.node2, seg.distance);
        if u == v {
            continue;
        }

        match shortest_normal_path(builder, u, v, super_nodes) {
            None => return Err(ValidationError::SuperSegmentUnreachable { from: u, to: v }),
            Some((actual, via)) => {
                if let Some(via) = via {
                    return Err(ValidationError::SuperSegmentPassesThroughSuperNode { from: u, to: v, via });
                }
                if actual != claimed {
                    return Err(ValidationError::SuperSegmentDistanceMismatch { from: u, to: v, claimed, actual });
                }
            }
        }
    }

    Ok(())
}

/// Dijkstra over plain (non-super-flagged) edges, refusing to step through
/// any super-node other than the two endpoints. Returns the shortest
/// distance found, plus `Some(node)` if the path that achieved it happened
/// to route through a super-node (a consistency violation, reported by the
/// caller) rather than `None`.
fn shortest_normal_path(builder: &Builder, from: IndexT, to: IndexT, super_nodes: &HashSet<IndexT>) -> Option<(u32, Option<IndexT>)> {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    let mut dist: HashMap<IndexT, u32> = HashMap::new();
    let mut heap: BinaryHeap<Reverse<(u32, IndexT)>> = BinaryHeap::new();
    dist.insert(from, 0);
    heap.push(Reverse((0, from)));

    while let Some(Reverse((d, n))) = heap.pop() {
        if d > *dist.get(&n).unwrap_or(&u32::MAX) {
            continue;
        }
        if n == to {
            return Some((d, None));
        }
        if n != from && super_nodes.contains(&n) {
            continue;
        }
        for seg_idx in builder.incident_segments(n) {
            let seg = &builder.segments.as_slice()[seg_idx as usize];
            if seg.deleted || seg.is_super {
                continue;
            }
            let allowed = if n == seg.node1 { !seg.oneway_2to1 } else { !seg.oneway_1to2 };
            if !allowed {
                continue;
            }
            let next = seg.other_node_idx(n);
            let nd = d + seg.distance;
            if nd < *dist.get(&next).unwrap_or(&u32::MAX) {
                dist.insert(next, nd);
                heap.push(Reverse((nd, next)));
            }
        }
    }

    dist.get(&to).map(|&d| (d, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_chain() -> (Vec<Node>, Vec<Segment>) {
        // A(0) - s0 - B(1) - s1 - C(2), both segments two-way.
        let nodes = vec![
            Node::new(0, 0, 0, 0b1, 0, units::NO_SEGMENT),
            Node::new(1, 0, 0, 0b1, 0, 0),
            Node::new(units::NO_SEGMENT, 0, 0, 0b1, 0, 1),
        ];
        let segments = vec![
            Segment { node1: 0, node2: 1, next1: units::NO_SEGMENT, next2: units::NO_SEGMENT, way: 0, distance_and_flags: 100 | units::SEGMENT_NORMAL },
            Segment { node1: 1, node2: 2, next1: units::NO_SEGMENT, next2: units::NO_SEGMENT, way: 0, distance_and_flags: 100 | units::SEGMENT_NORMAL },
        ];
        (nodes, segments)
    }

    #[test]
    fn adjacency_consistency_holds_for_a_clean_chain() {
        let (nodes, segments) = tiny_chain();
        assert!(check_adjacency_consistency(&nodes, &segments).is_ok());
    }

    #[test]
    fn adjacency_mismatch_detected() {
        let (nodes, mut segments) = tiny_chain();
        segments[0].node1 = 2;
        assert!(check_adjacency_consistency(&nodes, &segments).is_err());
    }

    #[test]
    fn bin_ranges_hold_for_single_bin_graph() {
        let (nodes, _segments) = tiny_chain();
        assert!(check_bin_ranges(&nodes, &[0, 3], 1, 1, 0, 0).is_ok());
    }
}
