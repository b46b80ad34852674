//! Turns a finished [`BuiltGraph`] into the four compact, memory-mappable
//! stores and writes them to `{dir}/{prefix}-{store}.mem`.
//!
//! Every field here is a direct repack of data the builder already computed;
//! there's no further graph logic in this module, just layout.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use routino_common::highway::way_flags;
use routino_common::units;
use routino_graph::compact::nodes::{Node, NodesFile, NodesHeader};
use routino_graph::compact::relations::{RelationsFile, RelationsHeader, TurnRelation};
use routino_graph::compact::segments::{Segment, SegmentsFile, SegmentsHeader};
use routino_graph::compact::ways::{build_name_blob, Way, WaysFile, WaysHeader};
use routino_graph::{BuiltGraph, Config};

pub fn build_nodes_file(graph: &BuiltGraph) -> NodesFile {
    let nodes: Vec<Node> = graph
        .nodes
        .iter()
        .map(|n| {
            Node::new(
                n.first_segment,
                units::latlong_to_off(n.lat),
                units::latlong_to_off(n.lon),
                n.allow.bits(),
                n.flags.bits(),
                n.first_segment2,
            )
        })
        .collect();

    NodesFile {
        header: NodesHeader::new(nodes.len() as u32, graph.n_super, graph.lat_bins, graph.lon_bins, graph.lat_zero, graph.lon_zero),
        offsets: graph.bin_offsets.clone(),
        nodes,
    }
}

pub fn build_segments_file(graph: &BuiltGraph) -> SegmentsFile {
    let segments: Vec<Segment> = graph
        .segments
        .iter()
        .map(|s| Segment {
            node1: s.node1,
            node2: s.node2,
            next1: s.next1,
            next2: s.next2,
            way: s.way,
            distance_and_flags: s.pack_distance_and_flags(),
        })
        .collect();

    let n_super = segments.iter().filter(|s| s.is_super()).count() as u32;
    let n_normal = segments.iter().filter(|s| s.is_normal()).count() as u32;

    SegmentsFile {
        header: SegmentsHeader::new(segments.len() as u32, n_super, n_normal),
        segments,
    }
}

pub fn build_ways_file(graph: &BuiltGraph) -> WaysFile {
    let names: Vec<String> = graph.ways.iter().map(|w| w.name.clone()).collect();
    let (name_blob, offsets) = build_name_blob(&names);

    let mut highways_union = 0u16;
    let mut allow_union = 0u16;
    let mut props_union = 0u8;

    let ways: Vec<Way> = graph
        .ways
        .iter()
        .zip(&offsets)
        .map(|(attrs, &name_offset)| {
            let mut highway = attrs.highway as u8;
            if attrs.oneway {
                highway |= way_flags::ONEWAY;
            }
            if attrs.roundabout {
                highway |= way_flags::ROUNDABOUT;
            }
            highways_union |= attrs.highways_bit().bits();
            allow_union |= attrs.allow.bits();
            props_union |= attrs.properties.bits();

            Way::new(name_offset, attrs.allow.bits(), attrs.properties.bits(), highway, attrs.speed, attrs.weight, attrs.height, attrs.width, attrs.length)
        })
        .collect();

    WaysFile {
        header: WaysHeader::new(ways.len() as u32, ways.len() as u32, highways_union, allow_union, props_union),
        ways,
        name_blob,
    }
}

pub fn build_relations_file(graph: &BuiltGraph) -> RelationsFile {
    let turn_relations: Vec<TurnRelation> = graph.turn_relations.iter().cloned().map(TurnRelation::from).collect();
    RelationsFile {
        header: RelationsHeader { n_turn_relations: turn_relations.len() as u32 },
        turn_relations,
    }
}

/// Writes all four compact stores under `config.dir`, named
/// `{prefix}-nodes.mem`, `{prefix}-segments.mem`, `{prefix}-ways.mem` and
/// `{prefix}-relations.mem`.
pub fn write_compact_stores(config: &Config, graph: &BuiltGraph) -> Result<()> {
    build_nodes_file(graph)
        .write(&config.database_path("nodes"))
        .context("writing nodes store")?;
    build_segments_file(graph)
        .write(&config.database_path("segments"))
        .context("writing segments store")?;
    build_ways_file(graph)
        .write(&config.database_path("ways"))
        .context("writing ways store")?;
    build_relations_file(graph)
        .write(&config.database_path("relations"))
        .context("writing relations store")?;
    Ok(())
}

/// Writes every accumulated [`routino_graph::BuildWarning`] to `path`, one
/// per line, in the `Display` form `thiserror` derives for them.
pub fn write_error_log(path: &Path, graph: &BuiltGraph) -> Result<()> {
    let mut file = fs::File::create(path).with_context(|| format!("creating error log {}", path.display()))?;
    for warning in &graph.warnings {
        writeln!(file, "{warning}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use routino_common::highway::Highway;
    use routino_common::property::Properties;
    use routino_common::transport::Transports;
    use routino_graph::builder::BuiltNode;
    use routino_graph::xstore::nodes::NodeXFlags;
    use routino_graph::xstore::segments::SegmentX;
    use routino_graph::xstore::ways::WayAttributes;

    fn sample_graph() -> BuiltGraph {
        let mut node = BuiltNode {
            lat: 0,
            lon: 0,
            allow: Transports::all(),
            flags: NodeXFlags::empty(),
            first_segment: 0,
            first_segment2: units::NO_SEGMENT,
        };
        node.flags |= NodeXFlags::SUPER;

        let mut seg = SegmentX::new(1, 2, 10, false, false, false);
        seg.node1 = 0;
        seg.node2 = 0;
        seg.distance = 42;
        seg.is_super = true;
        seg.is_normal = false;

        BuiltGraph {
            nodes: vec![node],
            segments: vec![seg],
            ways: vec![WayAttributes {
                name: "High Street".into(),
                highway: Highway::Residential,
                oneway: true,
                roundabout: false,
                allow: Transports::all(),
                properties: Properties::empty(),
                speed: 30,
                weight: 0,
                height: 0,
                width: 0,
                length: 0,
            }],
            turn_relations: vec![],
            lat_bins: 1,
            lon_bins: 1,
            lat_zero: 0,
            lon_zero: 0,
            bin_offsets: vec![0, 1],
            n_super: 1,
            warnings: vec![],
        }
    }

    #[test]
    fn nodes_file_carries_super_flag_and_bins() {
        let graph = sample_graph();
        let file = build_nodes_file(&graph);
        assert_eq!(file.header.n_nodes, 1);
        assert_eq!(file.header.n_super, 1);
        assert!(file.nodes[0].is_super());
    }

    #[test]
    fn segments_file_packs_distance_and_flags() {
        let graph = sample_graph();
        let file = build_segments_file(&graph);
        assert_eq!(file.header.n_total, 1);
        assert_eq!(file.header.n_super, 1);
        assert_eq!(file.header.n_normal, 0);
        assert_eq!(file.segments[0].distance(), 42);
        assert!(file.segments[0].is_super());
    }

    #[test]
    fn ways_file_overlays_oneway_bit_and_stores_name() {
        let graph = sample_graph();
        let file = build_ways_file(&graph);
        assert_eq!(file.ways[0].highway_type(), Highway::Residential as u8);
        assert!(file.ways[0].is_oneway());
        assert!(!file.ways[0].is_roundabout());
        assert_eq!(file.name(&file.ways[0]), "High Street");
    }

    #[test]
    fn relations_file_is_empty_for_no_turn_relations() {
        let graph = sample_graph();
        let file = build_relations_file(&graph);
        assert_eq!(file.header.n_turn_relations, 0);
        assert!(file.turn_relations.is_empty());
    }
}
