//! `--dump-visualiser --data=<mode>`: extracts one category of routing data
//! as a GeoJSON `FeatureCollection`, for loading into an external map viewer.
//! Mirrors the `OutputJunctions`/`OutputSuper`/`OutputOneway`/
//! `OutputTurnRestrictions`/`OutputSpeedLimits`/`OutputWeightLimits`/
//! `OutputHeightLimits`/`OutputWidthLimits`/`OutputLengthLimits` family from
//! the original dumper, one mode per `--data` value rather than one function
//! per mode.

use std::io::Write;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde_json::{json, Value};

use routino_common::units;
use routino_graph::compact::nodes::NodesFile;
use routino_graph::compact::relations::RelationsFile;
use routino_graph::compact::segments::{Segment, SegmentsFile};
use routino_graph::compact::ways::WaysFile;
use routino_router::node_latlon;

use crate::dump_osm::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Junctions,
    Super,
    Oneway,
    Turns,
    Speed,
    Weight,
    Height,
    Width,
    Length,
}

impl FromStr for DataType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "junctions" => DataType::Junctions,
            "super" => DataType::Super,
            "oneway" => DataType::Oneway,
            "turns" => DataType::Turns,
            "speed" => DataType::Speed,
            "weight" => DataType::Weight,
            "height" => DataType::Height,
            "width" => DataType::Width,
            "length" => DataType::Length,
            _ => bail!("unknown --data type {s}"),
        })
    }
}

fn lat_lon_deg(nodes: &NodesFile, index: u32) -> (f64, f64) {
    let (lat, lon) = node_latlon(nodes, index);
    (units::radians_to_degrees(units::latlong_to_radians(lat as f64)), units::radians_to_degrees(units::latlong_to_radians(lon as f64)))
}

fn point_feature(nodes: &NodesFile, index: u32, properties: Value) -> Value {
    let (lat, lon) = lat_lon_deg(nodes, index);
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": properties,
    })
}

fn line_feature(nodes: &NodesFile, segment: &Segment, properties: Value) -> Value {
    let (lat1, lon1) = lat_lon_deg(nodes, segment.node1);
    let (lat2, lon2) = lat_lon_deg(nodes, segment.node2);
    json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": [[lon1, lat1], [lon2, lat2]] },
        "properties": properties,
    })
}

fn segment_in_bbox(nodes: &NodesFile, segment: &Segment, bbox: BoundingBox) -> bool {
    let (lat1, lon1) = lat_lon_deg(nodes, segment.node1);
    let (lat2, lon2) = lat_lon_deg(nodes, segment.node2);
    bbox.contains(lat1, lon1) || bbox.contains(lat2, lon2)
}

fn segment_count(segments: &SegmentsFile, node: u32) -> usize {
    segments.segments.iter().filter(|s| s.node1 == node || s.node2 == node).count()
}

pub fn dump_visualiser(
    out: &mut impl Write,
    nodes: &NodesFile,
    segments: &SegmentsFile,
    ways: &WaysFile,
    relations: &RelationsFile,
    bbox: BoundingBox,
    data: DataType,
) -> Result<()> {
    let mut features = Vec::new();

    match data {
        DataType::Junctions => {
            for index in 0..nodes.nodes.len() as u32 {
                let (lat, lon) = lat_lon_deg(nodes, index);
                if !bbox.contains(lat, lon) {
                    continue;
                }
                let count = segment_count(segments, index);
                if count > 2 {
                    features.push(point_feature(nodes, index, json!({ "segments": count })));
                }
            }
        }
        DataType::Super => {
            for (index, node) in nodes.nodes.iter().enumerate() {
                let index = index as u32;
                if !node.is_super() {
                    continue;
                }
                let (lat, lon) = lat_lon_deg(nodes, index);
                if bbox.contains(lat, lon) {
                    features.push(point_feature(nodes, index, json!({ "super": true })));
                }
            }
            for segment in &segments.segments {
                if segment.is_super() && segment_in_bbox(nodes, segment, bbox) {
                    features.push(line_feature(nodes, segment, json!({ "super": true })));
                }
            }
        }
        DataType::Oneway => {
            for segment in &segments.segments {
                if !segment_in_bbox(nodes, segment, bbox) {
                    continue;
                }
                if segment.is_oneway_1to2() {
                    features.push(line_feature(nodes, segment, json!({ "direction": "1to2" })));
                } else if segment.is_oneway_2to1() {
                    features.push(line_feature(nodes, segment, json!({ "direction": "2to1" })));
                }
            }
        }
        DataType::Turns => {
            for rel in &relations.turn_relations {
                let (lat, lon) = lat_lon_deg(nodes, rel.via_node);
                if bbox.contains(lat, lon) {
                    features.push(point_feature(nodes, rel.via_node, json!({ "except": crate::names::allowed_name_list(rel.except) })));
                }
            }
        }
        DataType::Speed | DataType::Weight | DataType::Height | DataType::Width | DataType::Length => {
            for segment in &segments.segments {
                if !segment_in_bbox(nodes, segment, bbox) {
                    continue;
                }
                let way = &ways.ways[segment.way as usize];
                let props = match data {
                    DataType::Speed if way.speed != 0 => Some(json!({ "kph": way.speed })),
                    DataType::Weight if way.weight != 0 => Some(json!({ "tonnes": units::weight_to_tonnes(way.weight) })),
                    DataType::Height if way.height != 0 => Some(json!({ "metres": units::height_to_metres(way.height) })),
                    DataType::Width if way.width != 0 => Some(json!({ "metres": units::width_to_metres(way.width) })),
                    DataType::Length if way.length != 0 => Some(json!({ "metres": units::length_to_metres(way.length) })),
                    _ => None,
                };
                if let Some(properties) = props {
                    features.push(line_feature(nodes, segment, properties));
                }
            }
        }
    }

    let collection = json!({ "type": "FeatureCollection", "features": features });
    serde_json::to_writer_pretty(&mut *out, &collection)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_parses_known_values() {
        assert_eq!(DataType::from_str("junctions").unwrap(), DataType::Junctions);
        assert_eq!(DataType::from_str("weight").unwrap(), DataType::Weight);
        assert!(DataType::from_str("nonsense").is_err());
    }
}
