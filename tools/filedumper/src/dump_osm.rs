//! `--dump-osm`: re-emits a compact routing database as OSM XML, optionally
//! restricted to a lat/lon bounding box. Mirrors `print_head_osm`/
//! `print_region_osm`/`print_node_osm`/`print_segment_osm`/
//! `print_turnrelation_osm`/`print_tail_osm` from the original dumper.

use std::io::Write;

use anyhow::Result;

use routino_common::highway::Highway;
use routino_common::property::Property;
use routino_common::transport::Transport;
use routino_common::units::{self, IndexT};
use routino_graph::compact::nodes::{node_flags, NodesFile};
use routino_graph::compact::relations::RelationsFile;
use routino_graph::compact::segments::SegmentsFile;
use routino_graph::compact::ways::WaysFile;
use routino_router::node_latlon;

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub lat_min_deg: f64,
    pub lat_max_deg: f64,
    pub lon_min_deg: f64,
    pub lon_max_deg: f64,
}

impl BoundingBox {
    pub(crate) fn contains(&self, lat_deg: f64, lon_deg: f64) -> bool {
        lat_deg > self.lat_min_deg && lat_deg < self.lat_max_deg && lon_deg > self.lon_min_deg && lon_deg < self.lon_max_deg
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('\'', "&apos;")
}

fn node_coords_deg(nodes: &NodesFile, index: IndexT) -> (f64, f64) {
    let (lat, lon) = node_latlon(nodes, index);
    (units::radians_to_degrees(units::latlong_to_radians(lat as f64)), units::radians_to_degrees(units::latlong_to_radians(lon as f64)))
}

fn print_head(out: &mut impl Write, bbox: Option<BoundingBox>) -> Result<()> {
    writeln!(out, "<?xml version='1.0' encoding='UTF-8'?>")?;
    writeln!(out, "<osm version='0.6' generator='routino-rs'>")?;
    if let Some(b) = bbox {
        writeln!(out, "  <bounds minlat='{:.6}' maxlat='{:.6}' minlon='{:.6}' maxlon='{:.6}' />", b.lat_min_deg, b.lat_max_deg, b.lon_min_deg, b.lon_max_deg)?;
    }
    Ok(())
}

fn print_tail(out: &mut impl Write) -> Result<()> {
    writeln!(out, "</osm>")?;
    Ok(())
}

fn print_node(out: &mut impl Write, nodes: &NodesFile, item: IndexT) -> Result<()> {
    let node = &nodes.nodes[item as usize];
    let (lat, lon) = node_coords_deg(nodes, item);

    if node.allow == routino_common::transport::Transports::all().bits() && node.flags == 0 {
        writeln!(out, "  <node id='{}' lat='{:.7}' lon='{:.7}' version='1' />", item + 1, lat, lon)?;
        return Ok(());
    }

    writeln!(out, "  <node id='{}' lat='{:.7}' lon='{:.7}' version='1'>", item + 1, lat, lon)?;
    if node.flags & node_flags::SUPER != 0 {
        writeln!(out, "    <tag k='routino:super' v='yes' />")?;
    }
    if node.flags & node_flags::UTURN != 0 {
        writeln!(out, "    <tag k='routino:uturn' v='yes' />")?;
    }
    if node.flags & node_flags::MINI_ROUNDABOUT != 0 {
        writeln!(out, "    <tag k='highway' v='mini_roundabout' />")?;
    }
    if node.flags & node_flags::TURN_RESTRICTED != 0 {
        writeln!(out, "    <tag k='routino:turnrestriction' v='yes' />")?;
    }
    for t in Transport::ALL {
        if node.allow & t.bit() == 0 {
            writeln!(out, "    <tag k='{}' v='no' />", t.name())?;
        }
    }
    writeln!(out, "  </node>")?;
    Ok(())
}

fn print_segment(out: &mut impl Write, segments: &SegmentsFile, ways: &WaysFile, item: IndexT) -> Result<()> {
    let segment = &segments.segments[item as usize];
    let way = &ways.ways[segment.way as usize];
    let name = ways.name(way);

    writeln!(out, "  <way id='{}' version='1'>", item + 1)?;
    if segment.is_oneway_2to1() {
        writeln!(out, "    <nd ref='{}' />", segment.node2 + 1)?;
        writeln!(out, "    <nd ref='{}' />", segment.node1 + 1)?;
    } else {
        writeln!(out, "    <nd ref='{}' />", segment.node1 + 1)?;
        writeln!(out, "    <nd ref='{}' />", segment.node2 + 1)?;
    }

    if segment.is_super() {
        writeln!(out, "    <tag k='routino:super' v='yes' />")?;
    }
    if segment.is_normal() {
        writeln!(out, "    <tag k='routino:normal' v='yes' />")?;
    }
    writeln!(out, "    <tag k='routino:distance' v='{:.3}' />", units::distance_to_km(segment.distance()))?;

    if way.is_oneway() {
        writeln!(out, "    <tag k='oneway' v='yes' />")?;
    }
    if way.is_roundabout() {
        writeln!(out, "    <tag k='roundabout' v='yes' />")?;
    }
    let highway_name = Highway::ALL.iter().find(|h| **h as u8 == way.highway_type()).map(|h| h.name()).unwrap_or("unclassified");
    writeln!(out, "    <tag k='highway' v='{highway_name}' />")?;

    if segment.is_normal() && !name.is_empty() {
        writeln!(out, "    <tag k='name' v='{}' />", xml_escape(name))?;
    }

    for t in Transport::ALL {
        if way.allow & t.bit() != 0 {
            writeln!(out, "    <tag k='{}' v='yes' />", t.name())?;
        }
    }
    for p in Property::ALL {
        if way.properties & p.bit() != 0 {
            writeln!(out, "    <tag k='{}' v='yes' />", p.name())?;
        }
    }
    if way.speed != 0 {
        writeln!(out, "    <tag k='maxspeed' v='{}' />", way.speed)?;
    }
    if way.weight != 0 {
        writeln!(out, "    <tag k='maxweight' v='{:.1}' />", units::weight_to_tonnes(way.weight))?;
    }
    if way.height != 0 {
        writeln!(out, "    <tag k='maxheight' v='{:.1}' />", units::height_to_metres(way.height))?;
    }
    if way.width != 0 {
        writeln!(out, "    <tag k='maxwidth' v='{:.1}' />", units::width_to_metres(way.width))?;
    }
    if way.length != 0 {
        writeln!(out, "    <tag k='maxlength' v='{:.1}' />", units::length_to_metres(way.length))?;
    }

    writeln!(out, "  </way>")?;
    Ok(())
}

fn print_turn_relation(out: &mut impl Write, relations: &RelationsFile, item: IndexT) -> Result<()> {
    let rel = &relations.turn_relations[item as usize];
    writeln!(out, "  <relation id='{}' version='1'>", item + 1)?;
    writeln!(out, "    <tag k='type' v='restriction' />")?;
    if rel.except != 0 {
        writeln!(out, "    <tag k='except' v='{}' />", crate::names::allowed_name_list(rel.except))?;
    }
    writeln!(out, "    <member type='way' ref='{}' role='from' />", rel.from_segment + 1)?;
    writeln!(out, "    <member type='node' ref='{}' role='via' />", rel.via_node + 1)?;
    writeln!(out, "    <member type='way' ref='{}' role='to' />", rel.to_segment + 1)?;
    writeln!(out, "  </relation>")?;
    Ok(())
}

/// Dumps the whole database, or just the region inside `bbox` if given.
pub fn dump_osm(out: &mut impl Write, nodes: &NodesFile, segments: &SegmentsFile, ways: &WaysFile, relations: &RelationsFile, bbox: Option<BoundingBox>, no_super: bool) -> Result<()> {
    print_head(out, bbox)?;

    match bbox {
        None => {
            for item in 0..nodes.nodes.len() as IndexT {
                print_node(out, nodes, item)?;
            }
            for item in 0..segments.segments.len() as IndexT {
                if !no_super || segments.segments[item as usize].is_normal() {
                    print_segment(out, segments, ways, item)?;
                }
            }
            for item in 0..relations.turn_relations.len() as IndexT {
                print_turn_relation(out, relations, item)?;
            }
        }
        Some(b) => {
            for item in 0..nodes.nodes.len() as IndexT {
                let (lat, lon) = node_coords_deg(nodes, item);
                if !b.contains(lat, lon) {
                    continue;
                }
                print_node(out, nodes, item)?;
            }
            for item in 0..segments.segments.len() as IndexT {
                let segment = &segments.segments[item as usize];
                if no_super && !segment.is_normal() {
                    continue;
                }
                let (lat1, lon1) = node_coords_deg(nodes, segment.node1);
                let (lat2, lon2) = node_coords_deg(nodes, segment.node2);
                if b.contains(lat1, lon1) && b.contains(lat2, lon2) && segment.node1 > segment.node2 {
                    print_segment(out, segments, ways, item)?;
                }
            }
            for item in 0..relations.turn_relations.len() as IndexT {
                let rel = &relations.turn_relations[item as usize];
                let (lat, lon) = node_coords_deg(nodes, rel.via_node);
                if b.contains(lat, lon) {
                    print_turn_relation(out, relations, item)?;
                }
            }
        }
    }

    print_tail(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_escape_handles_ampersand_and_quote() {
        assert_eq!(xml_escape("Tom & Jerry's"), "Tom &amp; Jerry&apos;s");
    }

    #[test]
    fn bounding_box_excludes_outside_points() {
        let b = BoundingBox { lat_min_deg: 0.0, lat_max_deg: 1.0, lon_min_deg: 0.0, lon_max_deg: 1.0 };
        assert!(b.contains(0.5, 0.5));
        assert!(!b.contains(2.0, 0.5));
    }
}
