//! OSM XML parsing and the node/way/relation tag-to-attribute translation
//! that drives the [`Builder`] (§4.A).
//!
//! The schema read here is the standard `<osm><node>/<way>/<relation>>`
//! element set; the translation rules (which access tags gate which
//! [`Transport`], how `highway=*` maps to a [`Highway`], how a turn
//! `restriction=*` value maps to [`Builder::append_turn_relation`]'s single
//! `is_no_turn` flag) are grounded on the original parser's node/way/relation
//! tag handlers. Every tag list passed to these functions has already been
//! through the entity's [`crate::tagging::TaggingRules`] rule list.

use std::io::Read;

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use routino_common::highway::Highway;
use routino_common::property::{Properties, Property};
use routino_common::transport::{Transport, Transports};
use routino_common::units::{metres_to_height, metres_to_length, metres_to_width, tonnes_to_weight, HeightT, LengthT, SpeedT, WeightT, WidthT};
use routino_graph::{BuildWarning, Builder};
use routino_graph::xstore::ways::WayAttributes;

use crate::tagging::{TagList, TaggingRules};

#[derive(Debug, Default, Clone, Copy)]
pub struct OsmCounts {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
}

impl OsmCounts {
    pub fn merge(&mut self, other: &OsmCounts) {
        self.nodes += other.nodes;
        self.ways += other.ways;
        self.relations += other.relations;
    }
}

fn is_true(v: &str) -> bool {
    matches!(v, "true" | "yes" | "1")
}
fn is_false(v: &str) -> bool {
    matches!(v, "false" | "no" | "0")
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() == name.as_bytes() {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn push_unknown(out: &mut Vec<BuildWarning>, key: &str, value: &str) {
    out.push(BuildWarning::UnknownTagValue { key: key.to_string(), value: value.to_string() });
}

/// Result of translating a way's output tags: the deduplicatable attribute
/// bundle, whether it's a zero-distance area boundary, and its oneway
/// direction (`1` = node1->node2 only, `-1` = node2->node1 only, `0` = both).
struct WayTagResult {
    attrs: WayAttributes,
    area: bool,
    oneway_sign: i8,
}

fn process_node_tags(tags: &TagList, warnings: &mut Vec<BuildWarning>) -> Transports {
    // Nodes are permissive by default (§ osmparser.c `process_node_tags`):
    // an access tag only *restricts* which transports may use the node.
    let mut allow = Transports::all();
    for (k, v) in tags {
        if let Some(t) = Transport::from_tag(k) {
            if is_false(v) {
                allow.remove(Transports::from(t));
            } else if !is_true(v) {
                push_unknown(warnings, k, v);
            }
        } else if k == "highway" {
            // "mini_roundabout" would flag NodeXFlags::MINI_ROUNDABOUT, but
            // Builder::append_node's interface has no way to carry a node
            // flag through from the tagging layer; noted in DESIGN.md.
        } else {
            push_unknown(warnings, k, v);
        }
    }
    allow
}

fn process_way_tags(tags: &TagList, warnings: &mut Vec<BuildWarning>) -> Option<WayTagResult> {
    let highway_value = tags.iter().find(|(k, _)| k == "highway").map(|(_, v)| v.as_str());
    let highway = match highway_value {
        None => return None,
        Some(v) => match Highway::from_tag(v) {
            Some(h) => h,
            None => {
                push_unknown(warnings, "highway", v);
                return None;
            }
        },
    };

    let mut allow = Transports::empty();
    let mut properties = Properties::empty();
    let mut area = false;
    let mut oneway_sign: i8 = 0;
    let mut roundabout = false;
    let mut speed: SpeedT = 0;
    let mut weight: WeightT = 0;
    let mut height: HeightT = 0;
    let mut width: WidthT = 0;
    let mut length: LengthT = 0;
    let mut name = String::new();
    let mut ref_tag = String::new();

    for (k, v) in tags {
        match k.as_str() {
            "highway" => {}
            "area" => {
                if is_true(v) {
                    area = true;
                } else if !is_false(v) {
                    push_unknown(warnings, k, v);
                }
            }
            "bicycleroute" => set_property_flag(&mut properties, Property::BicycleRoute, v, k, warnings),
            "footroute" => set_property_flag(&mut properties, Property::FootRoute, v, k, warnings),
            "bridge" => set_property_flag(&mut properties, Property::Bridge, v, k, warnings),
            "tunnel" => set_property_flag(&mut properties, Property::Tunnel, v, k, warnings),
            "paved" => set_property_flag(&mut properties, Property::Paved, v, k, warnings),
            "multilane" => set_property_flag(&mut properties, Property::MultiLane, v, k, warnings),
            "maxspeed" => speed = parse_speed(v, warnings).round().clamp(0.0, SpeedT::MAX as f64) as SpeedT,
            "maxweight" => weight = tonnes_to_weight(parse_weight(v, warnings)),
            "maxheight" => height = metres_to_height(parse_length(v, warnings)),
            "maxwidth" => width = metres_to_width(parse_length(v, warnings)),
            "maxlength" => length = metres_to_length(parse_length(v, warnings)),
            "name" => name = v.clone(),
            "ref" => ref_tag = v.clone(),
            "oneway" => {
                if is_true(v) {
                    oneway_sign = 1;
                } else if v == "-1" {
                    oneway_sign = -1;
                } else if !is_false(v) {
                    push_unknown(warnings, k, v);
                }
            }
            "roundabout" => {
                if is_true(v) {
                    roundabout = true;
                } else if !is_false(v) {
                    push_unknown(warnings, k, v);
                }
            }
            _ => {
                if let Some(t) = Transport::from_tag(k) {
                    if is_true(v) {
                        allow |= Transports::from(t);
                    } else if !is_false(v) {
                        push_unknown(warnings, k, v);
                    }
                } else {
                    push_unknown(warnings, k, v);
                }
            }
        }
    }

    // Ways only *gain* transport permission from an explicit "yes": with
    // nothing granted at all, the way carries no traffic and is dropped.
    if allow.is_empty() {
        return None;
    }

    let display_name = match (name.is_empty(), ref_tag.is_empty()) {
        (false, false) => format!("{name} ({ref_tag})"),
        (false, true) => name,
        (true, false) => ref_tag,
        (true, true) => String::new(),
    };

    Some(WayTagResult {
        attrs: WayAttributes { name: display_name, highway, oneway: oneway_sign != 0, roundabout, allow, properties, speed, weight, height, width, length },
        area,
        oneway_sign,
    })
}

fn set_property_flag(properties: &mut Properties, prop: Property, v: &str, key: &str, warnings: &mut Vec<BuildWarning>) {
    if is_true(v) {
        *properties |= Properties::from(prop);
    } else if !is_false(v) {
        push_unknown(warnings, key, v);
    }
}

enum Restriction {
    NoTurn,
    OnlyTurn,
}

fn process_relation_tags(tags: &TagList, warnings: &mut Vec<BuildWarning>) -> (Transports, Transports, Option<Restriction>, bool) {
    let mut routes = Transports::empty();
    let mut except = Transports::empty();
    let mut restriction = None;
    let mut is_turn_restriction = false;

    for (k, v) in tags {
        match k.as_str() {
            "bicycleroute" => {
                if is_true(v) {
                    routes |= Transports::from(Transport::Bicycle);
                }
            }
            "footroute" => {
                if is_true(v) {
                    routes |= Transports::from(Transport::Foot);
                }
            }
            "except" => {
                let mut matched = false;
                for t in Transport::ALL {
                    if v.contains(t.name()) {
                        except |= Transports::from(t);
                        matched = true;
                    }
                }
                if !matched {
                    push_unknown(warnings, k, v);
                }
            }
            "restriction" => {
                restriction = match v.as_str() {
                    "no_right_turn" | "no_left_turn" | "no_u_turn" | "no_straight_on" => Some(Restriction::NoTurn),
                    "only_right_turn" | "only_left_turn" | "only_straight_on" => Some(Restriction::OnlyTurn),
                    _ => {
                        push_unknown(warnings, k, v);
                        None
                    }
                };
            }
            "type" => {
                if v == "restriction" {
                    is_turn_restriction = true;
                }
            }
            _ => {}
        }
    }
    (routes, except, restriction, is_turn_restriction)
}

fn parse_leading_f64(v: &str) -> Option<(f64, &str)> {
    let v = v.trim();
    let end = v.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-')).unwrap_or(v.len());
    if end == 0 {
        return None;
    }
    let num: f64 = v[..end].parse().ok()?;
    Some((num, v[end..].trim()))
}

fn parse_speed(v: &str, warnings: &mut Vec<BuildWarning>) -> f64 {
    match parse_leading_f64(v) {
        Some((n, "")) | Some((n, "kph")) | Some((n, "km/h")) => n,
        Some((n, "mph")) => n * 1.609,
        _ => {
            push_unknown(warnings, "maxspeed", v);
            0.0
        }
    }
}

fn parse_weight(v: &str, warnings: &mut Vec<BuildWarning>) -> f64 {
    match parse_leading_f64(v) {
        Some((n, "")) | Some((n, "t")) | Some((n, "T")) | Some((n, "ton")) | Some((n, "tons")) | Some((n, "tonne")) | Some((n, "tonnes")) => n,
        Some((n, "kg")) => n / 1000.0,
        _ => {
            push_unknown(warnings, "maxweight", v);
            0.0
        }
    }
}

/// `<feet>'<inches>"` and plain-metres/feet-suffix forms. The original
/// parser's feet/inches scale factor couldn't be fully recovered from the
/// retrieved source (the read was cut off mid-function), so this uses the
/// standard 0.3048 m/ft conversion rather than guess at a possibly-garbled
/// constant.
fn parse_length(v: &str, warnings: &mut Vec<BuildWarning>) -> f64 {
    let t = v.trim();
    if let Some(apos) = t.find('\'') {
        let feet: f64 = t[..apos].trim().parse().unwrap_or(0.0);
        let inches: f64 = t[apos + 1..].trim_end_matches('"').trim().parse().unwrap_or(0.0);
        return (feet + inches / 12.0) * 0.3048;
    }
    match parse_leading_f64(t) {
        Some((n, "")) | Some((n, "m")) | Some((n, "metre")) | Some((n, "metres")) | Some((n, "meter")) | Some((n, "meters")) => n,
        Some((n, "ft")) | Some((n, "feet")) => n * 0.3048,
        _ => {
            push_unknown(warnings, "length", v);
            0.0
        }
    }
}

struct Member {
    kind: String,
    osm_ref: i64,
    role: String,
}

enum Current {
    None,
    Node { id: i64, lat: f64, lon: f64, tags: TagList },
    Way { id: i64, refs: Vec<i64>, tags: TagList },
    Relation { id: i64, members: Vec<Member>, tags: TagList },
}

fn finish_node(id: i64, lat: f64, lon: f64, mut tags: TagList, builder: &mut Builder, rules: &TaggingRules) {
    let mut rule_warnings = Vec::new();
    let output = rules.apply_node(&mut tags, |k, v| push_unknown(&mut rule_warnings, k, v));
    builder.warnings.append(&mut rule_warnings);

    let mut warnings = Vec::new();
    let allow = process_node_tags(&output, &mut warnings);
    builder.warnings.append(&mut warnings);

    builder.append_node(id, lat, lon, allow);
}

fn finish_way(id: i64, refs: Vec<i64>, mut tags: TagList, builder: &mut Builder, rules: &TaggingRules) {
    let mut rule_warnings = Vec::new();
    let output = rules.apply_way(&mut tags, |k, v| push_unknown(&mut rule_warnings, k, v));
    builder.warnings.append(&mut rule_warnings);

    let mut warnings = Vec::new();
    let result = process_way_tags(&output, &mut warnings);
    builder.warnings.append(&mut warnings);

    let Some(result) = result else { return };
    if refs.is_empty() {
        return;
    }

    let oneway_1to2 = result.oneway_sign > 0;
    let oneway_2to1 = result.oneway_sign < 0;
    let area = result.area;
    builder.append_way(id, result.attrs);
    for pair in refs.windows(2) {
        builder.append_segment(pair[0], pair[1], id, area, oneway_1to2, oneway_2to1);
    }
}

fn finish_relation(id: i64, members: Vec<Member>, mut tags: TagList, builder: &mut Builder, rules: &TaggingRules) {
    let mut rule_warnings = Vec::new();
    let output = rules.apply_relation(&mut tags, |k, v| push_unknown(&mut rule_warnings, k, v));
    builder.warnings.append(&mut rule_warnings);

    let mut warnings = Vec::new();
    let (routes, except, restriction, is_turn_restriction) = process_relation_tags(&output, &mut warnings);
    builder.warnings.append(&mut warnings);

    if is_turn_restriction {
        let Some(restriction) = restriction else { return };
        let from = members.iter().find(|m| m.role == "from").map(|m| m.osm_ref);
        let to = members.iter().find(|m| m.role == "to").map(|m| m.osm_ref);
        let via = members.iter().find(|m| m.role == "via").map(|m| m.osm_ref);
        match (from, to, via) {
            (Some(from), Some(to), Some(via)) => {
                let is_no_turn = matches!(restriction, Restriction::NoTurn);
                builder.append_turn_relation(via, from, to, is_no_turn, except);
            }
            _ => builder.warnings.push(BuildWarning::DanglingTurnRelation),
        }
        return;
    }

    let way_ids: Vec<i64> = members.iter().filter(|m| m.kind == "way").map(|m| m.osm_ref).collect();
    let relation_ids: Vec<i64> = members.iter().filter(|m| m.kind == "relation").map(|m| m.osm_ref).collect();
    if !way_ids.is_empty() || !relation_ids.is_empty() {
        builder.append_route_relation(id, routes, way_ids, relation_ids);
    }
}

fn open_element(e: &BytesStart, current: &mut Current) -> Result<()> {
    match e.name().as_ref() {
        b"node" => {
            let id: i64 = attr(e, "id")?.context("node missing id")?.parse().context("node id")?;
            let lat: f64 = attr(e, "lat")?.context("node missing lat")?.parse().context("node lat")?;
            let lon: f64 = attr(e, "lon")?.context("node missing lon")?.parse().context("node lon")?;
            *current = Current::Node { id, lat, lon, tags: Vec::new() };
        }
        b"way" => {
            let id: i64 = attr(e, "id")?.context("way missing id")?.parse().context("way id")?;
            *current = Current::Way { id, refs: Vec::new(), tags: Vec::new() };
        }
        b"relation" => {
            let id: i64 = attr(e, "id")?.context("relation missing id")?.parse().context("relation id")?;
            *current = Current::Relation { id, members: Vec::new(), tags: Vec::new() };
        }
        b"tag" => {
            let k = attr(e, "k")?.unwrap_or_default();
            let v = attr(e, "v")?.unwrap_or_default();
            match current {
                Current::Node { tags, .. } | Current::Way { tags, .. } | Current::Relation { tags, .. } => tags.push((k, v)),
                Current::None => {}
            }
        }
        b"nd" => {
            if let Current::Way { refs, .. } = current {
                let r: i64 = attr(e, "ref")?.context("nd missing ref")?.parse().context("nd ref")?;
                refs.push(r);
            }
        }
        b"member" => {
            if let Current::Relation { members, .. } = current {
                let kind = attr(e, "type")?.unwrap_or_default();
                let osm_ref: i64 = attr(e, "ref")?.context("member missing ref")?.parse().context("member ref")?;
                let role = attr(e, "role")?.unwrap_or_default();
                members.push(Member { kind, osm_ref, role });
            }
        }
        _ => {}
    }
    Ok(())
}

fn close_entity(name: &[u8], current: &mut Current, builder: &mut Builder, rules: &TaggingRules, counts: &mut OsmCounts) {
    match name {
        b"node" => {
            if let Current::Node { id, lat, lon, tags } = std::mem::replace(current, Current::None) {
                finish_node(id, lat, lon, tags, builder, rules);
                counts.nodes += 1;
            }
        }
        b"way" => {
            if let Current::Way { id, refs, tags } = std::mem::replace(current, Current::None) {
                finish_way(id, refs, tags, builder, rules);
                counts.ways += 1;
            }
        }
        b"relation" => {
            if let Current::Relation { id, members, tags } = std::mem::replace(current, Current::None) {
                finish_relation(id, members, tags, builder, rules);
                counts.relations += 1;
            }
        }
        _ => {}
    }
}

/// Streams one OSM XML document from `source` into `builder`, applying
/// `rules` to every node/way/relation's tag list first.
pub fn parse_osm(source: impl Read, builder: &mut Builder, rules: &TaggingRules) -> Result<OsmCounts> {
    let mut reader = Reader::from_reader(std::io::BufReader::new(source));
    reader.config_mut().trim_text = true;

    let mut buf = Vec::new();
    let mut current = Current::None;
    let mut counts = OsmCounts::default();

    loop {
        let event = reader.read_event_into(&mut buf).context("reading OSM XML")?;
        match event {
            Event::Eof => break,
            Event::Start(e) => open_element(&e, &mut current)?,
            Event::Empty(e) => {
                let name = e.name().as_ref().to_vec();
                open_element(&e, &mut current)?;
                // a self-closing node/way/relation has no children and
                // closes immediately; tag/nd/member never reach here with
                // anything left to finish.
                close_entity(&name, &mut current, builder, rules, &mut counts);
            }
            Event::End(e) => close_entity(e.name().as_ref(), &mut current, builder, rules, &mut counts),
            _ => {}
        }
        buf.clear();
    }

    Ok(counts)
}
