//! `--statistics`: file sizes/mtimes, store counts and header unions, mirroring
//! the original dumper's `print_statistics` report.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use routino_common::units;
use routino_graph::compact::nodes::{Node, NodesFile};
use routino_graph::compact::relations::{RelationsFile, TurnRelation};
use routino_graph::compact::segments::{Segment, SegmentsFile};
use routino_graph::compact::ways::{Way, WaysFile};

use crate::names::{allowed_name_list, highways_name_list, properties_name_list};

fn report_file(out: &mut impl Write, path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).with_context(|| format!("statting {}", path.display()))?;
    let modified: DateTime<Utc> = meta.modified()?.into();
    writeln!(out, "'{}' - {:>9} Bytes", path.display(), meta.len())?;
    writeln!(out, "{}", modified.to_rfc2822())?;
    writeln!(out)?;
    Ok(())
}

pub fn print_statistics(out: &mut impl Write, dir: &Path, prefix: &str, nodes: &NodesFile, segments: &SegmentsFile, ways: &WaysFile, relations: &RelationsFile) -> Result<()> {
    writeln!(out, "Files")?;
    writeln!(out, "-----")?;
    writeln!(out)?;
    report_file(out, &dir.join(format!("{prefix}-nodes.mem")))?;
    report_file(out, &dir.join(format!("{prefix}-segments.mem")))?;
    report_file(out, &dir.join(format!("{prefix}-ways.mem")))?;
    report_file(out, &dir.join(format!("{prefix}-relations.mem")))?;

    writeln!(out, "Nodes")?;
    writeln!(out, "-----")?;
    writeln!(out)?;
    writeln!(out, "sizeof(Node) ={:>9} Bytes", std::mem::size_of::<Node>())?;
    writeln!(out, "Number       ={:>9}", nodes.header.n_nodes)?;
    writeln!(out, "Number(super)={:>9}", nodes.header.n_super)?;
    writeln!(out)?;
    writeln!(out, "Lat bins= {:4}", nodes.header.lat_bins)?;
    writeln!(out, "Lon bins= {:4}", nodes.header.lon_bins)?;
    writeln!(out)?;
    let lat_zero_deg = units::radians_to_degrees(units::latlong_to_radians(units::bin_to_latlong(nodes.header.lat_zero) as f64));
    let lon_zero_deg = units::radians_to_degrees(units::latlong_to_radians(units::bin_to_latlong(nodes.header.lon_zero) as f64));
    writeln!(out, "Lat zero={:5} ({:8.4} deg)", nodes.header.lat_zero, lat_zero_deg)?;
    writeln!(out, "Lon zero={:5} ({:8.4} deg)", nodes.header.lon_zero, lon_zero_deg)?;

    writeln!(out)?;
    writeln!(out, "Segments")?;
    writeln!(out, "--------")?;
    writeln!(out)?;
    writeln!(out, "sizeof(Segment)={:>9} Bytes", std::mem::size_of::<Segment>())?;
    writeln!(out, "Number(total)  ={:>9}", segments.header.n_total)?;
    writeln!(out, "Number(super)  ={:>9}", segments.header.n_super)?;
    writeln!(out, "Number(normal) ={:>9}", segments.header.n_normal)?;

    writeln!(out)?;
    writeln!(out, "Ways")?;
    writeln!(out, "----")?;
    writeln!(out)?;
    writeln!(out, "sizeof(Way)      ={:>9} Bytes", std::mem::size_of::<Way>())?;
    writeln!(out, "Number(compacted)={:>9}", ways.header.n_ways)?;
    writeln!(out, "Number(original) ={:>9}", ways.header.n_original)?;
    writeln!(out)?;
    writeln!(out, "Total names ={:>9} Bytes", ways.name_blob.len())?;
    writeln!(out)?;
    writeln!(out, "Included highways  : {}", highways_name_list(ways.header.highways_union))?;
    writeln!(out, "Included transports: {}", allowed_name_list(ways.header.allow_union))?;
    writeln!(out, "Included properties: {}", properties_name_list(ways.header.props_union))?;

    writeln!(out)?;
    writeln!(out, "Relations")?;
    writeln!(out, "---------")?;
    writeln!(out)?;
    writeln!(out, "sizeof(TurnRelation)={:>9} Bytes", std::mem::size_of::<TurnRelation>())?;
    writeln!(out, "Number              ={:>9}", relations.header.n_turn_relations)?;

    Ok(())
}
