//! Route output formatting: `--output-{html,gpx-track,gpx-route,text,
//! text-all,none}` (§6).

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use routino_common::units::{self, IndexT};
use routino_graph::compact::segments::SegmentsFile;
use routino_graph::compact::ways::WaysFile;
use routino_router::{node_latlon, Fakes, RouteLeg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    GpxTrack,
    GpxRoute,
    Text,
    TextAll,
    None,
}

impl OutputFormat {
    pub fn from_flag(flag: &str) -> Option<Self> {
        Some(match flag {
            "html" => OutputFormat::Html,
            "gpx-track" => OutputFormat::GpxTrack,
            "gpx-route" => OutputFormat::GpxRoute,
            "text" => OutputFormat::Text,
            "text-all" => OutputFormat::TextAll,
            "none" => OutputFormat::None,
            _ => return None,
        })
    }

    fn file_name(self) -> Option<&'static str> {
        match self {
            OutputFormat::Html => Some("shortest.html"),
            OutputFormat::GpxTrack => Some("shortest-track.gpx"),
            OutputFormat::GpxRoute => Some("shortest-route.gpx"),
            OutputFormat::Text => Some("shortest.txt"),
            OutputFormat::TextAll => Some("shortest-all.txt"),
            OutputFormat::None => None,
        }
    }
}

/// One point along the final route, with the way it travels along next
/// (`None` on the very last point).
struct RoutePoint {
    lat: f64,
    lon: f64,
    way_name: String,
    distance_m: f64,
    duration_s: f64,
}

fn node_coords(nodes: &routino_graph::compact::nodes::NodesFile, fakes: &Fakes, node: IndexT) -> (f64, f64) {
    let (lat, lon) = if units::is_fake_node(node) {
        fakes.fake_lat_long(node).expect("fake node registered during snap_waypoint")
    } else {
        node_latlon(nodes, node)
    };
    (units::radians_to_degrees(units::latlong_to_radians(lat)), units::radians_to_degrees(units::latlong_to_radians(lon)))
}

fn segment_stats(segments: &SegmentsFile, ways: &WaysFile, fakes: &Fakes, seg: IndexT, speed_kph: Option<f64>) -> (String, f64, f64) {
    if units::is_fake_segment(seg) {
        let info = fakes.lookup_fake_segment(seg).expect("fake segment registered during snap_waypoint");
        let way = &ways.ways[info.way as usize];
        let distance_m = info.distance as f64;
        let speed = speed_kph.unwrap_or(way.speed as f64).max(1.0);
        (ways.name(way).to_string(), distance_m, distance_m / 1000.0 / speed * 3600.0)
    } else {
        let segment = &segments.segments[seg as usize];
        let way = &ways.ways[segment.way as usize];
        let distance_m = segment.distance() as f64;
        let speed = speed_kph.unwrap_or(way.speed as f64).max(1.0);
        (ways.name(way).to_string(), distance_m, distance_m / 1000.0 / speed * 3600.0)
    }
}

fn leg_points(
    nodes: &routino_graph::compact::nodes::NodesFile,
    segments: &SegmentsFile,
    ways: &WaysFile,
    fakes: &Fakes,
    leg: &RouteLeg,
) -> Vec<RoutePoint> {
    let mut points = Vec::with_capacity(leg.nodes.len());
    for (i, &node) in leg.nodes.iter().enumerate() {
        let (lat, lon) = node_coords(nodes, fakes, node);
        let (way_name, distance_m, duration_s) = match leg.segments.get(i) {
            Some(&seg) => segment_stats(segments, ways, fakes, seg, None),
            None => (String::new(), 0.0, 0.0),
        };
        points.push(RoutePoint { lat, lon, way_name, distance_m, duration_s });
    }
    points
}

/// Writes the chosen output format for the whole route (every leg,
/// concatenated) into `dir`. Returns the path written, or `None` for
/// `--output-none`.
pub fn write_route(
    dir: &Path,
    format: OutputFormat,
    nodes: &routino_graph::compact::nodes::NodesFile,
    segments: &SegmentsFile,
    ways: &WaysFile,
    fakes: &Fakes,
    legs: &[RouteLeg],
) -> Result<Option<std::path::PathBuf>> {
    let Some(file_name) = format.file_name() else {
        log_summary(nodes, segments, ways, fakes, legs);
        return Ok(None);
    };

    let path = dir.join(file_name);
    let mut file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    let all_points: Vec<RoutePoint> = legs.iter().flat_map(|leg| leg_points(nodes, segments, ways, fakes, leg)).collect();

    match format {
        OutputFormat::Html => write_html(&mut file, &all_points)?,
        OutputFormat::GpxTrack => write_gpx_track(&mut file, &all_points)?,
        OutputFormat::GpxRoute => write_gpx_route(&mut file, &all_points)?,
        OutputFormat::Text => write_text(&mut file, &all_points, false)?,
        OutputFormat::TextAll => write_text(&mut file, &all_points, true)?,
        OutputFormat::None => unreachable!(),
    }

    Ok(Some(path))
}

fn log_summary(
    nodes: &routino_graph::compact::nodes::NodesFile,
    segments: &SegmentsFile,
    ways: &WaysFile,
    fakes: &Fakes,
    legs: &[RouteLeg],
) {
    let mut total_m = 0.0_f64;
    for leg in legs {
        let points = leg_points(nodes, segments, ways, fakes, leg);
        total_m += points.iter().map(|p| p.distance_m).sum::<f64>();
    }
    tracing::info!(total_km = total_m / 1000.0, legs = legs.len(), "route computed, --output-none discards the file");
}

fn generated_at() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn write_text(out: &mut impl Write, points: &[RoutePoint], all_points: bool) -> Result<()> {
    writeln!(out, "# Generated {}", generated_at())?;
    writeln!(out, "# Latitude\tLongitude\tSection\tDistance (km)\tDuration (min)")?;
    let mut cumulative_m = 0.0;
    let mut cumulative_s = 0.0;
    let mut last_way: Option<&str> = None;
    for p in points {
        cumulative_m += p.distance_m;
        cumulative_s += p.duration_s;
        let is_turn = last_way != Some(p.way_name.as_str());
        if all_points || is_turn {
            writeln!(
                out,
                "{:.6}\t{:.6}\t{}\t{:.3}\t{:.1}",
                p.lat,
                p.lon,
                if p.way_name.is_empty() { "-" } else { &p.way_name },
                cumulative_m / 1000.0,
                cumulative_s / 60.0
            )?;
        }
        last_way = Some(p.way_name.as_str());
    }
    Ok(())
}

fn write_gpx_track(out: &mut impl Write, points: &[RoutePoint]) -> Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<gpx version="1.1" creator="routino-rs" time="{}">"#, generated_at())?;
    writeln!(out, "<trk><name>Route</name><trkseg>")?;
    for p in points {
        writeln!(out, r#"<trkpt lat="{:.6}" lon="{:.6}"/>"#, p.lat, p.lon)?;
    }
    writeln!(out, "</trkseg></trk>")?;
    writeln!(out, "</gpx>")?;
    Ok(())
}

fn write_gpx_route(out: &mut impl Write, points: &[RoutePoint]) -> Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<gpx version="1.1" creator="routino-rs" time="{}">"#, generated_at())?;
    writeln!(out, "<rte><name>Route</name>")?;
    let mut last_way: Option<&str> = None;
    for p in points {
        if last_way != Some(p.way_name.as_str()) {
            let name = if p.way_name.is_empty() { "waypoint" } else { p.way_name.as_str() };
            writeln!(out, r#"<rtept lat="{:.6}" lon="{:.6}"><name>{}</name></rtept>"#, p.lat, p.lon, xml_escape(name))?;
        }
        last_way = Some(p.way_name.as_str());
    }
    writeln!(out, "</rte>")?;
    writeln!(out, "</gpx>")?;
    Ok(())
}

fn write_html(out: &mut impl Write, points: &[RoutePoint]) -> Result<()> {
    writeln!(out, "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Route</title></head><body>")?;
    writeln!(out, "<p>Generated {}</p>", generated_at())?;
    writeln!(out, "<p>{} points, {:.3} km total</p>", points.len(), points.iter().map(|p| p.distance_m).sum::<f64>() / 1000.0)?;
    writeln!(out, "<pre>")?;
    for p in points {
        writeln!(out, "{:.6},{:.6} {}", p.lat, p.lon, p.way_name)?;
    }
    writeln!(out, "</pre></body></html>")?;
    Ok(())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}
