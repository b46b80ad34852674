//! `router`: turns a routing database plus waypoints into a route (§6).
//!
//! Several flags are dynamically keyed (`--lonN`/`--latN` for each
//! waypoint, `--highway-<h>`, `--speed-<h>`, `--property-<p>`), so argument
//! scanning is done by hand here rather than through a single
//! `clap::Parser`-derive struct, following the original CLI's own
//! hand-rolled argv walk.

mod output;
mod profiles;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use routino_common::highway::Highway;
use routino_common::property::Property;
use routino_common::transport::Transport;
use routino_common::units::{self, LatLongT};
use routino_graph::compact::nodes::NodesFile;
use routino_graph::compact::relations::RelationsFile;
use routino_graph::compact::segments::SegmentsFile;
use routino_graph::compact::ways::WaysFile;
use routino_router::{find_route, Optimisation, Profile};

use output::OutputFormat;

const DEFAULT_MAX_DISTANCE_M: f64 = 10_000.0;

struct Cli {
    dir: PathBuf,
    prefix: String,
    profiles_file: Option<PathBuf>,
    exact_nodes_only: bool,
    quiet: bool,
    verify: bool,
    output: OutputFormat,
    profile_name: String,
    transport: Option<Transport>,
    optimisation: Optimisation,
    waypoints: Vec<(LatLongT, LatLongT)>,
    heading_degrees: Option<f64>,
    highway_overrides: BTreeMap<Highway, f64>,
    speed_overrides: BTreeMap<Highway, f64>,
    property_overrides: BTreeMap<Property, f64>,
    oneway: Option<bool>,
    turns: Option<bool>,
    weight: Option<f64>,
    height: Option<f64>,
    width: Option<f64>,
    length: Option<f64>,
}

fn degrees_to_latlong(deg: f64) -> LatLongT {
    units::radians_to_latlong(units::degrees_to_radians(deg))
}

fn parse_cli(args: impl Iterator<Item = String>) -> Result<Cli> {
    let mut dir = PathBuf::from(".");
    let mut prefix = "routino".to_string();
    let mut profiles_file = None;
    let mut exact_nodes_only = false;
    let mut quiet = false;
    let mut verify = false;
    let mut output = OutputFormat::Text;
    let mut profile_name = "motorcar".to_string();
    let mut transport = None;
    let mut optimisation = Optimisation::Shortest;
    let mut heading_degrees = None;
    let mut oneway = None;
    let mut turns = None;
    let mut weight = None;
    let mut height = None;
    let mut width = None;
    let mut length = None;

    let mut lats: BTreeMap<usize, f64> = BTreeMap::new();
    let mut lons: BTreeMap<usize, f64> = BTreeMap::new();
    let mut highway_overrides = BTreeMap::new();
    let mut speed_overrides = BTreeMap::new();
    let mut property_overrides = BTreeMap::new();

    for arg in args {
        let arg = arg.strip_prefix("--").with_context(|| format!("expected a --flag, got {arg}"))?;
        let (key, value) = match arg.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (arg, None),
        };

        if let Some(v) = value.filter(|_| key == "dir") {
            dir = PathBuf::from(v);
        } else if let Some(v) = value.filter(|_| key == "prefix") {
            prefix = v.to_string();
        } else if let Some(v) = value.filter(|_| key == "profiles") {
            profiles_file = Some(PathBuf::from(v));
        } else if key == "translations" {
            // Accepted and ignored: single-language text output only.
        } else if key == "exact-nodes-only" {
            exact_nodes_only = true;
        } else if key == "loggable" {
            // Covered by RUST_LOG / tracing-subscriber's own env filter.
        } else if key == "quiet" {
            quiet = true;
        } else if key == "verify" {
            verify = true;
        } else if key == "language" {
            // Single-language text output only; accepted and ignored.
        } else if let Some(stripped) = key.strip_prefix("output-") {
            output = OutputFormat::from_flag(stripped).with_context(|| format!("unknown --output-{stripped}"))?;
        } else if let Some(v) = value.filter(|_| key == "profile") {
            profile_name = v.to_string();
        } else if let Some(v) = value.filter(|_| key == "transport") {
            transport = Some(Transport::from_tag(v).with_context(|| format!("unknown transport {v}"))?);
        } else if key == "shortest" {
            optimisation = Optimisation::Shortest;
        } else if key == "quickest" {
            optimisation = Optimisation::Quickest;
        } else if let Some(v) = value.filter(|_| key == "heading") {
            heading_degrees = Some(v.parse().context("parsing --heading")?);
        } else if let Some(n) = key.strip_prefix("lon") {
            let n: usize = n.parse().with_context(|| format!("--{key} does not end in a waypoint number"))?;
            let v = value.with_context(|| format!("--{key} needs a value"))?;
            lons.insert(n, v.parse().with_context(|| format!("parsing --{key}"))?);
        } else if let Some(n) = key.strip_prefix("lat") {
            let n: usize = n.parse().with_context(|| format!("--{key} does not end in a waypoint number"))?;
            let v = value.with_context(|| format!("--{key} needs a value"))?;
            lats.insert(n, v.parse().with_context(|| format!("parsing --{key}"))?);
        } else if let Some(h) = key.strip_prefix("highway-") {
            let v = value.with_context(|| format!("--{key} needs a value"))?;
            let highway = Highway::from_tag(h).with_context(|| format!("unknown highway type {h}"))?;
            highway_overrides.insert(highway, v.parse().with_context(|| format!("parsing --{key}"))?);
        } else if let Some(h) = key.strip_prefix("speed-") {
            let v = value.with_context(|| format!("--{key} needs a value"))?;
            let highway = Highway::from_tag(h).with_context(|| format!("unknown highway type {h}"))?;
            speed_overrides.insert(highway, v.parse().with_context(|| format!("parsing --{key}"))?);
        } else if let Some(p) = key.strip_prefix("property-") {
            let v = value.with_context(|| format!("--{key} needs a value"))?;
            let property = Property::ALL.into_iter().find(|prop| prop.name() == p).with_context(|| format!("unknown property {p}"))?;
            property_overrides.insert(property, v.parse().with_context(|| format!("parsing --{key}"))?);
        } else if let Some(v) = value.filter(|_| key == "oneway") {
            oneway = Some(v != "0");
        } else if let Some(v) = value.filter(|_| key == "turns") {
            turns = Some(v != "0");
        } else if let Some(v) = value.filter(|_| key == "weight") {
            weight = Some(v.parse().context("parsing --weight")?);
        } else if let Some(v) = value.filter(|_| key == "height") {
            height = Some(v.parse().context("parsing --height")?);
        } else if let Some(v) = value.filter(|_| key == "width") {
            width = Some(v.parse().context("parsing --width")?);
        } else if let Some(v) = value.filter(|_| key == "length") {
            length = Some(v.parse().context("parsing --length")?);
        } else {
            bail!("unrecognised flag --{key}");
        }
    }

    if lats.len() != lons.len() || lats.keys().ne(lons.keys()) {
        bail!("every --latN must be paired with a --lonN for the same N");
    }
    if lats.len() > units::NWAYPOINTS {
        bail!("more than {} waypoints given ({})", units::NWAYPOINTS, lats.len());
    }
    let waypoints: Vec<(LatLongT, LatLongT)> =
        lats.into_iter().map(|(n, lat)| (degrees_to_latlong(lat), degrees_to_latlong(lons[&n]))).collect();
    if waypoints.len() < 2 {
        bail!("at least two waypoints (--lat1/--lon1 and --lat2/--lon2) are required");
    }

    Ok(Cli {
        dir,
        prefix,
        profiles_file,
        exact_nodes_only,
        quiet,
        verify,
        output,
        profile_name,
        transport,
        optimisation,
        waypoints,
        heading_degrees,
        highway_overrides,
        speed_overrides,
        property_overrides,
        oneway,
        turns,
        weight,
        height,
        width,
        length,
    })
}

fn store_path(dir: &Path, prefix: &str, store: &str) -> PathBuf {
    routino_graph::Config { dir: dir.to_path_buf(), prefix: prefix.to_string(), ..Default::default() }.database_path(store)
}

fn build_profile(cli: &Cli, ways_header: &routino_graph::compact::ways::WaysHeader) -> Result<Profile> {
    let mut profile = if let Some(path) = &cli.profiles_file {
        let mut loaded = profiles::load_profiles_xml(path)?;
        loaded.remove(&cli.profile_name).with_context(|| format!("profile {} not found in {}", cli.profile_name, path.display()))?
    } else {
        let mut builtins = profiles::built_in_profiles();
        builtins.remove(&cli.profile_name).with_context(|| format!("unknown built-in profile {}", cli.profile_name))?
    };

    if let Some(transport) = cli.transport {
        profile.transport = transport;
    }
    profile.optimisation = cli.optimisation;
    for (&highway, &pct) in &cli.highway_overrides {
        profile.highway_pref[highway.index()] = pct;
    }
    for (&highway, &kph) in &cli.speed_overrides {
        profile.speed[highway.index()] = kph;
    }
    for (&property, &pct) in &cli.property_overrides {
        profile.props_yes[property.index()] = pct;
    }
    if let Some(obey) = cli.oneway {
        profile.obey_oneway = obey;
    }
    if let Some(obey) = cli.turns {
        profile.obey_turns = obey;
    }
    if let Some(w) = cli.weight {
        profile.weight = w;
    }
    if let Some(h) = cli.height {
        profile.height = h;
    }
    if let Some(w) = cli.width {
        profile.width = w;
    }
    if let Some(l) = cli.length {
        profile.length = l;
    }

    profile.normalize(ways_header).context("normalising routing profile")?;
    Ok(profile)
}

fn run(cli: Cli) -> Result<()> {
    let verify_crc = cfg!(debug_assertions) || cli.verify;
    let nodes = NodesFile::read(&store_path(&cli.dir, &cli.prefix, "nodes"), verify_crc).context("reading nodes store")?;
    let segments = SegmentsFile::read(&store_path(&cli.dir, &cli.prefix, "segments"), verify_crc).context("reading segments store")?;
    let ways = WaysFile::read(&store_path(&cli.dir, &cli.prefix, "ways"), verify_crc).context("reading ways store")?;
    let relations = RelationsFile::read(&store_path(&cli.dir, &cli.prefix, "relations"), verify_crc).context("reading relations store")?;

    let profile = build_profile(&cli, &ways.header)?;

    let max_distance_m = if cli.exact_nodes_only { 0.1 } else { DEFAULT_MAX_DISTANCE_M };

    let (legs, fakes) =
        find_route(&nodes, &segments, &ways, &relations, &profile, &cli.waypoints, cli.heading_degrees, max_distance_m).context("finding route")?;

    let total_score: f32 = legs.iter().map(|leg| leg.score).sum();
    if !cli.quiet {
        tracing::info!(legs = legs.len(), total_score, "route found");
    }

    match output::write_route(&cli.dir, cli.output, &nodes, &segments, &ways, &fakes, &legs)? {
        Some(path) => {
            if !cli.quiet {
                tracing::info!(path = %path.display(), "wrote route output");
            }
        }
        None => {}
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = parse_cli(std::env::args().skip(1)).context("parsing command-line arguments")?;

    let filter = if cli.quiet { EnvFilter::new("error") } else { EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")) };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_waypoints_and_highway_overrides() {
        let args = [
            "--dir=/tmp/db",
            "--prefix=gb",
            "--profile=bicycle",
            "--lat1=51.5",
            "--lon1=-0.1",
            "--lat2=51.6",
            "--lon2=-0.2",
            "--highway-primary=20",
            "--speed-primary=30",
            "--output-gpx-track",
            "--quickest",
        ]
        .into_iter()
        .map(String::from);

        let cli = parse_cli(args).unwrap();
        assert_eq!(cli.waypoints.len(), 2);
        assert_eq!(cli.prefix, "gb");
        assert_eq!(cli.output, OutputFormat::GpxTrack);
        assert_eq!(cli.optimisation, Optimisation::Quickest);
        assert_eq!(cli.highway_overrides[&Highway::Primary], 20.0);
        assert_eq!(cli.speed_overrides[&Highway::Primary], 30.0);
    }

    #[test]
    fn rejects_mismatched_waypoint_numbering() {
        let args = ["--lat1=0", "--lon1=0", "--lat2=1"].into_iter().map(String::from);
        assert!(parse_cli(args).is_err());
    }

    #[test]
    fn rejects_single_waypoint() {
        let args = ["--lat1=0", "--lon1=0"].into_iter().map(String::from);
        assert!(parse_cli(args).is_err());
    }
}
