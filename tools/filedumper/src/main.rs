//! `filedumper`: read-only inspection of a compact routing database —
//! `--statistics`, `--dump-osm` and `--dump-visualiser` (§6).

mod dump_osm;
mod names;
mod stats;
mod visualiser;

use std::io::{stdout, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use routino_graph::compact::nodes::NodesFile;
use routino_graph::compact::relations::RelationsFile;
use routino_graph::compact::segments::SegmentsFile;
use routino_graph::compact::ways::WaysFile;
use routino_graph::Config;

use dump_osm::BoundingBox;
use visualiser::DataType;

#[derive(Parser)]
#[command(name = "filedumper")]
#[command(about = "Inspects a compact routing database", long_about = None)]
struct Cli {
    /// Directory containing the routing database.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Filename prefix for the routing database.
    #[arg(long, default_value = "routino")]
    prefix: String,

    /// Print statistics about the routing database.
    #[arg(long)]
    statistics: bool,

    /// Verify each store's CRC32 on open. Always on in debug builds.
    #[arg(long)]
    verify: bool,

    /// Dump all or part of the database as OSM XML.
    #[arg(long = "dump-osm")]
    dump_osm: bool,

    /// Exclude super-segments from a `--dump-osm`.
    #[arg(long = "no-super")]
    no_super: bool,

    /// Extract one category of data as GeoJSON for an external viewer.
    #[arg(long = "dump-visualiser")]
    dump_visualiser: bool,

    /// The category of data `--dump-visualiser` should extract. See module
    /// docs for the full list (junctions/super/oneway/turns/speed/weight/
    /// height/width/length).
    #[arg(long)]
    data: Option<String>,

    #[arg(long = "latmin")]
    lat_min: Option<f64>,
    #[arg(long = "latmax")]
    lat_max: Option<f64>,
    #[arg(long = "lonmin")]
    lon_min: Option<f64>,
    #[arg(long = "lonmax")]
    lon_max: Option<f64>,
}

impl Cli {
    fn bbox(&self) -> Result<Option<BoundingBox>> {
        let given = [self.lat_min, self.lat_max, self.lon_min, self.lon_max];
        let n_given = given.iter().filter(|v| v.is_some()).count();
        if n_given == 0 {
            return Ok(None);
        }
        if n_given != 4 {
            bail!("--latmin, --latmax, --lonmin and --lonmax must be given together or not at all");
        }
        Ok(Some(BoundingBox {
            lat_min_deg: self.lat_min.unwrap(),
            lat_max_deg: self.lat_max.unwrap(),
            lon_min_deg: self.lon_min.unwrap(),
            lon_max_deg: self.lon_max.unwrap(),
        }))
    }
}

struct Database {
    nodes: NodesFile,
    segments: SegmentsFile,
    ways: WaysFile,
    relations: RelationsFile,
}

fn open_database(config: &Config, verify_crc: bool) -> Result<Database> {
    Ok(Database {
        nodes: NodesFile::read(&config.database_path("nodes"), verify_crc).context("reading nodes store")?,
        segments: SegmentsFile::read(&config.database_path("segments"), verify_crc).context("reading segments store")?,
        ways: WaysFile::read(&config.database_path("ways"), verify_crc).context("reading ways store")?,
        relations: RelationsFile::read(&config.database_path("relations"), verify_crc).context("reading relations store")?,
    })
}

fn run(cli: Cli) -> Result<()> {
    let chosen = [cli.statistics, cli.dump_osm, cli.dump_visualiser].iter().filter(|b| **b).count();
    if chosen != 1 {
        bail!("must choose exactly one of --statistics, --dump-osm or --dump-visualiser");
    }

    let config = Config { dir: cli.dir.clone(), prefix: cli.prefix.clone(), ..Config::default() };
    let verify_crc = cfg!(debug_assertions) || cli.verify;
    let db = open_database(&config, verify_crc)?;
    let stdout = stdout();
    let mut out = stdout.lock();

    if cli.statistics {
        stats::print_statistics(&mut out, &cli.dir, &cli.prefix, &db.nodes, &db.segments, &db.ways, &db.relations)?;
        return Ok(());
    }

    if cli.dump_osm {
        let bbox = cli.bbox()?;
        dump_osm::dump_osm(&mut out, &db.nodes, &db.segments, &db.ways, &db.relations, bbox, cli.no_super)?;
        return Ok(());
    }

    let data = cli.data.as_deref().context("--dump-visualiser requires --data=<type>")?;
    let data_type = DataType::from_str(data)?;
    let bbox = cli.bbox()?.context("--dump-visualiser requires --latmin, --latmax, --lonmin and --lonmax")?;
    visualiser::dump_visualiser(&mut out, &db.nodes, &db.segments, &db.ways, &db.relations, bbox, data_type)?;

    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    run(cli)
}
