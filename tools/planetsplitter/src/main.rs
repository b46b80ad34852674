//! `planetsplitter`: turns one or more OSM XML files into a compact routing
//! database (§4.D, §6).

mod convert;
mod osm;
mod tagging;

use std::fs::File;
use std::io::stdin;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use routino_graph::config::{Config, PruneIsolated, PruneShort, PruneStraight};
use routino_graph::Builder;

use tagging::TaggingRules;

#[derive(Parser)]
#[command(name = "planetsplitter")]
#[command(about = "Turns OSM XML into a compact routing database", long_about = None)]
struct Cli {
    /// Directory the compact stores are written to.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Filename prefix for the compact stores.
    #[arg(long, default_value = "routino")]
    prefix: String,

    /// External-sort working-set size, in MiB.
    #[arg(long = "sort-ram-size", default_value_t = 64)]
    sort_ram_size: usize,

    /// Directory for temporary files used by the external sort.
    #[arg(long)]
    tmpdir: Option<PathBuf>,

    /// Tagging rules XML file. Defaults to `{dir}/{prefix}-tagging.xml` if
    /// present, otherwise every tag passes straight through.
    #[arg(long)]
    tagging: Option<PathBuf>,

    /// Emit one log line per build phase instead of overwriting a progress
    /// line (covered here by plain `tracing` line output either way).
    #[arg(long)]
    loggable: bool,

    /// Write accumulated build warnings to a file. Bare flag defaults to
    /// `error.log`.
    #[arg(long = "errorlog", num_args = 0..=1, default_missing_value = "error.log")]
    errorlog: Option<PathBuf>,

    /// Only parse the input files and report counts; don't build a database.
    #[arg(long = "parse-only")]
    parse_only: bool,

    /// Resume from a previously parsed intermediate state. Not supported by
    /// this implementation (see module docs); always an error if passed.
    #[arg(long = "process-only")]
    process_only: bool,

    /// Maximum super-graph contraction rounds.
    #[arg(long = "max-iterations", default_value_t = 5)]
    max_iterations: u32,

    /// Disable every pruning pass.
    #[arg(long = "prune-none")]
    prune_none: bool,

    /// Isolated-region pruning threshold, in metres.
    #[arg(long = "prune-isolated", default_value_t = 500)]
    prune_isolated: u32,

    /// Short-segment pruning threshold, in metres.
    #[arg(long = "prune-short", default_value_t = 5)]
    prune_short: u32,

    /// Straight-run pruning threshold, in metres.
    #[arg(long = "prune-straight", default_value_t = 3)]
    prune_straight: u32,

    /// Input OSM XML files. Reads stdin if none are given.
    files: Vec<PathBuf>,
}

fn resolve_tagging(cli: &Cli) -> Result<TaggingRules> {
    if let Some(path) = &cli.tagging {
        return TaggingRules::load(path);
    }
    let default_path = cli.dir.join(format!("{}-tagging.xml", cli.prefix));
    if default_path.is_file() {
        return TaggingRules::load(&default_path);
    }
    Ok(TaggingRules::passthrough())
}

fn build_config(cli: &Cli) -> Config {
    let (prune_isolated, prune_short, prune_straight) = if cli.prune_none {
        (PruneIsolated::Disabled, PruneShort::Disabled, PruneStraight::Disabled)
    } else {
        (
            PruneIsolated::Threshold { metres: cli.prune_isolated },
            PruneShort::Threshold { metres: cli.prune_short },
            PruneStraight::Threshold { metres: cli.prune_straight },
        )
    };

    Config {
        dir: cli.dir.clone(),
        prefix: cli.prefix.clone(),
        tmpdir: cli.tmpdir.clone().unwrap_or_else(std::env::temp_dir),
        sort_ram_bytes: cli.sort_ram_size * 1024 * 1024,
        max_iterations: cli.max_iterations,
        prune_isolated,
        prune_short,
        prune_straight,
        parse_only: cli.parse_only,
        process_only: cli.process_only,
        loggable: cli.loggable,
        ..Config::default()
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.parse_only && cli.process_only {
        bail!("--parse-only and --process-only are mutually exclusive");
    }
    if cli.process_only {
        bail!("--process-only requires a previously saved parse-phase state, which this build does not serialize; rerun without it");
    }
    if cli.process_only && !cli.files.is_empty() {
        bail!("input filenames cannot be combined with --process-only");
    }

    let rules = resolve_tagging(&cli)?;
    let config = build_config(&cli);
    std::fs::create_dir_all(&config.dir).with_context(|| format!("creating output directory {}", config.dir.display()))?;

    let mut builder = Builder::new(config.clone());
    let mut total_counts = osm::OsmCounts::default();

    if cli.files.is_empty() {
        info!("reading OSM XML from stdin");
        let counts = osm::parse_osm(stdin().lock(), &mut builder, &rules)?;
        total_counts.merge(&counts);
    } else {
        for path in &cli.files {
            info!(file = %path.display(), "parsing OSM XML");
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let counts = osm::parse_osm(file, &mut builder, &rules)?;
            total_counts.merge(&counts);
        }
    }

    info!(
        nodes = total_counts.nodes,
        ways = total_counts.ways,
        relations = total_counts.relations,
        warnings = builder.warnings.len(),
        "parsing complete"
    );

    if cli.parse_only {
        info!("--parse-only given, stopping before the build pipeline");
        return Ok(());
    }

    let graph = builder.build().context("building routing database")?;

    if let Some(path) = &cli.errorlog {
        convert::write_error_log(path, &graph)?;
        info!(path = %path.display(), warnings = graph.warnings.len(), "wrote error log");
    }
    for warning in &graph.warnings {
        tracing::warn!("{warning}");
    }

    convert::write_compact_stores(&config, &graph)?;
    info!(
        nodes = graph.nodes.len(),
        segments = graph.segments.len(),
        ways = graph.ways.len(),
        turn_relations = graph.turn_relations.len(),
        super_nodes = graph.n_super,
        "wrote compact routing database"
    );

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    run(cli)
}
