use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use sprite_atlas_core::{AtlasMetadata, AtlasOutput, BuildOptions, RunConfig, RunPaths};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "sprite-atlas",
    about = "Pack sprite directories into atlas images with tile metadata",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an atlas from a run configuration (JSON, or YAML by extension)
    Pack(PackArgs),
    /// Decode an atlas metadata file (.json or .cb) and print it as JSON
    Inspect(InspectArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    /// Run configuration file
    #[arg(help_heading = "Input/Output")]
    config: PathBuf,
    /// Outline every placement in the atlas image
    #[arg(long, default_value_t = false, help_heading = "Debug")]
    debug: bool,
    /// Build everything in memory but write no files
    #[arg(long, default_value_t = false, help_heading = "Debug")]
    dry_run: bool,
    /// Print the parsed configuration (json|yaml) and exit
    #[arg(long, value_parser = ["json", "yaml"], help_heading = "Debug")]
    print_config: Option<String>,
    /// Export packing stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
struct InspectArgs {
    /// Metadata file
    file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn load_config(path: &Path) -> anyhow::Result<RunConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let is_yaml = matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "yaml" | "yml")
    );
    let cfg = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("parse {}", path.display()))?
    } else {
        RunConfig::from_json(&text).with_context(|| format!("parse {}", path.display()))?
    };
    Ok(cfg)
}

fn run_pack(args: &PackArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.config)?;

    if let Some(format) = &args.print_config {
        match format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let paths = RunPaths::for_config_file(&args.config, &cfg);
    let opts = BuildOptions { debug: args.debug };
    let out = if args.dry_run {
        sprite_atlas_core::build_atlas(&cfg, &paths, &opts)?
    } else {
        sprite_atlas_core::run(&cfg, &paths, &opts)
            .with_context(|| format!("build atlas from {}", args.config.display()))?
    };

    report(&out);

    if let Some(stats_path) = &args.export_stats {
        let stats = out.stats();
        if args.dry_run {
            println!("{}", stats.summary());
        } else {
            fs::write(stats_path, serde_json::to_string_pretty(&stats)?)
                .with_context(|| format!("write {}", stats_path.display()))?;
            info!(?stats_path, "stats exported");
        }
    }
    Ok(())
}

fn report(out: &AtlasOutput) {
    let stats = out.stats();
    info!(
        sprites = out.sprite_count,
        duplicates = out.images.duplicates(),
        bins = stats.num_bins,
        occupancy = format!("{:.2}%", stats.occupancy * 100.0),
        wasted_px = stats.wasted_area(),
        "stats"
    );
    for b in &out.bins {
        info!(
            image = %b.image_path.display(),
            data = %b.data_path.display(),
            width = b.bin.width,
            height = b.bin.height,
            tiles = b.metadata.tiles.len(),
            "bin"
        );
    }
}

fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let meta = AtlasMetadata::read(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}
