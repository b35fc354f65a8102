use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rescue_cluster::cluster::{ClusterMode, ClusterResult, Clusterer};
use rescue_cluster::config::Config;
use rescue_cluster::export::{self, ExportFormat};
use rescue_cluster::geocode::{self, ReverseGeocoder};
use rescue_cluster::logging;
use rescue_cluster::mock::{self, MockPreset};
use rescue_cluster::photo::RescuePhoto;
use rescue_cluster::scanner;

/// Propose jobs from timestamped, geotagged photos.
#[derive(Debug, Parser)]
#[command(name = "rescue-cluster")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file.
    #[arg(short, long, global = true, env = "RESCUE_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (overrides RESCUE_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cluster a photo list and print suggestions.
    Suggest {
        /// JSON photo list, or an object with a `photos` array. `-` reads stdin.
        input: PathBuf,

        /// groups (flat) or buckets (buildings).
        #[arg(short, long, default_value = "groups")]
        mode: ClusterMode,

        /// json or csv.
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Label clusters with reverse-geocoded addresses.
        #[arg(long)]
        geocode: bool,
    },
    /// Build a photo list from a folder's EXIF data.
    Scan {
        directory: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a deterministic mock dataset.
    Mock {
        /// small, medium1k, large5k or huge20k.
        #[arg(short, long)]
        preset: Option<MockPreset>,

        #[arg(long)]
        seed: Option<u32>,

        /// Move minority runs this many minutes past the majority.
        #[arg(long)]
        minority_offset: Option<i64>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Manage configuration.
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the configuration file path.
    Path,
    /// Write the default configuration file.
    Init,
}

/// Accepted `suggest` input shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PhotoInput {
    List(Vec<RescuePhoto>),
    Wrapped { photos: Vec<RescuePhoto> },
}

impl PhotoInput {
    fn into_photos(self) -> Vec<RescuePhoto> {
        match self {
            PhotoInput::List(photos) | PhotoInput::Wrapped { photos } => photos,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logging failure must not stop the command.
    if let Err(e) = logging::init(None, cli.verbose) {
        eprintln!("warning: logging disabled: {e}");
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Suggest {
            input,
            mode,
            format,
            output,
            geocode: with_addresses,
        } => suggest(&config, &input, mode, format, output.as_deref(), with_addresses),
        Command::Scan { directory, output } => {
            let report = scanner::scan_directory(&directory, &config.scanner)?;
            eprintln!(
                "{} photos ({} with GPS, {} without), {} skipped without a capture time",
                report.photos.len(),
                report.stats.with_gps,
                report.stats.without_gps,
                report.skipped.len()
            );
            write_json(&report.photos, output.as_deref())
        }
        Command::Mock {
            preset,
            seed,
            minority_offset,
            output,
        } => {
            let mut options = preset.map(MockPreset::options).unwrap_or_default();
            if let Some(seed) = seed {
                options.seed = seed;
            }
            if let Some(minutes) = minority_offset {
                options.minority_offset_minutes = minutes;
            }
            let data = mock::generate(&options);
            eprintln!(
                "{} photos in {} buckets (seed {})",
                data.photos.len(),
                data.buckets.len(),
                options.seed
            );
            write_json(&data, output.as_deref())
        }
        Command::Config { action } => config_command(&cli.config, &config, action),
    }
}

fn suggest(
    config: &Config,
    input: &Path,
    mode: ClusterMode,
    format: ExportFormat,
    output: Option<&Path>,
    with_addresses: bool,
) -> Result<()> {
    let photos = read_photos(input)?;
    let clusterer = Clusterer::new(config.cluster.clone())?;
    let mut result = clusterer.cluster(&photos, mode);

    if with_addresses || config.geocode.enabled {
        let geocoder = geocode::create_geocoder(&config.geocode);
        let labelled = apply_geocoding(&mut result, &geocoder);
        tracing::info!(labelled, provider = geocoder.provider_name(), "Applied address suggestions");
    }

    print_summary(&result);

    match output {
        Some(path) => {
            export::export_result(&result, path, format)?;
        }
        None => {
            let stdout = io::stdout();
            export::write_result(&result, format, stdout.lock())?;
        }
    }
    Ok(())
}

fn apply_geocoding(result: &mut ClusterResult, geocoder: &dyn ReverseGeocoder) -> usize {
    match result {
        ClusterResult::Groups(r) => geocode::label_groups(&mut r.groups, geocoder),
        ClusterResult::Buckets(r) => geocode::label_buckets(&mut r.buckets, geocoder),
    }
}

fn read_photos(input: &Path) -> Result<Vec<RescuePhoto>> {
    let content = if input == Path::new("-") {
        io::read_to_string(io::stdin()).context("reading photos from stdin")?
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?
    };
    let parsed: PhotoInput = serde_json::from_str(&content)
        .with_context(|| format!("parsing photo list {}", input.display()))?;
    Ok(parsed.into_photos())
}

fn print_summary(result: &ClusterResult) {
    let stats = result.stats();
    let clusters = match result.mode() {
        ClusterMode::Groups => "groups",
        ClusterMode::Buckets => "buckets",
    };
    eprintln!(
        "{} photos: {} in {} {} ({} sessions)",
        stats.total_photos, stats.clustered_count, stats.cluster_count, clusters, stats.session_count
    );
    if stats.needs_attention() > 0 {
        eprintln!(
            "{} photos need your attention ({} without location, {} with unreliable GPS)",
            stats.needs_attention(),
            stats.unlocated_count,
            stats.noise_count
        );
    }
    if stats.rejected_count > 0 {
        eprintln!("{} records rejected as invalid", stats.rejected_count);
    }
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn config_command(
    explicit_path: &Option<PathBuf>,
    config: &Config,
    action: Option<ConfigAction>,
) -> Result<()> {
    let path = explicit_path.clone().unwrap_or_else(Config::config_path);
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => print!("{}", config.to_toml()?),
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init => {
            if path.exists() {
                anyhow::bail!("config file already exists: {}", path.display());
            }
            Config::default().save_to(&path)?;
            eprintln!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}
