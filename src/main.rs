use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use tmask::classify::{ClassifierConfig, DecisionRule, DEFAULT_THRESHOLD};
use tmask::data::archive::load_archive;
use tmask::data::model::BandSelection;
use tmask::data::writer::OutputFormat;
use tmask::runner::{run, RunOptions};

/// Flag cloud, cloud shadow and snow in every date of an image time series.
///
/// Writes one mask per date: 1 = contaminated, 0 = clear.
#[derive(Parser)]
#[command(name = "tmask", version, about, long_about = None)]
struct Cli {
    /// JSON file mapping each date (YYYY-MM-DD) to {"input": ..., "output": ...}
    archive: PathBuf,

    /// Output driver: parquet, csv, json or png (default: from output extension)
    #[arg(short, long)]
    driver: Option<OutputFormat>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Band number of the green band
    #[arg(long, default_value_t = 2)]
    green_band: u32,

    /// Band number of the near-infrared band
    #[arg(long, default_value_t = 4)]
    nir_band: u32,

    /// Band number of the short-wave infrared band
    #[arg(long, default_value_t = 5)]
    swir_band: u32,

    /// Residual threshold, in robust standard deviations
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Decision rule: magnitude (combined residual size) or sign-pattern
    /// (bright green, or dark NIR and SWIR1)
    #[arg(long, default_value_t = DecisionRule::Magnitude)]
    rule: DecisionRule,

    /// Size seasonal models from the whole archive's date span instead of
    /// each pixel's usable dates
    #[arg(long)]
    archive_years: bool,

    /// Also write a JSON run summary here
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !cli.threshold.is_finite() || cli.threshold < 0.0 {
        bail!("threshold must be a non-negative number, got {}", cli.threshold);
    }

    let options = RunOptions {
        classifier: ClassifierConfig {
            threshold: cli.threshold,
            rule: cli.rule,
            ..ClassifierConfig::default()
        },
        bands: BandSelection {
            green: cli.green_band,
            nir: cli.nir_band,
            swir1: cli.swir_band,
        },
        workers: cli.workers,
        driver: cli.driver,
        archive_years: cli.archive_years,
    };

    let archive = load_archive(&cli.archive)?;
    info!(
        "screening {} dates from {}",
        archive.len(),
        cli.archive.display()
    );

    let summary = run(&archive, &options)?;
    let flagged: usize = summary.dates.iter().map(|d| d.contaminated).sum();
    info!(
        "done: {} pixels × {} dates, {flagged} observations flagged",
        summary.pixels,
        summary.dates.len()
    );

    if let Some(path) = &cli.summary {
        let text = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing run summary {}", path.display()))?;
    }
    Ok(())
}
