use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::classify::{classify_pixel, ClassifierConfig, LabelSequence, Observation};
use crate::data::archive::Archive;
use crate::data::loader::load_scene;
use crate::data::model::{BandSelection, PixelCoord};
use crate::data::writer::{write_mask, OutputFormat};

// ---------------------------------------------------------------------------
// Options & summary
// ---------------------------------------------------------------------------

/// Everything a run needs besides the archive itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub classifier: ClassifierConfig,
    pub bands: BandSelection,
    /// Worker threads; 0 lets rayon decide.
    pub workers: usize,
    /// Output driver; follows each output's extension when `None`.
    pub driver: Option<OutputFormat>,
    /// Size every pixel's seasonal model from the archive's date span
    /// rather than from the pixel's own usable dates.
    pub archive_years: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            bands: BandSelection::default(),
            workers: 1,
            driver: None,
            archive_years: false,
        }
    }
}

impl RunOptions {
    /// Classifier settings for one archive.
    pub fn classifier_for(&self, archive: &Archive) -> ClassifierConfig {
        let mut config = self.classifier;
        if self.archive_years {
            config.num_years = Some(archive.num_years());
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSummary {
    pub date: String,
    pub contaminated: usize,
    pub output: PathBuf,
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub pixels: usize,
    /// Pixels without a single usable date.
    pub empty_pixels: usize,
    pub dates: Vec<DateSummary>,
}

// ---------------------------------------------------------------------------
// Pixel stacking & classification
// ---------------------------------------------------------------------------

/// The selected bands of every scene, aligned on one pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneStack {
    pub coords: Vec<PixelCoord>,
    /// Day ordinal per scene, in series order.
    pub dates: Vec<i64>,
    /// `values[scene][pixel] = [green, nir, swir1]`.
    pub values: Vec<Vec<[f64; 3]>>,
}

impl SceneStack {
    /// Time series of one pixel across all scenes.
    pub fn pixel_series(&self, pixel: usize) -> Vec<Observation> {
        self.dates
            .iter()
            .zip(&self.values)
            .map(|(&date, scene)| {
                let [green, nir, swir1] = scene[pixel];
                Observation::new(date, green, nir, swir1)
            })
            .collect()
    }

    /// Whether any date of the pixel is usable.
    pub fn has_valid_date(&self, pixel: usize) -> bool {
        self.pixel_series(pixel).iter().any(Observation::is_valid)
    }

    /// Classify every pixel independently, in parallel on the current
    /// rayon pool. Returns one label sequence per pixel.
    pub fn classify(&self, config: &ClassifierConfig) -> Vec<LabelSequence> {
        (0..self.coords.len())
            .into_par_iter()
            .map(|pixel| classify_pixel(&self.pixel_series(pixel), config))
            .collect()
    }
}

/// Per-date masks (`masks[date][pixel]`) from per-pixel label sequences.
pub fn transpose_labels(labels: &[LabelSequence], n_dates: usize) -> Vec<Vec<u8>> {
    (0..n_dates)
        .map(|d| labels.iter().map(|seq| seq[d].as_u8()).collect())
        .collect()
}

/// Load every scene of `archive` and align them into a [`SceneStack`].
pub fn load_stack(archive: &Archive, bands: &BandSelection) -> Result<SceneStack> {
    let mut coords: Option<Vec<PixelCoord>> = None;
    let mut values = Vec::with_capacity(archive.len());

    for entry in &archive.entries {
        let scene = load_scene(&entry.input)?;
        let selected = scene
            .select(bands)
            .with_context(|| format!("{}: selecting bands", entry.date))?;

        let grid = coords.get_or_insert_with(|| scene.coords.clone());
        if *grid != scene.coords {
            bail!(
                "{}: pixel grid differs from the first scene ({} vs {} pixels)",
                entry.date,
                scene.coords.len(),
                grid.len()
            );
        }
        values.push(selected);
    }

    Ok(SceneStack {
        coords: coords.unwrap_or_default(),
        dates: archive.ordinals(),
        values,
    })
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

/// Screen every pixel of every date in `archive` and write one mask per
/// date.
pub fn run(archive: &Archive, options: &RunOptions) -> Result<RunSummary> {
    options.bands.validate()?;
    archive.validate()?;

    let stack = load_stack(archive, &options.bands)?;
    info!(
        "{} dates, {} pixels per scene",
        stack.dates.len(),
        stack.coords.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()
        .context("building worker pool")?;
    let classifier = options.classifier_for(archive);
    if let Some(years) = classifier.num_years {
        info!("seasonal model sized for {years} year(s) of coverage");
    }
    let labels = pool.install(|| stack.classify(&classifier));

    let empty_pixels = (0..stack.coords.len())
        .filter(|&p| !stack.has_valid_date(p))
        .count();
    if empty_pixels > 0 {
        warn!("{empty_pixels} pixel(s) have no valid data on any date");
    }

    let masks = transpose_labels(&labels, stack.dates.len());
    let mut dates = Vec::with_capacity(archive.len());

    for (entry, mask) in archive.entries.iter().zip(&masks) {
        write_mask(&entry.output, &stack.coords, mask, options.driver)?;
        let contaminated = mask.iter().filter(|&&m| m == 1).count();
        info!(
            "{}: {contaminated}/{} pixels flagged → {}",
            entry.date,
            mask.len(),
            entry.output.display()
        );
        dates.push(DateSummary {
            date: entry.date.to_string(),
            contaminated,
            output: entry.output.clone(),
        });
    }

    Ok(RunSummary {
        pixels: stack.coords.len(),
        empty_pixels,
        dates,
    })
}
