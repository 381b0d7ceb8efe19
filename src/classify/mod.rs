/// Per-pixel contamination screening.
///
/// Architecture:
/// ```text
///   PixelSeries  (date, green, nir, swir1) × dates
///        │
///        ▼
///   ┌─────────────┐
///   │ preprocess  │  drop sentinel rows, remember their positions
///   └─────────────┘
///        │ CleanedSeries
///        ▼
///   ┌─────────────┐
///   │    fit      │  robust seasonal-plus-trend model per band (IRLS)
///   └─────────────┘
///        │ BandModels | None
///        ▼
///   ┌─────────────┐
///   │  residual   │  normalised residuals → label per cleaned row
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ reconstruct │  dropped rows back in as clear → LabelSequence
///   └─────────────┘
/// ```
///
/// Everything here is a pure function of its arguments: no I/O, no shared
/// state, safe to call from any number of threads at once.
pub mod fit;
pub mod model;
pub mod preprocess;
pub mod reconstruct;
pub mod residual;

use log::debug;

pub use fit::{fit, FitConfig, FitError};
pub use model::{
    Band, BandModel, BandModels, CleanedSeries, Label, LabelSequence, Observation, PixelSeries,
    DEFAULT_THRESHOLD, MIN_SAMPLES, SENTINEL,
};
pub use preprocess::{num_years, preprocess, years_spanned};
pub use reconstruct::reconstruct;
pub use residual::{classify, diagnose, DecisionRule, Verdict};

/// Everything that steers classification of a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// Residual threshold in robust-scale units.
    pub threshold: f64,
    pub rule: DecisionRule,
    /// Years of coverage; derived from the cleaned dates when `None`.
    pub num_years: Option<u32>,
    pub fit: FitConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            rule: DecisionRule::default(),
            num_years: None,
            fit: FitConfig::default(),
        }
    }
}

/// Fit models for a cleaned series, or `None` when screening is not
/// possible (too few samples, degenerate fit).
pub fn fit_models(cleaned: &CleanedSeries, config: &ClassifierConfig) -> Option<BandModels> {
    if cleaned.len() < MIN_SAMPLES {
        return None;
    }
    let years = config.num_years.unwrap_or_else(|| num_years(cleaned));
    match fit(cleaned, years, &config.fit) {
        Ok(models) => Some(models),
        Err(err) => {
            debug!("model unavailable, keeping all dates: {err}");
            None
        }
    }
}

/// Label every date of one pixel: 1 (contaminated) or 0 (clear).
///
/// The result always has the same length and order as `series`. Dates
/// without valid data on every band are clear, and so is the whole series
/// when fewer than [`MIN_SAMPLES`] dates are usable.
pub fn classify_pixel(series: &PixelSeries, config: &ClassifierConfig) -> LabelSequence {
    let cleaned = preprocess(series);
    let models = fit_models(&cleaned, config);
    let labels = classify(&cleaned, models.as_ref(), config.threshold, config.rule);
    reconstruct(cleaned.original_len, &cleaned.dropped, &labels)
}
