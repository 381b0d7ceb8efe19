use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Band value reserved for "no valid data on this date".
pub const SENTINEL: f64 = 0.0;

/// Fewest valid observations for which a seasonal model is fit.
pub const MIN_SAMPLES: usize = 12;

/// Default residual threshold (in robust-scale units).
pub const DEFAULT_THRESHOLD: f64 = 40.0;

// ---------------------------------------------------------------------------
// Observation – one date of one pixel
// ---------------------------------------------------------------------------

/// The monitored bands, in the order they are stored in an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Green,
    Nir,
    Swir1,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Green, Band::Nir, Band::Swir1];

    pub fn index(self) -> usize {
        match self {
            Band::Green => 0,
            Band::Nir => 1,
            Band::Swir1 => 2,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Green => write!(f, "green"),
            Band::Nir => write!(f, "nir"),
            Band::Swir1 => write!(f, "swir1"),
        }
    }
}

/// A single acquisition of a single pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Day ordinal (0001-01-01 is day 1).
    pub date: i64,
    pub green: f64,
    pub nir: f64,
    pub swir1: f64,
}

impl Observation {
    pub fn new(date: i64, green: f64, nir: f64, swir1: f64) -> Self {
        Self {
            date,
            green,
            nir,
            swir1,
        }
    }

    /// Band values in [`Band::ALL`] order.
    pub fn bands(&self) -> [f64; 3] {
        [self.green, self.nir, self.swir1]
    }

    pub fn band(&self, band: Band) -> f64 {
        self.bands()[band.index()]
    }

    /// True when every band carries usable data.
    pub fn is_valid(&self) -> bool {
        self.bands().iter().all(|&v| is_valid_value(v))
    }
}

/// A band value is usable when it is finite and not the sentinel.
pub fn is_valid_value(v: f64) -> bool {
    v.is_finite() && v != SENTINEL
}

/// All observations of one pixel, in acquisition order.
pub type PixelSeries = [Observation];

// ---------------------------------------------------------------------------
// CleanedSeries – the usable subsequence plus its bookkeeping
// ---------------------------------------------------------------------------

/// The valid rows of a [`PixelSeries`] together with the positions that were
/// removed, so labels can later be put back in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSeries {
    /// Surviving rows, in their original relative order.
    pub observations: Vec<Observation>,
    /// Positions (into the original series) of the removed rows, ascending.
    pub dropped: Vec<usize>,
    /// Length of the series this was derived from.
    pub original_len: usize,
}

impl CleanedSeries {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Values of one band, aligned with `observations`.
    pub fn band_values(&self, band: Band) -> Vec<f64> {
        self.observations.iter().map(|o| o.band(band)).collect()
    }

    /// Earliest and latest date, or `None` for an empty series.
    pub fn date_range(&self) -> Option<(i64, i64)> {
        let first = self.observations.first()?.date;
        Some(
            self.observations
                .iter()
                .fold((first, first), |(lo, hi), o| (lo.min(o.date), hi.max(o.date))),
        )
    }
}

// ---------------------------------------------------------------------------
// Fitted models
// ---------------------------------------------------------------------------

/// Shape of the seasonal-plus-trend regression for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeasonalDesign {
    /// Date that maps to `t = 0`.
    pub origin: i64,
    /// Whether a linear trend column is present.
    pub trend: bool,
    /// Number of harmonic (cos, sin) pairs.
    pub harmonics: usize,
}

/// Length of the seasonal cycle in days.
pub const DAYS_PER_YEAR: f64 = 365.25;

impl SeasonalDesign {
    pub fn n_terms(&self) -> usize {
        1 + usize::from(self.trend) + 2 * self.harmonics
    }

    /// Regressor values for one date: intercept, trend, then harmonic pairs.
    pub fn row(&self, date: i64) -> Vec<f64> {
        let t = (date - self.origin) as f64 / DAYS_PER_YEAR;
        let mut row = Vec::with_capacity(self.n_terms());
        row.push(1.0);
        if self.trend {
            row.push(t);
        }
        for k in 1..=self.harmonics {
            let phase = 2.0 * std::f64::consts::PI * k as f64 * t;
            row.push(phase.cos());
            row.push(phase.sin());
        }
        row
    }
}

/// A fitted regression for one band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandModel {
    pub design: SeasonalDesign,
    /// One coefficient per design column.
    pub coefficients: Vec<f64>,
    /// Robust scale of the final residuals (never zero).
    pub scale: f64,
    /// Reweighting rounds performed.
    pub iterations: usize,
    /// False when the iteration bound was hit first.
    pub converged: bool,
}

impl BandModel {
    pub fn predict(&self, date: i64) -> f64 {
        self.design
            .row(date)
            .iter()
            .zip(&self.coefficients)
            .map(|(x, b)| x * b)
            .sum()
    }

    /// Signed residual in units of the robust scale.
    pub fn normalized_residual(&self, date: i64, observed: f64) -> f64 {
        (observed - self.predict(date)) / self.scale
    }
}

/// One model per monitored band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandModels {
    pub green: BandModel,
    pub nir: BandModel,
    pub swir1: BandModel,
}

impl Index<Band> for BandModels {
    type Output = BandModel;

    fn index(&self, band: Band) -> &BandModel {
        match band {
            Band::Green => &self.green,
            Band::Nir => &self.nir,
            Band::Swir1 => &self.swir1,
        }
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Per-date verdict for one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Label {
    #[default]
    Clear,
    /// Cloud, cloud shadow or snow.
    Contaminated,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        match self {
            Label::Clear => 0,
            Label::Contaminated => 1,
        }
    }

    pub fn is_contaminated(self) -> bool {
        self == Label::Contaminated
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        label.as_u8()
    }
}

/// One label per original observation, same order.
pub type LabelSequence = Vec<Label>;
