use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use super::model::{
    Band, BandModel, BandModels, CleanedSeries, SeasonalDesign, DAYS_PER_YEAR, MIN_SAMPLES,
};

/// Normal-consistency factor turning a MAD into a standard deviation.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Normal-consistency factor for the mean absolute deviation.
const MEAN_DEV_TO_SIGMA: f64 = 1.2533;

/// Scale floor relative to the typical magnitude of the band: about one
/// unit of integer-scaled reflectance.
const MIN_RELATIVE_SCALE: f64 = 1e-3;

/// Huber tuning constant of the warm-start rounds.
const HUBER_TUNING: f64 = 1.345;

/// Huber rounds run before the bisquare loop.
const WARM_START_ROUNDS: usize = 10;

/// Smallest accepted reciprocal condition estimate of the normal equations.
const MIN_RCOND: f64 = 1e-12;

/// Richest seasonal model: annual, semi-annual and four-month cycles.
const MAX_HARMONICS: usize = 3;

/// Observations required per model coefficient.
const SAMPLES_PER_TERM: usize = 3;

// ---------------------------------------------------------------------------
// Configuration & errors
// ---------------------------------------------------------------------------

/// Knobs of the iteratively reweighted least-squares loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    /// Upper bound on reweighting rounds.
    pub max_iterations: usize,
    /// Relative coefficient change below which the fit has converged.
    pub tolerance: f64,
    /// Tukey bisquare tuning constant (in robust-scale units).
    pub tuning: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-6,
            tuning: 4.685,
        }
    }
}

/// Why no model could be fit for a pixel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("not enough samples: {n} (min {min})")]
    TooFewSamples { n: usize, min: usize },
    #[error("{band}: design is singular ({terms} terms, {rows} weighted rows)")]
    Singular { band: Band, terms: usize, rows: usize },
    #[error("{band}: fit produced non-finite coefficients")]
    NonFinite { band: Band },
}

// ---------------------------------------------------------------------------
// Design
// ---------------------------------------------------------------------------

/// Number of harmonic pairs supported by `num_years` of coverage, `n`
/// observations and a date span of `span_days`.
///
/// A series that does not cover one full seasonal cycle gets none: a
/// harmonic fit over part of a cycle extrapolates wildly at the ends.
pub fn harmonics_for(num_years: u32, n: usize, span_days: i64) -> usize {
    if (span_days as f64) < DAYS_PER_YEAR {
        return 0;
    }
    let by_samples = (n / SAMPLES_PER_TERM).saturating_sub(2) / 2;
    (num_years as usize).min(MAX_HARMONICS).min(by_samples)
}

/// Seasonal-plus-trend design for a cleaned series.
pub fn design_for(cleaned: &CleanedSeries, num_years: u32) -> SeasonalDesign {
    let (origin, last) = cleaned.date_range().unwrap_or((0, 0));
    SeasonalDesign {
        origin,
        trend: num_years > 0,
        harmonics: harmonics_for(num_years, cleaned.len(), last - origin),
    }
}

fn design_matrix(design: &SeasonalDesign, cleaned: &CleanedSeries) -> DMatrix<f64> {
    let rows: Vec<f64> = cleaned
        .observations
        .iter()
        .flat_map(|o| design.row(o.date))
        .collect();
    DMatrix::from_row_slice(cleaned.len(), design.n_terms(), &rows)
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Fit one robust seasonal-plus-trend model per band.
///
/// Each band starts from ordinary least squares, is pulled towards the bulk
/// of the series by a few Huber rounds, and is then refit with Tukey
/// bisquare weights computed from the previous residuals, so dates that
/// sit far from the bulk lose their influence entirely. The bisquare loop
/// stops on convergence or after `config.max_iterations` rounds.
pub fn fit(
    cleaned: &CleanedSeries,
    num_years: u32,
    config: &FitConfig,
) -> Result<BandModels, FitError> {
    if cleaned.len() < MIN_SAMPLES {
        return Err(FitError::TooFewSamples {
            n: cleaned.len(),
            min: MIN_SAMPLES,
        });
    }

    let design = design_for(cleaned, num_years);
    let x = design_matrix(&design, cleaned);
    let fit_one = |band: Band| fit_band(band, &x, &cleaned.band_values(band), design, config);

    Ok(BandModels {
        green: fit_one(Band::Green)?,
        nir: fit_one(Band::Nir)?,
        swir1: fit_one(Band::Swir1)?,
    })
}

fn fit_band(
    band: Band,
    x: &DMatrix<f64>,
    values: &[f64],
    design: SeasonalDesign,
    config: &FitConfig,
) -> Result<BandModel, FitError> {
    let y = DVector::from_column_slice(values);
    let floor = scale_floor(values);

    let mut weights = DVector::from_element(y.len(), 1.0);
    let mut beta = weighted_least_squares(band, x, &y, &weights)?;

    // Huber warm start
    for _ in 0..WARM_START_ROUNDS {
        let residuals = &y - x * &beta;
        let scale = robust_scale(residuals.as_slice(), weights.as_slice(), floor);
        weights = residuals.map(|r| huber(r / (HUBER_TUNING * scale)));

        let next = weighted_least_squares(band, x, &y, &weights)?;
        let done = has_converged(&beta, &next, config.tolerance);
        beta = next;
        if done {
            break;
        }
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        iterations += 1;

        let residuals = &y - x * &beta;
        let scale = robust_scale(residuals.as_slice(), weights.as_slice(), floor);
        weights = residuals.map(|r| bisquare(r / (config.tuning * scale)));

        let next = weighted_least_squares(band, x, &y, &weights)?;
        converged = has_converged(&beta, &next, config.tolerance);
        beta = next;
        if converged {
            break;
        }
    }

    let residuals = &y - x * &beta;
    Ok(BandModel {
        design,
        coefficients: beta.as_slice().to_vec(),
        scale: robust_scale(residuals.as_slice(), weights.as_slice(), floor),
        iterations,
        converged,
    })
}

fn has_converged(previous: &DVector<f64>, next: &DVector<f64>, tolerance: f64) -> bool {
    (next - previous).amax() <= tolerance * next.amax().max(1.0)
}

/// Solve `XᵀWX β = XᵀWy` through a Cholesky factorisation.
fn weighted_least_squares(
    band: Band,
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    weights: &DVector<f64>,
) -> Result<DVector<f64>, FitError> {
    let terms = x.ncols();
    let rows = weights.iter().filter(|&&w| w > 0.0).count();
    let singular = FitError::Singular { band, terms, rows };
    if rows < terms {
        return Err(singular);
    }

    let mut xw = x.clone();
    for (mut row, &w) in xw.row_iter_mut().zip(weights.iter()) {
        row *= w;
    }
    let normal = x.transpose() * &xw;
    let rhs = xw.transpose() * y;

    let chol = normal.cholesky().ok_or_else(|| singular.clone())?;
    let diag = chol.l_dirty().diagonal();
    let rcond = (diag.min() / diag.max()).powi(2);
    if !(rcond >= MIN_RCOND) {
        return Err(singular);
    }

    let beta = chol.solve(&rhs);
    if beta.iter().all(|b| b.is_finite()) {
        Ok(beta)
    } else {
        Err(FitError::NonFinite { band })
    }
}

// ---------------------------------------------------------------------------
// Robust statistics
// ---------------------------------------------------------------------------

fn huber(u: f64) -> f64 {
    if u.abs() <= 1.0 {
        1.0
    } else {
        1.0 / u.abs()
    }
}

fn bisquare(u: f64) -> f64 {
    if u.abs() < 1.0 {
        let v = 1.0 - u * u;
        v * v
    } else {
        0.0
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Normalised median absolute deviation, never below `floor`.
///
/// When more than half the residuals tie (quantised data fit almost
/// exactly) the MAD collapses; the weighted mean absolute deviation is used
/// instead, so down-weighted outliers do not inflate it.
pub(crate) fn robust_scale(residuals: &[f64], weights: &[f64], floor: f64) -> f64 {
    let mut values = residuals.to_vec();
    let center = median(&mut values);
    let deviations: Vec<f64> = residuals.iter().map(|r| (r - center).abs()).collect();

    let mad = MAD_TO_SIGMA * median(&mut deviations.clone());
    if mad > floor {
        return mad;
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return floor;
    }
    let spread = deviations
        .iter()
        .zip(weights)
        .map(|(d, w)| d * w)
        .sum::<f64>()
        / total;
    (MEAN_DEV_TO_SIGMA * spread).max(floor)
}

/// Smallest scale a band's residuals may take; keeps exact fits finite.
fn scale_floor(values: &[f64]) -> f64 {
    let mut magnitudes: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    MIN_RELATIVE_SCALE * median(&mut magnitudes).max(1.0)
}
