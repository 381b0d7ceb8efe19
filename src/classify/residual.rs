use std::fmt;
use std::str::FromStr;

use super::model::{Band, BandModels, CleanedSeries, Label, Observation};

// ---------------------------------------------------------------------------
// Decision rules
// ---------------------------------------------------------------------------

/// How the three normalised residuals of a date are turned into a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionRule {
    /// Euclidean norm of the normalised residuals above the threshold.
    #[default]
    Magnitude,
    /// Bright in green (cloud, snow) or dark in both NIR and SWIR1 (shadow).
    SignPattern,
}

impl FromStr for DecisionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "magnitude" => Ok(DecisionRule::Magnitude),
            "sign-pattern" => Ok(DecisionRule::SignPattern),
            other => Err(format!(
                "unknown decision rule '{other}' (expected magnitude or sign-pattern)"
            )),
        }
    }
}

impl fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionRule::Magnitude => write!(f, "magnitude"),
            DecisionRule::SignPattern => write!(f, "sign-pattern"),
        }
    }
}

/// Why a date was, or was not, flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clear,
    /// Green much brighter than expected: cloud or snow.
    Bright,
    /// NIR and SWIR1 both much darker than expected: cloud shadow.
    Shadow,
    /// Far from the model without a recognised sign pattern.
    Outlier,
}

impl Verdict {
    pub fn label(self) -> Label {
        match self {
            Verdict::Clear => Label::Clear,
            _ => Label::Contaminated,
        }
    }
}

/// Signed residuals of one observation, each in units of its band's
/// robust scale, in [`Band::ALL`] order.
pub fn normalized_residuals(obs: &Observation, models: &BandModels) -> [f64; 3] {
    Band::ALL.map(|band| models[band].normalized_residual(obs.date, obs.band(band)))
}

/// Apply `rule` to one date's normalised residuals.
pub fn diagnose(z: [f64; 3], threshold: f64, rule: DecisionRule) -> Verdict {
    let [green, nir, swir1] = z;
    match rule {
        DecisionRule::Magnitude => {
            let magnitude = z.iter().map(|v| v * v).sum::<f64>().sqrt();
            if magnitude > threshold {
                if green > threshold {
                    Verdict::Bright
                } else if nir < -threshold && swir1 < -threshold {
                    Verdict::Shadow
                } else {
                    Verdict::Outlier
                }
            } else {
                Verdict::Clear
            }
        }
        DecisionRule::SignPattern => {
            if green > threshold {
                Verdict::Bright
            } else if nir < -threshold && swir1 < -threshold {
                Verdict::Shadow
            } else {
                Verdict::Clear
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Classification of the cleaned rows
// ---------------------------------------------------------------------------

/// Label every row of `cleaned`.
///
/// Without models (too few samples, or the fit failed) every row is clear.
pub fn classify(
    cleaned: &CleanedSeries,
    models: Option<&BandModels>,
    threshold: f64,
    rule: DecisionRule,
) -> Vec<Label> {
    match models {
        None => vec![Label::Clear; cleaned.len()],
        Some(models) => cleaned
            .observations
            .iter()
            .map(|obs| diagnose(normalized_residuals(obs, models), threshold, rule).label())
            .collect(),
    }
}
