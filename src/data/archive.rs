use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::classify::years_spanned;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Archive – the date → (input scene, output mask) mapping
// ---------------------------------------------------------------------------

/// One acquisition date with the scene to read and the mask to write.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub date: NaiveDate,
    /// Day ordinal, 0001-01-01 being day 1.
    pub ordinal: i64,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// All dates of a time series, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    pub entries: Vec<ArchiveEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    input: PathBuf,
    output: PathBuf,
}

/// Day ordinal of a calendar date (0001-01-01 is day 1).
pub fn date_ordinal(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

/// Read an archive description from a JSON file.
///
/// ```json
/// {
///   "2015-01-03": { "input": "scenes/2015-01-03.parquet", "output": "masks/2015-01-03.png" },
///   "2015-01-19": { "input": "scenes/2015-01-19.parquet", "output": "masks/2015-01-19.png" }
/// }
/// ```
///
/// Relative paths are taken relative to the directory holding the file.
pub fn load_archive(path: &Path) -> Result<Archive> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading archive file {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    parse_archive(&text, base_dir).with_context(|| format!("in archive file {}", path.display()))
}

/// Parse archive JSON, resolving relative paths against `base_dir`.
pub fn parse_archive(text: &str, base_dir: &Path) -> Result<Archive> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records: &Map<String, JsonValue> = root
        .as_object()
        .context("Expected top-level JSON object keyed by date")?;

    if records.is_empty() {
        bail!("archive lists no dates");
    }

    let mut seen = BTreeSet::new();
    let mut entries = Vec::with_capacity(records.len());

    for (key, value) in records {
        let date = NaiveDate::parse_from_str(key, DATE_FORMAT)
            .with_context(|| format!("'{key}' is not a YYYY-MM-DD date"))?;
        let raw: RawEntry = serde_json::from_value(value.clone())
            .with_context(|| format!("{key}: expected {{\"input\": ..., \"output\": ...}}"))?;

        let ordinal = date_ordinal(date);
        if !seen.insert(ordinal) {
            bail!("{key}: date listed more than once");
        }

        entries.push(ArchiveEntry {
            date,
            ordinal,
            input: base_dir.join(raw.input),
            output: base_dir.join(raw.output),
        });
    }

    Ok(Archive { entries })
}

impl Archive {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Day ordinals in series order.
    pub fn ordinals(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.ordinal).collect()
    }

    /// Years covered by the whole archive, counted like a pixel's own
    /// coverage.
    pub fn num_years(&self) -> u32 {
        let ordinals = self.ordinals();
        match (ordinals.iter().min(), ordinals.iter().max()) {
            (Some(&first), Some(&last)) => years_spanned(first, last),
            _ => 0,
        }
    }

    /// Check that every input scene exists, reporting all missing ones.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.input.is_file())
            .map(|e| format!("{} ({})", e.input.display(), e.date))
            .collect();

        if !missing.is_empty() {
            bail!(
                "{} input scene(s) not found: {}",
                missing.len(),
                missing.join(", ")
            );
        }
        Ok(())
    }
}
