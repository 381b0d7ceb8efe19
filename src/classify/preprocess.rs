use super::model::{CleanedSeries, PixelSeries};

// ---------------------------------------------------------------------------
// Series preprocessing: drop rows without valid data on every band
// ---------------------------------------------------------------------------

/// Split a pixel series into its usable rows and the positions that were
/// removed.
///
/// A row is removed when **any** band holds the sentinel (or a non-finite
/// value): a date is only usable if all monitored bands have data.
/// The input is never modified.
pub fn preprocess(series: &PixelSeries) -> CleanedSeries {
    let (kept, dropped): (Vec<_>, Vec<_>) = series
        .iter()
        .enumerate()
        .partition(|(_, obs)| obs.is_valid());

    CleanedSeries {
        observations: kept.into_iter().map(|(_, obs)| *obs).collect(),
        dropped: dropped.into_iter().map(|(i, _)| i).collect(),
        original_len: series.len(),
    }
}

/// Whole years covered by the cleaned series: `ceil(span / 365)`.
pub fn num_years(cleaned: &CleanedSeries) -> u32 {
    match cleaned.date_range() {
        Some((first, last)) => years_spanned(first, last),
        None => 0,
    }
}

/// `ceil((last - first) / 365)` for two day ordinals.
pub fn years_spanned(first: i64, last: i64) -> u32 {
    ((last - first) as f64 / 365.0).ceil() as u32
}
