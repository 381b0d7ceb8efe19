//! Cloud, cloud shadow and snow screening for satellite image time series.
//!
//! Each pixel's (green, NIR, SWIR1) history is fit with a robust
//! seasonal-plus-trend model; dates that sit too far from the fit are
//! flagged. [`classify`] holds the pure per-pixel logic, [`data`] and
//! [`runner`] the archive/scene plumbing around it.

pub mod classify;
pub mod data;
pub mod runner;
