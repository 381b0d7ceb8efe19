use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PixelCoord – position of a pixel in the scene grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for PixelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ---------------------------------------------------------------------------
// BandSelection – which scene bands feed the classifier
// ---------------------------------------------------------------------------

/// 1-based band numbers (as in GDAL) of the monitored bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandSelection {
    pub green: u32,
    pub nir: u32,
    pub swir1: u32,
}

impl Default for BandSelection {
    /// Landsat 8 OLI layout.
    fn default() -> Self {
        Self {
            green: 2,
            nir: 4,
            swir1: 5,
        }
    }
}

impl BandSelection {
    pub fn validate(&self) -> Result<()> {
        for (name, number) in self.named() {
            if number == 0 {
                bail!("{name} band number must be 1 or greater");
            }
        }
        Ok(())
    }

    fn named(&self) -> [(&'static str, u32); 3] {
        [("green", self.green), ("nir", self.nir), ("swir1", self.swir1)]
    }
}

/// Column name holding band `number` in a scene table.
pub fn band_column(number: u32) -> String {
    format!("b{number}")
}

/// Band number encoded in a column name such as `b4`.
pub fn parse_band_column(name: &str) -> Option<u32> {
    name.strip_prefix('b')?
        .parse::<u32>()
        .ok()
        .filter(|&n| n >= 1)
}

// ---------------------------------------------------------------------------
// Scene – one date of the archive, as a pixel table
// ---------------------------------------------------------------------------

/// The pixels of one acquisition: a coordinate per pixel and, per band
/// number, one value per pixel (the sentinel where there is no data).
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub coords: Vec<PixelCoord>,
    pub bands: BTreeMap<u32, Vec<f64>>,
}

impl Scene {
    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the scene has no pixels.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn band(&self, number: u32) -> Result<&[f64]> {
        match self.bands.get(&number) {
            Some(values) => Ok(values),
            None => {
                let available: Vec<String> = self.bands.keys().map(|&n| band_column(n)).collect();
                bail!(
                    "scene has no '{}' column (available: {})",
                    band_column(number),
                    available.join(", ")
                )
            }
        }
    }

    /// `[green, nir, swir1]` per pixel.
    pub fn select(&self, selection: &BandSelection) -> Result<Vec<[f64; 3]>> {
        let green = self.band(selection.green)?;
        let nir = self.band(selection.nir)?;
        let swir1 = self.band(selection.swir1)?;
        Ok((0..self.len())
            .map(|i| [green[i], nir[i], swir1[i]])
            .collect())
    }

    /// `(width, height)` of the smallest grid holding every pixel.
    pub fn grid_size(&self) -> (u32, u32) {
        self.coords.iter().fold((0, 0), |(w, h), c| {
            (w.max(c.col + 1), h.max(c.row + 1))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Scene {
        let coords = vec![
            PixelCoord { row: 0, col: 0 },
            PixelCoord { row: 0, col: 1 },
            PixelCoord { row: 2, col: 0 },
        ];
        let bands = (1..=5)
            .map(|b| (b, vec![b as f64, 10.0 * b as f64, 100.0 * b as f64]))
            .collect();
        Scene { coords, bands }
    }

    #[test]
    fn band_column_names() {
        assert_eq!(band_column(4), "b4");
        assert_eq!(parse_band_column("b12"), Some(12));
        assert_eq!(parse_band_column("b0"), None);
        assert_eq!(parse_band_column("row"), None);
        assert_eq!(parse_band_column("blue"), None);
    }

    #[test]
    fn selects_default_bands() {
        let rows = scene().select(&BandSelection::default()).unwrap();
        assert_eq!(rows[1], [20.0, 40.0, 50.0]);
    }

    #[test]
    fn missing_band_is_an_error() {
        let selection = BandSelection {
            swir1: 7,
            ..BandSelection::default()
        };
        let err = scene().select(&selection).unwrap_err().to_string();
        assert!(err.contains("'b7'"), "{err}");
    }

    #[test]
    fn zero_band_number_is_rejected() {
        let selection = BandSelection {
            nir: 0,
            ..BandSelection::default()
        };
        assert!(selection.validate().is_err());
        assert!(BandSelection::default().validate().is_ok());
    }

    #[test]
    fn grid_size_covers_all_pixels() {
        assert_eq!(scene().grid_size(), (2, 3));
    }
}
