use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{UInt32Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use image::{GrayImage, ImageFormat, Luma};
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use super::model::PixelCoord;

/// Name of the mask layer in tabular outputs.
pub const MASK_LAYER: &str = "tmask";

// ---------------------------------------------------------------------------
// Output drivers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Parquet,
    Csv,
    Json,
    /// Single-band 8-bit image; pixel value is the label.
    Png,
}

impl OutputFormat {
    /// Driver implied by a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "pq" => Ok(OutputFormat::Parquet),
            other => other
                .parse()
                .map_err(|_| anyhow::anyhow!("No output driver for extension .{other} ({})", path.display())),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(OutputFormat::Parquet),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "png" => Ok(OutputFormat::Png),
            other => Err(format!(
                "unknown output driver '{other}' (expected parquet, csv, json or png)"
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Png => "png",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Serialize)]
struct MaskRecord {
    row: u32,
    col: u32,
    tmask: u8,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write one date's mask (`1` = cloud / shadow / snow, `0` = clear).
///
/// `coords` and `mask` are aligned pixel by pixel. The driver is `format`
/// when given, otherwise it follows the file extension.
pub fn write_mask(
    path: &Path,
    coords: &[PixelCoord],
    mask: &[u8],
    format: Option<OutputFormat>,
) -> Result<()> {
    if coords.len() != mask.len() {
        bail!(
            "mask has {} values for {} pixels",
            mask.len(),
            coords.len()
        );
    }
    let format = match format {
        Some(f) => f,
        None => OutputFormat::from_path(path)?,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    match format {
        OutputFormat::Parquet => write_parquet(path, coords, mask),
        OutputFormat::Csv => write_csv(path, coords, mask),
        OutputFormat::Json => write_json(path, coords, mask),
        OutputFormat::Png => write_png(path, coords, mask),
    }
    .with_context(|| format!("writing {format} mask {}", path.display()))
}

fn records<'a>(coords: &'a [PixelCoord], mask: &'a [u8]) -> impl Iterator<Item = MaskRecord> + 'a {
    coords.iter().zip(mask).map(|(c, &m)| MaskRecord {
        row: c.row,
        col: c.col,
        tmask: m,
    })
}

fn write_csv(path: &Path, coords: &[PixelCoord], mask: &[u8]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    for record in records(coords, mask) {
        writer.serialize(record).context("writing CSV record")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_json(path: &Path, coords: &[PixelCoord], mask: &[u8]) -> Result<()> {
    let all: Vec<MaskRecord> = records(coords, mask).collect();
    let file = std::fs::File::create(path).context("creating JSON file")?;
    serde_json::to_writer(std::io::BufWriter::new(file), &all).context("serializing JSON")?;
    Ok(())
}

fn write_parquet(path: &Path, coords: &[PixelCoord], mask: &[u8]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("row", DataType::UInt32, false),
        Field::new("col", DataType::UInt32, false),
        Field::new(MASK_LAYER, DataType::UInt8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(UInt32Array::from_iter_values(coords.iter().map(|c| c.row))),
            Arc::new(UInt32Array::from_iter_values(coords.iter().map(|c| c.col))),
            Arc::new(UInt8Array::from(mask.to_vec())),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn write_png(path: &Path, coords: &[PixelCoord], mask: &[u8]) -> Result<()> {
    let (width, height) = coords.iter().fold((0, 0), |(w, h), c| {
        (w.max(c.col + 1), h.max(c.row + 1))
    });
    if width == 0 || height == 0 {
        bail!("cannot write an empty image");
    }

    let mut img = GrayImage::new(width, height);
    for (c, &m) in coords.iter().zip(mask) {
        img.put_pixel(c.col, c.row, Luma([m]));
    }
    img.save_with_format(path, ImageFormat::Png)
        .context("encoding PNG")?;
    Ok(())
}
