use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{parse_band_column, PixelCoord, Scene};
use crate::classify::SENTINEL;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load one scene (a pixel table) from a file.  Dispatch by extension.
///
/// Every format carries integer `row` and `col` columns plus band columns
/// `b1`, `b2`, …; other columns are ignored. Empty or null band cells are
/// read as the no-data sentinel.
///
/// Supported formats:
/// * `.parquet` – integer or floating-point columns (recommended)
/// * `.json`    – `[{ "row": 0, "col": 0, "b1": 512, ... }, ...]`
/// * `.csv`     – header row `row,col,b1,b2,...`
pub fn load_scene(path: &Path) -> Result<Scene> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let scene = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported scene extension: .{other}"),
    }
    .with_context(|| format!("loading scene {}", path.display()))?;

    debug!(
        "loaded {} pixels, bands {:?} from {}",
        scene.len(),
        scene.bands.keys().collect::<Vec<_>>(),
        path.display()
    );
    Ok(scene)
}

/// Collects pixels row by row while the band set is being discovered.
struct SceneBuilder {
    coords: Vec<PixelCoord>,
    bands: BTreeMap<u32, Vec<f64>>,
}

impl SceneBuilder {
    fn new(band_numbers: impl IntoIterator<Item = u32>) -> Self {
        Self {
            coords: Vec::new(),
            bands: band_numbers.into_iter().map(|b| (b, Vec::new())).collect(),
        }
    }

    fn finish(self) -> Result<Scene> {
        if self.bands.is_empty() {
            bail!("no band columns (expected b1, b2, ...)");
        }
        Ok(Scene {
            coords: self.coords,
            bands: self.bands,
        })
    }
}

fn coord_value(value: i64, row: usize, col: &str) -> Result<u32> {
    u32::try_from(value)
        .with_context(|| format!("Row {row}: '{col}' = {value} is not a valid pixel index"))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, one object per pixel:
///
/// ```json
/// [
///   { "row": 0, "col": 0, "b1": 410, "b2": 655, "b3": 0, ... },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Scene> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let band_numbers = match records.first().and_then(|r| r.as_object()) {
        Some(obj) => obj.keys().filter_map(|k| parse_band_column(k)).collect::<Vec<_>>(),
        None => Vec::new(),
    };
    let mut builder = SceneBuilder::new(band_numbers);

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let row = json_index(obj.get("row"), i, "row")?;
        let col = json_index(obj.get("col"), i, "col")?;
        builder.coords.push(PixelCoord { row, col });

        for (&band, values) in builder.bands.iter_mut() {
            let key = format!("b{band}");
            let value = match obj.get(&key) {
                None | Some(JsonValue::Null) => SENTINEL,
                Some(v) => v
                    .as_f64()
                    .with_context(|| format!("Row {i}, {key}: not a number"))?,
            };
            values.push(value);
        }
    }

    builder.finish()
}

fn json_index(val: Option<&JsonValue>, row: usize, col: &str) -> Result<u32> {
    let value = val
        .and_then(|v| v.as_i64())
        .with_context(|| format!("Row {row}: missing or invalid '{col}'"))?;
    coord_value(value, row, col)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one pixel per record.
fn load_csv(path: &Path) -> Result<Scene> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let row_idx = headers
        .iter()
        .position(|h| h == "row")
        .context("CSV missing 'row' column")?;
    let col_idx = headers
        .iter()
        .position(|h| h == "col")
        .context("CSV missing 'col' column")?;
    let band_cols: Vec<(usize, u32)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| parse_band_column(h).map(|b| (i, b)))
        .collect();

    let mut builder = SceneBuilder::new(band_cols.iter().map(|&(_, b)| b));

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let row = parse_index(record.get(row_idx).unwrap_or(""), row_no, "row")?;
        let col = parse_index(record.get(col_idx).unwrap_or(""), row_no, "col")?;
        builder.coords.push(PixelCoord { row, col });

        for &(idx, band) in &band_cols {
            let value = parse_band_value(record.get(idx).unwrap_or(""), row_no, band)?;
            if let Some(values) = builder.bands.get_mut(&band) {
                values.push(value);
            }
        }
    }

    builder.finish()
}

fn parse_index(s: &str, row: usize, col: &str) -> Result<u32> {
    let value = s
        .trim()
        .parse::<i64>()
        .with_context(|| format!("Row {row}, {col}: '{s}' is not an integer"))?;
    coord_value(value, row, col)
}

fn parse_band_value(s: &str, row: usize, band: u32) -> Result<f64> {
    let tok = s.trim();
    if tok.is_empty() {
        return Ok(SENTINEL);
    }
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, b{band}: '{tok}' is not a number"))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet scene.
///
/// Expected schema:
/// - `row`, `col`: any integer type
/// - `b<N>`: any integer or floating-point type (nulls are no-data)
///
/// Other columns are ignored.
fn load_parquet(path: &Path) -> Result<Scene> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut scene: Option<SceneBuilder> = None;
    let mut offset = 0;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let row_idx = schema
            .index_of("row")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'row' column"))?;
        let col_idx = schema
            .index_of("col")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'col' column"))?;
        let band_cols: Vec<(usize, u32)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter_map(|(i, f)| parse_band_column(f.name()).map(|b| (i, b)))
            .collect();

        let out = scene.get_or_insert_with(|| SceneBuilder::new(band_cols.iter().map(|&(_, b)| b)));

        let rows = integer_column(batch.column(row_idx)).context("reading 'row'")?;
        let cols = integer_column(batch.column(col_idx)).context("reading 'col'")?;
        for i in 0..batch.num_rows() {
            if rows.is_null(i) || cols.is_null(i) {
                bail!("Row {}: null pixel index", offset + i);
            }
            out.coords.push(PixelCoord {
                row: coord_value(rows.value(i), offset + i, "row")?,
                col: coord_value(cols.value(i), offset + i, "col")?,
            });
        }

        for &(idx, band) in &band_cols {
            let values = float_column(batch.column(idx))
                .with_context(|| format!("reading 'b{band}'"))?;
            let Some(target) = out.bands.get_mut(&band) else {
                bail!("'b{band}' appears in a later record batch only");
            };
            target.extend(values.iter().map(|v| v.unwrap_or(SENTINEL)));
        }

        offset += batch.num_rows();
    }

    match scene {
        Some(builder) => builder.finish(),
        None => bail!("parquet file has no record batches"),
    }
}

// -- Arrow helpers --

fn integer_column(col: &ArrayRef) -> Result<Int64Array> {
    if !col.data_type().is_integer() {
        bail!("Expected an integer column, got {:?}", col.data_type());
    }
    let casted = cast(col, &DataType::Int64).context("casting to Int64")?;
    casted
        .as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .context("expected Int64Array")
}

fn float_column(col: &ArrayRef) -> Result<Float64Array> {
    if !col.data_type().is_numeric() {
        bail!("Expected a numeric column, got {:?}", col.data_type());
    }
    let casted = cast(col, &DataType::Float64).context("casting to Float64")?;
    casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .context("expected Float64Array")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float32Array, Int32Array, UInt16Array};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn loads_csv_with_blank_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "scene.csv",
            "row,col,b1,b2,quality\n0,0,10,20,ok\n0,1,,21,bad\n",
        );
        let scene = load_scene(&path).unwrap();

        assert_eq!(scene.len(), 2);
        assert_eq!(scene.coords[1], PixelCoord { row: 0, col: 1 });
        assert_eq!(scene.band(1).unwrap(), &[10.0, SENTINEL]);
        assert_eq!(scene.band(2).unwrap(), &[20.0, 21.0]);
        assert!(scene.band(3).is_err());
    }

    #[test]
    fn rejects_negative_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "scene.csv", "row,col,b1\n-1,0,10\n");
        let err = format!("{:#}", load_scene(&path).unwrap_err());
        assert!(err.contains("not a valid pixel index"), "{err}");
    }

    #[test]
    fn loads_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "scene.json",
            r#"[{"row": 1, "col": 2, "b1": 5.5, "b2": null},
                {"row": 1, "col": 3, "b1": 6}]"#,
        );
        let scene = load_scene(&path).unwrap();
        assert_eq!(scene.coords[0], PixelCoord { row: 1, col: 2 });
        assert_eq!(scene.band(1).unwrap(), &[5.5, 6.0]);
        assert_eq!(scene.band(2).unwrap(), &[SENTINEL, SENTINEL]);
    }

    #[test]
    fn loads_parquet_with_mixed_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("row", DataType::Int32, false),
            Field::new("col", DataType::Int32, false),
            Field::new("b1", DataType::UInt16, true),
            Field::new("b2", DataType::Float32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![0, 0])),
                Arc::new(Int32Array::from(vec![0, 1])),
                Arc::new(UInt16Array::from(vec![Some(400), None])),
                Arc::new(Float32Array::from(vec![0.5, 1.5])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let scene = load_scene(&path).unwrap();
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.band(1).unwrap(), &[400.0, SENTINEL]);
        assert_eq!(scene.band(2).unwrap(), &[0.5, 1.5]);
    }

    #[test]
    fn unknown_extension() {
        assert!(load_scene(Path::new("scene.tif")).is_err());
    }
}
