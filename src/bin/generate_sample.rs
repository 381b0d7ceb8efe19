use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Int32Array, UInt16Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, Duration, NaiveDate};
use parquet::arrow::ArrowWriter;
use serde_json::{json, Map, Value as JsonValue};

const GRID: u32 = 16;
const N_BANDS: usize = 6;
const N_DATES: usize = 69;
const REVISIT_DAYS: i64 = 16;

/// Mean reflectance (×10⁴) and seasonal amplitude per band b1..b6.
const BAND_PROFILE: [(f64, f64); N_BANDS] = [
    (450.0, 60.0),
    (700.0, 150.0),
    (650.0, 250.0),
    (2600.0, 1100.0),
    (1800.0, 300.0),
    (1100.0, 250.0),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    fn below(&mut self, n: u32) -> u32 {
        (self.next_f64() * n as f64) as u32
    }
}

/// A round patch of the scene.
struct Disc {
    row: f64,
    col: f64,
    radius: f64,
}

impl Disc {
    fn random(rng: &mut SimpleRng) -> Self {
        Disc {
            row: rng.below(GRID) as f64,
            col: rng.below(GRID) as f64,
            radius: 2.0 + rng.next_f64() * 3.0,
        }
    }

    fn contains(&self, row: u32, col: u32) -> bool {
        let dr = row as f64 - self.row;
        let dc = col as f64 - self.col;
        dr * dr + dc * dc <= self.radius * self.radius
    }
}

fn generate_scene(date: NaiveDate, rng: &mut SimpleRng) -> Vec<Vec<u16>> {
    let phase = 2.0 * std::f64::consts::PI * (date.ordinal0() as f64 - 80.0) / 365.0;

    let cloud = rng.chance(0.2).then(|| Disc::random(rng));
    let shadow = cloud.as_ref().map(|c| Disc {
        row: c.row + 3.0,
        col: c.col - 2.0,
        radius: c.radius,
    });
    let stripe = rng.chance(0.1).then(|| rng.below(GRID));

    let mut bands = vec![Vec::with_capacity((GRID * GRID) as usize); N_BANDS];
    for row in 0..GRID {
        for col in 0..GRID {
            let in_cloud = cloud.as_ref().is_some_and(|d| d.contains(row, col));
            let in_shadow = !in_cloud && shadow.as_ref().is_some_and(|d| d.contains(row, col));
            let no_data = stripe == Some(col);

            for (b, &(mean, amplitude)) in BAND_PROFILE.iter().enumerate() {
                let texture = 1.0 + 0.02 * ((row * 7 + col * 3) % 5) as f64;
                let mut v = (mean + amplitude * phase.sin()) * texture + rng.gauss(0.0, 25.0);
                if in_cloud {
                    v += 4000.0;
                } else if in_shadow {
                    v *= 0.25;
                }
                let value = if no_data { 0 } else { v.clamp(1.0, 10_000.0) as u16 };
                bands[b].push(value);
            }
        }
    }
    bands
}

fn write_scene(path: &Path, bands: &[Vec<u16>]) -> Result<()> {
    let mut fields = vec![
        Field::new("row", DataType::Int32, false),
        Field::new("col", DataType::Int32, false),
    ];
    fields.extend((1..=bands.len()).map(|b| Field::new(format!("b{b}"), DataType::UInt16, false)));
    let schema = Arc::new(Schema::new(fields));

    let rows: Vec<i32> = (0..GRID).flat_map(|r| (0..GRID).map(move |_| r as i32)).collect();
    let cols: Vec<i32> = (0..GRID).flat_map(|_| (0..GRID).map(|c| c as i32)).collect();

    let mut columns: Vec<arrow::array::ArrayRef> =
        vec![Arc::new(Int32Array::from(rows)), Arc::new(Int32Array::from(cols))];
    columns.extend(
        bands
            .iter()
            .map(|b| Arc::new(UInt16Array::from(b.clone())) as arrow::array::ArrayRef),
    );

    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_archive".to_string());
    let out_dir = Path::new(&out_dir);
    std::fs::create_dir_all(out_dir.join("scenes")).context("creating output directory")?;

    let mut rng = SimpleRng::new(42);
    let start = NaiveDate::from_ymd_opt(2015, 1, 3).context("invalid start date")?;
    let mut archive = Map::new();

    for i in 0..N_DATES {
        let date = start + Duration::days(REVISIT_DAYS * i as i64);
        let key = date.format("%Y-%m-%d").to_string();
        let scene = format!("scenes/{key}.parquet");

        write_scene(&out_dir.join(&scene), &generate_scene(date, &mut rng))?;
        archive.insert(
            key.clone(),
            json!({ "input": scene, "output": format!("masks/{key}.png") }),
        );
    }

    let archive_path = out_dir.join("archive.json");
    let text = serde_json::to_string_pretty(&JsonValue::Object(archive))
        .context("serializing archive")?;
    std::fs::write(&archive_path, text).context("writing archive.json")?;

    println!(
        "Wrote {N_DATES} scenes ({GRID}x{GRID} pixels, {N_BANDS} bands) and {}",
        archive_path.display()
    );
    Ok(())
}
