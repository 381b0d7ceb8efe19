/// Data layer: archive description, scene loading and mask writing.
///
/// Architecture:
/// ```text
///   archive.json
///        │
///        ▼
///   ┌──────────┐
///   │ archive  │  date → (scene path, mask path), day ordinals
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  .parquet / .json / .csv → Scene (coords + bands)
///   └──────────┘
///        │
///        ▼           (classification happens in `runner`)
///   ┌──────────┐
///   │  writer  │  labels → .parquet / .csv / .json / .png
///   └──────────┘
/// ```

pub mod archive;
pub mod loader;
pub mod model;
pub mod writer;
