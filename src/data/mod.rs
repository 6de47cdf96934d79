/// Data layer: dataset type, file loading and synthetic samples.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset  │  named f64 columns
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ observations  │  select model columns → n × p matrix, covariance
///   └──────────────┘
/// ```

pub mod loader;
pub mod model;
pub mod sample;
