use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde::de::IgnoredAny;

use super::model::Dataset;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, one numeric column per variable (also the fallback)
/// * `.json`    – `[{ "V1": 1.0, "V2": 3.0, ... }, ...]`
/// * `.parquet` – flat numeric columns
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        _ => load_csv(path),
    }
    .with_context(|| format!("loading dataset from {}", path.display()))?;

    info!(
        "loaded {} rows × {} columns from {}",
        dataset.len(),
        dataset.column_names.len(),
        path.display()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one observation per row.
/// Cells that are empty or not numbers become `NaN`.
fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() {
        bail!("CSV has no header row");
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (col_idx, values) in columns.iter_mut().enumerate() {
            values.push(parse_cell(record.get(col_idx).unwrap_or("")));
        }
    }

    Ok(Dataset::from_columns(headers.into_iter().zip(columns).collect()))
}

fn parse_cell(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// A single JSON cell. Anything that is not a number is kept as missing.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonCell {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl JsonCell {
    fn as_f64(&self) -> f64 {
        match self {
            JsonCell::Number(v) => *v,
            JsonCell::Text(s) => parse_cell(s),
            JsonCell::Other(IgnoredAny) => f64::NAN,
        }
    }
}

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "V1": 3.0, "V2": 4.0, ... },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let records: Vec<BTreeMap<String, JsonCell>> =
        serde_json::from_str(&text).context("parsing JSON records")?;

    // Keys are sorted within a record; new keys append in that order.
    let mut names: Vec<String> = Vec::new();
    for rec in &records {
        for key in rec.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|rec| rec.get(&name).map_or(f64::NAN, JsonCell::as_f64))
                .collect();
            (name, values)
        })
        .collect();

    Ok(Dataset::from_columns(columns))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one numeric column per variable.
///
/// Float and integer columns are read as `f64`; nulls become `NaN`.
/// Columns of any other type are skipped.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut names: Vec<String> = Vec::new();
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        for (col_idx, field) in schema.fields().iter().enumerate() {
            let Some(values) = extract_f64_column(batch.column(col_idx)) else {
                debug!("skipping non-numeric parquet column '{}'", field.name());
                continue;
            };
            if !columns.contains_key(field.name()) {
                names.push(field.name().clone());
            }
            columns
                .entry(field.name().clone())
                .or_default()
                .extend(values);
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values = columns.remove(&name).unwrap_or_default();
            (name, values)
        })
        .collect();
    Ok(Dataset::from_columns(columns))
}

// -- Parquet / Arrow helpers --

/// Read a numeric Arrow column as `f64`, or `None` for other types.
fn extract_f64_column(col: &Arc<dyn Array>) -> Option<Vec<f64>> {
    let values = match col.data_type() {
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>()?;
            arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>()?;
            arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect()
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>()?;
            arr.iter().map(|v| v.map_or(f64::NAN, |i| i as f64)).collect()
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>()?;
            arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect()
        }
        _ => return None,
    };
    Some(values)
}
