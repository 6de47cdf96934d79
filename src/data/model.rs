use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::sem::error::{Result, SemError};

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// A table of named numeric columns, one row per observation.
///
/// Cells that could not be read as numbers are stored as `NaN`; they only
/// become an error once a column holding them is selected for fitting.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Column names in file order.
    pub column_names: Vec<String>,
    columns: BTreeMap<String, Vec<f64>>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset from `(name, values)` pairs.
    ///
    /// Shorter columns are padded with `NaN` so every column has the same
    /// number of rows. A repeated name keeps the first column.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Self {
        let n_rows = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let mut column_names = Vec::with_capacity(columns.len());
        let mut map = BTreeMap::new();

        for (name, mut values) in columns {
            if map.contains_key(&name) {
                continue;
            }
            values.resize(n_rows, f64::NAN);
            column_names.push(name.clone());
            map.insert(name, values);
        }

        Dataset {
            column_names,
            columns: map,
            n_rows,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.n_rows
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Gather the named columns into an `n × p` observation matrix.
    pub fn observations(&self, names: &[String]) -> Result<DMatrix<f64>> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let values = self
                .column(name)
                .ok_or_else(|| SemError::MissingColumn(name.clone()))?;
            let missing = values.iter().filter(|v| !v.is_finite()).count();
            if missing > 0 {
                return Err(SemError::MissingValues {
                    column: name.clone(),
                    count: missing,
                });
            }
            selected.push(values);
        }

        Ok(DMatrix::from_fn(self.n_rows, names.len(), |i, j| {
            selected[j][i]
        }))
    }
}

// ---------------------------------------------------------------------------
// Moments
// ---------------------------------------------------------------------------

/// Covariance matrix of the columns of `x` with denominator `n`.
pub fn covariance(x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = x.nrows();
    if n < 2 {
        return Err(SemError::TooFewObservations(n));
    }
    let mut centered = x.clone();
    for mut col in centered.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    Ok(centered.transpose() * &centered / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn short_columns_are_padded() {
        let ds = Dataset::from_columns(vec![
            ("a".into(), vec![1.0, 2.0, 3.0]),
            ("b".into(), vec![4.0]),
        ]);
        assert_eq!(ds.len(), 3);
        assert!(ds.column("b").unwrap()[2].is_nan());
    }

    #[test]
    fn observations_respect_requested_order() {
        let ds = Dataset::from_columns(vec![
            ("a".into(), vec![1.0, 2.0]),
            ("b".into(), vec![3.0, 4.0]),
        ]);
        let x = ds.observations(&names(&["b", "a"])).unwrap();
        assert_eq!(x[(0, 0)], 3.0);
        assert_eq!(x[(1, 1)], 2.0);
    }

    #[test]
    fn missing_column_is_reported() {
        let ds = Dataset::from_columns(vec![("a".into(), vec![1.0, 2.0])]);
        let err = ds.observations(&names(&["a", "V9"])).unwrap_err();
        assert!(matches!(err, SemError::MissingColumn(ref c) if c == "V9"));
    }

    #[test]
    fn nan_cells_are_reported() {
        let ds = Dataset::from_columns(vec![("a".into(), vec![1.0, f64::NAN, 2.0])]);
        let err = ds.observations(&names(&["a"])).unwrap_err();
        assert!(matches!(err, SemError::MissingValues { count: 1, .. }));
    }

    #[test]
    fn covariance_uses_n_denominator() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0, 4.0, 8.0]);
        let s = covariance(&x).unwrap();
        assert!((s[(0, 0)] - 1.25).abs() < 1e-12);
        assert!((s[(0, 1)] - 2.5).abs() < 1e-12);
        assert!((s[(1, 1)] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_needs_two_rows() {
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(matches!(
            covariance(&x),
            Err(SemError::TooFewObservations(1))
        ));
    }
}
