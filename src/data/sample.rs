use std::path::Path;

use anyhow::{Context, Result};

use super::model::Dataset;

// ---------------------------------------------------------------------------
// Population values used to draw synthetic data
// ---------------------------------------------------------------------------

/// `(indicator, factor, loading)`; the first indicator of each factor is 1.
pub const LOADINGS: [(&str, &str, f64); 9] = [
    ("V10", "InterestInGrad", 1.0),
    ("V11", "InterestInGrad", 0.8),
    ("V4", "将来に対する関心", 1.0),
    ("V5", "将来に対する関心", 0.9),
    ("V7", "将来に対する関心", 0.8),
    ("V9", "将来に対する関心", 1.1),
    ("V1", "CuriosityInResearch", 1.0),
    ("V2", "CuriosityInResearch", 0.7),
    ("V6", "CuriosityInResearch", 0.9),
];

/// `(dependent, regressor, coefficient)`.
pub const PATHS: [(&str, &str, f64); 3] = [
    ("InterestInGrad", "将来に対する関心", 0.4),
    ("InterestInGrad", "CuriosityInResearch", 0.5),
    ("CuriosityInResearch", "将来に対する関心", 0.6),
];

const FUTURE_VARIANCE: f64 = 1.0;
const CURIOSITY_RESIDUAL: f64 = 0.64;
const GRAD_RESIDUAL: f64 = 0.5;
const ERROR_VARIANCE: f64 = 0.36;
/// Indicators are centred on the middle of a 5-point scale.
const INDICATOR_MEAN: f64 = 3.0;

/// Columns written by [`simulate`], in order. `V3` and `V8` are noise.
pub const COLUMNS: [&str; 11] = [
    "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11",
];

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Draw `n_rows` observations from the population model.
pub fn simulate(n_rows: usize, seed: u64) -> Dataset {
    let mut rng = SimpleRng::new(seed);
    let mut columns: Vec<(String, Vec<f64>)> = COLUMNS
        .iter()
        .map(|c| (c.to_string(), Vec::with_capacity(n_rows)))
        .collect();

    let path = |dep: &str, reg: &str| {
        PATHS
            .iter()
            .find(|(d, r, _)| *d == dep && *r == reg)
            .map_or(0.0, |p| p.2)
    };

    for _ in 0..n_rows {
        let future = rng.gauss(0.0, FUTURE_VARIANCE.sqrt());
        let curiosity = path("CuriosityInResearch", "将来に対する関心") * future
            + rng.gauss(0.0, CURIOSITY_RESIDUAL.sqrt());
        let grad = path("InterestInGrad", "将来に対する関心") * future
            + path("InterestInGrad", "CuriosityInResearch") * curiosity
            + rng.gauss(0.0, GRAD_RESIDUAL.sqrt());

        for (name, values) in columns.iter_mut() {
            let signal = LOADINGS
                .iter()
                .find(|(ind, _, _)| *ind == name.as_str())
                .map_or(0.0, |&(_, factor, loading)| {
                    let score = match factor {
                        "InterestInGrad" => grad,
                        "将来に対する関心" => future,
                        _ => curiosity,
                    };
                    loading * score
                });
            values.push(INDICATOR_MEAN + signal + rng.gauss(0.0, ERROR_VARIANCE.sqrt()));
        }
    }

    Dataset::from_columns(columns)
}

/// Write `dataset` as CSV with a header row.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(&dataset.column_names)
        .context("writing CSV header")?;

    let columns: Vec<&[f64]> = dataset
        .column_names
        .iter()
        .filter_map(|name| dataset.column(name))
        .collect();
    for row in 0..dataset.len() {
        writer
            .write_record(columns.iter().map(|col| format!("{:.4}", col[row])))
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

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
}
