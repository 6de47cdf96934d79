use std::f64::consts::PI;

use nalgebra::DMatrix;

use super::dist::chi2_sf;
use super::model::FittedModel;

/// Fit indices of a fitted model against the independence baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct FitStatistics {
    pub dof: f64,
    pub dof_baseline: f64,
    pub chi2: f64,
    pub chi2_p_value: f64,
    pub chi2_baseline: f64,
    pub cfi: f64,
    pub gfi: f64,
    pub agfi: f64,
    pub nfi: f64,
    pub tli: f64,
    pub rmsea: f64,
    pub aic: f64,
    pub bic: f64,
    pub loglik: f64,
}

impl FitStatistics {
    /// `(name, value)` pairs in report order.
    pub fn rows(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("DoF", self.dof),
            ("DoF Baseline", self.dof_baseline),
            ("chi2", self.chi2),
            ("chi2 p-value", self.chi2_p_value),
            ("chi2 Baseline", self.chi2_baseline),
            ("CFI", self.cfi),
            ("GFI", self.gfi),
            ("AGFI", self.agfi),
            ("NFI", self.nfi),
            ("TLI", self.tli),
            ("RMSEA", self.rmsea),
            ("AIC", self.aic),
            ("BIC", self.bic),
            ("LogLik", self.loglik),
        ]
    }
}

/// Compute fit statistics for `fitted`.
pub fn calc_stats(fitted: &FittedModel) -> FitStatistics {
    let s = &fitted.sample_cov;
    let sigma = &fitted.implied;
    let p = s.nrows();
    let n = fitted.n_obs as f64;
    let k = fitted.theta.len() as f64;

    let dof = fitted.model.dof() as f64;
    let dof_baseline = (p * (p - 1) / 2) as f64;

    let chi2 = (n * fitted.objective).max(0.0);
    let log_det_s = log_det(s);
    let chi2_baseline = n * (s.diagonal().iter().map(|v| v.ln()).sum::<f64>() - log_det_s);

    let chi2_p_value = chi2_sf(chi2, dof);

    let excess = (chi2 - dof).max(0.0);
    let excess_baseline = (chi2_baseline - dof_baseline).max(excess);
    let cfi = if excess_baseline > 0.0 {
        1.0 - excess / excess_baseline
    } else {
        1.0
    };

    let nfi = (chi2_baseline - chi2) / chi2_baseline;
    let ratio_baseline = chi2_baseline / dof_baseline;
    let tli = if dof > 0.0 {
        (ratio_baseline - chi2 / dof) / (ratio_baseline - 1.0)
    } else {
        f64::NAN
    };

    let rmsea = if dof > 0.0 {
        ((chi2 / dof - 1.0).max(0.0) / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };

    let (gfi, loglik) = match sigma.clone().try_inverse() {
        Some(sigma_inv) => {
            let m = &sigma_inv * s;
            let resid = &m - DMatrix::identity(p, p);
            let gfi = 1.0 - (&resid * &resid).trace() / (&m * &m).trace();
            let loglik = -0.5 * n * (p as f64 * (2.0 * PI).ln() + log_det(sigma) + m.trace());
            (gfi, loglik)
        }
        None => (f64::NAN, f64::NAN),
    };
    let agfi = if dof > 0.0 {
        1.0 - (p * (p + 1)) as f64 / (2.0 * dof) * (1.0 - gfi)
    } else {
        f64::NAN
    };

    FitStatistics {
        dof,
        dof_baseline,
        chi2,
        chi2_p_value,
        chi2_baseline,
        cfi,
        gfi,
        agfi,
        nfi,
        tli,
        rmsea,
        aic: 2.0 * k - 2.0 * loglik,
        bic: k * n.ln() - 2.0 * loglik,
        loglik,
    }
}

fn log_det(m: &DMatrix<f64>) -> f64 {
    m.determinant().ln()
}
