use log::warn;
use nalgebra::DMatrix;

use super::dist::normal_sf;
use super::model::FittedModel;

/// One row of the estimates table.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEstimate {
    pub lval: String,
    pub op: &'static str,
    pub rval: String,
    pub estimate: f64,
    /// `None` for fixed parameters.
    pub std_err: Option<f64>,
    pub z_value: Option<f64>,
    pub p_value: Option<f64>,
}

/// Parameter table with standard errors, z-values and two-sided p-values.
pub fn inspect(fitted: &FittedModel) -> Vec<ParameterEstimate> {
    let std_errs = standard_errors(fitted);
    let mut free_idx = 0;

    fitted
        .model
        .params
        .iter()
        .zip(&fitted.estimates)
        .map(|(param, &estimate)| {
            let (std_err, z_value, p_value) = if param.is_free() {
                let se = std_errs[free_idx];
                free_idx += 1;
                let z = estimate / se;
                (Some(se), Some(z), Some(2.0 * normal_sf(z.abs())))
            } else {
                (None, None, None)
            };
            ParameterEstimate {
                lval: param.lval.clone(),
                op: param.kind.op(),
                rval: param.rval.clone(),
                estimate,
                std_err,
                z_value,
                p_value,
            }
        })
        .collect()
}

/// Square roots of the diagonal of the inverse expected information.
///
/// `I_ij = (n/2) tr(Σ⁻¹ ∂Σ/∂θ_i Σ⁻¹ ∂Σ/∂θ_j)`. A singular matrix yields NaN.
pub fn standard_errors(fitted: &FittedModel) -> Vec<f64> {
    let k = fitted.theta.len();
    let nan = vec![f64::NAN; k];

    let Some(sigma_inv) = fitted.implied.clone().try_inverse() else {
        warn!("implied covariance is singular; standard errors unavailable");
        return nan;
    };
    let products: Vec<DMatrix<f64>> = fitted
        .sigma_derivatives()
        .iter()
        .map(|d| &sigma_inv * d)
        .collect();
    if products.len() != k {
        return nan;
    }

    let half_n = fitted.n_obs as f64 / 2.0;
    let info = DMatrix::from_fn(k, k, |i, j| {
        half_n * products[i].component_mul(&products[j].transpose()).sum()
    });

    match info.try_inverse() {
        Some(cov) => cov
            .diagonal()
            .iter()
            .map(|&v| if v > 0.0 { v.sqrt() } else { f64::NAN })
            .collect(),
        None => {
            warn!("information matrix is singular; model may not be identified");
            nan
        }
    }
}
