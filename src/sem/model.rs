use std::collections::BTreeSet;

use argmin::core::{CostFunction, Error as ArgminError, Gradient};
use log::{debug, info};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use super::error::{Result, SemError};
use super::optimizer::{self, INFEASIBLE, Minimum};
use super::syntax::{self, Operator, Relation};
use crate::data::model::{Dataset, covariance};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// What a parameter means and which RAM matrix holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Factor loading, `A[indicator, factor]`.
    Loading,
    /// Structural path, `A[dependent, regressor]`.
    Regression,
    /// Variance, `S[v, v]`.
    Variance,
    /// Covariance, `S[a, b]` and `S[b, a]`.
    Covariance,
}

impl ParamKind {
    /// Operator used when reporting the parameter.
    pub fn op(self) -> &'static str {
        match self {
            ParamKind::Loading | ParamKind::Regression => "~",
            ParamKind::Variance | ParamKind::Covariance => "~~",
        }
    }

    fn is_path(self) -> bool {
        matches!(self, ParamKind::Loading | ParamKind::Regression)
    }
}

/// One entry of the parameter table.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Dependent variable for paths, first variable for (co)variances.
    pub lval: String,
    pub rval: String,
    pub kind: ParamKind,
    /// `Some(v)` when the parameter is held at `v` instead of estimated.
    pub fixed: Option<f64>,
    row: usize,
    col: usize,
}

impl Parameter {
    pub fn is_free(&self) -> bool {
        self.fixed.is_none()
    }
}

// ---------------------------------------------------------------------------
// Model – the unfitted structure
// ---------------------------------------------------------------------------

/// Tuning knobs for [`Model::fit`].
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Stop when the largest gradient component falls below this.
    pub gradient_tolerance: f64,
    /// Stop when the objective improves by less than this, relatively.
    pub function_tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            gradient_tolerance: 1e-8,
            function_tolerance: 1e-14,
        }
    }
}

/// A structural equation model in RAM form, built from a description.
///
/// Variables are indexed observed-first, so the filter matrix `F` is the
/// leading `p × m` identity block and never has to be materialised.
#[derive(Debug, Clone)]
pub struct Model {
    /// Observed variables, in order of first appearance.
    pub observed: Vec<String>,
    /// Latent factors, in order of first appearance.
    pub latent: Vec<String>,
    /// Full parameter table (free and fixed).
    pub params: Vec<Parameter>,
    relations: Vec<Relation>,
}

impl Model {
    /// Parse `description` and derive the parameter table.
    pub fn new(description: &str) -> Result<Self> {
        let relations = syntax::parse(description)?;

        let latent: Vec<String> = unique_in_order(
            relations
                .iter()
                .filter(|r| r.op == Operator::Measurement)
                .map(|r| r.lhs.as_str()),
        );
        let observed: Vec<String> = unique_in_order(
            relations
                .iter()
                .flat_map(|r| [r.lhs.as_str(), r.rhs.as_str()])
                .filter(|name| !latent.iter().any(|l| l == *name)),
        );

        let mut model = Model {
            observed,
            latent,
            params: Vec::new(),
            relations,
        };
        model.params = model.build_parameters();
        Ok(model)
    }

    /// All variables, observed first.
    pub fn variables(&self) -> impl Iterator<Item = &String> {
        self.observed.iter().chain(self.latent.iter())
    }

    pub fn is_latent(&self, name: &str) -> bool {
        self.latent.iter().any(|l| l == name)
    }

    fn index_of(&self, name: &str) -> usize {
        self.variables()
            .position(|v| v == name)
            .expect("relation names are registered as variables")
    }

    /// Variables that appear as a regression outcome or as an indicator.
    pub fn endogenous(&self) -> BTreeSet<&str> {
        self.relations
            .iter()
            .filter_map(|r| match r.op {
                Operator::Regression => Some(r.lhs.as_str()),
                Operator::Measurement => Some(r.rhs.as_str()),
                Operator::Covariance => None,
            })
            .collect()
    }

    fn build_parameters(&self) -> Vec<Parameter> {
        let mut params = Vec::new();
        let mut first_indicator_seen: BTreeSet<&str> = BTreeSet::new();

        for rel in &self.relations {
            let (kind, row, col, fixed) = match rel.op {
                Operator::Measurement => {
                    let first = first_indicator_seen.insert(rel.lhs.as_str());
                    let fixed = rel.fixed.or(if first { Some(1.0) } else { None });
                    let row = self.index_of(&rel.rhs);
                    let col = self.index_of(&rel.lhs);
                    (ParamKind::Loading, row, col, fixed)
                }
                Operator::Regression => {
                    let row = self.index_of(&rel.lhs);
                    let col = self.index_of(&rel.rhs);
                    (ParamKind::Regression, row, col, rel.fixed)
                }
                Operator::Covariance => {
                    let a = self.index_of(&rel.lhs);
                    let b = self.index_of(&rel.rhs);
                    let kind = if a == b {
                        ParamKind::Variance
                    } else {
                        ParamKind::Covariance
                    };
                    (kind, a, b, rel.fixed)
                }
            };
            let (lval, rval) = match rel.op {
                Operator::Measurement => (rel.rhs.clone(), rel.lhs.clone()),
                _ => (rel.lhs.clone(), rel.rhs.clone()),
            };
            params.push(Parameter {
                lval,
                rval,
                kind,
                fixed,
                row,
                col,
            });
        }

        let has_cov = |params: &[Parameter], a: usize, b: usize| {
            params.iter().any(|p| {
                !p.kind.is_path() && ((p.row == a && p.col == b) || (p.row == b && p.col == a))
            })
        };

        // Every variable gets a variance (residual variance when endogenous).
        let names: Vec<String> = self.variables().cloned().collect();
        for (i, name) in names.iter().enumerate() {
            if !has_cov(&params, i, i) {
                params.push(Parameter {
                    lval: name.clone(),
                    rval: name.clone(),
                    kind: ParamKind::Variance,
                    fixed: None,
                    row: i,
                    col: i,
                });
            }
        }

        // Exogenous variables covary freely.
        let endogenous = self.endogenous();
        let exogenous: Vec<usize> = names
            .iter()
            .enumerate()
            .filter(|(_, n)| !endogenous.contains(n.as_str()))
            .map(|(i, _)| i)
            .collect();
        for (k, &a) in exogenous.iter().enumerate() {
            for &b in &exogenous[k + 1..] {
                if !has_cov(&params, a, b) {
                    params.push(Parameter {
                        lval: names[a].clone(),
                        rval: names[b].clone(),
                        kind: ParamKind::Covariance,
                        fixed: None,
                        row: a,
                        col: b,
                    });
                }
            }
        }

        // Paths first, then (co)variances; order within each group is stable.
        params.sort_by_key(|p| !p.kind.is_path());
        params
    }

    /// Number of free parameters.
    pub fn n_free(&self) -> usize {
        self.params.iter().filter(|p| p.is_free()).count()
    }

    /// Distinct elements of the observed covariance matrix.
    pub fn n_moments(&self) -> usize {
        let p = self.observed.len();
        p * (p + 1) / 2
    }

    /// Degrees of freedom of the model.
    pub fn dof(&self) -> i64 {
        self.n_moments() as i64 - self.n_free() as i64
    }

    /// Expand a free-parameter vector into a value for every parameter.
    fn expand(&self, theta: &DVector<f64>) -> Vec<f64> {
        let mut free = theta.iter();
        self.params
            .iter()
            .map(|p| match p.fixed {
                Some(v) => v,
                None => *free.next().expect("theta has one entry per free parameter"),
            })
            .collect()
    }

    /// Build `A` and `S` from a value for every parameter.
    fn ram_matrices(&self, values: &[f64]) -> (DMatrix<f64>, DMatrix<f64>) {
        let m = self.observed.len() + self.latent.len();
        let mut a = DMatrix::zeros(m, m);
        let mut s = DMatrix::zeros(m, m);
        for (p, &v) in self.params.iter().zip(values) {
            if p.kind.is_path() {
                a[(p.row, p.col)] = v;
            } else {
                s[(p.row, p.col)] = v;
                s[(p.col, p.row)] = v;
            }
        }
        (a, s)
    }

    /// Evaluate the RAM structure at `theta`.
    fn structure(&self, theta: &DVector<f64>) -> Option<Structure> {
        let values = self.expand(theta);
        let (a, s) = self.ram_matrices(&values);
        let m = a.nrows();
        let p = self.observed.len();
        let c = (DMatrix::identity(m, m) - a).try_inverse()?;
        let total = &c * s * c.transpose();
        let sigma = total.view((0, 0), (p, p)).into_owned();
        Some(Structure { c, total, sigma })
    }

    /// Model-implied covariance of the observed variables at `theta`.
    pub fn implied_covariance(&self, theta: &DVector<f64>) -> Option<DMatrix<f64>> {
        self.structure(theta).map(|st| st.sigma)
    }

    /// Free parameters in table order with their `∂Σ/∂θ` at `theta`.
    fn sigma_derivatives(&self, st: &Structure) -> Vec<DMatrix<f64>> {
        let p = self.observed.len();
        self.params
            .iter()
            .filter(|prm| prm.is_free())
            .map(|prm| {
                let u = st.c.view((0, prm.row), (p, 1));
                let v = if prm.kind.is_path() {
                    st.total.view((0, prm.col), (p, 1))
                } else {
                    st.c.view((0, prm.col), (p, 1))
                };
                let uv = u * v.transpose();
                if !prm.kind.is_path() && prm.row == prm.col {
                    uv
                } else {
                    &uv + uv.transpose()
                }
            })
            .collect()
    }

    /// Start values for the free parameters, derived from the sample covariance.
    pub fn start_values(&self, sample_cov: &DMatrix<f64>) -> DVector<f64> {
        let p = self.observed.len();
        let reference = |factor: usize| {
            self.params.iter().find(|prm| {
                prm.kind == ParamKind::Loading && prm.col == factor && prm.fixed.is_some()
            })
        };

        let values: Vec<f64> = self
            .params
            .iter()
            .filter(|prm| prm.is_free())
            .map(|prm| match prm.kind {
                ParamKind::Loading => reference(prm.col)
                    .filter(|r| r.row < p && prm.row < p)
                    .map(|r| {
                        let var = sample_cov[(r.row, r.row)];
                        if var > 0.0 {
                            sample_cov[(prm.row, r.row)] / var
                        } else {
                            1.0
                        }
                    })
                    .unwrap_or(1.0),
                ParamKind::Regression | ParamKind::Covariance => 0.0,
                ParamKind::Variance if prm.row < p => 0.5 * sample_cov[(prm.row, prm.row)],
                ParamKind::Variance => 0.05,
            })
            .collect();
        DVector::from_vec(values)
    }

    /// Fit the model to `dataset` by Wishart maximum likelihood.
    pub fn fit(self, dataset: &Dataset, options: &FitOptions) -> Result<FittedModel> {
        let x = dataset.observations(&self.observed)?;
        let sample_cov = covariance(&x)?;
        let n_obs = x.nrows();

        if self.dof() < 0 {
            return Err(SemError::NotIdentified {
                params: self.n_free(),
                moments: self.n_moments(),
            });
        }

        let objective = Objective::new(&self, &sample_cov)?;
        let start = self.start_values(&sample_cov);
        info!(
            "fitting {} free parameters to {} observations of {} variables",
            start.len(),
            n_obs,
            self.observed.len()
        );

        let Minimum {
            x,
            value,
            iterations,
            cost_evals,
            gradient_evals,
        } = optimizer::minimize(objective, start.as_slice().to_vec(), options)?;
        debug!(
            "objective {value:.8} after {iterations} iterations ({cost_evals} cost, {gradient_evals} gradient evaluations)"
        );
        let theta = DVector::from_vec(x);

        let implied = self
            .implied_covariance(&theta)
            .ok_or(SemError::NotPositiveDefinite("implied"))?;
        let estimates = self.expand(&theta);

        Ok(FittedModel {
            model: self,
            theta,
            estimates,
            sample_cov,
            implied,
            n_obs,
            objective: value,
            iterations,
        })
    }
}

fn unique_in_order<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// `(I − A)⁻¹`, `Σ` over all variables, and its observed block.
struct Structure {
    c: DMatrix<f64>,
    total: DMatrix<f64>,
    sigma: DMatrix<f64>,
}

// ---------------------------------------------------------------------------
// Objective – Wishart maximum likelihood
// ---------------------------------------------------------------------------

/// `F = ln|Σ| + tr(S Σ⁻¹) − ln|S| − p` with its analytic gradient.
struct Objective<'a> {
    model: &'a Model,
    sample_cov: &'a DMatrix<f64>,
    log_det_s: f64,
}

impl<'a> Objective<'a> {
    fn new(model: &'a Model, sample_cov: &'a DMatrix<f64>) -> Result<Self> {
        let chol = Cholesky::new(sample_cov.clone()).ok_or(SemError::NotPositiveDefinite("sample"))?;
        Ok(Self {
            model,
            sample_cov,
            log_det_s: log_det(&chol),
        })
    }

    /// Structure at `theta` and `Σ⁻¹`, or `None` when `Σ(θ)` is not positive definite.
    fn factor(&self, theta: &[f64]) -> Option<(Structure, Cholesky<f64, Dyn>)> {
        let st = self.model.structure(&DVector::from_column_slice(theta))?;
        let chol = Cholesky::new(st.sigma.clone())?;
        Some((st, chol))
    }

    fn value_at(&self, theta: &[f64]) -> Option<f64> {
        let (st, chol) = self.factor(theta)?;
        let p = st.sigma.nrows();
        let value = log_det(&chol) + (self.sample_cov * chol.inverse()).trace()
            - self.log_det_s
            - p as f64;
        value.is_finite().then_some(value)
    }

    fn gradient_at(&self, theta: &[f64]) -> Option<Vec<f64>> {
        let (st, chol) = self.factor(theta)?;
        let sigma_inv = chol.inverse();
        let w = &sigma_inv * (&st.sigma - self.sample_cov) * &sigma_inv;
        Some(
            self.model
                .sigma_derivatives(&st)
                .iter()
                .map(|d| w.component_mul(d).sum())
                .collect(),
        )
    }
}

fn check_finite(theta: &[f64]) -> std::result::Result<(), ArgminError> {
    if theta.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ArgminError::msg("non-finite parameter vector"))
    }
}

impl CostFunction for Objective<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> std::result::Result<f64, ArgminError> {
        check_finite(theta)?;
        Ok(self.value_at(theta).unwrap_or(INFEASIBLE))
    }
}

impl Gradient for Objective<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Zero outside the feasible region, where the cost is flat at [`INFEASIBLE`].
    fn gradient(&self, theta: &Self::Param) -> std::result::Result<Vec<f64>, ArgminError> {
        check_finite(theta)?;
        Ok(self.gradient_at(theta).unwrap_or_else(|| vec![0.0; theta.len()]))
    }
}

fn log_det(chol: &Cholesky<f64, Dyn>) -> f64 {
    chol.l_dirty()
        .diagonal()
        .iter()
        .map(|d| 2.0 * d.ln())
        .sum()
}

// ---------------------------------------------------------------------------
// FittedModel – estimates plus everything needed for inference
// ---------------------------------------------------------------------------

/// Result of [`Model::fit`].
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub model: Model,
    /// Free-parameter estimates, in table order.
    pub theta: DVector<f64>,
    /// Value of every parameter in `model.params` (fixed ones included).
    pub estimates: Vec<f64>,
    /// Sample covariance (denominator `n`).
    pub sample_cov: DMatrix<f64>,
    /// Implied covariance at the estimates.
    pub implied: DMatrix<f64>,
    pub n_obs: usize,
    /// Minimised `F_ML`.
    pub objective: f64,
    pub iterations: usize,
}

impl FittedModel {
    /// Estimate of the parameter `lval op rval`, if the table holds one.
    pub fn estimate(&self, lval: &str, op: &str, rval: &str) -> Option<f64> {
        self.model
            .params
            .iter()
            .zip(&self.estimates)
            .find(|(p, _)| {
                p.kind.op() == op
                    && ((p.lval == lval && p.rval == rval)
                        || (op == "~~" && p.lval == rval && p.rval == lval))
            })
            .map(|(_, &v)| v)
    }

    /// `∂Σ/∂θ` for every free parameter at the estimates.
    pub(crate) fn sigma_derivatives(&self) -> Vec<DMatrix<f64>> {
        match self.model.structure(&self.theta) {
            Some(st) => self.model.sigma_derivatives(&st),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_FACTOR: &str = "F =~ a + b + c";

    #[test]
    fn variables_are_split_into_observed_and_latent() {
        let m = Model::new("F1 =~ a + b\nF2 =~ c + d\nF2 ~ F1 + x").unwrap();
        assert_eq!(m.observed, vec!["a", "b", "c", "d", "x"]);
        assert_eq!(m.latent, vec!["F1", "F2"]);
        assert!(m.is_latent("F2"));
        assert!(!m.is_latent("x"));
    }

    #[test]
    fn first_loading_is_fixed_to_one() {
        let m = Model::new(ONE_FACTOR).unwrap();
        let loadings: Vec<&Parameter> = m
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::Loading)
            .collect();
        assert_eq!(loadings.len(), 3);
        assert_eq!(loadings[0].fixed, Some(1.0));
        assert_eq!(loadings[0].lval, "a");
        assert_eq!(loadings[0].rval, "F");
        assert!(loadings[1].is_free());
    }

    #[test]
    fn one_factor_model_counts() {
        let m = Model::new(ONE_FACTOR).unwrap();
        // 2 loadings + 3 error variances + 1 factor variance
        assert_eq!(m.n_free(), 6);
        assert_eq!(m.n_moments(), 6);
        assert_eq!(m.dof(), 0);
    }

    #[test]
    fn exogenous_factors_covary() {
        let m = Model::new("F1 =~ a + b\nF2 =~ c + d").unwrap();
        let covs: Vec<&Parameter> = m
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::Covariance)
            .collect();
        assert_eq!(covs.len(), 1);
        assert_eq!((covs[0].lval.as_str(), covs[0].rval.as_str()), ("F1", "F2"));

        // A regression makes F2 endogenous, so the covariance disappears.
        let m = Model::new("F1 =~ a + b\nF2 =~ c + d\nF2 ~ F1").unwrap();
        assert!(m.params.iter().all(|p| p.kind != ParamKind::Covariance));
    }

    #[test]
    fn explicit_variance_is_not_duplicated() {
        let m = Model::new("F =~ a + b + c\na ~~ 0.3*a").unwrap();
        let vars: Vec<&Parameter> = m
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::Variance && p.lval == "a")
            .collect();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].fixed, Some(0.3));
    }

    #[test]
    fn paths_come_before_covariances() {
        let m = Model::new("a ~~ b\nF =~ a + b + c").unwrap();
        let first_cov = m.params.iter().position(|p| !p.kind.is_path()).unwrap();
        assert!(m.params[..first_cov].iter().all(|p| p.kind.is_path()));
        assert!(m.params[first_cov..].iter().all(|p| !p.kind.is_path()));
    }

    #[test]
    fn implied_covariance_of_one_factor_model() {
        let m = Model::new(ONE_FACTOR).unwrap();
        // free order: λb, λc, var a, var b, var c, var F
        let theta = DVector::from_vec(vec![2.0, 3.0, 0.1, 0.2, 0.3, 0.5]);
        let sigma = m.implied_covariance(&theta).unwrap();
        let expect = |i: usize, j: usize| {
            let lam = [1.0, 2.0, 3.0];
            let err = [0.1, 0.2, 0.3];
            0.5 * lam[i] * lam[j] + if i == j { err[i] } else { 0.0 }
        };
        for i in 0..3 {
            for j in 0..3 {
                assert!((sigma[(i, j)] - expect(i, j)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn regression_propagates_through_structure() {
        let m = Model::new("y ~ x").unwrap();
        assert_eq!(m.observed, vec!["y", "x"]);
        // free order: β, var y, var x
        let theta = DVector::from_vec(vec![2.0, 1.0, 3.0]);
        let sigma = m.implied_covariance(&theta).unwrap();
        assert!((sigma[(1, 1)] - 3.0).abs() < 1e-12);
        assert!((sigma[(0, 1)] - 6.0).abs() < 1e-12);
        assert!((sigma[(0, 0)] - (4.0 * 3.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let m = Model::new("F1 =~ a + b + c\nF2 =~ d + e\nF2 ~ F1").unwrap();
        let s = DMatrix::from_fn(5, 5, |i, j| if i == j { 2.0 } else { 0.6 + 0.05 * (i + j) as f64 });
        let obj = Objective::new(&m, &s).unwrap();
        let theta: Vec<f64> = m.start_values(&s).add_scalar(0.1).iter().copied().collect();
        let grad = obj.gradient_at(&theta).unwrap();

        let h = 1e-6;
        for k in 0..theta.len() {
            let mut up = theta.clone();
            let mut down = theta.clone();
            up[k] += h;
            down[k] -= h;
            let numeric = (obj.value_at(&up).unwrap() - obj.value_at(&down).unwrap()) / (2.0 * h);
            assert!(
                (numeric - grad[k]).abs() < 1e-5,
                "param {k}: analytic {} numeric {numeric}",
                grad[k]
            );
        }
    }

    #[test]
    fn objective_is_zero_at_the_sample_covariance() {
        let m = Model::new("y ~ x").unwrap();
        let s = DMatrix::from_row_slice(2, 2, &[13.0, 6.0, 6.0, 3.0]);
        let obj = Objective::new(&m, &s).unwrap();
        let theta = [2.0, 1.0, 3.0];
        assert!(obj.value_at(&theta).unwrap().abs() < 1e-12);
        assert!(obj.gradient_at(&theta).unwrap().iter().all(|g| g.abs() < 1e-12));
    }

    #[test]
    fn infeasible_points_cost_the_sentinel() {
        let m = Model::new("y ~ x").unwrap();
        let s = DMatrix::from_row_slice(2, 2, &[13.0, 6.0, 6.0, 3.0]);
        let obj = Objective::new(&m, &s).unwrap();
        // negative variance of x makes Σ indefinite
        let theta = vec![2.0, 1.0, -3.0];
        assert_eq!(obj.cost(&theta).unwrap(), INFEASIBLE);
        assert_eq!(obj.gradient(&theta).unwrap(), vec![0.0; 3]);
        assert!(obj.cost(&vec![f64::NAN, 1.0, 3.0]).is_err());
    }

    #[test]
    fn unidentified_model_is_rejected_before_fitting() {
        let m = Model::new("F =~ a + b").unwrap();
        // 1 loading + 2 error variances + 1 factor variance > 3 moments
        assert_eq!(m.dof(), -1);
        let ds = Dataset::from_columns(vec![
            ("a".into(), vec![1.0, 2.0, 3.0, 4.0]),
            ("b".into(), vec![2.0, 1.0, 4.0, 3.0]),
        ]);
        let err = m.fit(&ds, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, SemError::NotIdentified { params: 4, moments: 3 }));
    }
}
