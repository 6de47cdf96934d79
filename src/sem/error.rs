use thiserror::Error;

/// Errors raised while building, fitting or rendering a model.
#[derive(Debug, Error)]
pub enum SemError {
    #[error("model description, line {line}: {message}: '{text}'")]
    Syntax {
        line: usize,
        message: String,
        text: String,
    },

    #[error("dataset has no column named '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has {count} missing or non-numeric values")]
    MissingValues { column: String, count: usize },

    #[error("need at least 2 observations to estimate a covariance matrix, got {0}")]
    TooFewObservations(usize),

    #[error("model is not identified: {params} free parameters but only {moments} sample moments")]
    NotIdentified { params: usize, moments: usize },

    #[error("{0} covariance matrix is not positive definite")]
    NotPositiveDefinite(&'static str),

    #[error("optimizer did not converge after {iterations} iterations (objective {objective:.6}, gradient norm {gradient:.3e})")]
    NotConverged {
        iterations: usize,
        objective: f64,
        gradient: f64,
    },

    #[error("optimizer failed: {0}")]
    Optimizer(String),

    #[error("unsupported diagram format '.{0}' (expected png, svg or dot)")]
    UnsupportedDiagram(String),
}

pub type Result<T> = std::result::Result<T, SemError>;
