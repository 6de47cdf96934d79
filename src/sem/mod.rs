/// Structural equation modeling: description parsing, ML fitting and
/// inference.
///
/// ```text
///  description text
///        │  syntax::parse
///        ▼
///   ┌──────────┐
///   │  Model    │  parameter table, RAM matrices A / S
///   └──────────┘
///        │  Model::fit (optimizer: BFGS on F_ML)
///        ▼
///   ┌─────────────┐
///   │ FittedModel  │──► inspect()    estimates, SE, z, p
///   └─────────────┘──► calc_stats() chi2, CFI, RMSEA, ...
/// ```

pub mod dist;
pub mod error;
pub mod inspect;
pub mod model;
pub mod optimizer;
pub mod stats;
pub mod syntax;

pub use error::SemError;
pub use inspect::{ParameterEstimate, inspect};
pub use model::{FitOptions, FittedModel, Model, ParamKind};
pub use stats::{FitStatistics, calc_stats};
