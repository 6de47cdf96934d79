//! Structural equation model fitting: load a dataset, fit a fixed
//! three-factor model by maximum likelihood, report estimates and fit
//! statistics, and draw the path diagram.

pub mod analysis;
pub mod cli;
pub mod color;
pub mod data;
pub mod diagram;
pub mod formatters;
pub mod sem;
