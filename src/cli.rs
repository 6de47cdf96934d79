use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Parser, ValueHint};

use crate::analysis;

#[derive(Parser, Debug, Clone)]
#[command(name = "semfit", version, about = "Fit a structural equation model to a dataset", long_about = None)]
pub struct Args {
    /// Dataset to analyse (.csv, .json or .parquet)
    #[arg(long = "data_path", value_name = "PATH", default_value = "data.csv", value_hint = ValueHint::FilePath)]
    pub data_path: PathBuf,

    /// Where to save the path diagram (.png, .svg or .dot); empty to skip
    #[arg(long = "diagram_path", value_name = "PATH", default_value = "sem_diagram3.png", value_hint = ValueHint::FilePath)]
    pub diagram_path: String,

    /// Verbose logging (-v info, -vv debug)
    #[arg(long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Diagram destination, or `None` when the flag was given as empty.
    pub fn diagram(&self) -> Option<&Path> {
        if self.diagram_path.is_empty() {
            None
        } else {
            Some(Path::new(&self.diagram_path))
        }
    }

    /// Default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Runs the analysis described by `args`, printing to stdout.
///
/// # Errors
/// Returns an error if loading, fitting or rendering fails.
pub fn run(args: &Args) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    analysis::run_sem(&args.data_path, args.diagram(), &mut out)
}
