use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use semfit::data::sample::{simulate, write_csv};

/// Write a CSV drawn from the analysed model with known parameters.
#[derive(Parser, Debug)]
#[command(name = "generate_sample", version, about)]
struct Args {
    /// Output CSV path
    #[arg(default_value = "data.csv")]
    path: PathBuf,

    /// Number of rows to simulate
    #[arg(default_value_t = 500)]
    rows: usize,

    /// Random seed
    #[arg(default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let dataset = simulate(args.rows, args.seed);
    write_csv(&dataset, &args.path)?;

    println!(
        "Wrote {} rows ({} columns) to {}",
        dataset.len(),
        dataset.column_names.len(),
        args.path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_arguments_have_defaults() {
        let args = Args::try_parse_from(["generate_sample"]).unwrap();
        assert_eq!(args.path, PathBuf::from("data.csv"));
        assert_eq!(args.rows, 500);
        assert_eq!(args.seed, 42);
    }

    #[test]
    fn positional_arguments_are_parsed_in_order() {
        let args = Args::try_parse_from(["generate_sample", "out.csv", "120", "7"]).unwrap();
        assert_eq!(args.path, PathBuf::from("out.csv"));
        assert_eq!(args.rows, 120);
        assert_eq!(args.seed, 7);
    }

    #[test]
    fn invalid_row_count_is_rejected() {
        assert!(Args::try_parse_from(["generate_sample", "out.csv", "many"]).is_err());
    }
}
