use clap::Parser;

use semfit::cli::{self, Args};

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    if let Err(err) = cli::run(&args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
