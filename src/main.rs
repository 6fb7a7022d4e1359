// src/main.rs
//
// audioprint CLI - fingerprint reference tracks and identify clips.
//
// Thin wrapper around the audioprint library; all pipeline logic lives
// in the library modules. Exit codes: 0 success, 1 usage or input
// error, 2 processing error.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use audioprint::cli::{self, Args};
use audioprint::Error;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version are not failures.
            if e.use_stderr() {
                eprint!("{e}");
                return ExitCode::from(1);
            }
            print!("{e}");
            return ExitCode::SUCCESS;
        }
    };

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let input_error = err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<Error>())
                .any(|e| e.is_input_error());
            if input_error {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}
