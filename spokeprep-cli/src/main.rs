//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::error::Error;

use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    if let Err(err) = spokeprep_cli::run() {
        if let spokeprep_cli::CliError::ArgumentParsing(clap_error) = &err {
            clap_error.exit();
        }
        eprintln!("spokeprep: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

/// Log to stderr at `info` unless `RUST_LOG` says otherwise.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
