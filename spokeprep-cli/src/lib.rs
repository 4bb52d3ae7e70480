//! Command-line interface for preparing city analysis inputs.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod prepare;

pub use error::CliError;
use prepare::{PrepareArgs, run_prepare};

const ARG_COUNTRY: &str = "country";
const ARG_CITY: &str = "city";
const ARG_OUTPUT_DIR: &str = "output-dir";
const ARG_SPEED_LIMIT: &str = "speed-limit";
const ARG_BLOCK_SIZE: &str = "block-size";
const ARG_BLOCK_POPULATION: &str = "block-population";
const ARG_RETRIES: &str = "retries";
const ARG_NOMINATIM_URL: &str = "nominatim-url";
const ARG_GEOFABRIK_URL: &str = "geofabrik-url";
const ENV_COUNTRY: &str = "SPOKEPREP_CMDS_PREPARE_COUNTRY";
const ENV_CITY: &str = "SPOKEPREP_CMDS_PREPARE_CITY";

/// Run the spokeprep CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns a [`CliError`] when arguments or configuration are invalid, or
/// when the preparation pipeline fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Prepare(args) => run_prepare(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "spokeprep",
    about = "Prepare the input files for a bicycle network analysis",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch and derive every artefact for one city.
    Prepare(PrepareArgs),
}

#[cfg(test)]
mod tests;
