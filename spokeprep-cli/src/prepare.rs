//! Prepare command implementation for the spokeprep CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use spokeprep_core::{
    ArtifactManifest, Collaborators, DEFAULT_BLOCK_POPULATION, DEFAULT_BLOCK_SIZE,
    DEFAULT_RETRIES, DEFAULT_SPEED_LIMIT, Place, PreparationRequest, prepare,
};
use spokeprep_data::{
    DEFAULT_GEOFABRIK_URL, DEFAULT_NOMINATIM_URL, DataCollaborators, DataConfig,
};

use crate::{
    ARG_BLOCK_POPULATION, ARG_BLOCK_SIZE, ARG_CITY, ARG_COUNTRY, ARG_GEOFABRIK_URL,
    ARG_NOMINATIM_URL, ARG_OUTPUT_DIR, ARG_RETRIES, ARG_SPEED_LIMIT, CliError, ENV_CITY,
    ENV_COUNTRY,
};

/// Directory receiving the artefacts when none is configured.
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "./data";

/// CLI arguments for the `prepare` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Prepare every file a bicycle network analysis needs for one \
                 city: the boundary shapefile, the clipped OSM network, and \
                 either US census and employment data or a synthetic \
                 population. Values can come from CLI arguments, \
                 configuration files, or environment variables.",
    about = "Prepare the input files for a city"
)]
#[ortho_config(prefix = "SPOKEPREP")]
pub(crate) struct PrepareArgs {
    /// Country containing the city.
    #[arg(value_name = ARG_COUNTRY)]
    #[serde(default)]
    pub(crate) country: Option<String>,
    /// City to prepare.
    #[arg(value_name = ARG_CITY)]
    #[serde(default)]
    pub(crate) city: Option<String>,
    /// State or region containing the city.
    #[arg(value_name = "state")]
    #[serde(default)]
    pub(crate) state: Option<String>,
    /// Directory receiving every artefact (default "./data").
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// Speed limit in km/h applied outside the US (default 50).
    #[arg(long = ARG_SPEED_LIMIT, value_name = "km/h")]
    #[serde(default)]
    pub(crate) speed_limit: Option<u32>,
    /// Edge length in metres of a synthetic census block (default 500).
    #[arg(long = ARG_BLOCK_SIZE, value_name = "metres")]
    #[serde(default)]
    pub(crate) block_size: Option<u32>,
    /// People living in each synthetic census block (default 100).
    #[arg(long = ARG_BLOCK_POPULATION, value_name = "people")]
    #[serde(default)]
    pub(crate) block_population: Option<u32>,
    /// Attempts allowed for each network call (default 2).
    #[arg(long = ARG_RETRIES, value_name = "count")]
    #[serde(default)]
    pub(crate) retries: Option<u32>,
    /// Nominatim instance used to find the city boundary.
    #[arg(long = ARG_NOMINATIM_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) nominatim_url: Option<String>,
    /// Geofabrik server providing region extracts.
    #[arg(long = ARG_GEOFABRIK_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) geofabrik_url: Option<String>,
}

impl PrepareArgs {
    pub(crate) fn into_config(self) -> Result<PrepareConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        PrepareConfig::try_from(merged)
    }
}

/// Resolved `prepare` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PrepareConfig {
    /// The validated pipeline request.
    pub(crate) request: PreparationRequest,
    /// Endpoints and tools for the concrete collaborators.
    pub(crate) data: DataConfig,
}

impl PrepareConfig {
    pub(crate) fn validate_output_dir(&self) -> Result<(), CliError> {
        let path = self.request.output_dir();
        match spokeprep_fs::file_is_file(path) {
            Ok(false) => Ok(()),
            Ok(true) => Err(CliError::OutputDirectoryNotDirectory {
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CliError::InspectOutputDirectory {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<PrepareArgs> for PrepareConfig {
    type Error = CliError;

    fn try_from(args: PrepareArgs) -> Result<Self, Self::Error> {
        let country = args.country.ok_or(CliError::MissingArgument {
            field: ARG_COUNTRY,
            env: ENV_COUNTRY,
        })?;
        let city = args.city.ok_or(CliError::MissingArgument {
            field: ARG_CITY,
            env: ENV_CITY,
        })?;
        let place = Place::new(country, args.state, city)?;
        let output_dir = args
            .output_dir
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));
        let request = PreparationRequest::new(place, output_dir)
            .with_speed_limit(args.speed_limit.unwrap_or(DEFAULT_SPEED_LIMIT))?
            .with_block_size(args.block_size.unwrap_or(DEFAULT_BLOCK_SIZE))?
            .with_block_population(args.block_population.unwrap_or(DEFAULT_BLOCK_POPULATION))?
            .with_retries(args.retries.unwrap_or(DEFAULT_RETRIES))?;

        let data = DataConfig {
            nominatim_url: args
                .nominatim_url
                .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_owned()),
            geofabrik_url: args
                .geofabrik_url
                .unwrap_or_else(|| DEFAULT_GEOFABRIK_URL.to_owned()),
            ..DataConfig::default()
        };
        Ok(Self { request, data })
    }
}

pub(super) fn run_prepare(args: PrepareArgs) -> Result<(), CliError> {
    let config = resolve_prepare_config(args)?;
    let owned = DataCollaborators::new(&config.data)?;
    let manifest = execute_prepare(&config.request, owned.collaborators())?;
    let mut stdout = std::io::stdout().lock();
    write_manifest(&mut stdout, &manifest)
}

pub(super) fn resolve_prepare_config(args: PrepareArgs) -> Result<PrepareConfig, CliError> {
    let config = args.into_config()?;
    config.validate_output_dir()?;
    Ok(config)
}

/// Drive the pipeline to completion on a single-threaded runtime.
pub(super) fn execute_prepare(
    request: &PreparationRequest,
    collaborators: Collaborators<'_>,
) -> Result<ArtifactManifest, CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let manifest = runtime.block_on(prepare(request, &collaborators))?;
    info!("prepared {} in {}", request.place(), manifest.output_dir());
    Ok(manifest)
}

fn write_path(writer: &mut dyn Write, label: &str, path: &Utf8Path) -> std::io::Result<()> {
    writeln!(writer, "{label:<13}{path}")
}

/// Print the manifest as aligned `label value` lines.
pub(super) fn write_manifest(
    writer: &mut dyn Write,
    manifest: &ArtifactManifest,
) -> Result<(), CliError> {
    writeln!(writer, "{:<13}{}", "state", manifest.state_abbreviation())
        .and_then(|()| writeln!(writer, "{:<13}{}", "state fips", manifest.state_fips()))
        .and_then(|()| write_path(writer, "boundary", manifest.boundary_shape()))
        .and_then(|()| write_path(writer, "city network", manifest.city_network()))
        .and_then(|()| write_path(writer, "output dir", manifest.output_dir()))
        .map_err(CliError::WriteManifest)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<PrepareConfig, CliError> {
    let merged = PrepareArgs::merge_from_layers(layers).map_err(CliError::from)?;
    PrepareConfig::try_from(merged)
}
