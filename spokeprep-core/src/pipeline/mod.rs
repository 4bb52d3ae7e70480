//! The preparation pipeline.
//!
//! [`prepare`] drives the collaborators in a fixed order: boundary lookup,
//! region acquisition, network reduction, jurisdiction classification, and
//! then exactly one of the US or synthetic branches. Every network-backed
//! call runs under the request's [`RetryPolicy`]; local tool invocations run
//! once. The first unrecoverable error aborts the run.

mod error;
#[cfg(test)]
mod tests;

use std::future::Future;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;

use crate::{
    AcquisitionError, ArtifactManifest, BoundaryReader, BoundaryService, CityArtifacts,
    Jurisdiction, LodesPart, NetworkReducer, Place, PopulationGrid, PreparationRequest,
    RegionScope, RegionSource, RetryPolicy, Slug, StateInfo, SyntheticArtifacts, UsDataSource,
    resolve_jurisdiction,
};

pub use error::{PrepareError, SyntheticStep, UsDataset};

/// Reference year of the LODES employment tables.
pub const LODES_YEAR: u16 = 2019;

/// The collaborators one run drives.
///
/// Borrowed trait objects keep the pipeline independent of how each
/// collaborator is built; tests substitute recording stubs.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Resolves and persists the city boundary.
    pub boundaries: &'a dyn BoundaryService,
    /// Downloads raw region extracts.
    pub regions: &'a dyn RegionSource,
    /// Clips a region extract to the city.
    pub reducer: &'a dyn NetworkReducer,
    /// Opens sessions for the US datasets.
    pub us_data: &'a dyn UsDataSource,
    /// Reads the boundary shape back for the synthetic branch.
    pub boundary_reader: &'a dyn BoundaryReader,
    /// Persists synthetic stand-ins for the US datasets.
    pub synthetic: &'a dyn SyntheticArtifacts,
}

/// Prepare every artefact for `request` and return the manifest.
///
/// The manifest is only returned once its boundary shape and city network
/// exist and are non-empty.
///
/// # Errors
///
/// Returns a [`PrepareError`] naming the stage that failed. Retried stages
/// carry the error of their final attempt unchanged.
pub async fn prepare(
    request: &PreparationRequest,
    collaborators: &Collaborators<'_>,
) -> Result<ArtifactManifest, PrepareError> {
    let place = request.place();
    let output_dir = request.output_dir();
    let retry = request.retry_policy();
    Slug::for_place(place).map_err(PrepareError::InvalidRequest)?;
    spokeprep_fs::ensure_dir(output_dir).map_err(|source| PrepareError::CreateOutputDir {
        path: output_dir.to_owned(),
        source,
    })?;

    info!("retrieving boundaries for {place}");
    let boundaries = collaborators.boundaries;
    let slug = retry
        .run("boundary lookup", move || {
            boundaries.retrieve_city_boundaries(output_dir, place)
        })
        .await
        .map_err(PrepareError::Boundary)?;
    let artifacts = CityArtifacts::new(output_dir.to_owned(), slug);

    let region_file = acquire_region(collaborators.regions, place, output_dir, retry).await?;

    info!("reducing {region_file} to {}", artifacts.city_network());
    collaborators
        .reducer
        .prepare_city_file(
            output_dir,
            &region_file,
            artifacts.polygon(),
            artifacts.city_network(),
        )
        .await
        .map_err(PrepareError::Reduction)?;

    let jurisdiction = resolve_jurisdiction(place.state(), place.country());
    match jurisdiction {
        Jurisdiction::Classified(state) => {
            info!("{place} is in {}; downloading US datasets", state.name());
            acquire_us_data(collaborators.us_data, state, output_dir, retry).await?;
        }
        Jurisdiction::Unclassified => {
            info!("{place} is outside the US; generating synthetic datasets");
            synthesize(collaborators, request, &artifacts, &jurisdiction).await?;
        }
    }

    let manifest = ArtifactManifest::new(jurisdiction, artifacts, output_dir.to_owned());
    verify(&manifest)?;
    info!(
        "prepared {} ({} / {})",
        manifest.city_network(),
        manifest.state_abbreviation(),
        manifest.state_fips()
    );
    Ok(manifest)
}

/// Download the smallest available region: the state when one was given and
/// has an extract, otherwise the country.
///
/// Only a "not found" outcome on the state, after its retries, widens the
/// scope; any other failure aborts.
async fn acquire_region(
    regions: &dyn RegionSource,
    place: &Place,
    output_dir: &Utf8Path,
    retry: RetryPolicy,
) -> Result<Utf8PathBuf, PrepareError> {
    if let Some(state) = place.state() {
        let scope = RegionScope::State {
            state,
            country: place.country(),
        };
        match fetch_region(regions, scope, output_dir, retry).await {
            Ok(path) => return Ok(path),
            Err(err) if err.is_missing_value() => {
                info!("{err}; falling back to {}", place.country());
            }
            Err(source) => {
                return Err(PrepareError::Region {
                    scope: state.to_owned(),
                    source,
                });
            }
        }
    }
    let country = place.country();
    fetch_region(regions, RegionScope::Country(country), output_dir, retry)
        .await
        .map_err(|source| PrepareError::Region {
            scope: country.to_owned(),
            source,
        })
}

async fn fetch_region(
    regions: &dyn RegionSource,
    scope: RegionScope<'_>,
    output_dir: &Utf8Path,
    retry: RetryPolicy,
) -> Result<Utf8PathBuf, AcquisitionError> {
    info!("retrieving region file for {scope}");
    retry
        .run("region download", move || {
            regions.retrieve_region_file(scope, output_dir)
        })
        .await
}

/// Run the US downloads one after another on a single session.
///
/// The session is dropped, and so released, on every return path.
async fn acquire_us_data(
    source: &dyn UsDataSource,
    state: StateInfo,
    output_dir: &Utf8Path,
    retry: RetryPolicy,
) -> Result<(), PrepareError> {
    let session = source
        .open_session()
        .await
        .map_err(PrepareError::UsSession)?;
    let session = session.as_ref();
    let abbreviation = state.abbreviation();

    for part in LodesPart::ALL {
        download(retry, UsDataset::Employment(part), move || {
            session.download_lodes_data(output_dir, abbreviation, part, LODES_YEAR)
        })
        .await?;
    }
    download(retry, UsDataset::WaterBlocks, move || {
        session.download_census_waterblocks(output_dir)
    })
    .await?;
    download(retry, UsDataset::CensusBlocks, move || {
        session.download_2010_census_blocks(output_dir, state.fips())
    })
    .await?;
    download(retry, UsDataset::StateSpeedLimits, move || {
        session.download_state_speed_limits(output_dir)
    })
    .await?;
    download(retry, UsDataset::CitySpeedLimits, move || {
        session.download_city_speed_limits(output_dir)
    })
    .await?;
    Ok(())
}

async fn download<F, Fut>(
    retry: RetryPolicy,
    dataset: UsDataset,
    operation: F,
) -> Result<(), PrepareError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), AcquisitionError>>,
{
    info!("downloading {dataset}");
    retry
        .run(&dataset.to_string(), operation)
        .await
        .map_err(|source| PrepareError::UsData { dataset, source })
}

async fn synthesize(
    collaborators: &Collaborators<'_>,
    request: &PreparationRequest,
    artifacts: &CityArtifacts,
    jurisdiction: &Jurisdiction,
) -> Result<(), PrepareError> {
    let output_dir = request.output_dir();
    let boundary = collaborators
        .boundary_reader
        .read_boundary(artifacts.boundary_shape())
        .await
        .map_err(PrepareError::ReadBoundary)?;
    let grid = PopulationGrid::cover(&boundary, request.block_size(), request.block_population())
        .map_err(PrepareError::PopulationGrid)?;
    info!(
        "laid {} synthetic blocks of {} m holding {} people",
        grid.len(),
        grid.cell_size(),
        grid.total_population()
    );

    collaborators
        .synthetic
        .simulate_census_blocks(output_dir, &grid)
        .await
        .map_err(|source| PrepareError::Synthetic {
            step: SyntheticStep::CensusBlocks,
            source,
        })?;
    collaborators
        .synthetic
        .change_speed_limit(
            output_dir,
            request.place().city(),
            jurisdiction,
            request.speed_limit(),
        )
        .await
        .map_err(|source| PrepareError::Synthetic {
            step: SyntheticStep::SpeedLimit,
            source,
        })
}

fn verify(manifest: &ArtifactManifest) -> Result<(), PrepareError> {
    match manifest.first_missing() {
        Ok(None) => Ok(()),
        Ok(Some(path)) => Err(PrepareError::MissingArtifact {
            path: path.to_owned(),
        }),
        Err(source) => Err(PrepareError::InspectArtifact {
            path: manifest.output_dir().to_owned(),
            source,
        }),
    }
}
