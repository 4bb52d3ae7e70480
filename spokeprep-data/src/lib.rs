//! Network and tool-backed collaborators for city preparation.
//!
//! Responsibilities:
//! - Resolve city boundaries through Nominatim.
//! - Download region extracts from Geofabrik and US datasets from the Census
//!   Bureau and PeopleForBikes mirrors.
//! - Drive `ogr2ogr` and `osmium` for format conversion and clipping.
//! - Persist the synthetic stand-ins used outside the US.
//!
//! Boundaries:
//! - Do not sequence steps or retry (lives in `spokeprep-core`).
//! - Report network failures as `AcquisitionError` and local failures as
//!   `ToolError` so the pipeline can tell them apart.

mod boundary;
mod geojson;
mod http;
mod reader;
mod reducer;
mod region;
mod synthetic;
mod tool;
mod us;

use spokeprep_core::Collaborators;
use thiserror::Error;

pub use boundary::{DEFAULT_NOMINATIM_URL, NominatimBoundaryService};
pub use http::DEFAULT_USER_AGENT;
pub use reader::OgrBoundaryReader;
pub use reducer::OsmiumReducer;
pub use region::{DEFAULT_GEOFABRIK_URL, GeofabrikRegionSource};
pub use synthetic::{CITY_SPEED_HEADER, LODES_HEADER, SyntheticArtifactWriter, city_speed_row};
pub use tool::Tools;
pub use us::{
    CensusDataSource, DEFAULT_LODES_URL, DEFAULT_PFB_URL, DEFAULT_TIGER_URL, HttpUsSession,
    UsEndpoints, lodes_file_name,
};

/// Errors raised while constructing collaborators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The HTTP client could not be configured.
    #[error("failed to build HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

/// Endpoints, user agent, and tool programs for the concrete collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    /// Nominatim instance used for boundary searches.
    pub nominatim_url: String,
    /// Geofabrik download server.
    pub geofabrik_url: String,
    /// Hosts of the US datasets.
    pub us: UsEndpoints,
    /// User agent sent with every request.
    pub user_agent: String,
    /// External programs.
    pub tools: Tools,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            nominatim_url: DEFAULT_NOMINATIM_URL.to_owned(),
            geofabrik_url: DEFAULT_GEOFABRIK_URL.to_owned(),
            us: UsEndpoints::default(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            tools: Tools::default(),
        }
    }
}

/// Owns one of each concrete collaborator.
///
/// # Examples
///
/// ```no_run
/// use spokeprep_data::{DataCollaborators, DataConfig};
///
/// # fn main() -> Result<(), spokeprep_data::BuildError> {
/// let owned = DataCollaborators::new(&DataConfig::default())?;
/// let collaborators = owned.collaborators();
/// # let _ = collaborators;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DataCollaborators {
    boundaries: NominatimBoundaryService,
    regions: GeofabrikRegionSource,
    reducer: OsmiumReducer,
    us_data: CensusDataSource,
    boundary_reader: OgrBoundaryReader,
    synthetic: SyntheticArtifactWriter,
}

impl DataCollaborators {
    /// Build every collaborator from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::HttpClient`] when an HTTP client cannot be built.
    pub fn new(config: &DataConfig) -> Result<Self, BuildError> {
        Ok(Self {
            boundaries: NominatimBoundaryService::new(
                config.nominatim_url.as_str(),
                &config.user_agent,
                config.tools.clone(),
            )?,
            regions: GeofabrikRegionSource::new(config.geofabrik_url.as_str(), &config.user_agent)?,
            reducer: OsmiumReducer::new(config.tools.clone()),
            us_data: CensusDataSource::new(config.us.clone(), config.user_agent.as_str()),
            boundary_reader: OgrBoundaryReader::new(config.tools.clone()),
            synthetic: SyntheticArtifactWriter::new(config.tools.clone()),
        })
    }

    /// Borrow the collaborators in the shape [`spokeprep_core::prepare`] takes.
    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            boundaries: &self.boundaries,
            regions: &self.regions,
            reducer: &self.reducer,
            us_data: &self.us_data,
            boundary_reader: &self.boundary_reader,
            synthetic: &self.synthetic,
        }
    }
}
