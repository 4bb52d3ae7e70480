//! Facade crate for the spokeprep city preparation toolkit.
//!
//! This crate re-exports the request, manifest, and pipeline types from
//! `spokeprep-core` and, behind the `data` feature, the network and
//! tool-backed collaborators from `spokeprep-data`.

#![forbid(unsafe_code)]

pub use spokeprep_core::{
    AcquisitionError, ArtifactManifest, BoundaryReader, BoundaryService, CityArtifacts,
    Collaborators, DEFAULT_BLOCK_POPULATION, DEFAULT_BLOCK_SIZE, DEFAULT_RETRIES,
    DEFAULT_SPEED_LIMIT, Jurisdiction, LODES_YEAR, LodesPart, NON_US_STATE_ABBREV,
    NON_US_STATE_FIPS, NetworkReducer, Place, PopulationCell, PopulationGrid, PreparationRequest,
    PrepareError, RegionScope, RegionSource, RequestError, RetryPolicy, Slug, SlugError,
    StateInfo, SyntheticArtifacts, SyntheticError, SyntheticStep, ToolError, TransportError,
    UnknownJurisdiction, UsDataSession, UsDataSource, UsDataset, classify, prepare,
    resolve_jurisdiction,
};

#[cfg(feature = "data")]
pub use spokeprep_data::{
    CensusDataSource, DataCollaborators, GeofabrikRegionSource, NominatimBoundaryService,
    OgrBoundaryReader, OsmiumReducer, SyntheticArtifactWriter, UsEndpoints,
};
