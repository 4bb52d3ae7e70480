//! Core domain types and orchestration for city preparation.
//!
//! A preparation run turns a place name into the artefacts a bicycle network
//! analysis needs: a boundary shape, a city-scoped road network, and either
//! US demographic datasets or a synthetic stand-in. This crate owns the
//! request and manifest types, the retry policy, jurisdiction
//! classification, the synthetic population grid, and the pipeline that
//! sequences the collaborators. Concrete collaborators live in
//! `spokeprep-data`.

pub mod collaborator;
mod jurisdiction;
mod manifest;
pub mod pipeline;
mod request;
mod retry;
mod slug;
mod synthetic;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use collaborator::{
    AcquisitionError, BoundaryReader, BoundaryService, LodesPart, NetworkReducer, RegionScope,
    RegionSource, SyntheticArtifacts, ToolError, TransportError, UsDataSession, UsDataSource,
};
pub use jurisdiction::{
    Jurisdiction, NON_US_STATE_ABBREV, NON_US_STATE_FIPS, StateInfo, UnknownJurisdiction,
    classify, resolve_jurisdiction,
};
pub use manifest::{ArtifactManifest, CityArtifacts};
pub use pipeline::{Collaborators, LODES_YEAR, PrepareError, SyntheticStep, UsDataset, prepare};
pub use request::{
    DEFAULT_BLOCK_POPULATION, DEFAULT_BLOCK_SIZE, DEFAULT_RETRIES, DEFAULT_SPEED_LIMIT, Place,
    PreparationRequest, RequestError,
};
pub use retry::RetryPolicy;
pub use slug::{Slug, SlugError};
pub use synthetic::{PopulationCell, PopulationGrid, SyntheticError};
