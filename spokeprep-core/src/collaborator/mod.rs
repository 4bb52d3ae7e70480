//! Contracts for the external collaborators the pipeline drives.
//!
//! Network-backed collaborators report [`AcquisitionError`] and are retried
//! by the pipeline. Local computations and tool invocations report
//! [`ToolError`] and are never retried. All traits are `?Send`: a run is a
//! single cooperative task.

mod error;

use std::fmt;
use std::num::NonZeroU32;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use geo::MultiPolygon;

use crate::{Jurisdiction, Place, PopulationGrid, Slug};

pub use error::{AcquisitionError, ToolError, TransportError};

/// Resolves a place's administrative boundary.
#[async_trait(?Send)]
pub trait BoundaryService {
    /// Persist `{slug}.shp` (and sidecars) for `place` into `output_dir`.
    async fn retrieve_city_boundaries(
        &self,
        output_dir: &Utf8Path,
        place: &Place,
    ) -> Result<Slug, AcquisitionError>;
}

/// Administrative area whose road-network extract is requested.
///
/// A state carries its country so sources can tell apart regions that share
/// a name, such as the US state of Georgia and the country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionScope<'a> {
    /// A state or province within `country`.
    State {
        /// State name as given by the caller.
        state: &'a str,
        /// Country containing the state.
        country: &'a str,
    },
    /// A whole country.
    Country(&'a str),
}

impl RegionScope<'_> {
    /// Name of the requested area.
    pub const fn name(&self) -> &str {
        match self {
            Self::State { state, .. } => state,
            Self::Country(country) => country,
        }
    }
}

impl fmt::Display for RegionScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Downloads raw road-network extracts for an administrative scope.
#[async_trait(?Send)]
pub trait RegionSource {
    /// Download the extract for `scope`.
    ///
    /// Report [`AcquisitionError::NotFound`] when no extract exists for the
    /// scope; the pipeline treats that as the signal to widen the scope.
    async fn retrieve_region_file(
        &self,
        scope: RegionScope<'_>,
        output_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, AcquisitionError>;
}

/// Clips a region extract to a city boundary.
#[async_trait(?Send)]
pub trait NetworkReducer {
    /// Write `polygon_file` and the reduced `city_network` extract.
    async fn prepare_city_file(
        &self,
        output_dir: &Utf8Path,
        region_file: &Utf8Path,
        polygon_file: &Utf8Path,
        city_network: &Utf8Path,
    ) -> Result<(), ToolError>;
}

/// Scope of a LODES origin/destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LodesPart {
    /// Jobs where home and work are in the state.
    Main,
    /// Jobs where work is in the state and home is elsewhere.
    Aux,
}

impl LodesPart {
    /// Both parts in download order.
    pub const ALL: [Self; 2] = [Self::Main, Self::Aux];

    /// Tag used in LODES file names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Aux => "aux",
        }
    }
}

impl fmt::Display for LodesPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens sessions for downloading US datasets.
#[async_trait(?Send)]
pub trait UsDataSource {
    /// Open a session; dropping it releases its connections.
    async fn open_session(&self) -> Result<Box<dyn UsDataSession>, AcquisitionError>;
}

/// A live session issuing US dataset downloads one after another.
#[async_trait(?Send)]
pub trait UsDataSession {
    /// Download a LODES origin/destination table for `state_abbrev`.
    async fn download_lodes_data(
        &self,
        output_dir: &Utf8Path,
        state_abbrev: &str,
        part: LodesPart,
        year: u16,
    ) -> Result<(), AcquisitionError>;

    /// Download the national census water-blocks table.
    async fn download_census_waterblocks(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError>;

    /// Download the 2010 census blocks for the state identified by `state_fips`.
    async fn download_2010_census_blocks(
        &self,
        output_dir: &Utf8Path,
        state_fips: &str,
    ) -> Result<(), AcquisitionError>;

    /// Download the national state speed-limit table.
    async fn download_state_speed_limits(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError>;

    /// Download the city speed-limit table.
    async fn download_city_speed_limits(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError>;
}

/// Reads a boundary shape back into memory.
#[async_trait(?Send)]
pub trait BoundaryReader {
    /// Load every polygon stored in `shape`.
    async fn read_boundary(&self, shape: &Utf8Path) -> Result<MultiPolygon<f64>, ToolError>;
}

/// Persists the synthetic stand-ins for US datasets.
#[async_trait(?Send)]
pub trait SyntheticArtifacts {
    /// Write census-block equivalents derived from `grid`.
    async fn simulate_census_blocks(
        &self,
        output_dir: &Utf8Path,
        grid: &PopulationGrid,
    ) -> Result<(), ToolError>;

    /// Write a speed-limit table assigning `speed_limit` to the whole city.
    async fn change_speed_limit(
        &self,
        output_dir: &Utf8Path,
        city: &str,
        jurisdiction: &Jurisdiction,
        speed_limit: NonZeroU32,
    ) -> Result<(), ToolError>;
}
