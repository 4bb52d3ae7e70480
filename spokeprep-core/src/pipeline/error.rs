//! Stage-tagged errors reported by [`prepare`](super::prepare).

use std::fmt;
use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::{AcquisitionError, LodesPart, SlugError, SyntheticError, ToolError};

/// US datasets downloaded by the US branch, in download order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsDataset {
    /// LODES origin/destination table for one part.
    Employment(LodesPart),
    /// National census water blocks.
    WaterBlocks,
    /// 2010 census blocks for the state.
    CensusBlocks,
    /// National state speed-limit table.
    StateSpeedLimits,
    /// City speed-limit table.
    CitySpeedLimits,
}

impl fmt::Display for UsDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Employment(part) => write!(f, "LODES {part} employment data"),
            Self::WaterBlocks => f.write_str("census water blocks"),
            Self::CensusBlocks => f.write_str("2010 census blocks"),
            Self::StateSpeedLimits => f.write_str("state speed limits"),
            Self::CitySpeedLimits => f.write_str("city speed limits"),
        }
    }
}

/// Steps of the synthetic branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntheticStep {
    /// Persisting census-block equivalents.
    CensusBlocks,
    /// Writing the speed-limit override.
    SpeedLimit,
}

impl fmt::Display for SyntheticStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CensusBlocks => "simulating census blocks",
            Self::SpeedLimit => "writing the speed-limit override",
        })
    }
}

/// Errors aborting a preparation run, tagged with the stage that failed.
///
/// Collaborator errors are kept as the `source` exactly as the final
/// attempt produced them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PrepareError {
    /// The request could not name its artefacts.
    #[error("invalid preparation request")]
    InvalidRequest(#[source] SlugError),
    /// The output directory could not be created.
    #[error("failed to create output directory {path:?}")]
    CreateOutputDir {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// Boundary retrieval failed after every attempt.
    #[error("failed to retrieve city boundaries")]
    Boundary(#[source] AcquisitionError),
    /// Region retrieval failed for the last scope tried.
    #[error("failed to retrieve the region file for {scope:?}")]
    Region {
        scope: String,
        #[source]
        source: AcquisitionError,
    },
    /// The network reduction tool failed.
    #[error("failed to reduce the region file to the city")]
    Reduction(#[source] ToolError),
    /// A US dataset could not be acquired.
    #[error("failed to acquire {dataset}")]
    UsData {
        dataset: UsDataset,
        #[source]
        source: AcquisitionError,
    },
    /// The US data session could not be opened.
    #[error("failed to open the US data session")]
    UsSession(#[source] AcquisitionError),
    /// The boundary shape could not be read back.
    #[error("failed to read the city boundary")]
    ReadBoundary(#[source] ToolError),
    /// No population grid could be laid over the boundary.
    #[error("failed to generate a synthetic population")]
    PopulationGrid(#[source] SyntheticError),
    /// A synthetic artefact could not be written.
    #[error("failed while {step}")]
    Synthetic {
        step: SyntheticStep,
        #[source]
        source: ToolError,
    },
    /// A manifest path was missing or empty after every stage succeeded.
    #[error("expected artefact {path:?} is missing or empty")]
    MissingArtifact { path: Utf8PathBuf },
    /// Inspecting a manifest path failed.
    #[error("failed to inspect artefact {path:?}")]
    InspectArtifact {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}
