//! Error types emitted by the spokeprep CLI.
//!
//! Messages name only the failing layer; `main` walks the source chain for
//! the underlying cause.

use std::sync::Arc;

use camino::Utf8PathBuf;
use spokeprep_core::{PrepareError, RequestError};
use spokeprep_data::BuildError;
use thiserror::Error;

/// Errors emitted by the spokeprep CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required value is missing after configuration merging.
    #[error("missing {field} (pass it on the command line or set {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A merged value is blank or out of range.
    #[error("invalid configuration")]
    InvalidValue(#[from] RequestError),
    /// The output directory exists but is not a directory.
    #[error("output directory {path:?} is not a directory")]
    OutputDirectoryNotDirectory { path: Utf8PathBuf },
    /// The output directory could not be inspected.
    #[error("failed to inspect output directory {path:?}")]
    InspectOutputDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Constructing the network collaborators failed.
    #[error("failed to set up collaborators")]
    BuildCollaborators(#[from] BuildError),
    /// The async runtime could not be started.
    #[error("failed to start the async runtime")]
    Runtime(#[source] std::io::Error),
    /// The preparation pipeline failed.
    #[error("preparation failed")]
    Prepare(#[from] PrepareError),
    /// Writing the manifest summary failed.
    #[error("failed to write the manifest")]
    WriteManifest(#[source] std::io::Error),
}
