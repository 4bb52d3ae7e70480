//! Error types reported by collaborators.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Transport-level errors encountered while issuing HTTP requests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request failed before a status was received.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        source: io::Error,
    },
}

/// Errors from network-backed collaborators. The pipeline retries these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AcquisitionError {
    /// The remote call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The service answered, but has nothing for the requested value.
    #[error("no {what} found for {value:?}")]
    NotFound {
        /// Kind of thing looked up, e.g. "region extract".
        what: &'static str,
        /// The value that matched nothing.
        value: String,
    },
    /// The service answered with a payload that could not be decoded.
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },
    /// Writing a downloaded artefact failed.
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// A local conversion step inside the acquisition failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl AcquisitionError {
    /// Whether this error means "nothing exists for that value".
    pub const fn is_missing_value(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from deterministic local steps. The pipeline never retries these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The program exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", describe_status(.status))]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    /// Reading or writing a local file failed.
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// Output could not be decoded or encoded.
    #[error("invalid {what}: {message}")]
    Format { what: String, message: String },
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "a signal".to_owned(), |code| format!("status {code}"))
}
