//! Invocation of the external geospatial command-line tools.

use log::debug;
use spokeprep_core::ToolError;
use tokio::process::Command;

/// Program names used for each external tool.
///
/// Defaults resolve `ogr2ogr` and `osmium` from `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    ogr2ogr: String,
    osmium: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            ogr2ogr: "ogr2ogr".to_owned(),
            osmium: "osmium".to_owned(),
        }
    }
}

impl Tools {
    /// Use `program` for GDAL's `ogr2ogr`.
    #[must_use]
    pub fn with_ogr2ogr(mut self, program: impl Into<String>) -> Self {
        self.ogr2ogr = program.into();
        self
    }

    /// Use `program` for `osmium`.
    #[must_use]
    pub fn with_osmium(mut self, program: impl Into<String>) -> Self {
        self.osmium = program.into();
        self
    }

    /// Program run for vector format conversions.
    pub fn ogr2ogr(&self) -> &str {
        &self.ogr2ogr
    }

    /// Program run for OSM extracts.
    pub fn osmium(&self) -> &str {
        &self.osmium
    }
}

/// Run `program` to completion and return its standard output.
pub(crate) async fn run(program: &str, args: &[&str]) -> Result<Vec<u8>, ToolError> {
    debug!("running {program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            program: program.to_owned(),
            source,
        })?;
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(ToolError::Failed {
            program: program.to_owned(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}
