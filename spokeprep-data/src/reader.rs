//! Reading boundary shapefiles back through `ogr2ogr`.

use async_trait::async_trait;
use camino::Utf8Path;
use geo::MultiPolygon;
use spokeprep_core::{BoundaryReader, ToolError};

use crate::geojson::decode_boundary;
use crate::{Tools, tool};

/// Converts a shapefile to GeoJSON on stdout and decodes its polygons.
#[derive(Debug, Clone, Default)]
pub struct OgrBoundaryReader {
    tools: Tools,
}

impl OgrBoundaryReader {
    /// Reader running the given tool programs.
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }
}

#[async_trait(?Send)]
impl BoundaryReader for OgrBoundaryReader {
    async fn read_boundary(&self, shape: &Utf8Path) -> Result<MultiPolygon<f64>, ToolError> {
        let output = tool::run(
            self.tools.ogr2ogr(),
            &["-f", "GeoJSON", "/vsistdout/", shape.as_str()],
        )
        .await?;
        decode_boundary(&output).map_err(|message| ToolError::Format {
            what: format!("boundary in {shape}"),
            message,
        })
    }
}
