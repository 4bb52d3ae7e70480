//! Clipping region extracts to a city with `ogr2ogr` and `osmium`.

use async_trait::async_trait;
use camino::Utf8Path;
use log::info;
use spokeprep_core::{NetworkReducer, ToolError};

use crate::{Tools, tool};

/// Reduces a region extract to the city boundary.
///
/// The clipping polygon is derived from the boundary shapefile sharing the
/// polygon file's stem, then `osmium extract` cuts the region to it.
#[derive(Debug, Clone, Default)]
pub struct OsmiumReducer {
    tools: Tools,
}

impl OsmiumReducer {
    /// Reducer running the given tool programs.
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }
}

fn polygon_args<'a>(polygon_file: &'a Utf8Path, shape: &'a Utf8Path) -> [&'a str; 4] {
    ["-f", "GeoJSON", polygon_file.as_str(), shape.as_str()]
}

fn extract_args<'a>(
    polygon_file: &'a Utf8Path,
    region_file: &'a Utf8Path,
    city_network: &'a Utf8Path,
) -> [&'a str; 7] {
    [
        "extract",
        "-p",
        polygon_file.as_str(),
        region_file.as_str(),
        "-o",
        city_network.as_str(),
        "--overwrite",
    ]
}

#[async_trait(?Send)]
impl NetworkReducer for OsmiumReducer {
    async fn prepare_city_file(
        &self,
        _output_dir: &Utf8Path,
        region_file: &Utf8Path,
        polygon_file: &Utf8Path,
        city_network: &Utf8Path,
    ) -> Result<(), ToolError> {
        let shape = polygon_file.with_extension("shp");
        // The GeoJSON driver refuses to replace an existing file.
        spokeprep_fs::remove_file_if_exists(polygon_file).map_err(|source| ToolError::Io {
            path: polygon_file.to_owned(),
            source,
        })?;
        tool::run(self.tools.ogr2ogr(), &polygon_args(polygon_file, &shape)).await?;
        tool::run(
            self.tools.osmium(),
            &extract_args(polygon_file, region_file, city_network),
        )
        .await?;
        info!("reduced {region_file} to {city_network}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn builds_tool_arguments() {
        let polygon = Utf8Path::new("data/providence.geojson");
        let shape = polygon.with_extension("shp");
        assert_eq!(
            polygon_args(polygon, &shape),
            ["-f", "GeoJSON", "data/providence.geojson", "data/providence.shp"]
        );
        assert_eq!(
            extract_args(
                polygon,
                Utf8Path::new("data/rhode-island-latest.osm.pbf"),
                Utf8Path::new("data/providence.osm"),
            ),
            [
                "extract",
                "-p",
                "data/providence.geojson",
                "data/rhode-island-latest.osm.pbf",
                "-o",
                "data/providence.osm",
                "--overwrite",
            ]
        );
    }

    #[cfg(unix)]
    #[rstest]
    #[tokio::test]
    async fn tool_failures_stop_the_reduction() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("utf-8 tempdir");
        let reducer = OsmiumReducer::new(Tools::default().with_ogr2ogr("true").with_osmium("false"));

        let err = reducer
            .prepare_city_file(
                &root,
                &root.join("region.osm.pbf"),
                &root.join("city.geojson"),
                &root.join("city.osm"),
            )
            .await
            .expect_err("osmium fails");

        assert!(matches!(err, ToolError::Failed { ref program, .. } if program == "false"));
    }
}
