//! City boundaries from a Nominatim search endpoint.

use std::io::Write;

use async_trait::async_trait;
use camino::Utf8Path;
use log::{debug, info};
use reqwest::Client;
use serde_json::json;
use spokeprep_core::{AcquisitionError, BoundaryService, Place, Slug, ToolError};
use url::Url;

use crate::geojson::{Feature, FeatureCollection, Geometry};
use crate::http::{build_client, get, sanitise_base_url};
use crate::{BuildError, Tools, tool};

/// Public Nominatim instance.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Resolves city outlines with Nominatim and stores them as shapefiles.
#[derive(Debug, Clone)]
pub struct NominatimBoundaryService {
    client: Client,
    base_url: String,
    tools: Tools,
}

impl NominatimBoundaryService {
    /// Service querying `base_url` with the given user agent.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::HttpClient`] when the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        tools: Tools,
    ) -> Result<Self, BuildError> {
        Ok(Self {
            client: build_client(user_agent)?,
            base_url: sanitise_base_url(base_url, DEFAULT_NOMINATIM_URL),
            tools,
        })
    }

    fn search_url(&self, place: &Place) -> Result<Url, AcquisitionError> {
        let endpoint = format!("{}/search", self.base_url);
        Url::parse_with_params(
            &endpoint,
            [
                ("q", place.to_string().as_str()),
                ("format", "geojson"),
                ("polygon_geojson", "1"),
                ("limit", "1"),
            ],
        )
        .map_err(|err| AcquisitionError::Decode {
            what: "boundary search URL".to_owned(),
            message: err.to_string(),
        })
    }

    async fn find_outline(&self, place: &Place) -> Result<Feature, AcquisitionError> {
        let url = self.search_url(place)?;
        let collection: FeatureCollection = get(&self.client, url.as_str())
            .await?
            .json()
            .await
            .map_err(|err| AcquisitionError::Decode {
                what: "boundary search response".to_owned(),
                message: err.to_string(),
            })?;
        collection
            .features
            .into_iter()
            .find(|feature| {
                matches!(
                    feature.geometry,
                    Some(Geometry::Polygon { .. } | Geometry::MultiPolygon { .. })
                )
            })
            .ok_or_else(|| AcquisitionError::NotFound {
                what: "city boundary",
                value: place.to_string(),
            })
    }
}

#[async_trait(?Send)]
impl BoundaryService for NominatimBoundaryService {
    async fn retrieve_city_boundaries(
        &self,
        output_dir: &Utf8Path,
        place: &Place,
    ) -> Result<Slug, AcquisitionError> {
        let slug = Slug::for_place(place).map_err(|err| AcquisitionError::Decode {
            what: "place name".to_owned(),
            message: err.to_string(),
        })?;
        let outline = self.find_outline(place).await?;
        let geometry = outline.geometry.as_ref().map(Geometry::to_value);
        let document = json!({
            "type": "FeatureCollection",
            "features": [{ "type": "Feature", "properties": outline.properties, "geometry": geometry }],
        });

        let mut scratch = tempfile::Builder::new()
            .prefix("boundary-")
            .suffix(".geojson")
            .tempfile_in(output_dir)
            .map_err(|source| AcquisitionError::Write {
                path: output_dir.to_owned(),
                source,
            })?;
        serde_json::to_writer(&mut scratch, &document)
            .map_err(std::io::Error::from)
            .and_then(|()| scratch.flush())
            .map_err(|source| AcquisitionError::Write {
                path: output_dir.to_owned(),
                source,
            })?;
        let scratch_path = scratch.path().to_str().ok_or_else(|| {
            AcquisitionError::from(ToolError::Format {
                what: "scratch path".to_owned(),
                message: "not valid UTF-8".to_owned(),
            })
        })?;

        let shape = output_dir.join(slug.file_name("shp"));
        debug!("converting boundary for {place} into {shape}");
        tool::run(
            self.tools.ogr2ogr(),
            &["-f", "ESRI Shapefile", "-overwrite", shape.as_str(), scratch_path],
        )
        .await?;
        info!("stored boundary for {place} in {shape}");
        Ok(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn providence() -> Place {
        Place::new("usa", Some("rhode island"), "providence").expect("valid place")
    }

    fn service(server: &MockServer) -> NominatimBoundaryService {
        // `true` stands in for ogr2ogr so tests do not need GDAL installed.
        NominatimBoundaryService::new(
            server.uri(),
            "spokeprep-tests",
            Tools::default().with_ogr2ogr("true"),
        )
        .expect("client builds")
    }

    fn scratch_dir() -> (tempfile::TempDir, camino::Utf8PathBuf) {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("utf-8 tempdir");
        (dir, root)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn queries_polygon_geojson_and_returns_the_slug() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "providence, rhode island, usa"))
            .and(query_param("format", "geojson"))
            .and(query_param("polygon_geojson", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": { "display_name": "Providence" },
                    "geometry": { "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (_guard, root) = scratch_dir();

        let slug = service(&server)
            .retrieve_city_boundaries(&root, &providence())
            .await
            .expect("boundary retrieved");

        assert_eq!(slug.as_str(), "providence-rhode-island-usa");
    }

    #[tokio::test]
    async fn empty_results_are_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "FeatureCollection",
                "features": []
            })))
            .mount(&server)
            .await;
        let (_guard, root) = scratch_dir();

        let err = service(&server)
            .retrieve_city_boundaries(&root, &providence())
            .await
            .expect_err("no boundary");

        assert!(err.is_missing_value());
    }

    #[tokio::test]
    async fn server_errors_surface_as_http_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let (_guard, root) = scratch_dir();

        let err = service(&server)
            .retrieve_city_boundaries(&root, &providence())
            .await
            .expect_err("service unavailable");

        assert!(matches!(
            err,
            AcquisitionError::Transport(spokeprep_core::TransportError::Http { status: 503, .. })
        ));
    }
}
