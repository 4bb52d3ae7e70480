//! Names and verification of the artefacts a run leaves behind.

use camino::{Utf8Path, Utf8PathBuf};

use crate::{Jurisdiction, Slug};

/// Per-city artefact paths derived from an output directory and a slug.
///
/// # Examples
///
/// ```
/// use spokeprep_core::{CityArtifacts, Slug};
///
/// # fn main() -> Result<(), spokeprep_core::SlugError> {
/// let slug = Slug::new("providence rhode island usa")?;
/// let artifacts = CityArtifacts::new("data".into(), slug);
/// assert_eq!(artifacts.boundary_shape().as_str(), "data/providence-rhode-island-usa.shp");
/// assert_eq!(artifacts.city_network().as_str(), "data/providence-rhode-island-usa.osm");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityArtifacts {
    slug: Slug,
    boundary_shape: Utf8PathBuf,
    polygon: Utf8PathBuf,
    city_network: Utf8PathBuf,
}

impl CityArtifacts {
    /// Lay out the artefacts for `slug` inside `output_dir`.
    pub fn new(output_dir: Utf8PathBuf, slug: Slug) -> Self {
        Self {
            boundary_shape: output_dir.join(slug.file_name("shp")),
            polygon: output_dir.join(slug.file_name("geojson")),
            city_network: output_dir.join(slug.file_name("osm")),
            slug,
        }
    }

    /// Slug shared by every artefact.
    pub fn slug(&self) -> &Slug {
        &self.slug
    }

    /// `{slug}.shp`, written by the boundary service.
    pub fn boundary_shape(&self) -> &Utf8Path {
        &self.boundary_shape
    }

    /// `{slug}.geojson`, the clipping polygon written by the reducer.
    pub fn polygon(&self) -> &Utf8Path {
        &self.polygon
    }

    /// `{slug}.osm`, the city-scoped road network.
    pub fn city_network(&self) -> &Utf8Path {
        &self.city_network
    }
}

/// Result of a successful preparation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactManifest {
    jurisdiction: Jurisdiction,
    boundary_shape: Utf8PathBuf,
    city_network: Utf8PathBuf,
    output_dir: Utf8PathBuf,
}

impl ArtifactManifest {
    pub(crate) fn new(
        jurisdiction: Jurisdiction,
        artifacts: CityArtifacts,
        output_dir: Utf8PathBuf,
    ) -> Self {
        Self {
            jurisdiction,
            boundary_shape: artifacts.boundary_shape,
            city_network: artifacts.city_network,
            output_dir,
        }
    }

    /// How the place was classified.
    pub fn jurisdiction(&self) -> Jurisdiction {
        self.jurisdiction
    }

    /// State abbreviation, or `ZZ` outside the US.
    pub fn state_abbreviation(&self) -> &'static str {
        self.jurisdiction.abbreviation()
    }

    /// State FIPS code, or `0` outside the US.
    pub fn state_fips(&self) -> &'static str {
        self.jurisdiction.identifier()
    }

    /// Boundary shapefile of the city.
    pub fn boundary_shape(&self) -> &Utf8Path {
        &self.boundary_shape
    }

    /// Reduced road network of the city.
    pub fn city_network(&self) -> &Utf8Path {
        &self.city_network
    }

    /// Directory holding every artefact.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// First manifest path that is missing or empty, if any.
    pub fn first_missing(&self) -> std::io::Result<Option<&Utf8Path>> {
        for path in [self.boundary_shape(), self.city_network()] {
            if !spokeprep_fs::file_is_nonempty(path)? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}
