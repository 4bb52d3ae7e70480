//! Region extracts from a Geofabrik download server.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use reqwest::Client;
use serde::Deserialize;
use spokeprep_core::{AcquisitionError, RegionScope, RegionSource};

use crate::BuildError;
use crate::http::{build_client, download_to, get, sanitise_base_url};

/// Public Geofabrik download server.
pub const DEFAULT_GEOFABRIK_URL: &str = "https://download.geofabrik.de";

const INDEX_PATH: &str = "index-v1-nogeom.json";

/// Everyday names Geofabrik does not use, mapped to extract ids.
const ALIASES: [(&str, &str); 4] = [
    ("usa", "us"),
    ("united states", "us"),
    ("uk", "great-britain"),
    ("united kingdom", "great-britain"),
];

#[derive(Debug, Deserialize)]
struct Index {
    features: Vec<IndexFeature>,
}

#[derive(Debug, Deserialize)]
struct IndexFeature {
    properties: Extract,
}

#[derive(Debug, Deserialize)]
struct Extract {
    id: String,
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    urls: ExtractUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractUrls {
    pbf: Option<String>,
}

impl Extract {
    /// Last path segment of the id, e.g. `rhode-island` for `us/rhode-island`.
    fn short_id(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    fn matches(&self, scope: &str) -> bool {
        let hyphenated = scope.replace(' ', "-");
        self.name.eq_ignore_ascii_case(scope)
            || self.id.eq_ignore_ascii_case(scope)
            || self.short_id().eq_ignore_ascii_case(&hyphenated)
    }

    /// Whether this extract is nested under the extract `parent`.
    fn is_within(&self, parent: &str) -> bool {
        self.parent.as_deref() == Some(parent)
            || self
                .id
                .strip_prefix(parent)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    const fn is_published(&self) -> bool {
        self.urls.pbf.is_some()
    }
}

/// Downloads `.osm.pbf` extracts listed in the Geofabrik index.
#[derive(Debug, Clone)]
pub struct GeofabrikRegionSource {
    client: Client,
    base_url: String,
}

impl GeofabrikRegionSource {
    /// Source reading the index and extracts from `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::HttpClient`] when the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, BuildError> {
        Ok(Self {
            client: build_client(user_agent)?,
            base_url: sanitise_base_url(base_url, DEFAULT_GEOFABRIK_URL),
        })
    }

    async fn index(&self) -> Result<Vec<Extract>, AcquisitionError> {
        let url = format!("{}/{INDEX_PATH}", self.base_url);
        let index: Index = get(&self.client, &url)
            .await?
            .json()
            .await
            .map_err(|err| AcquisitionError::Decode {
                what: "Geofabrik index".to_owned(),
                message: err.to_string(),
            })?;
        Ok(index
            .features
            .into_iter()
            .map(|feature| feature.properties)
            .collect())
    }
}

fn select<'a>(extracts: &'a [Extract], scope: RegionScope<'_>) -> Option<&'a Extract> {
    match scope {
        RegionScope::State { state, country } => select_state(extracts, state, country),
        RegionScope::Country(country) => select_country(extracts, country),
    }
}

/// A country's own extract. Top-level entries win over sub-regions sharing
/// the name, so "georgia" is the country rather than `us/georgia`.
fn select_country<'a>(extracts: &'a [Extract], country: &str) -> Option<&'a Extract> {
    let country = country.trim();
    let alias = ALIASES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(country))
        .map(|(_, id)| *id);
    let matching: Vec<&Extract> = extracts
        .iter()
        .filter(|extract| extract.is_published())
        .filter(|extract| extract.matches(country) || alias.is_some_and(|id| extract.id == id))
        .collect();
    matching
        .iter()
        .find(|extract| !extract.id.contains('/'))
        .or_else(|| matching.first())
        .copied()
}

/// A state's extract, restricted to sub-regions of its country.
///
/// Without a listed country only sub-national extracts qualify, so a state
/// never resolves to a country of the same name.
fn select_state<'a>(extracts: &'a [Extract], state: &str, country: &str) -> Option<&'a Extract> {
    let state = state.trim();
    let parent = select_country(extracts, country).map(|extract| extract.id.as_str());
    extracts
        .iter()
        .filter(|extract| extract.is_published() && extract.matches(state))
        .find(|extract| match parent {
            Some(parent) => extract.is_within(parent),
            None => is_sub_national(extracts, extract),
        })
}

/// Countries hang off continents, which have no parent themselves.
fn is_sub_national(extracts: &[Extract], extract: &Extract) -> bool {
    extract.id.contains('/')
        || extract.parent.as_deref().is_some_and(|parent| {
            extracts
                .iter()
                .any(|candidate| candidate.id == parent && candidate.parent.is_some())
        })
}

#[async_trait(?Send)]
impl RegionSource for GeofabrikRegionSource {
    async fn retrieve_region_file(
        &self,
        scope: RegionScope<'_>,
        output_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, AcquisitionError> {
        let extracts = self.index().await?;
        let not_found = || AcquisitionError::NotFound {
            what: "region extract",
            value: scope.name().to_owned(),
        };
        let extract = select(&extracts, scope).ok_or_else(not_found)?;
        let url = extract.urls.pbf.as_deref().ok_or_else(not_found)?;
        let target = output_dir.join(format!("{}-latest.osm.pbf", extract.short_id()));
        info!("downloading {} extract from {url}", extract.name);
        download_to(&self.client, url, &target).await?;
        Ok(target)
    }
}
