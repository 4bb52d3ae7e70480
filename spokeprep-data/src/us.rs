//! US employment, census, and speed-limit datasets over HTTP.

use std::io::{self, BufReader};

use async_trait::async_trait;
use camino::Utf8Path;
use flate2::read::GzDecoder;
use log::{debug, info};
use reqwest::Client;
use spokeprep_core::{AcquisitionError, LodesPart, TransportError, UsDataSession, UsDataSource};

use crate::http::{build_client, download_to, sanitise_base_url};

/// LEHD origin/destination employment tables.
pub const DEFAULT_LODES_URL: &str = "https://lehd.ces.census.gov/data/lodes/LODES7";
/// Bucket holding the water-block and speed-limit tables.
pub const DEFAULT_PFB_URL: &str = "https://s3.amazonaws.com/pfb-public-documents";
/// 2010 census block shapefiles with population and housing counts.
pub const DEFAULT_TIGER_URL: &str = "https://www2.census.gov/geo/tiger/TIGER2010BLKPOPHU";

/// Base URLs of the US datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsEndpoints {
    /// LODES root; tables live under `{lodes}/{state}/od/`.
    pub lodes: String,
    /// Host of `censuswaterblocks.zip`.
    pub water_blocks: String,
    /// Host of `tabblock2010_{fips}_pophu.zip`.
    pub census_blocks: String,
    /// Host of `state_fips_speed.csv` and `city_fips_speed.csv`.
    pub speed_limits: String,
}

impl Default for UsEndpoints {
    fn default() -> Self {
        Self {
            lodes: DEFAULT_LODES_URL.to_owned(),
            water_blocks: DEFAULT_PFB_URL.to_owned(),
            census_blocks: DEFAULT_TIGER_URL.to_owned(),
            speed_limits: DEFAULT_PFB_URL.to_owned(),
        }
    }
}

impl UsEndpoints {
    /// Every endpoint rooted at `base`, as served by a mirror or mock.
    pub fn mirrored_at(base: &str) -> Self {
        let base = sanitise_base_url(base, DEFAULT_PFB_URL);
        Self {
            lodes: base.clone(),
            water_blocks: base.clone(),
            census_blocks: base.clone(),
            speed_limits: base,
        }
    }

    fn sanitised(&self) -> Self {
        Self {
            lodes: sanitise_base_url(self.lodes.as_str(), DEFAULT_LODES_URL),
            water_blocks: sanitise_base_url(self.water_blocks.as_str(), DEFAULT_PFB_URL),
            census_blocks: sanitise_base_url(self.census_blocks.as_str(), DEFAULT_TIGER_URL),
            speed_limits: sanitise_base_url(self.speed_limits.as_str(), DEFAULT_PFB_URL),
        }
    }
}

/// File name of a LODES origin/destination table, without compression suffix.
pub fn lodes_file_name(state_abbrev: &str, part: LodesPart, year: u16) -> String {
    format!(
        "{}_od_{part}_JT00_{year}.csv",
        state_abbrev.to_ascii_lowercase()
    )
}

/// Opens [`HttpUsSession`]s against a set of endpoints.
#[derive(Debug, Clone)]
pub struct CensusDataSource {
    endpoints: UsEndpoints,
    user_agent: String,
}

impl CensusDataSource {
    /// Source downloading from `endpoints`.
    pub fn new(endpoints: UsEndpoints, user_agent: impl Into<String>) -> Self {
        Self {
            endpoints: endpoints.sanitised(),
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait(?Send)]
impl UsDataSource for CensusDataSource {
    async fn open_session(&self) -> Result<Box<dyn UsDataSession>, AcquisitionError> {
        let client = build_client(&self.user_agent).map_err(|err| TransportError::Network {
            url: self.endpoints.lodes.clone(),
            source: io::Error::other(err),
        })?;
        debug!("opened US data session");
        Ok(Box::new(HttpUsSession {
            client,
            endpoints: self.endpoints.clone(),
        }))
    }
}

/// One HTTP client shared by every US download of a run.
///
/// Dropping the session closes its pooled connections.
#[derive(Debug)]
pub struct HttpUsSession {
    client: Client,
    endpoints: UsEndpoints,
}

impl Drop for HttpUsSession {
    fn drop(&mut self) {
        debug!("released US data session");
    }
}

impl HttpUsSession {
    async fn fetch(&self, url: &str, output_dir: &Utf8Path, name: &str) -> Result<(), AcquisitionError> {
        let target = output_dir.join(name);
        info!("downloading {name}");
        download_to(&self.client, url, &target).await?;
        Ok(())
    }
}

fn gunzip(source: &Utf8Path, target: &Utf8Path) -> Result<u64, AcquisitionError> {
    let write_error = |source| AcquisitionError::Write {
        path: target.to_owned(),
        source,
    };
    let input = spokeprep_fs::open_utf8_file(source).map_err(|err| AcquisitionError::Write {
        path: source.to_owned(),
        source: err,
    })?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut output = spokeprep_fs::create_utf8_file(target).map_err(write_error)?;
    io::copy(&mut decoder, &mut output).map_err(|err| {
        if matches!(
            err.kind(),
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
        ) {
            AcquisitionError::Decode {
                what: source.to_string(),
                message: err.to_string(),
            }
        } else {
            write_error(err)
        }
    })
}

#[async_trait(?Send)]
impl UsDataSession for HttpUsSession {
    async fn download_lodes_data(
        &self,
        output_dir: &Utf8Path,
        state_abbrev: &str,
        part: LodesPart,
        year: u16,
    ) -> Result<(), AcquisitionError> {
        let state = state_abbrev.to_ascii_lowercase();
        let csv_name = lodes_file_name(state_abbrev, part, year);
        let gz_name = format!("{csv_name}.gz");
        let url = format!("{}/{state}/od/{gz_name}", self.endpoints.lodes);
        self.fetch(&url, output_dir, &gz_name).await?;

        let compressed = output_dir.join(&gz_name);
        let written = gunzip(&compressed, &output_dir.join(&csv_name))?;
        spokeprep_fs::remove_file_if_exists(&compressed).map_err(|source| {
            AcquisitionError::Write {
                path: compressed.clone(),
                source,
            }
        })?;
        debug!("expanded {gz_name} into {written} bytes");
        Ok(())
    }

    async fn download_census_waterblocks(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError> {
        let name = "censuswaterblocks.zip";
        let url = format!("{}/{name}", self.endpoints.water_blocks);
        self.fetch(&url, output_dir, name).await
    }

    async fn download_2010_census_blocks(
        &self,
        output_dir: &Utf8Path,
        state_fips: &str,
    ) -> Result<(), AcquisitionError> {
        let name = format!("tabblock2010_{state_fips}_pophu.zip");
        let url = format!("{}/{name}", self.endpoints.census_blocks);
        self.fetch(&url, output_dir, &name).await
    }

    async fn download_state_speed_limits(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError> {
        let name = "state_fips_speed.csv";
        let url = format!("{}/{name}", self.endpoints.speed_limits);
        self.fetch(&url, output_dir, name).await
    }

    async fn download_city_speed_limits(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError> {
        let name = "city_fips_speed.csv";
        let url = format!("{}/{name}", self.endpoints.speed_limits);
        self.fetch(&url, output_dir, name).await
    }
}
