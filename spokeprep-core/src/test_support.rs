//! Recording stub collaborators used by unit and behaviour tests.
//!
//! Every stub writes small placeholder files where its real counterpart
//! would write artefacts, and records each call in a shared [`CallLog`].
//! Failures are scripted per call label with [`StubCollaborators::fail`] and
//! [`StubCollaborators::missing`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Write};
use std::num::NonZeroU32;
use std::rc::Rc;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use geo::{MultiPolygon, Rect, coord};

use crate::{
    AcquisitionError, BoundaryReader, BoundaryService, Collaborators, Jurisdiction, LodesPart,
    NetworkReducer, Place, PopulationGrid, RegionScope, RegionSource, Slug, SyntheticArtifacts,
    ToolError, TransportError, UsDataSession, UsDataSource,
};

/// Attempts value meaning "fail on every call".
pub const ALWAYS: u32 = u32::MAX;

/// Drive `future` to completion on a fresh current-thread runtime.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build test runtime")
        .block_on(future)
}

/// Ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    fn record(&self, call: &str) {
        self.0.borrow_mut().push(call.to_owned());
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Number of calls whose label starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
enum FailureKind {
    Transport,
    Missing,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    kind: FailureKind,
    remaining: u32,
}

/// Shared log plus scripted failures.
#[derive(Debug, Clone, Default)]
struct Recorder {
    log: CallLog,
    failures: Rc<RefCell<HashMap<String, Failure>>>,
}

impl Recorder {
    /// Record `label` and report the scripted failure for it, if any.
    fn call(&self, label: &str) -> Option<FailureKind> {
        self.log.record(label);
        let mut failures = self.failures.borrow_mut();
        let failure = failures
            .iter_mut()
            .find(|(prefix, failure)| label.starts_with(prefix.as_str()) && failure.remaining > 0)
            .map(|(_, failure)| failure)?;
        if failure.remaining != ALWAYS {
            failure.remaining -= 1;
        }
        Some(failure.kind)
    }

    fn acquire(&self, label: &str) -> Result<(), AcquisitionError> {
        match self.call(label) {
            None => Ok(()),
            Some(FailureKind::Transport) => Err(TransportError::Http {
                url: format!("stub://{label}"),
                status: 503,
                message: "service unavailable".to_owned(),
            }
            .into()),
            Some(FailureKind::Missing) => Err(AcquisitionError::NotFound {
                what: "stub value",
                value: label.to_owned(),
            }),
        }
    }

    fn run_tool(&self, label: &str) -> Result<(), ToolError> {
        match self.call(label) {
            None => Ok(()),
            Some(_) => Err(ToolError::Failed {
                program: label.to_owned(),
                status: Some(1),
                stderr: "scripted failure".to_owned(),
            }),
        }
    }
}

fn write_placeholder(path: &Utf8Path, contents: &str) -> io::Result<()> {
    let mut file = spokeprep_fs::create_utf8_file(path)?;
    file.write_all(contents.as_bytes())
}

fn placeholder_for_acquisition(path: &Utf8Path, contents: &str) -> Result<(), AcquisitionError> {
    write_placeholder(path, contents).map_err(|source| AcquisitionError::Write {
        path: path.to_owned(),
        source,
    })
}

fn placeholder_for_tool(path: &Utf8Path, contents: &str) -> Result<(), ToolError> {
    write_placeholder(path, contents).map_err(|source| ToolError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Writes `{slug}.shp` for the place and returns the slug.
#[derive(Debug, Clone)]
pub struct StubBoundaryService(Recorder);

#[async_trait(?Send)]
impl BoundaryService for StubBoundaryService {
    async fn retrieve_city_boundaries(
        &self,
        output_dir: &Utf8Path,
        place: &Place,
    ) -> Result<Slug, AcquisitionError> {
        self.0.acquire(&format!("boundary {place}"))?;
        let slug = Slug::for_place(place).map_err(|err| AcquisitionError::Decode {
            what: "place name".to_owned(),
            message: err.to_string(),
        })?;
        placeholder_for_acquisition(&output_dir.join(slug.file_name("shp")), "shape")?;
        Ok(slug)
    }
}

/// Writes `{scope}-latest.osm.pbf`.
#[derive(Debug, Clone)]
pub struct StubRegionSource(Recorder);

#[async_trait(?Send)]
impl RegionSource for StubRegionSource {
    async fn retrieve_region_file(
        &self,
        scope: RegionScope<'_>,
        output_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, AcquisitionError> {
        self.0.acquire(&format!("region {scope}"))?;
        let name = Slug::new(scope.name())
            .map(|slug| slug.to_string())
            .unwrap_or_else(|_| "region".to_owned());
        let path = output_dir.join(format!("{name}-latest.osm.pbf"));
        placeholder_for_acquisition(&path, "pbf")?;
        Ok(path)
    }
}

/// Writes the polygon and city network files.
#[derive(Debug, Clone)]
pub struct StubReducer(Recorder);

#[async_trait(?Send)]
impl NetworkReducer for StubReducer {
    async fn prepare_city_file(
        &self,
        _output_dir: &Utf8Path,
        region_file: &Utf8Path,
        polygon_file: &Utf8Path,
        city_network: &Utf8Path,
    ) -> Result<(), ToolError> {
        self.0.run_tool(&format!("reduce {region_file}"))?;
        placeholder_for_tool(polygon_file, "{}")?;
        placeholder_for_tool(city_network, "<osm/>")
    }
}

/// Opens [`StubUsSession`]s and counts how many are still open.
#[derive(Debug, Clone)]
pub struct StubUsDataSource {
    recorder: Recorder,
    open_sessions: Rc<Cell<u32>>,
}

#[async_trait(?Send)]
impl UsDataSource for StubUsDataSource {
    async fn open_session(&self) -> Result<Box<dyn UsDataSession>, AcquisitionError> {
        self.recorder.acquire("open-session")?;
        self.open_sessions.set(self.open_sessions.get() + 1);
        Ok(Box::new(StubUsSession {
            recorder: self.recorder.clone(),
            open_sessions: Rc::clone(&self.open_sessions),
        }))
    }
}

/// Session writing one placeholder per dataset; records its release on drop.
#[derive(Debug)]
pub struct StubUsSession {
    recorder: Recorder,
    open_sessions: Rc<Cell<u32>>,
}

impl Drop for StubUsSession {
    fn drop(&mut self) {
        self.open_sessions.set(self.open_sessions.get() - 1);
        self.recorder.log.record("release-session");
    }
}

#[async_trait(?Send)]
impl UsDataSession for StubUsSession {
    async fn download_lodes_data(
        &self,
        output_dir: &Utf8Path,
        state_abbrev: &str,
        part: LodesPart,
        year: u16,
    ) -> Result<(), AcquisitionError> {
        self.recorder
            .acquire(&format!("lodes {part} {state_abbrev} {year}"))?;
        let name = format!(
            "{}_od_{part}_JT00_{year}.csv",
            state_abbrev.to_ascii_lowercase()
        );
        placeholder_for_acquisition(&output_dir.join(name), "lodes")
    }

    async fn download_census_waterblocks(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError> {
        self.recorder.acquire("waterblocks")?;
        placeholder_for_acquisition(&output_dir.join("censuswaterblocks.zip"), "zip")
    }

    async fn download_2010_census_blocks(
        &self,
        output_dir: &Utf8Path,
        state_fips: &str,
    ) -> Result<(), AcquisitionError> {
        self.recorder.acquire(&format!("census-blocks {state_fips}"))?;
        let name = format!("tabblock2010_{state_fips}_pophu.zip");
        placeholder_for_acquisition(&output_dir.join(name), "zip")
    }

    async fn download_state_speed_limits(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError> {
        self.recorder.acquire("state-speed-limits")?;
        placeholder_for_acquisition(&output_dir.join("state_fips_speed.csv"), "speed")
    }

    async fn download_city_speed_limits(
        &self,
        output_dir: &Utf8Path,
    ) -> Result<(), AcquisitionError> {
        self.recorder.acquire("city-speed-limits")?;
        placeholder_for_acquisition(&output_dir.join("city_fips_speed.csv"), "speed")
    }
}

/// Returns a 0.01-degree square north-east of (1.5, 42.5).
#[derive(Debug, Clone)]
pub struct StubBoundaryReader(Recorder);

#[async_trait(?Send)]
impl BoundaryReader for StubBoundaryReader {
    async fn read_boundary(&self, shape: &Utf8Path) -> Result<MultiPolygon<f64>, ToolError> {
        self.0.run_tool(&format!("read-boundary {shape}"))?;
        let square = Rect::new(coord! { x: 1.5, y: 42.5 }, coord! { x: 1.51, y: 42.51 });
        Ok(MultiPolygon::new(vec![square.to_polygon()]))
    }
}

/// Writes `population.geojson` and `city_fips_speed.csv` placeholders.
#[derive(Debug, Clone)]
pub struct StubSyntheticArtifacts(Recorder);

#[async_trait(?Send)]
impl SyntheticArtifacts for StubSyntheticArtifacts {
    async fn simulate_census_blocks(
        &self,
        output_dir: &Utf8Path,
        grid: &PopulationGrid,
    ) -> Result<(), ToolError> {
        self.0
            .run_tool(&format!("simulate-census-blocks {}", grid.len()))?;
        placeholder_for_tool(
            &output_dir.join("population.geojson"),
            &grid.total_population().to_string(),
        )
    }

    async fn change_speed_limit(
        &self,
        output_dir: &Utf8Path,
        city: &str,
        jurisdiction: &Jurisdiction,
        speed_limit: NonZeroU32,
    ) -> Result<(), ToolError> {
        let abbreviation = jurisdiction.abbreviation();
        self.0
            .run_tool(&format!("change-speed-limit {city} {abbreviation} {speed_limit}"))?;
        placeholder_for_tool(
            &output_dir.join("city_fips_speed.csv"),
            &format!("{city},{abbreviation},{speed_limit}"),
        )
    }
}

/// One of every stub collaborator, sharing a log and a failure script.
#[derive(Debug, Clone)]
pub struct StubCollaborators {
    recorder: Recorder,
    boundaries: StubBoundaryService,
    regions: StubRegionSource,
    reducer: StubReducer,
    us_data: StubUsDataSource,
    boundary_reader: StubBoundaryReader,
    synthetic: StubSyntheticArtifacts,
}

impl Default for StubCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl StubCollaborators {
    /// Stubs that succeed on every call.
    pub fn new() -> Self {
        let recorder = Recorder::default();
        Self {
            boundaries: StubBoundaryService(recorder.clone()),
            regions: StubRegionSource(recorder.clone()),
            reducer: StubReducer(recorder.clone()),
            us_data: StubUsDataSource {
                recorder: recorder.clone(),
                open_sessions: Rc::default(),
            },
            boundary_reader: StubBoundaryReader(recorder.clone()),
            synthetic: StubSyntheticArtifacts(recorder.clone()),
            recorder,
        }
    }

    /// Fail the next `times` calls whose label starts with `prefix`
    /// ([`ALWAYS`] for every call). Acquisitions fail with an HTTP 503;
    /// tools exit with status 1.
    pub fn fail(&self, prefix: &str, times: u32) {
        self.script(prefix, FailureKind::Transport, times);
    }

    /// Report "not found" for the next `times` matching acquisitions.
    pub fn missing(&self, prefix: &str, times: u32) {
        self.script(prefix, FailureKind::Missing, times);
    }

    fn script(&self, prefix: &str, kind: FailureKind, remaining: u32) {
        self.recorder
            .failures
            .borrow_mut()
            .insert(prefix.to_owned(), Failure { kind, remaining });
    }

    /// The shared call log.
    pub fn log(&self) -> &CallLog {
        &self.recorder.log
    }

    /// US sessions opened and not yet released.
    pub fn open_sessions(&self) -> u32 {
        self.us_data.open_sessions.get()
    }

    /// Borrow the stubs as pipeline collaborators.
    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            boundaries: &self.boundaries,
            regions: &self.regions,
            reducer: &self.reducer,
            us_data: &self.us_data,
            boundary_reader: &self.boundary_reader,
            synthetic: &self.synthetic,
        }
    }
}
