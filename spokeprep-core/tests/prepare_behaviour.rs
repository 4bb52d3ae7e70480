//! Behaviour tests for the preparation pipeline driven through recording stubs.
#![expect(clippy::expect_used, reason = "behaviour steps fail fast on broken fixtures")]

use std::cell::RefCell;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use spokeprep_core::test_support::{ALWAYS, StubCollaborators, block_on_for_tests};
use spokeprep_core::{
    ArtifactManifest, Jurisdiction, NON_US_STATE_ABBREV, NON_US_STATE_FIPS, Place, PrepareError,
    PreparationRequest, UsDataset, prepare,
};
use tempfile::TempDir;

struct PrepareWorld {
    _workspace: TempDir,
    output_dir: Utf8PathBuf,
    stubs: StubCollaborators,
    request: RefCell<Option<PreparationRequest>>,
    outcome: RefCell<Option<Result<ArtifactManifest, PrepareError>>>,
}

impl PrepareWorld {
    fn new() -> Self {
        let workspace = TempDir::new().expect("tempdir");
        let output_dir = Utf8PathBuf::from_path_buf(workspace.path().join("data"))
            .expect("utf-8 tempdir");
        Self {
            _workspace: workspace,
            output_dir,
            stubs: StubCollaborators::new(),
            request: RefCell::new(None),
            outcome: RefCell::new(None),
        }
    }

    fn manifest(&self) -> ArtifactManifest {
        self.outcome
            .borrow()
            .as_ref()
            .expect("city prepared")
            .as_ref()
            .expect("preparation succeeded")
            .clone()
    }
}

#[fixture]
fn world() -> PrepareWorld {
    PrepareWorld::new()
}

#[given("a request for providence, rhode island, usa with 3 attempts")]
fn providence_request(#[from(world)] world: &PrepareWorld) {
    let place = Place::new("usa", Some("rhode island"), "providence").expect("valid place");
    let request = PreparationRequest::new(place, world.output_dir.clone())
        .with_speed_limit(40)
        .and_then(|request| request.with_retries(3))
        .expect("valid request");
    *world.request.borrow_mut() = Some(request);
}

#[given("a request for andorra la vella, andorra at 30 km/h")]
fn andorra_request(#[from(world)] world: &PrepareWorld) {
    let place = Place::new("andorra", None::<String>, "andorra la vella").expect("valid place");
    let request = PreparationRequest::new(place, world.output_dir.clone())
        .with_speed_limit(30)
        .and_then(|request| request.with_block_size(200))
        .and_then(|request| request.with_block_population(10))
        .and_then(|request| request.with_retries(2))
        .expect("valid request");
    *world.request.borrow_mut() = Some(request);
}

#[given("the region service has no extract for rhode island")]
fn no_state_extract(#[from(world)] world: &PrepareWorld) {
    world.stubs.missing("region rhode island", ALWAYS);
}

#[given("the water-blocks download always fails")]
fn waterblocks_fail(#[from(world)] world: &PrepareWorld) {
    world.stubs.fail("waterblocks", ALWAYS);
}

#[when("the city is prepared")]
fn prepare_city(#[from(world)] world: &PrepareWorld) {
    let request = world.request.borrow();
    let request = request.as_ref().expect("request configured");
    let outcome = block_on_for_tests(prepare(request, &world.stubs.collaborators()));
    *world.outcome.borrow_mut() = Some(outcome);
}

#[then("the manifest names rhode island")]
fn names_rhode_island(#[from(world)] world: &PrepareWorld) {
    let manifest = world.manifest();
    assert_eq!(manifest.state_abbreviation(), "RI");
    assert_eq!(manifest.state_fips(), "44");
    assert!(manifest.boundary_shape().is_file());
    assert!(manifest.city_network().is_file());
}

#[then("every US dataset is downloaded once on a single released session")]
fn us_datasets_downloaded(#[from(world)] world: &PrepareWorld) {
    let log = world.stubs.log();
    assert_eq!(log.count("open-session"), 1);
    for call in [
        "lodes main",
        "lodes aux",
        "waterblocks",
        "census-blocks 44",
        "state-speed-limits",
        "city-speed-limits",
    ] {
        assert_eq!(log.count(call), 1, "expected one {call} download");
    }
    assert_eq!(log.calls().last().map(String::as_str), Some("release-session"));
    assert_eq!(world.stubs.open_sessions(), 0);
}

#[then("no synthetic data is generated")]
fn no_synthetic_data(#[from(world)] world: &PrepareWorld) {
    let log = world.stubs.log();
    assert_eq!(log.count("read-boundary"), 0);
    assert_eq!(log.count("simulate-census-blocks"), 0);
    assert_eq!(log.count("change-speed-limit"), 0);
}

#[then("the manifest carries the non-US sentinel")]
fn carries_sentinel(#[from(world)] world: &PrepareWorld) {
    let manifest = world.manifest();
    assert_eq!(manifest.jurisdiction(), Jurisdiction::Unclassified);
    assert_eq!(manifest.state_abbreviation(), NON_US_STATE_ABBREV);
    assert_eq!(manifest.state_fips(), NON_US_STATE_FIPS);
}

#[then("no US data session is opened")]
fn no_session(#[from(world)] world: &PrepareWorld) {
    let log = world.stubs.log();
    assert_eq!(log.count("open-session"), 0);
    assert_eq!(log.count("lodes"), 0);
}

#[then("every road is limited to 30 km/h")]
fn speed_limited(#[from(world)] world: &PrepareWorld) {
    assert_eq!(
        world
            .stubs
            .log()
            .count("change-speed-limit andorra la vella ZZ 30"),
        1
    );
}

#[then("the state extract is requested 3 times before the country")]
fn state_then_country(#[from(world)] world: &PrepareWorld) {
    let regions: Vec<_> = world
        .stubs
        .log()
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("region "))
        .collect();
    assert_eq!(
        regions,
        vec![
            "region rhode island".to_owned(),
            "region rhode island".to_owned(),
            "region rhode island".to_owned(),
            "region usa".to_owned(),
        ]
    );
}

#[then("the run fails while acquiring census water blocks")]
fn fails_on_waterblocks(#[from(world)] world: &PrepareWorld) {
    let outcome = world.outcome.borrow();
    let error = outcome
        .as_ref()
        .expect("city prepared")
        .as_ref()
        .expect_err("preparation should fail");
    assert!(matches!(
        error,
        PrepareError::UsData {
            dataset: UsDataset::WaterBlocks,
            ..
        }
    ));
    assert_eq!(world.stubs.log().count("waterblocks"), 3);
}

#[then("the US data session is released")]
fn session_released(#[from(world)] world: &PrepareWorld) {
    assert_eq!(world.stubs.log().count("release-session"), 1);
    assert_eq!(world.stubs.open_sessions(), 0);
}

macro_rules! register_prepare_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/prepare_pipeline.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: PrepareWorld) {
            let _ = world;
        }
    };
}

register_prepare_scenario!(us_city, "preparing a US city downloads census datasets");
register_prepare_scenario!(
    non_us_city,
    "preparing a city outside the US generates synthetic data"
);
register_prepare_scenario!(
    state_fallback,
    "falling back to the country when the state has no extract"
);
register_prepare_scenario!(
    failing_download,
    "aborting when a US dataset stays unavailable"
);
