//! Unit tests for the preparation pipeline.

use super::*;
use crate::test_support::{ALWAYS, StubCollaborators, block_on_for_tests};
use crate::{NON_US_STATE_ABBREV, NON_US_STATE_FIPS, ToolError, TransportError};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn workspace() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    (dir, root)
}

fn providence(output_dir: &Utf8Path) -> PreparationRequest {
    let place = Place::new("usa", Some("rhode island"), "providence").expect("valid place");
    PreparationRequest::new(place, output_dir.join("out"))
        .with_speed_limit(40)
        .and_then(|request| request.with_retries(3))
        .expect("valid request")
}

fn andorra(output_dir: &Utf8Path) -> PreparationRequest {
    let place = Place::new("andorra", None::<String>, "andorra la vella").expect("valid place");
    PreparationRequest::new(place, output_dir.join("out"))
        .with_speed_limit(30)
        .and_then(|request| request.with_block_size(200))
        .and_then(|request| request.with_block_population(10))
        .and_then(|request| request.with_retries(2))
        .expect("valid request")
}

fn run(
    request: &PreparationRequest,
    stubs: &StubCollaborators,
) -> Result<ArtifactManifest, PrepareError> {
    block_on_for_tests(prepare(request, &stubs.collaborators()))
}

#[rstest]
fn us_request_downloads_every_dataset_on_one_session(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    let request = providence(&root);

    let manifest = run(&request, &stubs).expect("pipeline succeeds");

    assert_eq!(manifest.state_abbreviation(), "RI");
    assert_eq!(manifest.state_fips(), "44");
    assert_eq!(
        manifest.city_network(),
        request
            .output_dir()
            .join("providence-rhode-island-usa.osm")
    );
    assert_eq!(
        stubs.log().calls(),
        vec![
            "boundary providence, rhode island, usa".to_owned(),
            "region rhode island".to_owned(),
            format!(
                "reduce {}",
                request.output_dir().join("rhode-island-latest.osm.pbf")
            ),
            "open-session".to_owned(),
            "lodes main RI 2019".to_owned(),
            "lodes aux RI 2019".to_owned(),
            "waterblocks".to_owned(),
            "census-blocks 44".to_owned(),
            "state-speed-limits".to_owned(),
            "city-speed-limits".to_owned(),
            "release-session".to_owned(),
        ]
    );
    assert_eq!(stubs.open_sessions(), 0);
    assert_eq!(stubs.log().count("read-boundary"), 0);
}

#[rstest]
fn non_us_request_generates_synthetic_data(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    let request = andorra(&root);

    let manifest = run(&request, &stubs).expect("pipeline succeeds");

    assert_eq!(manifest.state_abbreviation(), NON_US_STATE_ABBREV);
    assert_eq!(manifest.state_fips(), NON_US_STATE_FIPS);
    assert_eq!(manifest.jurisdiction(), Jurisdiction::Unclassified);
    assert_eq!(stubs.log().count("open-session"), 0);
    assert_eq!(stubs.log().count("region "), 1);
    assert_eq!(stubs.log().count("simulate-census-blocks"), 1);
    assert_eq!(
        stubs.log().count("change-speed-limit andorra la vella ZZ 30"),
        1
    );
    let speed = std::fs::read_to_string(request.output_dir().join("city_fips_speed.csv"))
        .expect("speed-limit override written");
    assert!(speed.ends_with(",30"));
}

#[rstest]
fn missing_state_region_falls_back_to_country(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    stubs.missing("region rhode island", ALWAYS);

    run(&providence(&root), &stubs).expect("pipeline succeeds");

    // The state scope spends its whole budget before the country is tried.
    assert_eq!(stubs.log().count("region rhode island"), 3);
    assert_eq!(stubs.log().count("region usa"), 1);
}

#[rstest]
fn transport_failure_on_state_region_does_not_fall_back(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    stubs.fail("region rhode island", ALWAYS);

    let err = run(&providence(&root), &stubs).expect_err("region failure aborts");

    assert!(matches!(
        err,
        PrepareError::Region { ref scope, source: AcquisitionError::Transport(_) }
            if scope == "rhode island"
    ));
    assert_eq!(stubs.log().count("region usa"), 0);
}

#[rstest]
fn absent_state_skips_the_state_scope(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();

    run(&andorra(&root), &stubs).expect("pipeline succeeds");

    let regions: Vec<_> = stubs
        .log()
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("region "))
        .collect();
    assert_eq!(regions, vec!["region andorra".to_owned()]);
}

#[rstest]
#[case(1)]
#[case(2)]
fn transient_boundary_failures_are_retried(
    workspace: (TempDir, Utf8PathBuf),
    #[case] failures: u32,
) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    stubs.fail("boundary", failures);

    run(&providence(&root), &stubs).expect("pipeline recovers");

    assert_eq!(stubs.log().count("boundary"), failures as usize + 1);
}

#[rstest]
fn exhausted_boundary_retries_abort_with_the_last_error(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    stubs.fail("boundary", ALWAYS);

    let err = run(&providence(&root), &stubs).expect_err("boundary failure aborts");

    assert!(matches!(
        err,
        PrepareError::Boundary(AcquisitionError::Transport(TransportError::Http {
            status: 503,
            ..
        }))
    ));
    assert_eq!(stubs.log().count("boundary"), 3);
    assert_eq!(stubs.log().count("region"), 0);
}

#[rstest]
fn reduction_failures_are_not_retried(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    stubs.fail("reduce", 1);

    let err = run(&providence(&root), &stubs).expect_err("reduction failure aborts");

    assert!(matches!(err, PrepareError::Reduction(ToolError::Failed { .. })));
    assert_eq!(stubs.log().count("reduce"), 1);
    assert_eq!(stubs.log().count("open-session"), 0);
}

#[rstest]
fn session_is_released_when_a_download_fails(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    stubs.fail("waterblocks", ALWAYS);

    let err = run(&providence(&root), &stubs).expect_err("download failure aborts");

    assert!(matches!(
        err,
        PrepareError::UsData {
            dataset: UsDataset::WaterBlocks,
            ..
        }
    ));
    assert_eq!(stubs.log().count("waterblocks"), 3);
    assert_eq!(stubs.log().count("census-blocks"), 0);
    assert_eq!(stubs.log().count("release-session"), 1);
    assert_eq!(stubs.open_sessions(), 0);
}

#[rstest]
fn synthetic_failures_are_not_retried(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    stubs.fail("simulate-census-blocks", 1);

    let err = run(&andorra(&root), &stubs).expect_err("synthetic failure aborts");

    assert!(matches!(
        err,
        PrepareError::Synthetic {
            step: SyntheticStep::CensusBlocks,
            ..
        }
    ));
    assert_eq!(stubs.log().count("simulate-census-blocks"), 1);
    assert_eq!(stubs.log().count("change-speed-limit"), 0);
}

#[rstest]
fn rerunning_a_request_overwrites_the_same_files(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let request = providence(&root);
    let list = || {
        let mut names: Vec<_> = std::fs::read_dir(request.output_dir())
            .expect("read output dir")
            .map(|entry| entry.expect("dir entry").file_name())
            .collect();
        names.sort();
        names
    };

    let first = run(&request, &StubCollaborators::new()).expect("first run");
    let files_after_first = list();
    let second = run(&request, &StubCollaborators::new()).expect("second run");

    assert_eq!(first, second);
    assert_eq!(list(), files_after_first);
}

#[rstest]
fn unnameable_places_are_rejected_before_any_call(workspace: (TempDir, Utf8PathBuf)) {
    let (_guard, root) = workspace;
    let stubs = StubCollaborators::new();
    let place = Place::new("…", None::<String>, "«»").expect("non-blank place");
    let request = PreparationRequest::new(place, root.join("out"));

    let err = run(&request, &stubs).expect_err("no slug for the place");

    assert!(matches!(err, PrepareError::InvalidRequest(_)));
    assert!(stubs.log().calls().is_empty());
}
