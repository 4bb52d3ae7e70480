//! Synthetic stand-ins for the US census and speed-limit datasets.

use std::borrow::Cow;
use std::io::{self, BufWriter, Write};
use std::num::NonZeroU32;

use async_trait::async_trait;
use camino::Utf8Path;
use log::info;
use spokeprep_core::{
    Jurisdiction, LODES_YEAR, LodesPart, NON_US_STATE_ABBREV, PopulationGrid, SyntheticArtifacts,
    ToolError,
};

use crate::geojson::encode_population;
use crate::us::lodes_file_name;
use crate::{Tools, tool};

const POPULATION_GEOJSON: &str = "population.geojson";
const POPULATION_SHAPE: &str = "population.shp";
const CITY_SPEED_TABLE: &str = "city_fips_speed.csv";

/// Column header of a LODES origin/destination table.
pub const LODES_HEADER: &str =
    "w_geocode,h_geocode,S000,SA01,SA02,SA03,SE01,SE02,SE03,SI01,SI02,SI03,createdate";

/// Column header of the city speed-limit table.
pub const CITY_SPEED_HEADER: &str = "city,state,fips_code_city,speed";

/// Writes population blocks, empty LODES tables, and speed overrides.
#[derive(Debug, Clone, Default)]
pub struct SyntheticArtifactWriter {
    tools: Tools,
}

impl SyntheticArtifactWriter {
    /// Writer running the given tool programs.
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }
}

fn write_file(
    path: &Utf8Path,
    contents: impl FnOnce(&mut dyn Write) -> io::Result<()>,
) -> Result<(), ToolError> {
    let io_error = |source| ToolError::Io {
        path: path.to_owned(),
        source,
    };
    let file = spokeprep_fs::create_utf8_file(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    contents(&mut writer).map_err(io_error)?;
    writer.flush().map_err(io_error)
}

/// Quote `field` when it holds a delimiter, quote, or line break.
///
/// Embedded quotes are doubled, as RFC 4180 requires.
fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Data row assigning `speed_limit` to every street in `city`.
pub fn city_speed_row(city: &str, jurisdiction: &Jurisdiction, speed_limit: NonZeroU32) -> String {
    format!(
        "{},{},{}000000,{speed_limit}",
        csv_field(city),
        jurisdiction.abbreviation().to_ascii_lowercase(),
        jurisdiction.identifier(),
    )
}

#[async_trait(?Send)]
impl SyntheticArtifacts for SyntheticArtifactWriter {
    async fn simulate_census_blocks(
        &self,
        output_dir: &Utf8Path,
        grid: &PopulationGrid,
    ) -> Result<(), ToolError> {
        let geojson = output_dir.join(POPULATION_GEOJSON);
        let document = encode_population(grid);
        write_file(&geojson, |writer| {
            serde_json::to_writer(writer, &document).map_err(io::Error::from)
        })?;

        let shape = output_dir.join(POPULATION_SHAPE);
        tool::run(
            self.tools.ogr2ogr(),
            &["-f", "ESRI Shapefile", "-overwrite", shape.as_str(), geojson.as_str()],
        )
        .await?;

        for part in LodesPart::ALL {
            let table = output_dir.join(lodes_file_name(NON_US_STATE_ABBREV, part, LODES_YEAR));
            write_file(&table, |writer| writeln!(writer, "{LODES_HEADER}"))?;
        }
        info!(
            "simulated {} census blocks housing {} people",
            grid.len(),
            grid.total_population()
        );
        Ok(())
    }

    async fn change_speed_limit(
        &self,
        output_dir: &Utf8Path,
        city: &str,
        jurisdiction: &Jurisdiction,
        speed_limit: NonZeroU32,
    ) -> Result<(), ToolError> {
        let row = city_speed_row(city, jurisdiction, speed_limit);
        write_file(&output_dir.join(CITY_SPEED_TABLE), |writer| {
            writeln!(writer, "{CITY_SPEED_HEADER}")?;
            writeln!(writer, "{row}")
        })?;
        info!("set the {city} speed limit to {speed_limit}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use geo::{MultiPolygon, Rect, coord};
    use rstest::{fixture, rstest};
    use spokeprep_core::classify;
    use tempfile::TempDir;

    struct Workspace {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Workspace { _dir: dir, root }
    }

    fn limit(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).expect("non-zero")
    }

    #[rstest]
    fn non_us_rows_use_the_sentinel_identifier() {
        assert_eq!(
            city_speed_row("andorra la vella", &Jurisdiction::Unclassified, limit(30)),
            "andorra la vella,zz,0000000,30"
        );
    }

    #[rstest]
    #[case("Saint-Denis, La Reunion", "\"Saint-Denis, La Reunion\",zz,0000000,30")]
    #[case("the \"big\" city", "\"the \"\"big\"\" city\",zz,0000000,30")]
    #[case("ordino", "ordino,zz,0000000,30")]
    fn city_names_are_quoted_when_needed(#[case] city: &str, #[case] expected: &str) {
        let row = city_speed_row(city, &Jurisdiction::Unclassified, limit(30));
        assert_eq!(row, expected);
        assert_eq!(unquoted_field_count(&row), CITY_SPEED_HEADER.split(',').count());
    }

    /// Commas outside quoted sections, plus one.
    fn unquoted_field_count(row: &str) -> usize {
        let mut quoted = false;
        let mut fields = 1;
        for ch in row.chars() {
            match ch {
                '"' => quoted = !quoted,
                ',' if !quoted => fields += 1,
                _ => {}
            }
        }
        fields
    }

    #[rstest]
    fn us_rows_use_the_state_fips() {
        let jurisdiction = Jurisdiction::Classified(classify("Rhode Island").expect("known state"));
        assert_eq!(
            city_speed_row("providence", &jurisdiction, limit(25)),
            "providence,ri,44000000,25"
        );
    }

    #[rstest]
    #[tokio::test]
    async fn writes_the_speed_table(workspace: Workspace) {
        let writer = SyntheticArtifactWriter::default();

        writer
            .change_speed_limit(&workspace.root, "ordino", &Jurisdiction::Unclassified, limit(40))
            .await
            .expect("speed table written");

        let table = std::fs::read_to_string(workspace.root.join(CITY_SPEED_TABLE))
            .expect("table readable");
        assert_eq!(table, "city,state,fips_code_city,speed\nordino,zz,0000000,40\n");
    }

    #[cfg(unix)]
    #[rstest]
    #[tokio::test]
    async fn writes_population_and_empty_lodes_tables(workspace: Workspace) {
        let square = Rect::new(coord! { x: 1.5, y: 42.5 }, coord! { x: 1.51, y: 42.51 });
        let boundary = MultiPolygon::new(vec![square.to_polygon()]);
        let grid = PopulationGrid::cover(&boundary, limit(500), limit(10)).expect("grid");
        let writer = SyntheticArtifactWriter::new(Tools::default().with_ogr2ogr("true"));

        writer
            .simulate_census_blocks(&workspace.root, &grid)
            .await
            .expect("blocks simulated");

        let geojson: serde_json::Value = serde_json::from_slice(
            &std::fs::read(workspace.root.join(POPULATION_GEOJSON)).expect("geojson written"),
        )
        .expect("valid json");
        assert_eq!(
            geojson["features"].as_array().map(Vec::len),
            Some(grid.len())
        );
        for name in ["zz_od_main_JT00_2019.csv", "zz_od_aux_JT00_2019.csv"] {
            let table = std::fs::read_to_string(workspace.root.join(name)).expect("table written");
            assert_eq!(table.trim_end(), LODES_HEADER);
        }
    }

    #[cfg(unix)]
    #[rstest]
    #[tokio::test]
    async fn conversion_failures_are_reported(workspace: Workspace) {
        let square = Rect::new(coord! { x: 1.5, y: 42.5 }, coord! { x: 1.51, y: 42.51 });
        let boundary = MultiPolygon::new(vec![square.to_polygon()]);
        let grid = PopulationGrid::cover(&boundary, limit(500), limit(10)).expect("grid");
        let writer = SyntheticArtifactWriter::new(Tools::default().with_ogr2ogr("false"));

        let err = writer
            .simulate_census_blocks(&workspace.root, &grid)
            .await
            .expect_err("conversion fails");

        assert!(matches!(err, ToolError::Failed { .. }));
    }
}
