//! Minimal GeoJSON reading and writing for boundary and population data.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Value, json};
use spokeprep_core::PopulationGrid;

/// A GeoJSON feature collection.
#[derive(Debug, Deserialize)]
pub(crate) struct FeatureCollection {
    #[serde(default)]
    pub(crate) features: Vec<Feature>,
}

/// One feature; properties are kept verbatim.
#[derive(Debug, Deserialize)]
pub(crate) struct Feature {
    pub(crate) geometry: Option<Geometry>,
    #[serde(default)]
    pub(crate) properties: Value,
}

/// Geometries the boundary readers care about.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Other,
}

impl Geometry {
    /// Polygons carried by this geometry; empty for non-polygonal types.
    pub(crate) fn polygons(&self) -> Result<Vec<Polygon<f64>>, String> {
        match self {
            Self::Polygon { coordinates } => Ok(vec![polygon(coordinates)?]),
            Self::MultiPolygon { coordinates } => {
                coordinates.iter().map(|rings| polygon(rings)).collect()
            }
            Self::Other => Ok(Vec::new()),
        }
    }

    /// GeoJSON representation, for re-serialising a selected boundary.
    pub(crate) fn to_value(&self) -> Value {
        match self {
            Self::Polygon { coordinates } => {
                json!({ "type": "Polygon", "coordinates": coordinates })
            }
            Self::MultiPolygon { coordinates } => {
                json!({ "type": "MultiPolygon", "coordinates": coordinates })
            }
            Self::Other => Value::Null,
        }
    }
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, String> {
    let mut rings = rings.iter().map(|ring| ring_from(ring));
    let exterior = rings
        .next()
        .ok_or_else(|| "polygon has no exterior ring".to_owned())??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from(positions: &[Vec<f64>]) -> Result<LineString<f64>, String> {
    positions
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(format!("position {position:?} has fewer than two ordinates")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

/// Collect every polygon in a feature collection into one multipolygon.
pub(crate) fn decode_boundary(bytes: &[u8]) -> Result<MultiPolygon<f64>, String> {
    let collection: FeatureCollection =
        serde_json::from_slice(bytes).map_err(|err| err.to_string())?;
    let mut polygons = Vec::new();
    for geometry in collection.features.iter().filter_map(|f| f.geometry.as_ref()) {
        polygons.extend(geometry.polygons()?);
    }
    if polygons.is_empty() {
        return Err("no polygon features".to_owned());
    }
    Ok(MultiPolygon::new(polygons))
}

/// Census-block-shaped feature collection for a synthetic grid.
pub(crate) fn encode_population(grid: &PopulationGrid) -> Value {
    let features: Vec<Value> = grid
        .cells()
        .iter()
        .map(|cell| {
            let ring: Vec<[f64; 2]> = cell
                .footprint
                .exterior()
                .coords()
                .map(|coord| [coord.x, coord.y])
                .collect();
            json!({
                "type": "Feature",
                "properties": { "BLOCKID10": cell.block_id, "POP10": cell.population },
                "geometry": { "type": "Polygon", "coordinates": [ring] },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}
