//! Synthetic population grids for jurisdictions without census data.
//!
//! The grid is laid out in a local equirectangular approximation centred on
//! the boundary's mean latitude. That keeps cells close to square at city
//! scale without a projection library.

use std::num::NonZeroU32;

use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Polygon, Rect};
use thiserror::Error;

/// Metres spanned by one degree of latitude.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Upper bound on the number of cells considered for one boundary.
pub const MAX_CELLS: u64 = 4_000_000;

/// Errors returned by [`PopulationGrid::cover`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntheticError {
    /// The boundary held no coordinates.
    #[error("boundary has no geometry to cover")]
    EmptyBoundary,
    /// The boundary sits where longitude degrees collapse (near a pole).
    #[error("cannot lay a metric grid at latitude {latitude}")]
    DegenerateLatitude { latitude: f64 },
    /// The cell size is too small for the boundary's extent.
    #[error("{cell_size} m cells would need more than {MAX_CELLS} cells")]
    TooManyCells { cell_size: u32 },
}

/// One populated grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationCell {
    /// Fifteen-digit block identifier, unique within the grid.
    pub block_id: String,
    /// People living in the cell.
    pub population: u32,
    /// Cell footprint in longitude/latitude.
    pub footprint: Polygon<f64>,
}

/// Square cells covering a boundary, each carrying the same population.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationGrid {
    cells: Vec<PopulationCell>,
    cell_size: NonZeroU32,
}

impl PopulationGrid {
    /// Cover `boundary` with `cell_size`-metre cells of `population` people.
    ///
    /// Cells are kept when they intersect the boundary, so the grid always
    /// reaches the boundary's edge.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroU32;
    /// use geo::{MultiPolygon, Rect, coord};
    /// use spokeprep_core::PopulationGrid;
    ///
    /// # fn main() -> Result<(), spokeprep_core::SyntheticError> {
    /// let square = Rect::new(coord! { x: 1.5, y: 42.5 }, coord! { x: 1.51, y: 42.51 });
    /// let boundary = MultiPolygon::new(vec![square.to_polygon()]);
    /// let size = NonZeroU32::new(500).expect("non-zero");
    /// let people = NonZeroU32::new(10).expect("non-zero");
    /// let grid = PopulationGrid::cover(&boundary, size, people)?;
    /// assert!(!grid.is_empty());
    /// # Ok(())
    /// # }
    /// ```
    #[expect(
        clippy::float_arithmetic,
        reason = "cell corners are offsets in degrees from the bounding rectangle"
    )]
    pub fn cover(
        boundary: &MultiPolygon<f64>,
        cell_size: NonZeroU32,
        population: NonZeroU32,
    ) -> Result<Self, SyntheticError> {
        let bounds = boundary
            .bounding_rect()
            .ok_or(SyntheticError::EmptyBoundary)?;
        let latitude = (bounds.min().y + bounds.max().y) / 2.0;
        let scale = latitude.to_radians().cos();
        if !scale.is_finite() || scale <= 1.0e-6 {
            return Err(SyntheticError::DegenerateLatitude { latitude });
        }

        let step_y = f64::from(cell_size.get()) / METRES_PER_DEGREE;
        let step_x = step_y / scale;
        let too_many = SyntheticError::TooManyCells {
            cell_size: cell_size.get(),
        };
        let rows = cells_along(bounds.height(), step_y).ok_or_else(|| too_many.clone())?;
        let columns = cells_along(bounds.width(), step_x).ok_or_else(|| too_many.clone())?;
        if u64::from(rows) * u64::from(columns) > MAX_CELLS {
            return Err(too_many);
        }

        let origin = bounds.min();
        let mut cells = Vec::new();
        for row in 0..rows {
            for column in 0..columns {
                let min = Coord {
                    x: origin.x + f64::from(column) * step_x,
                    y: origin.y + f64::from(row) * step_y,
                };
                let max = Coord {
                    x: min.x + step_x,
                    y: min.y + step_y,
                };
                let footprint = Rect::new(min, max).to_polygon();
                if boundary.intersects(&footprint) {
                    cells.push(PopulationCell {
                        block_id: format!("{:015}", cells.len()),
                        population: population.get(),
                        footprint,
                    });
                }
            }
        }
        if cells.is_empty() {
            return Err(SyntheticError::EmptyBoundary);
        }
        Ok(Self { cells, cell_size })
    }

    /// Populated cells in row-major order from the south-west corner.
    pub fn cells(&self) -> &[PopulationCell] {
        &self.cells
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid holds no cells. Never true for a grid built by
    /// [`PopulationGrid::cover`].
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell edge length in metres.
    pub fn cell_size(&self) -> NonZeroU32 {
        self.cell_size
    }

    /// Sum of all cell populations.
    pub fn total_population(&self) -> u64 {
        self.cells
            .iter()
            .map(|cell| u64::from(cell.population))
            .sum()
    }
}

/// Cells needed to span `extent` degrees in `step`-degree increments.
#[expect(
    clippy::float_arithmetic,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the count is finite, at least one, and checked against u32::MAX before the cast"
)]
fn cells_along(extent: f64, step: f64) -> Option<u32> {
    let count = (extent / step).ceil().max(1.0);
    if count.is_finite() && count <= f64::from(u32::MAX) {
        Some(count as u32)
    } else {
        None
    }
}
