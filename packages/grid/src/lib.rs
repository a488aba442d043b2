#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Regular planar grids over incident extents.
//!
//! A grid is fully determined by its [`GridSpec`] and cell counts: cell
//! `(ix, iy)` covers `[xmin + ix * s, xmin + (ix + 1) * s)` on x (likewise
//! y), and [`cell_identity`] maps any point, center or not, back to the cell
//! containing it.
//!
//! Two extents are supported. [`GridMode::Global`] covers every incident and
//! is what backtests use. [`GridMode::Local`] covers only the recent window
//! plus a padding margin and is meant for one-off interactive queries.

use near_repeat_incident_models::Incident;
use near_repeat_risk_models::{
    Cell, CellId, Extent, Grid, GridMode, GridSpec, ParameterError, require_positive_finite,
};

/// Upper bound on cells in one grid.
pub const MAX_CELLS: usize = 25_000_000;

/// Errors that can occur while building a grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// Cell size or padding was invalid.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// An input point has a NaN or infinite coordinate.
    #[error("point ({x}, {y}) has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Easting of the offending point.
        x: f64,
        /// Northing of the offending point.
        y: f64,
    },

    /// The padded bounding box overflowed.
    #[error("grid extent is not finite: {extent:?}")]
    NonFiniteExtent {
        /// The offending bounding box.
        extent: Extent,
    },

    /// The extent and cell size would produce an unreasonably large grid.
    #[error("grid of {nx} x {ny} cells exceeds the limit of {limit} cells")]
    TooManyCells {
        /// Cells along x.
        nx: usize,
        /// Cells along y.
        ny: usize,
        /// The configured ceiling.
        limit: usize,
    },
}

/// Maps an arbitrary point to the identity of the cell containing it.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn cell_identity(x: f64, y: f64, spec: &GridSpec) -> CellId {
    CellId {
        ix: ((x - spec.xmin) / spec.cell_size).floor() as i64,
        iy: ((y - spec.ymin) / spec.cell_size).floor() as i64,
    }
}

/// Center point of the cell with identity `id`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cell_center(id: CellId, spec: &GridSpec) -> (f64, f64) {
    (
        spec.cell_size.mul_add(id.ix as f64 + 0.5, spec.xmin),
        spec.cell_size.mul_add(id.iy as f64 + 0.5, spec.ymin),
    )
}

/// Number of cells needed along one axis: `floor((max - min) / size) + 1`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_count(min: f64, max: f64, cell_size: f64) -> usize {
    ((max - min) / cell_size).floor() as usize + 1
}

/// Tiles `extent` with square cells, row by row.
///
/// `None` yields an empty grid anchored at the origin.
///
/// # Errors
///
/// * [`GridError::Parameter`] if `cell_size` is not positive and finite
/// * [`GridError::NonFiniteExtent`] if the extent has a non-finite bound
/// * [`GridError::TooManyCells`] if the grid would exceed [`MAX_CELLS`]
pub fn grid_from_extent(
    extent: Option<Extent>,
    cell_size: f64,
    mode: GridMode,
) -> Result<Grid, GridError> {
    let cell_size = require_positive_finite("cell_size", cell_size)?;

    let Some(extent) = extent else {
        log::debug!("No points for {mode} grid; returning an empty grid");
        return Ok(Grid {
            spec: GridSpec {
                xmin: 0.0,
                ymin: 0.0,
                cell_size,
            },
            mode,
            nx: 0,
            ny: 0,
            cells: Vec::new(),
        });
    };

    if !extent.is_finite() {
        return Err(GridError::NonFiniteExtent { extent });
    }

    let nx = axis_count(extent.xmin, extent.xmax, cell_size);
    let ny = axis_count(extent.ymin, extent.ymax, cell_size);
    if nx.checked_mul(ny).is_none_or(|total| total > MAX_CELLS) {
        return Err(GridError::TooManyCells {
            nx,
            ny,
            limit: MAX_CELLS,
        });
    }

    let spec = GridSpec {
        xmin: extent.xmin,
        ymin: extent.ymin,
        cell_size,
    };

    let mut cells = Vec::with_capacity(nx * ny);
    for iy in 0..ny {
        for ix in 0..nx {
            let id = CellId {
                ix: i64::try_from(ix).unwrap_or(i64::MAX),
                iy: i64::try_from(iy).unwrap_or(i64::MAX),
            };
            let (x, y) = cell_center(id, &spec);
            cells.push(Cell { id, x, y });
        }
    }

    log::info!(
        "Built {mode} grid: {nx} x {ny} = {} cells of {cell_size} m",
        cells.len()
    );

    Ok(Grid {
        spec,
        mode,
        nx,
        ny,
        cells,
    })
}

fn extent_of(incidents: &[Incident]) -> Result<Option<Extent>, GridError> {
    if let Some(bad) = incidents
        .iter()
        .find(|i| !(i.x.is_finite() && i.y.is_finite()))
    {
        return Err(GridError::NonFiniteCoordinate { x: bad.x, y: bad.y });
    }
    Ok(Extent::of_points(incidents.iter().map(Incident::point)))
}

/// Grid over the bounding box of every incident.
///
/// # Errors
///
/// [`GridError::NonFiniteCoordinate`] for a NaN or infinite input point,
/// plus everything [`grid_from_extent`] rejects.
pub fn build_global(incidents: &[Incident], cell_size: f64) -> Result<Grid, GridError> {
    grid_from_extent(extent_of(incidents)?, cell_size, GridMode::Global)
}

/// Grid over the bounding box of `recent`, padded by `padding_m` on every
/// side so cells at the edge still see incidents just outside the box.
///
/// # Errors
///
/// [`GridError::Parameter`] if `padding_m` is negative or non-finite, plus
/// everything [`build_global`] rejects.
pub fn build_local(
    recent: &[Incident],
    cell_size: f64,
    padding_m: f64,
) -> Result<Grid, GridError> {
    if !(padding_m >= 0.0 && padding_m.is_finite()) {
        return Err(ParameterError {
            name: "padding_m",
            value: padding_m,
            requirement: "must be non-negative and finite",
        }
        .into());
    }
    grid_from_extent(
        extent_of(recent)?.map(|e| e.padded(padding_m)),
        cell_size,
        GridMode::Local,
    )
}

/// Builds a grid in either mode. `padding_m` only applies to
/// [`GridMode::Local`].
///
/// # Errors
///
/// See [`build_global`] and [`build_local`].
pub fn build_grid(
    incidents: &[Incident],
    cell_size: f64,
    mode: GridMode,
    padding_m: f64,
) -> Result<Grid, GridError> {
    match mode {
        GridMode::Global => build_global(incidents, cell_size),
        GridMode::Local => build_local(incidents, cell_size, padding_m),
    }
}
