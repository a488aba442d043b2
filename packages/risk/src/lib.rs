#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Near-repeat risk scoring.
//!
//! For a prediction instant `t0`, every incident in the trailing lookback
//! window contributes `exp(-d / sigma) * exp(-age / tau)` to each grid cell
//! whose center lies within `radius` of it, where `d` is the distance to the
//! cell center in meters and `age` is the incident's age in days. Incidents
//! beyond the radius contribute exactly nothing.
//!
//! Scores are relative. Divide by [`RiskMap::max_risk`] for display, but
//! rank on the raw values.

pub mod hotspots;

use chrono::NaiveDateTime;
use near_repeat_grid::{GridError, build_local};
use near_repeat_incident_models::{Incident, IncidentTable};
use near_repeat_risk_models::{
    Grid, ParameterError, RiskMap, RiskParams, ScoredCell, require_positive_finite,
};
use near_repeat_spatial::PointIndex;
use rayon::prelude::*;

pub use hotspots::hotspots;

/// Errors that can occur during risk scoring.
#[derive(Debug, thiserror::Error)]
pub enum RiskError {
    /// A kernel parameter was invalid.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// The local grid could not be built.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Weight of an incident `distance_m` away from a cell center.
#[must_use]
pub fn spatial_weight(distance_m: f64, sigma_m: f64) -> f64 {
    (-distance_m / sigma_m).exp()
}

/// Weight of an incident `age_days` old.
#[must_use]
pub fn temporal_weight(age_days: f64, tau_days: f64) -> f64 {
    (-age_days / tau_days).exp()
}

/// Scores every cell of `grid` at `t0`.
///
/// Only incidents with `t0 - lookback_days <= dt < t0` are considered. If
/// there are none, every cell scores `0`.
///
/// # Errors
///
/// Returns [`RiskError::Parameter`] if `sigma_m`, `tau_days`, or `radius_m`
/// is not strictly positive.
pub fn compute_risk(
    incidents: &IncidentTable,
    grid: &Grid,
    t0: NaiveDateTime,
    params: &RiskParams,
) -> Result<RiskMap, RiskError> {
    params.validate()?;
    let recent = incidents.recent(t0, params.lookback_days);
    Ok(score_grid(recent, grid, t0, params))
}

/// Scores a [`GridMode::Local`](near_repeat_risk_models::GridMode::Local)
/// grid fitted to the recent window at `t0`, padded by `radius_m`.
///
/// This is the fast path for single-date queries. The resulting cells do not
/// line up with a backtest's global grid.
///
/// # Errors
///
/// Returns [`RiskError::Parameter`] for invalid kernel parameters and
/// [`RiskError::Grid`] if the grid cannot be built (including an infinite
/// `radius_m`, which cannot serve as padding).
pub fn compute_local_risk(
    incidents: &IncidentTable,
    t0: NaiveDateTime,
    params: &RiskParams,
    cell_size_m: f64,
) -> Result<RiskMap, RiskError> {
    params.validate()?;
    require_positive_finite("cell_size_m", cell_size_m)?;
    let recent = incidents.recent(t0, params.lookback_days);
    let grid = build_local(recent, cell_size_m, params.radius_m)?;
    Ok(score_grid(recent, &grid, t0, params))
}

fn score_grid(
    recent: &[Incident],
    grid: &Grid,
    t0: NaiveDateTime,
    params: &RiskParams,
) -> RiskMap {
    let cells = if recent.is_empty() {
        grid.cells
            .iter()
            .map(|&cell| ScoredCell { cell, risk: 0.0 })
            .collect()
    } else {
        let index = PointIndex::new(recent.iter().map(Incident::point));
        let time_weights: Vec<f64> = recent
            .iter()
            .map(|incident| temporal_weight(incident.age_days(t0), params.tau_days))
            .collect();

        grid.cells
            .par_iter()
            .map(|&cell| {
                let risk = index
                    .within_radius([cell.x, cell.y], params.radius_m)
                    .iter()
                    .map(|hit| {
                        spatial_weight(hit.distance, params.sigma_m) * time_weights[hit.index]
                    })
                    .sum();
                ScoredCell { cell, risk }
            })
            .collect()
    };

    log::debug!(
        "Scored {} {} cells at {t0} from {} recent incidents",
        grid.len(),
        grid.mode,
        recent.len()
    );

    RiskMap {
        t0,
        params: *params,
        spec: grid.spec,
        mode: grid.mode,
        cells,
    }
}
