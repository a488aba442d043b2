#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rolling backtest of the near-repeat model.
//!
//! For every calendar day in a range, the model predicts from incidents
//! strictly before midnight, flags its top-K cells, and is scored against
//! the incidents that actually occur during that day. The same run is
//! repeated with time decay disabled to give a baseline. Both variants share
//! one global grid so cell identities are stable across days.

pub mod progress;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use near_repeat_backtest_models::{DayResult, Report, Variant};
use near_repeat_grid::{GridError, build_global, cell_identity};
use near_repeat_incident_models::{Incident, IncidentTable};
use near_repeat_risk::{RiskError, compute_risk};
use near_repeat_risk_models::{CellId, Grid, ModelParams, ParameterError, RiskMap, RiskParams};
use rayon::prelude::*;

use crate::progress::{ProgressCallback, null_progress};

pub use near_repeat_backtest_models::Comparison;

/// Errors that can occur while running a backtest.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    /// A model parameter was invalid.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// The global grid could not be built.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Scoring failed.
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// The range ends before it starts.
    #[error("backtest range is empty: start {start} is after end {end}")]
    InvalidDateRange {
        /// First day requested.
        start: NaiveDate,
        /// Last day requested.
        end: NaiveDate,
    },
}

/// Scores one day's predictions against what happened.
///
/// `actual` holds the incidents of the day being predicted. Actual incidents
/// are assigned to cells with the map's own [`GridSpec`](near_repeat_risk_models::GridSpec)
/// and compared by cell identity. The flagged area is `topk / cells`, so an
/// empty grid or `topk == 0` gives a `NaN` PAI.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_day(map: &RiskMap, actual: &[Incident], date: NaiveDate, topk: usize) -> DayResult {
    let flagged: BTreeSet<CellId> = map.top_k(topk).iter().map(|c| c.cell.id).collect();

    let hits = actual
        .iter()
        .filter(|incident| flagged.contains(&cell_identity(incident.x, incident.y, &map.spec)))
        .count();

    let hit_rate = if actual.is_empty() {
        0.0
    } else {
        hits as f64 / actual.len() as f64
    };
    let area_frac = if map.cells.is_empty() {
        0.0
    } else {
        topk as f64 / map.cells.len() as f64
    };
    let pai = if area_frac > 0.0 {
        hit_rate / area_frac
    } else {
        f64::NAN
    };

    DayResult {
        date,
        incidents: actual.len(),
        hits,
        hit_rate,
        pai,
    }
}

/// Predicts `date` from earlier incidents and scores the prediction.
///
/// Returns `None` when nothing happened on `date`; such days carry no signal
/// and are left out of reports rather than counted as misses.
///
/// # Errors
///
/// Returns [`BacktestError::Risk`] if the kernel parameters are invalid.
pub fn evaluate_day(
    incidents: &IncidentTable,
    grid: &Grid,
    date: NaiveDate,
    topk: usize,
    params: &RiskParams,
    variant: Variant,
) -> Result<Option<DayResult>, BacktestError> {
    let t0 = date.and_time(NaiveTime::MIN);
    let actual = incidents.between(t0, t0 + TimeDelta::days(1));
    if actual.is_empty() {
        log::trace!("{date}: no incidents, skipping {variant}");
        return Ok(None);
    }

    let params = match variant {
        Variant::Model => *params,
        Variant::Baseline => params.without_time_decay(),
    };
    let map = compute_risk(incidents, grid, t0, &params)?;
    let result = score_day(&map, actual, date, topk);

    log::debug!(
        "{date} {variant}: {}/{} hits, hit rate {:.3}, PAI {:.2}",
        result.hits,
        result.incidents,
        result.hit_rate,
        result.pai
    );

    Ok(Some(result))
}

/// Runs the model and the no-decay baseline over `[start, end]`.
///
/// # Errors
///
/// See [`backtest_range_with_progress`].
pub fn backtest_range(
    incidents: &IncidentTable,
    params: &ModelParams,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(Report, Report), BacktestError> {
    backtest_range_with_progress(incidents, params, start, end, &null_progress())
}

/// Runs the model and the no-decay baseline over `[start, end]`, reporting
/// one progress unit per day.
///
/// Days are evaluated in parallel; both reports come back ordered by date.
///
/// # Errors
///
/// * [`BacktestError::Parameter`] if any model parameter is invalid
/// * [`BacktestError::InvalidDateRange`] if `start` is after `end`
/// * [`BacktestError::Grid`] if the global grid cannot be built
pub fn backtest_range_with_progress(
    incidents: &IncidentTable,
    params: &ModelParams,
    start: NaiveDate,
    end: NaiveDate,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(Report, Report), BacktestError> {
    params.validate()?;
    if start > end {
        return Err(BacktestError::InvalidDateRange { start, end });
    }

    let grid = build_global(incidents.as_slice(), params.cell_size_m)?;
    let risk = params.risk();
    let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();

    log::info!(
        "Backtesting {} days ({start} to {end}) over {} incidents, top {} of {} cells",
        dates.len(),
        incidents.len(),
        params.topk,
        grid.len()
    );
    progress.set_total(dates.len() as u64);

    let outcomes = dates
        .par_iter()
        .map(|&date| {
            let model = evaluate_day(incidents, &grid, date, params.topk, &risk, Variant::Model)?;
            let baseline =
                evaluate_day(incidents, &grid, date, params.topk, &risk, Variant::Baseline)?;
            progress.inc(1);
            Ok::<_, BacktestError>((model, baseline))
        })
        .collect::<Result<Vec<_>, BacktestError>>()?;

    let mut model = Report::new(Variant::Model);
    let mut baseline = Report::new(Variant::Baseline);
    for (m, b) in outcomes {
        model.days.extend(m);
        baseline.days.extend(b);
    }

    let summary = format!(
        "Evaluated {} of {} days: model hit rate {:.3}, baseline hit rate {:.3}",
        model.len(),
        dates.len(),
        model.mean_hit_rate().unwrap_or(f64::NAN),
        baseline.mean_hit_rate().unwrap_or(f64::NAN),
    );
    log::info!("{summary}");
    progress.finish(summary);

    Ok((model, baseline))
}

/// Joins the two reports of a backtest by date and averages each variant.
#[must_use]
pub fn compare(model: &Report, baseline: &Report) -> Comparison {
    Comparison::join(model, baseline)
}
