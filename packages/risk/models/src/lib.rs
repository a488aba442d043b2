#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grid, risk map, and parameter types shared by the scoring and backtest
//! crates.
//!
//! A [`Grid`] is a flat, row-major list of square [`Cell`]s anchored by a
//! [`GridSpec`]. Scoring a grid for one prediction instant yields a
//! [`RiskMap`], whose values are relative scores: they are comparable within
//! one map but carry no probability meaning.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Time constant that disables time decay for the baseline variant.
///
/// Large enough that `exp(-age / tau)` rounds to 1 for any realistic
/// lookback window while staying finite.
pub const BASELINE_TAU_DAYS: f64 = 1e9;

/// A parameter was outside its valid range.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid parameter {name} = {value}: {requirement}")]
pub struct ParameterError {
    /// Name of the offending parameter (e.g. `"sigma_m"`).
    pub name: &'static str,
    /// The value that was rejected.
    pub value: f64,
    /// What the value must satisfy.
    pub requirement: &'static str,
}

/// Rejects anything that is not strictly positive. Infinity is accepted.
///
/// # Errors
///
/// Returns [`ParameterError`] for zero, negative, or `NaN` values.
pub fn require_positive(name: &'static str, value: f64) -> Result<f64, ParameterError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ParameterError {
            name,
            value,
            requirement: "must be strictly positive",
        })
    }
}

/// Rejects anything that is not strictly positive and finite.
///
/// # Errors
///
/// Returns [`ParameterError`] for zero, negative, infinite, or `NaN` values.
pub fn require_positive_finite(name: &'static str, value: f64) -> Result<f64, ParameterError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ParameterError {
            name,
            value,
            requirement: "must be strictly positive and finite",
        })
    }
}

/// The three scalars anchoring a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSpec {
    pub xmin: f64,
    pub ymin: f64,
    /// Side length of each square cell, in meters.
    pub cell_size: f64,
}

/// Integer identity of a grid cell relative to a [`GridSpec`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CellId {
    pub ix: i64,
    pub iy: i64,
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.ix, self.iy)
    }
}

/// One square cell: its identity and its center point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub x: f64,
    pub y: f64,
}

/// How a grid's extent was chosen.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GridMode {
    /// Bounding box of the full incident set. Stable across evaluation days.
    Global,
    /// Bounding box of the recent window, padded by the scoring radius.
    /// Hotspots from this mode are not comparable with global-grid results.
    Local,
}

/// Axis-aligned bounding box in planar meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    /// Bounding box of a set of points, or `None` when there are none.
    #[must_use]
    pub fn of_points<I: IntoIterator<Item = [f64; 2]>>(points: I) -> Option<Self> {
        points.into_iter().fold(None, |acc, [x, y]| {
            Some(acc.map_or(
                Self {
                    xmin: x,
                    ymin: y,
                    xmax: x,
                    ymax: y,
                },
                |e: Self| Self {
                    xmin: e.xmin.min(x),
                    ymin: e.ymin.min(y),
                    xmax: e.xmax.max(x),
                    ymax: e.ymax.max(y),
                },
            ))
        })
    }

    /// Grows the box by `margin` on every side.
    #[must_use]
    pub fn padded(self, margin: f64) -> Self {
        Self {
            xmin: self.xmin - margin,
            ymin: self.ymin - margin,
            xmax: self.xmax + margin,
            ymax: self.ymax + margin,
        }
    }

    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.xmax.is_finite()
            && self.ymax.is_finite()
    }
}

/// A regular grid of square cells in row-major order (`iy` outer, `ix`
/// inner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub spec: GridSpec,
    pub mode: GridMode,
    /// Cells along the x axis.
    pub nx: usize,
    /// Cells along the y axis.
    pub ny: usize,
    pub cells: Vec<Cell>,
}

impl Grid {
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Kernel parameters for a single risk computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskParams {
    /// Spatial decay length: weight is `exp(-d / sigma_m)`.
    pub sigma_m: f64,
    /// Temporal decay constant in days: weight is `exp(-age / tau_days)`.
    pub tau_days: f64,
    /// Size of the trailing window of incidents considered.
    pub lookback_days: u32,
    /// Hard cutoff; incidents farther than this contribute nothing.
    pub radius_m: f64,
}

impl RiskParams {
    /// Checks every continuous parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] naming the first non-positive parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        require_positive("sigma_m", self.sigma_m)?;
        require_positive("tau_days", self.tau_days)?;
        require_positive("radius_m", self.radius_m)?;
        Ok(())
    }

    /// The same parameters with time decay switched off.
    #[must_use]
    pub const fn without_time_decay(self) -> Self {
        Self {
            tau_days: BASELINE_TAU_DAYS,
            ..self
        }
    }
}

/// The full parameter set for scoring and backtesting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub cell_size_m: f64,
    pub sigma_m: f64,
    pub tau_days: f64,
    pub lookback_days: u32,
    pub radius_m: f64,
    /// Number of highest-risk cells flagged per prediction.
    pub topk: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            cell_size_m: 300.0,
            sigma_m: NeighborhoodSize::Small.sigma_m(),
            tau_days: 7.0,
            lookback_days: RecentWindow::Last7Days.days(),
            radius_m: 1500.0,
            topk: 60,
        }
    }
}

impl ModelParams {
    #[must_use]
    pub const fn risk(&self) -> RiskParams {
        RiskParams {
            sigma_m: self.sigma_m,
            tau_days: self.tau_days,
            lookback_days: self.lookback_days,
            radius_m: self.radius_m,
        }
    }

    /// Checks the kernel parameters and the cell size.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] naming the first invalid parameter.
    pub fn validate(&self) -> Result<(), ParameterError> {
        require_positive_finite("cell_size_m", self.cell_size_m)?;
        self.risk().validate()
    }
}

/// Preset spatial spreads.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NeighborhoodSize {
    /// About 300 m
    Small,
    /// About 600 m
    Medium,
    /// About 900 m
    Large,
}

impl NeighborhoodSize {
    #[must_use]
    pub const fn sigma_m(self) -> f64 {
        match self {
            Self::Small => 300.0,
            Self::Medium => 600.0,
            Self::Large => 900.0,
        }
    }
}

/// Preset lookback windows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum RecentWindow {
    #[serde(rename = "last7")]
    #[strum(serialize = "last7")]
    Last7Days,
    #[serde(rename = "last14")]
    #[strum(serialize = "last14")]
    Last14Days,
    #[serde(rename = "last21")]
    #[strum(serialize = "last21")]
    Last21Days,
}

impl RecentWindow {
    #[must_use]
    pub const fn days(self) -> u32 {
        match self {
            Self::Last7Days => 7,
            Self::Last14Days => 14,
            Self::Last21Days => 21,
        }
    }
}

/// A grid cell with its risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCell {
    pub cell: Cell,
    pub risk: f64,
}

/// Risk scores for every cell of a grid at one prediction instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMap {
    pub t0: NaiveDateTime,
    pub params: RiskParams,
    pub spec: GridSpec,
    pub mode: GridMode,
    /// Same order as the grid's cells.
    pub cells: Vec<ScoredCell>,
}

impl RiskMap {
    /// Largest risk in the map; `0.0` for an empty map.
    #[must_use]
    pub fn max_risk(&self) -> f64 {
        self.cells.iter().map(|c| c.risk).fold(0.0, f64::max)
    }

    /// The `k` highest-risk cells, highest first.
    ///
    /// Ties keep grid order, so the result is reproducible. Returns fewer
    /// than `k` cells when the grid is smaller than `k`.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<&ScoredCell> {
        let mut ranked: Vec<&ScoredCell> = self.cells.iter().collect();
        ranked.sort_by(|a, b| b.risk.total_cmp(&a.risk));
        ranked.truncate(k);
        ranked
    }
}

/// A top-ranked cell annotated for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub cell: Cell,
    pub risk: f64,
    /// Risk as a percentage of the map's maximum.
    pub risk_pct: f64,
    /// Distance to the closest incident in the recent window.
    pub nearest_dist_m: Option<f64>,
    /// When that closest incident occurred.
    pub nearest_dt: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn scored(ix: i64, risk: f64) -> ScoredCell {
        #[allow(clippy::cast_precision_loss)]
        let x = ix as f64;
        ScoredCell {
            cell: Cell {
                id: CellId { ix, iy: 0 },
                x,
                y: 0.0,
            },
            risk,
        }
    }

    fn map(risks: &[f64]) -> RiskMap {
        RiskMap {
            t0: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            params: ModelParams::default().risk(),
            spec: GridSpec {
                xmin: 0.0,
                ymin: 0.0,
                cell_size: 1.0,
            },
            mode: GridMode::Global,
            cells: risks
                .iter()
                .enumerate()
                .map(|(i, r)| scored(i64::try_from(i).unwrap(), *r))
                .collect(),
        }
    }

    #[test]
    fn top_k_ties_keep_grid_order() {
        let m = map(&[1.0, 3.0, 1.0, 3.0, 0.0]);
        let ids: Vec<i64> = m.top_k(3).iter().map(|c| c.cell.id.ix).collect();
        assert_eq!(ids, vec![1, 3, 0]);
    }

    #[test]
    fn top_k_larger_than_grid() {
        let m = map(&[0.5, 0.25]);
        assert_eq!(m.top_k(10).len(), 2);
        assert!(map(&[]).top_k(5).is_empty());
    }

    #[test]
    fn max_risk_of_empty_map_is_zero() {
        assert!(map(&[]).max_risk().abs() < f64::EPSILON);
        assert!((map(&[0.2, 0.9, 0.1]).max_risk() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_non_positive_parameters() {
        let base = ModelParams::default();
        assert!(base.validate().is_ok());

        let err = ModelParams {
            sigma_m: 0.0,
            ..base
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.name, "sigma_m");

        let err = ModelParams {
            cell_size_m: f64::INFINITY,
            ..base
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.name, "cell_size_m");

        let err = ModelParams {
            radius_m: f64::NAN,
            ..base
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.name, "radius_m");

        assert!(
            ModelParams {
                tau_days: f64::INFINITY,
                ..base
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn baseline_replaces_only_tau() {
        let params = ModelParams::default().risk();
        let baseline = params.without_time_decay();
        assert!((baseline.tau_days - BASELINE_TAU_DAYS).abs() < f64::EPSILON);
        assert!((baseline.sigma_m - params.sigma_m).abs() < f64::EPSILON);
        assert_eq!(baseline.lookback_days, params.lookback_days);
    }

    #[test]
    fn extent_and_padding() {
        let e = Extent::of_points([[1.0, 5.0], [-2.0, 3.0], [4.0, 4.0]]).unwrap();
        assert_eq!(
            e,
            Extent {
                xmin: -2.0,
                ymin: 3.0,
                xmax: 4.0,
                ymax: 5.0
            }
        );
        let p = e.padded(10.0);
        assert!((p.xmin - -12.0).abs() < f64::EPSILON);
        assert!((p.ymax - 15.0).abs() < f64::EPSILON);
        assert!(Extent::of_points(std::iter::empty::<[f64; 2]>()).is_none());
    }

    #[test]
    fn presets_parse() {
        let sigma = "medium".parse::<NeighborhoodSize>().unwrap().sigma_m();
        assert!((sigma - 600.0).abs() < f64::EPSILON);
        assert_eq!("last14".parse::<RecentWindow>().unwrap().days(), 14);
        assert!("huge".parse::<NeighborhoodSize>().is_err());
    }

    #[test]
    fn preset_names_agree_between_serde_and_strum() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Presets {
            spread: NeighborhoodSize,
            window: RecentWindow,
        }

        for window in [
            RecentWindow::Last7Days,
            RecentWindow::Last14Days,
            RecentWindow::Last21Days,
        ] {
            let presets = Presets {
                spread: NeighborhoodSize::Large,
                window,
            };
            let text = toml::to_string(&presets).unwrap();
            assert!(text.contains(&format!("window = \"{window}\"")));
            assert!(text.contains("spread = \"large\""));
            assert_eq!(toml::from_str::<Presets>(&text).unwrap(), presets);
        }

        let parsed: Presets = toml::from_str("spread = \"small\"\nwindow = \"last21\"").unwrap();
        assert_eq!(parsed.window, RecentWindow::Last21Days);
    }

    #[test]
    fn partial_params_fill_defaults() {
        let params: ModelParams = toml::from_str("sigma_m = 900.0\ntopk = 10").unwrap();
        assert!((params.sigma_m - 900.0).abs() < f64::EPSILON);
        assert_eq!(params.topk, 10);
        assert!((params.radius_m - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cell_id_display() {
        assert_eq!(CellId { ix: 3, iy: -1 }.to_string(), "3_-1");
    }
}
