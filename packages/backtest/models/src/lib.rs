#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Backtest result types.
//!
//! A backtest produces one [`Report`] per [`Variant`]. Days with no actual
//! incidents are absent from a report rather than recorded as zero hits, so
//! two reports can be joined by date with [`Comparison::join`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Which scoring variant a report belongs to.
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
pub enum Variant {
    /// Spatial and temporal decay.
    Model,
    /// Spatial decay only.
    Baseline,
}

/// Outcome of predicting one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayResult {
    pub date: NaiveDate,
    /// Actual incidents during the day.
    pub incidents: usize,
    /// Actual incidents that fell in a flagged cell.
    pub hits: usize,
    pub hit_rate: f64,
    /// Predictive accuracy index; `NaN` when the flagged area is zero.
    pub pai: f64,
}

/// Day-by-day results for one variant, ordered by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub variant: Variant,
    pub days: Vec<DayResult>,
}

impl Report {
    #[must_use]
    pub const fn new(variant: Variant) -> Self {
        Self {
            variant,
            days: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    #[must_use]
    pub fn mean_hit_rate(&self) -> Option<f64> {
        mean(self.days.iter().map(|d| d.hit_rate))
    }

    /// Mean PAI over days where it is defined.
    #[must_use]
    pub fn mean_pai(&self) -> Option<f64> {
        mean(self.days.iter().map(|d| d.pai))
    }

    #[must_use]
    pub fn total_incidents(&self) -> usize {
        self.days.iter().map(|d| d.incidents).sum()
    }

    #[must_use]
    pub fn total_hits(&self) -> usize {
        self.days.iter().map(|d| d.hits).sum()
    }
}

/// Arithmetic mean skipping `NaN`s; `None` if nothing remains.
#[allow(clippy::cast_precision_loss)]
fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Model and baseline metrics for one date present in both reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub date: NaiveDate,
    pub hit_rate_model: f64,
    pub pai_model: f64,
    pub hit_rate_baseline: f64,
    pub pai_baseline: f64,
}

/// Averages over the joined rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub days: usize,
    pub avg_hit_rate_model: Option<f64>,
    pub avg_hit_rate_baseline: Option<f64>,
    pub avg_pai_model: Option<f64>,
    pub avg_pai_baseline: Option<f64>,
}

/// The two variants side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub rows: Vec<ComparisonRow>,
    pub summary: Summary,
}

impl Comparison {
    /// Inner-joins `model` and `baseline` on date.
    ///
    /// Both reports must be ordered by date.
    #[must_use]
    pub fn join(model: &Report, baseline: &Report) -> Self {
        let mut rows = Vec::with_capacity(model.len().min(baseline.len()));
        let mut base = baseline.days.iter().peekable();

        for m in &model.days {
            while base.next_if(|b| b.date < m.date).is_some() {}
            if let Some(b) = base.next_if(|b| b.date == m.date) {
                rows.push(ComparisonRow {
                    date: m.date,
                    hit_rate_model: m.hit_rate,
                    pai_model: m.pai,
                    hit_rate_baseline: b.hit_rate,
                    pai_baseline: b.pai,
                });
            }
        }

        let summary = Summary {
            days: rows.len(),
            avg_hit_rate_model: mean(rows.iter().map(|r| r.hit_rate_model)),
            avg_hit_rate_baseline: mean(rows.iter().map(|r| r.hit_rate_baseline)),
            avg_pai_model: mean(rows.iter().map(|r| r.pai_model)),
            avg_pai_baseline: mean(rows.iter().map(|r| r.pai_baseline)),
        };

        Self { rows, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32, hit_rate: f64, pai: f64) -> DayResult {
        DayResult {
            date: NaiveDate::from_ymd_opt(2024, 4, d).unwrap(),
            incidents: 4,
            hits: 2,
            hit_rate,
            pai,
        }
    }

    fn report(variant: Variant, days: Vec<DayResult>) -> Report {
        Report { variant, days }
    }

    #[test]
    fn means_skip_nan() {
        let r = report(
            Variant::Model,
            vec![day(1, 0.5, 10.0), day(2, 1.0, f64::NAN), day(3, 0.0, 20.0)],
        );
        assert!((r.mean_hit_rate().unwrap() - 0.5).abs() < 1e-12);
        assert!((r.mean_pai().unwrap() - 15.0).abs() < 1e-12);
        assert_eq!(r.total_incidents(), 12);
        assert_eq!(r.total_hits(), 6);
    }

    #[test]
    fn empty_report_has_no_mean() {
        let r = Report::new(Variant::Baseline);
        assert!(r.mean_hit_rate().is_none());
        assert!(r.mean_pai().is_none());
    }

    #[test]
    fn join_keeps_shared_dates_only() {
        let model = report(
            Variant::Model,
            vec![day(1, 0.5, 5.0), day(3, 1.0, 10.0), day(4, 0.25, 2.5)],
        );
        let baseline = report(
            Variant::Baseline,
            vec![day(2, 0.1, 1.0), day(3, 0.5, 5.0), day(4, 0.0, 0.0), day(5, 1.0, 1.0)],
        );

        let cmp = Comparison::join(&model, &baseline);
        let dates: Vec<u32> = cmp.rows.iter().map(|r| chrono::Datelike::day(&r.date)).collect();
        assert_eq!(dates, vec![3, 4]);
        assert_eq!(cmp.summary.days, 2);
        assert!((cmp.summary.avg_hit_rate_model.unwrap() - 0.625).abs() < 1e-12);
        assert!((cmp.summary.avg_hit_rate_baseline.unwrap() - 0.25).abs() < 1e-12);
        assert!((cmp.rows[0].pai_baseline - 5.0).abs() < 1e-12);
    }

    #[test]
    fn nan_pai_serializes_as_null() {
        let json = serde_json::to_value(day(1, 0.0, f64::NAN)).unwrap();
        assert!(json["pai"].is_null());
        assert_eq!(json["date"], "2024-04-01");
        assert_eq!(Variant::Baseline.to_string(), "baseline");
    }
}
