#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Planar incident records consumed by the risk engine.
//!
//! Incidents arrive already projected to planar meters and already filtered
//! to the category of interest. The [`IncidentTable`] keeps them ordered by
//! occurrence time so that trailing windows ("the last seven days before
//! `t0`") are a pair of binary searches rather than a full scan.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A single geolocated, timestamped incident in planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Easting in projected meters.
    pub x: f64,
    /// Northing in projected meters.
    pub y: f64,
    /// When the incident occurred.
    pub dt: NaiveDateTime,
}

impl Incident {
    #[must_use]
    pub const fn new(x: f64, y: f64, dt: NaiveDateTime) -> Self {
        Self { x, y, dt }
    }

    /// Planar position as an `[x, y]` pair.
    #[must_use]
    pub const fn point(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Fractional days elapsed between this incident and `t0`.
    ///
    /// Negative when the incident occurs after `t0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn age_days(&self, t0: NaiveDateTime) -> f64 {
        (t0 - self.dt).num_milliseconds() as f64 / MILLIS_PER_DAY
    }
}

/// An immutable collection of incidents ordered by occurrence time.
///
/// Serializes as a plain list; deserializing re-sorts it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Incident>", into = "Vec<Incident>")]
pub struct IncidentTable {
    incidents: Vec<Incident>,
}

impl IncidentTable {
    /// Builds a table from incidents in any order.
    #[must_use]
    pub fn new(mut incidents: Vec<Incident>) -> Self {
        incidents.sort_by_key(|incident| incident.dt);
        Self { incidents }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// All incidents, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Incident> {
        self.incidents.iter()
    }

    /// Incidents with `start <= dt < end`, oldest first.
    ///
    /// Returns an empty slice when `start >= end`.
    #[must_use]
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Incident] {
        if start >= end {
            return &[];
        }
        let lo = self.incidents.partition_point(|incident| incident.dt < start);
        let hi = self.incidents.partition_point(|incident| incident.dt < end);
        &self.incidents[lo..hi]
    }

    /// The trailing window `[t0 - lookback_days, t0)`.
    ///
    /// A lookback reaching past the earliest representable time covers
    /// everything before `t0`.
    #[must_use]
    pub fn recent(&self, t0: NaiveDateTime, lookback_days: u32) -> &[Incident] {
        let start = t0
            .checked_sub_signed(TimeDelta::days(i64::from(lookback_days)))
            .unwrap_or(NaiveDateTime::MIN);
        self.between(start, t0)
    }

    /// Earliest occurrence time, if any.
    #[must_use]
    pub fn first_dt(&self) -> Option<NaiveDateTime> {
        self.incidents.first().map(|incident| incident.dt)
    }

    /// Latest occurrence time, if any.
    #[must_use]
    pub fn last_dt(&self) -> Option<NaiveDateTime> {
        self.incidents.last().map(|incident| incident.dt)
    }
}

impl From<Vec<Incident>> for IncidentTable {
    fn from(incidents: Vec<Incident>) -> Self {
        Self::new(incidents)
    }
}

impl From<IncidentTable> for Vec<Incident> {
    fn from(table: IncidentTable) -> Self {
        table.incidents
    }
}

impl FromIterator<Incident> for IncidentTable {
    fn from_iter<I: IntoIterator<Item = Incident>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a IncidentTable {
    type Item = &'a Incident;
    type IntoIter = std::slice::Iter<'a, Incident>;

    fn into_iter(self) -> Self::IntoIter {
        self.incidents.iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn table() -> IncidentTable {
        vec![
            Incident::new(3.0, 0.0, at(10, 12)),
            Incident::new(1.0, 0.0, at(2, 0)),
            Incident::new(2.0, 0.0, at(5, 6)),
            Incident::new(4.0, 0.0, at(10, 0)),
        ]
        .into()
    }

    #[test]
    fn sorts_by_occurrence() {
        let xs: Vec<f64> = table().iter().map(|i| i.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 4.0, 3.0]);
    }

    #[test]
    fn between_is_half_open() {
        let t = table();
        let hits = t.between(at(2, 0), at(10, 0));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|i| i.dt < at(10, 0)));

        let day = t.between(at(10, 0), at(11, 0));
        assert_eq!(day.len(), 2);
    }

    #[test]
    fn between_empty_when_reversed() {
        assert!(table().between(at(10, 0), at(2, 0)).is_empty());
    }

    #[test]
    fn recent_window_excludes_t0() {
        let t = table();
        let recent = t.recent(at(10, 0), 7);
        assert_eq!(recent.len(), 1);
        assert!((recent[0].x - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unbounded_lookback_covers_all_history() {
        let t = table();
        let recent = t.recent(at(10, 12), u32::MAX);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].dt, at(2, 0));
    }

    #[test]
    fn deserializing_restores_time_order() {
        let json = r#"[
            {"x": 3.0, "y": 0.0, "dt": "2024-03-10T12:00:00"},
            {"x": 1.0, "y": 0.0, "dt": "2024-03-02T00:00:00"},
            {"x": 2.0, "y": 0.0, "dt": "2024-03-05T06:00:00"}
        ]"#;
        let t: IncidentTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.first_dt(), Some(at(2, 0)));
        assert_eq!(t.last_dt(), Some(at(10, 12)));
        assert_eq!(t.between(at(2, 0), at(6, 0)).len(), 2);

        let back = serde_json::to_string(&t).unwrap();
        assert!(back.starts_with('['));
        let again: IncidentTable = serde_json::from_str(&back).unwrap();
        assert_eq!(again, t);
    }

    #[test]
    fn age_in_fractional_days() {
        let incident = Incident::new(0.0, 0.0, at(5, 6));
        assert!((incident.age_days(at(6, 18)) - 1.5).abs() < 1e-12);
        assert!(incident.age_days(at(5, 0)) < 0.0);
    }

    #[test]
    fn bounds_of_empty_table() {
        let t = IncidentTable::default();
        assert!(t.is_empty());
        assert_eq!(t.first_dt(), None);
        assert_eq!(t.last_dt(), None);
    }
}
