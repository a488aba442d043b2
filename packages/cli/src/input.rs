//! Reads clean planar incident tables.
//!
//! The expected CSV has a header row with at least `x`, `y` (projected
//! meters), and `dt` columns. Projection and category filtering happen
//! upstream; this reader only parses what it is given.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use near_repeat_incident_models::{Incident, IncidentTable};
use serde::Deserialize;

/// Errors that can occur while reading incidents.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The input file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Io {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The CSV stream itself is unreadable (not a per-row value problem).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct IncidentRow {
    x: f64,
    y: f64,
    dt: String,
}

/// Parses a timestamp as written by common exports.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated ISO 8601 form, either
/// with optional fractional seconds, and bare dates (midnight).
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Reads incidents from CSV. Rows with unparseable or non-finite values are
/// skipped with a warning.
///
/// # Errors
///
/// Returns [`InputError::Csv`] if the stream cannot be read or the header
/// is malformed.
pub fn read_incidents<R: Read>(reader: R) -> Result<IncidentTable, InputError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut incidents = Vec::new();
    let mut skipped = 0_usize;

    for (line, result) in rdr.deserialize::<IncidentRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Deserialize { .. }) => {
                log::warn!("Skipping row {}: {e}", line + 2);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let Some(dt) = parse_timestamp(&row.dt) else {
            log::warn!("Skipping row {}: unrecognized timestamp {:?}", line + 2, row.dt);
            skipped += 1;
            continue;
        };
        if !(row.x.is_finite() && row.y.is_finite()) {
            log::warn!("Skipping row {}: non-finite coordinates", line + 2);
            skipped += 1;
            continue;
        }

        incidents.push(Incident::new(row.x, row.y, dt));
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed rows");
    }
    log::info!("Loaded {} incidents", incidents.len());

    Ok(IncidentTable::new(incidents))
}

/// Opens `path` and reads incidents from it.
///
/// # Errors
///
/// Returns [`InputError`] if the file cannot be opened or read.
pub fn load_incidents(path: &Path) -> Result<IncidentTable, InputError> {
    let file = std::fs::File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_incidents(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_separated_timestamp() {
        let dt = parse_timestamp("2018-05-03 14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2018-05-03 14:30:00");
    }

    #[test]
    fn parses_iso_timestamp_with_fraction() {
        let dt = parse_timestamp("2018-05-03T14:30:00.250").unwrap();
        assert_eq!(dt.to_string(), "2018-05-03 14:30:00.250");
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let dt = parse_timestamp(" 2018-05-03 ").unwrap();
        assert_eq!(dt.to_string(), "2018-05-03 00:00:00");
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(parse_timestamp("05/03/2018").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn reads_and_sorts_rows() {
        let data = "\
x,y,dt,extra
100.5,200.0,2018-05-03 14:30:00,a
-7.25,3.0,2018-05-01,b
";
        let table = read_incidents(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let first = table.as_slice()[0];
        assert!((first.x - -7.25).abs() < f64::EPSILON);
        assert_eq!(first.dt.to_string(), "2018-05-01 00:00:00");
    }

    #[test]
    fn skips_malformed_rows() {
        let data = "\
x,y,dt
1.0,2.0,2018-05-03
oops,2.0,2018-05-03
1.0,2.0,yesterday
NaN,2.0,2018-05-03
3.0,4.0,2018-05-04T01:02:03
";
        let table = read_incidents(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_incidents(Path::new("/nonexistent/incidents.csv")).unwrap_err();
        assert!(matches!(err, InputError::Io { .. }));
        assert!(
            err.to_string()
                .starts_with("failed to open /nonexistent/incidents.csv: ")
        );
    }
}
