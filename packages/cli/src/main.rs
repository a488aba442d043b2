#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for near-repeat hotspot prediction and backtesting.
//!
//! Reads a clean incident CSV (`x`, `y` in projected meters and a `dt`
//! timestamp), then either ranks tomorrow's hotspots for one date or
//! backtests the model against its no-decay baseline over a date range.
//!
//! Uses `indicatif-log-bridge` (via [`near_repeat_cli_utils::init_logger`])
//! so log lines and the backtest progress bar share the terminal.

mod config;
mod input;
mod output;

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use clap::{Parser, Subcommand};
use near_repeat_backtest::{backtest_range_with_progress, compare};
use near_repeat_cli_utils::{IndicatifProgress, MultiProgress};
use near_repeat_incident_models::IncidentTable;
use near_repeat_risk::{compute_local_risk, hotspots};

use crate::config::{Config, Overrides};

/// Default backtest span ending at the last incident date.
const DEFAULT_BACKTEST_DAYS: i64 = 30;

#[derive(Parser)]
#[command(name = "near_repeat", about = "Near-repeat burglary risk tool")]
struct Cli {
    /// TOML file overriding the default model parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the riskiest cells for one prediction date
    Hotspots {
        /// Incident CSV with x, y, dt columns
        #[arg(long)]
        input: PathBuf,
        /// Prediction date (defaults to the day before the latest incident)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Rows to show
        #[arg(long)]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Score daily predictions over a date range against a no-decay baseline
    Backtest {
        /// Incident CSV with x, y, dt columns
        #[arg(long)]
        input: PathBuf,
        /// First day to predict (defaults to 30 days before --end)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day to predict (defaults to the latest incident date)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = near_repeat_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Hotspots {
            input,
            date,
            limit,
            json,
            overrides,
        } => run_hotspots(&config, &overrides, &input, date, limit, json),
        Commands::Backtest {
            input,
            start,
            end,
            json,
            overrides,
        } => run_backtest(&multi, &config, &overrides, &input, start, end, json),
    }
}

/// Loads the input table and the date of its latest incident.
fn load(input: &Path) -> Result<(IncidentTable, NaiveDate), Box<dyn std::error::Error>> {
    let table = input::load_incidents(input)?;
    let Some(last) = table.last_dt() else {
        return Err(format!("no usable incidents in {}", input.display()).into());
    };
    Ok((table, last.date()))
}

fn run_hotspots(
    config: &Config,
    overrides: &Overrides,
    input: &Path,
    date: Option<NaiveDate>,
    limit: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = overrides.apply(config.model);
    params.validate()?;

    let (table, last) = load(input)?;
    let date = date.unwrap_or_else(|| last.pred_opt().unwrap_or(last));
    let t0 = date.and_time(NaiveTime::MIN);

    let map = compute_local_risk(&table, t0, &params.risk(), params.cell_size_m)?;
    if map.cells.is_empty() {
        log::warn!(
            "No incidents in the {} days before {date}; try a different date",
            params.lookback_days
        );
        return Ok(());
    }

    let limit = limit.unwrap_or(config.hotspots.limit).min(params.topk);
    let spots = hotspots(&map, &table, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&spots)?);
    } else {
        println!(
            "Hotspots for {date} ({} m cells, {} day window, sigma {} m)",
            params.cell_size_m, params.lookback_days, params.sigma_m
        );
        print!("{}", output::hotspot_table(&spots));
    }
    Ok(())
}

fn run_backtest(
    multi: &MultiProgress,
    config: &Config,
    overrides: &Overrides,
    input: &Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = overrides.apply(config.model);
    params.validate()?;

    let (table, last) = load(input)?;
    let end = end.unwrap_or(last);
    let start = start.unwrap_or(end - TimeDelta::days(DEFAULT_BACKTEST_DAYS));

    let progress = IndicatifProgress::days_bar(multi, "Backtesting");
    let (model, baseline) = backtest_range_with_progress(&table, &params, start, end, &progress)?;
    let comparison = compare(&model, &baseline);

    if json {
        let body = serde_json::json!({
            "model": model,
            "baseline": baseline,
            "comparison": comparison,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", output::comparison_table(&comparison));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use near_repeat_risk_models::{ModelParams, NeighborhoodSize, RecentWindow};

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_hotspots_with_presets() {
        let cli = Cli::try_parse_from([
            "near_repeat",
            "hotspots",
            "--input",
            "incidents.csv",
            "--date",
            "2024-05-20",
            "--spread",
            "medium",
            "--window",
            "last14",
            "--limit",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.config, None);
        let Commands::Hotspots {
            input,
            date,
            limit,
            json,
            overrides,
        } = cli.command
        else {
            panic!("expected the hotspots command");
        };
        assert_eq!(input, PathBuf::from("incidents.csv"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 20));
        assert_eq!(limit, Some(5));
        assert!(!json);
        assert_eq!(overrides.spread, Some(NeighborhoodSize::Medium));
        assert_eq!(overrides.window, Some(RecentWindow::Last14Days));

        let params = overrides.apply(ModelParams::default());
        assert!((params.sigma_m - 600.0).abs() < f64::EPSILON);
        assert_eq!(params.lookback_days, 14);
    }

    #[test]
    fn parses_backtest_range_and_global_config() {
        let cli = Cli::try_parse_from([
            "near_repeat",
            "backtest",
            "--input",
            "incidents.csv",
            "--start",
            "2024-05-01",
            "--end",
            "2024-05-31",
            "--topk",
            "25",
            "--window",
            "last21",
            "--json",
            "--config",
            "model.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("model.toml")));
        let Commands::Backtest {
            start,
            end,
            json,
            overrides,
            ..
        } = cli.command
        else {
            panic!("expected the backtest command");
        };
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 5, 31));
        assert!(json);
        assert_eq!(overrides.topk, Some(25));
        assert_eq!(overrides.window, Some(RecentWindow::Last21Days));
    }

    #[test]
    fn rejects_unknown_presets() {
        let unknown_window = Cli::try_parse_from([
            "near_repeat",
            "hotspots",
            "--input",
            "incidents.csv",
            "--window",
            "last30",
        ]);
        assert!(unknown_window.is_err());
        let unknown_spread = Cli::try_parse_from([
            "near_repeat",
            "backtest",
            "--input",
            "incidents.csv",
            "--spread",
            "huge",
        ]);
        assert!(unknown_spread.is_err());
    }
}
