//! Plain-text and JSON rendering of command results.

use near_repeat_backtest_models::Comparison;
use near_repeat_risk_models::Hotspot;

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

/// Renders the hotspot table.
#[must_use]
pub fn hotspot_table(spots: &[Hotspot]) -> String {
    let mut out = format!(
        "{:>4}  {:>9}  {:>12}  {:>12}  {:>9}  {:>10}  {:>10}\n",
        "rank", "risk (%)", "x", "y", "cell", "nearest m", "nearest on"
    );
    for (rank, spot) in spots.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:>9.1}  {:>12.1}  {:>12.1}  {:>9}  {:>10}  {:>10}\n",
            rank + 1,
            spot.risk_pct,
            spot.cell.x,
            spot.cell.y,
            spot.cell.id.to_string(),
            fmt_opt(spot.nearest_dist_m, 0),
            spot.nearest_dt
                .map_or_else(|| "-".to_string(), |dt| dt.date().to_string()),
        ));
    }
    out
}

/// Renders the per-day comparison followed by the summary.
#[must_use]
pub fn comparison_table(comparison: &Comparison) -> String {
    let mut out = format!(
        "{:<10}  {:>10}  {:>10}  {:>10}  {:>10}\n",
        "date", "hit model", "hit base", "PAI model", "PAI base"
    );
    for row in &comparison.rows {
        out.push_str(&format!(
            "{:<10}  {:>10.3}  {:>10.3}  {:>10.2}  {:>10.2}\n",
            row.date.to_string(),
            row.hit_rate_model,
            row.hit_rate_baseline,
            row.pai_model,
            row.pai_baseline,
        ));
    }

    let s = &comparison.summary;
    out.push_str(&format!(
        "\n{} days compared\n\
         avg hit rate: model {}, baseline {}\n\
         avg PAI:      model {}, baseline {}\n",
        s.days,
        fmt_opt(s.avg_hit_rate_model, 3),
        fmt_opt(s.avg_hit_rate_baseline, 3),
        fmt_opt(s.avg_pai_model, 2),
        fmt_opt(s.avg_pai_baseline, 2),
    ));
    out
}
