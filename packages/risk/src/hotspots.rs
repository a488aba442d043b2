//! Hotspot table: the top cells of a risk map annotated with the closest
//! recent incident.

use near_repeat_incident_models::{Incident, IncidentTable};
use near_repeat_risk_models::{Hotspot, RiskMap};
use near_repeat_spatial::PointIndex;

/// The `limit` highest-risk cells of `map`, highest first.
///
/// `incidents` must be the table the map was scored from; the recent window
/// is re-derived from the map's `t0` and lookback. `risk_pct` is relative to
/// the map's maximum and is `0` when every cell scored `0`. The nearest
/// incident fields are `None` when the recent window is empty.
#[must_use]
pub fn hotspots(map: &RiskMap, incidents: &IncidentTable, limit: usize) -> Vec<Hotspot> {
    let recent = incidents.recent(map.t0, map.params.lookback_days);
    let index = PointIndex::new(recent.iter().map(Incident::point));
    let max_risk = map.max_risk();

    let top = map.top_k(limit);
    let nearest = index.nearest_each(top.iter().map(|scored| [scored.cell.x, scored.cell.y]));

    top.into_iter()
        .zip(nearest)
        .map(|(scored, nearest)| Hotspot {
            cell: scored.cell,
            risk: scored.risk,
            risk_pct: if max_risk > 0.0 {
                scored.risk / max_risk * 100.0
            } else {
                0.0
            },
            nearest_dist_m: nearest.map(|n| n.distance),
            nearest_dt: nearest.map(|n| recent[n.index].dt),
        })
        .collect()
}
