//! Coordinate-grid helpers: tick spacing, sexagesimal labels, and where grid
//! lines leave the image.

use crate::error::{Error, Result};

/// Candidate grid spacings in degrees, largest first: whole degrees, then
/// arcminutes, then arcseconds.
pub const ANGULAR_STEPS: [f64; 21] = [
    30.0,
    20.0,
    15.0,
    10.0,
    5.0,
    2.0,
    1.0,
    30.0 / 60.0,
    20.0 / 60.0,
    15.0 / 60.0,
    10.0 / 60.0,
    5.0 / 60.0,
    2.0 / 60.0,
    1.0 / 60.0,
    30.0 / 3600.0,
    20.0 / 3600.0,
    15.0 / 3600.0,
    10.0 / 3600.0,
    5.0 / 3600.0,
    2.0 / 3600.0,
    1.0 / 3600.0,
];

/// Largest step in [`ANGULAR_STEPS`] not exceeding `(max - min) / target_ticks`,
/// or the smallest step if none does.
pub fn grid_step(min: f64, max: f64, target_ticks: usize) -> Result<f64> {
    if !(min < max) {
        return Err(Error::InvalidInput(format!(
            "grid range is empty: min {min} must be less than max {max}"
        )));
    }
    if target_ticks == 0 {
        return Err(Error::InvalidInput("target tick count must be positive".into()));
    }
    let ideal = (max - min) / target_ticks as f64;
    Ok(ANGULAR_STEPS
        .iter()
        .copied()
        .find(|&s| s <= ideal)
        .unwrap_or(ANGULAR_STEPS[ANGULAR_STEPS.len() - 1]))
}

/// Multiples of `step` within `[min, max]`.
pub fn grid_ticks(min: f64, max: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !min.is_finite() || !max.is_finite() || min > max {
        return Vec::new();
    }
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

/// Label subdivisions per degree (or per hour) for a grid step.
fn label_scale(step: f64) -> i64 {
    if step >= 10.0 {
        1
    } else if step >= 1.0 {
        60
    } else {
        3600
    }
}

/// Right ascension label in hours: `12h`, `12h05m` or `12h05m30s`,
/// depending on the grid step (degrees).
pub fn format_ra(ra: f64, step: f64) -> String {
    let hours = ra.rem_euclid(360.0) / 15.0;
    let scale = label_scale(step);
    let total = ((hours * scale as f64).round() as i64).rem_euclid(24 * scale);
    match scale {
        1 => format!("{total}h"),
        60 => format!("{}h{:02}m", total / 60, total % 60),
        _ => format!(
            "{}h{:02}m{:02}s",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        ),
    }
}

/// Declination label: `+12°`, `+12°05′` or `−12°05′30″`, depending on the
/// grid step (degrees). Negative values use the minus sign U+2212.
pub fn format_dec(dec: f64, step: f64) -> String {
    let sign = if dec < 0.0 { '\u{2212}' } else { '+' };
    let scale = label_scale(step);
    let total = (dec.abs() * scale as f64).round() as i64;
    match scale {
        1 => format!("{sign}{total}°"),
        60 => format!("{sign}{}°{:02}′", total / 60, total % 60),
        _ => format!(
            "{sign}{}°{:02}′{:02}″",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        ),
    }
}

// ── Edge crossings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

/// Point where a grid-line segment crosses an image edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCrossing {
    pub edge: Edge,
    pub x: f64,
    pub y: f64,
    /// Inclination of the segment, `atan(dy / dx)` in radians.
    pub angle: f64,
}

/// Crossings of the segment `p1 → p2` with the edges of a `width × height`
/// rectangle anchored at the origin (`y = 0` is the top edge).
///
/// A crossing is reported only when the endpoints lie strictly on opposite
/// sides of an edge line.
pub fn edge_crossings(p1: (f64, f64), p2: (f64, f64), width: f64, height: f64) -> Vec<EdgeCrossing> {
    let (x1, y1) = p1;
    let (x2, y2) = p2;
    let angle = ((y1 - y2) / (x1 - x2)).atan();
    let mut hits = Vec::new();

    for (edge, line) in [(Edge::Left, 0.0), (Edge::Right, width)] {
        if (x1 - line) * (x2 - line) < 0.0 {
            let t = (line - x1) / (x2 - x1);
            let y = y1 + t * (y2 - y1);
            if (0.0..=height).contains(&y) {
                hits.push(EdgeCrossing { edge, x: line, y, angle });
            }
        }
    }
    for (edge, line) in [(Edge::Top, 0.0), (Edge::Bottom, height)] {
        if (y1 - line) * (y2 - line) < 0.0 {
            let t = (line - y1) / (y2 - y1);
            let x = x1 + t * (x2 - x1);
            if (0.0..=width).contains(&x) {
                hits.push(EdgeCrossing { edge, x, y: line, angle });
            }
        }
    }
    hits
}

/// Crossing to label: the first edge in `priority` that has any crossing,
/// and on it the crossing nearest the edge's midpoint.
pub fn select_label_crossing(
    hits: &[EdgeCrossing],
    priority: &[Edge],
    width: f64,
    height: f64,
) -> Option<EdgeCrossing> {
    priority.iter().find_map(|&edge| {
        let distance = |h: &EdgeCrossing| match edge {
            Edge::Left | Edge::Right => (h.y - height * 0.5).abs(),
            Edge::Top | Edge::Bottom => (h.x - width * 0.5).abs(),
        };
        hits.iter()
            .filter(|h| h.edge == edge)
            .min_by(|a, b| distance(a).total_cmp(&distance(b)))
            .copied()
    })
}
