//! Recorded fixes to replay
//!
//! Two formats: JSON lines of [`PositionFix`] objects (`.jsonl`, `.json`), or
//! a GPX track whose points are replayed at a fixed interval.

use super::error::{AppError, AppResult};
use coverage_nav_lib::{PositionFix, gpx_points};
use std::path::Path;

pub fn load_fixes(path: &Path, gpx_interval_ms: i64) -> AppResult<Vec<PositionFix>> {
    let is_gpx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gpx"));

    let fixes = if is_gpx {
        let file = std::fs::File::open(path)?;
        let gpx = gpx::read(std::io::BufReader::new(file))?;
        fixes_from_points(&gpx_points(&gpx), gpx_interval_ms)
    } else {
        parse_json_lines(&std::fs::read_to_string(path)?)?
    };
    tracing::info!(path = %path.display(), fixes = fixes.len(), "Loaded fixes");
    Ok(fixes)
}

fn fixes_from_points(points: &[geo::Point<f64>], interval_ms: i64) -> Vec<PositionFix> {
    points
        .iter()
        .zip(0i64..)
        .map(|(point, i)| PositionFix::new(*point, i * interval_ms))
        .collect()
}

/// One fix per non-empty line, in timestamp order
fn parse_json_lines(text: &str) -> AppResult<Vec<PositionFix>> {
    let mut fixes = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fix: PositionFix = serde_json::from_str(line).map_err(|e| AppError::InvalidFix {
            line: index + 1,
            reason: e.to_string(),
        })?;
        fixes.push(fix);
    }
    fixes.sort_by_key(|f| f.timestamp_ms);
    Ok(fixes)
}
