//! Position matching against the route polyline
//!
//! The matcher searches an asymmetric window of segments around its previous
//! match (drivers mostly move forward) and only falls back to scanning the whole
//! route when the window has nothing convincing. That keeps per-fix cost bounded
//! on long routes while still recovering from jumps and signal gaps.

use crate::Route;
use crate::config::MatcherConfig;
use crate::geometry::project_to_segment;
use geo::Point;
use std::ops::Range;

/// Closest projection of a fix onto the route
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub segment_index: usize,
    pub perpendicular_distance_meters: f64,
    pub projected_point: Point<f64>,
    pub along_route_meters: f64,
}

/// Windowed nearest-segment search with a full-scan fallback
#[derive(Debug, Clone)]
pub struct PositionMatcher {
    config: MatcherConfig,
    /// Segment index of the previous match, seeds the next window
    cursor: Option<usize>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl PositionMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            cursor: None,
        }
    }

    #[inline]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Forget the previous match; the next search scans the full route
    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// Move the cursor, e.g. after progress was forced to a new position
    pub fn reseed(&mut self, segment_index: usize) {
        self.cursor = Some(segment_index);
    }

    /// Match a point against the route and advance the cursor to the winner
    pub fn match_position(&mut self, route: &Route, point: Point<f64>) -> MatchResult {
        let windowed = self
            .window(route)
            .and_then(|window| best_in_range(route, point, window));

        let best = match windowed {
            Some(best) if best.perpendicular_distance_meters <= self.config.full_scan_distance_m => {
                best
            }
            _ => {
                tracing::debug!(cursor = ?self.cursor, "Window match missed, scanning full route");
                // A route always has at least one segment
                best_in_range(route, point, 0..route.segment_count())
                    .unwrap_or_else(|| project_onto(route, point, 0))
            }
        };

        self.cursor = Some(best.segment_index);
        best
    }

    /// Segment range around the cursor, `None` before the first match
    fn window(&self, route: &Route) -> Option<Range<usize>> {
        let cursor = self.cursor?.min(route.segment_count() - 1);
        let start = cursor.saturating_sub(self.config.look_behind);
        let end = (cursor + self.config.look_ahead + 1).min(route.segment_count());
        Some(start..end)
    }
}

/// Closest projection strictly ahead of `from_along` and within `radius_m` of the point
///
/// This is the resume-ahead search: it ignores everything at or behind the
/// current progress, so a driver who rejoins the route further on gets a
/// forward point even if an earlier part of the route happens to be closer.
pub fn forward_candidate(
    route: &Route,
    point: Point<f64>,
    from_along: f64,
    radius_m: f64,
) -> Option<MatchResult> {
    let first = route.segment_index_at(from_along);
    (first..route.segment_count())
        .map(|index| project_onto(route, point, index))
        .filter(|m| m.along_route_meters > from_along && m.perpendicular_distance_meters <= radius_m)
        .min_by(|a, b| {
            a.perpendicular_distance_meters
                .total_cmp(&b.perpendicular_distance_meters)
        })
}

fn best_in_range(route: &Route, point: Point<f64>, range: Range<usize>) -> Option<MatchResult> {
    let mut best: Option<MatchResult> = None;
    for index in range {
        let candidate = project_onto(route, point, index);
        if best.is_none_or(|b| candidate.perpendicular_distance_meters < b.perpendicular_distance_meters) {
            best = Some(candidate);
        }
    }
    best
}

#[inline]
fn project_onto(route: &Route, point: Point<f64>, index: usize) -> MatchResult {
    let coords = route.coords();
    let projection = project_to_segment(point, coords[index], coords[index + 1]);
    MatchResult {
        segment_index: index,
        perpendicular_distance_meters: projection.distance_meters,
        projected_point: projection.projected_point,
        along_route_meters: route.cumulative_distances()[index]
            + projection.t * route.segment_lengths()[index],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManeuverConfig;
    use crate::geometry::offset_meters;
    use std::sync::Arc;

    fn origin() -> Point<f64> {
        Point::new(-0.1278, 51.5074)
    }

    fn north_route(count: usize) -> Arc<Route> {
        let coords = (0..count)
            .map(|i| offset_meters(origin(), i as f64 * 100.0, 0.0))
            .collect();
        Route::new(coords, &ManeuverConfig::default()).unwrap()
    }

    #[test]
    fn test_first_match_scans_full_route() {
        let route = north_route(50);
        let mut matcher = PositionMatcher::new(MatcherConfig::default());
        assert!(matcher.cursor().is_none());

        let result = matcher.match_position(&route, offset_meters(origin(), 3_050.0, 10.0));
        assert_eq!(result.segment_index, 30);
        assert!((result.along_route_meters - 3_050.0).abs() < 0.1);
        assert!((result.perpendicular_distance_meters - 10.0).abs() < 0.05);
        assert_eq!(matcher.cursor(), Some(30));
    }

    #[test]
    fn test_window_follows_forward_travel() {
        let route = north_route(50);
        let mut matcher = PositionMatcher::new(MatcherConfig::default());
        let mut last_along = -1.0;
        for step in 0..40 {
            let p = offset_meters(origin(), step as f64 * 110.0, 5.0);
            let result = matcher.match_position(&route, p);
            assert!(result.along_route_meters > last_along);
            assert!(result.perpendicular_distance_meters < 6.0);
            last_along = result.along_route_meters;
        }
    }

    #[test]
    fn test_jump_beyond_window_falls_back_to_full_scan() {
        let route = north_route(50);
        let mut matcher = PositionMatcher::new(MatcherConfig::default());
        matcher.match_position(&route, offset_meters(origin(), 50.0, 0.0));
        assert_eq!(matcher.cursor(), Some(0));

        // 40 segments ahead, far outside the window
        let result = matcher.match_position(&route, offset_meters(origin(), 4_020.0, 0.0));
        assert_eq!(result.segment_index, 40);
        assert!(result.perpendicular_distance_meters < 0.1);
        assert_eq!(matcher.cursor(), Some(40));
    }

    #[test]
    fn test_jump_backwards_is_found() {
        let route = north_route(50);
        let mut matcher = PositionMatcher::new(MatcherConfig::default());
        matcher.reseed(45);
        let result = matcher.match_position(&route, offset_meters(origin(), 120.0, 0.0));
        assert_eq!(result.segment_index, 1);
    }

    #[test]
    fn test_windowed_match_is_global_for_loops() {
        // Out and back: the return leg is 20m east of the outbound leg
        let o = origin();
        let coords = vec![
            o,
            offset_meters(o, 1_000.0, 0.0),
            offset_meters(o, 1_000.0, 20.0),
            offset_meters(o, 0.0, 20.0),
        ];
        let route = Route::new(coords, &ManeuverConfig::default()).unwrap();
        let mut matcher = PositionMatcher::new(MatcherConfig::default());

        let result = matcher.match_position(&route, offset_meters(o, 500.0, 18.0));
        assert_eq!(result.segment_index, 2);
        assert!(result.along_route_meters > 1_000.0);
    }

    #[test]
    fn test_reset_clears_cursor() {
        let route = north_route(5);
        let mut matcher = PositionMatcher::new(MatcherConfig::default());
        matcher.match_position(&route, origin());
        matcher.reset();
        assert!(matcher.cursor().is_none());
    }

    #[test]
    fn test_forward_candidate_skips_points_behind() {
        let route = north_route(20);
        let p = offset_meters(origin(), 600.0, 300.0);

        let candidate = forward_candidate(&route, p, 50.0, 500.0).unwrap();
        assert!((candidate.along_route_meters - 600.0).abs() < 0.5);
        assert!((candidate.perpendicular_distance_meters - 300.0).abs() < 0.5);

        // Nothing ahead of 1900m
        assert!(forward_candidate(&route, p, 1_900.0, 500.0).is_none());
    }

    #[test]
    fn test_forward_candidate_respects_radius() {
        let route = north_route(20);
        let p = offset_meters(origin(), 600.0, 700.0);
        assert!(forward_candidate(&route, p, 0.0, 500.0).is_none());
    }
}
