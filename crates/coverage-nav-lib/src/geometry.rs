//! Geometry kernel: distances, bearings and projections on `[lon, lat]` points
//!
//! Every function here is pure. Points are `geo::Point<f64>` with `x` holding the
//! longitude and `y` the latitude, both in degrees.

use geo::Point;

/// Sphere radius used by every distance computation, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Squared planar length (in m²) under which a segment is treated as a single point
const DEGENERATE_SEGMENT_SQ_M: f64 = 1e-12;

/// Result of projecting a point onto a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Haversine distance from the point to its foot on the segment
    pub distance_meters: f64,
    /// Foot parameter along the segment, clamped to `[0, 1]`
    pub t: f64,
    /// The foot itself
    pub projected_point: Point<f64>,
}

/// Haversine distance between two points in meters
#[inline]
pub fn distance_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat1 = a.y().to_radians();
    let lat2 = b.y().to_radians();
    let delta_lat = (b.y() - a.y()).to_radians();
    let delta_lon = (b.x() - a.x()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from `a` to `b`, normalized to `[0, 360)`
#[inline]
pub fn bearing_deg(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat1 = a.y().to_radians();
    let lat2 = b.y().to_radians();
    let delta_lon = (b.x() - a.x()).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if bearing >= 360.0 { 0.0 } else { bearing }
}

/// Signed minimal turn from heading `from` to heading `to`, in `(-180, 180]`
///
/// Positive values are clockwise (right turns).
#[inline]
pub fn angle_delta_deg(from: f64, to: f64) -> f64 {
    let mut delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Project `point` onto the segment `a`-`b`
///
/// The projection is done in a local equirectangular frame referenced at the
/// segment's mean latitude, which is accurate for road-segment-scale distances.
/// A degenerate segment (`a == b`) yields `t = 0` and the distance to `a`.
pub fn project_to_segment(point: Point<f64>, a: Point<f64>, b: Point<f64>) -> Projection {
    let cos_lat = ((a.y() + b.y()) / 2.0).to_radians().cos();
    let meters_per_deg_lat = EARTH_RADIUS_M.to_radians();
    let meters_per_deg_lon = meters_per_deg_lat * cos_lat;

    let dx = (b.x() - a.x()) * meters_per_deg_lon;
    let dy = (b.y() - a.y()) * meters_per_deg_lat;
    let px = (point.x() - a.x()) * meters_per_deg_lon;
    let py = (point.y() - a.y()) * meters_per_deg_lat;

    let len_sq = dx * dx + dy * dy;
    if !(len_sq > DEGENERATE_SEGMENT_SQ_M) {
        return Projection {
            distance_meters: distance_meters(point, a),
            t: 0.0,
            projected_point: a,
        };
    }

    let t = ((px * dx + py * dy) / len_sq).clamp(0.0, 1.0);
    let projected_point = Point::new(a.x() + t * (b.x() - a.x()), a.y() + t * (b.y() - a.y()));

    Projection {
        distance_meters: distance_meters(point, projected_point),
        t,
        projected_point,
    }
}

/// Minimum distance from `point` to a polyline, via per-pair segment projection
///
/// Returns `None` for an empty polyline. A single-vertex polyline degrades to a
/// point distance.
pub fn point_to_polyline_meters(point: Point<f64>, line: &[Point<f64>]) -> Option<f64> {
    match line {
        [] => None,
        [only] => Some(distance_meters(point, *only)),
        _ => line
            .windows(2)
            .map(|pair| project_to_segment(point, pair[0], pair[1]).distance_meters)
            .min_by(f64::total_cmp),
    }
}

/// Displace `origin` by `north_m` and `east_m` meters in its local frame
pub fn offset_meters(origin: Point<f64>, north_m: f64, east_m: f64) -> Point<f64> {
    let dlat = (north_m / EARTH_RADIUS_M).to_degrees();
    let dlon = (east_m / (EARTH_RADIUS_M * origin.y().to_radians().cos())).to_degrees();
    Point::new(origin.x() + dlon, origin.y() + dlat)
}

/// Check that a point holds a finite, in-range longitude and latitude
#[inline]
pub fn is_valid_lon_lat(point: &Point<f64>) -> bool {
    point.x().is_finite()
        && point.y().is_finite()
        && (-180.0..=180.0).contains(&point.x())
        && (-90.0..=90.0).contains(&point.y())
}
