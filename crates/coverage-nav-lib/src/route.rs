//! Route model
//!
//! This module provides the immutable `Route` built from an ordered polyline,
//! with precomputed cumulative distances, segment lengths and maneuvers.

use crate::config::ManeuverConfig;
use crate::geometry::{self, distance_meters};
use crate::maneuver::{Maneuver, detect_maneuvers};
use crate::{NavError, Result};
use geo::Point;
use std::sync::Arc;

/// An immutable route polyline with derived distance tables
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    /// Ordered `[lon, lat]` vertices
    coords: Vec<Point<f64>>,
    /// `cumulative[i]` is the along-route distance of vertex `i`
    cumulative: Vec<f64>,
    /// `segment_lengths[i]` is the length of the segment from vertex `i` to `i + 1`
    segment_lengths: Vec<f64>,
    /// Cached total length in meters
    total_distance: f64,
    /// Maneuvers bounded by depart and arrive
    maneuvers: Vec<Maneuver>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Route {
    /// Build a route from an ordered polyline
    ///
    /// # Errors
    /// `NavError::InvalidRoute` when there are fewer than two points, a
    /// coordinate is not a valid longitude/latitude, or the polyline has no
    /// length at all.
    pub fn new(coords: Vec<Point<f64>>, config: &ManeuverConfig) -> Result<Arc<Self>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("route::new");

        if coords.len() < 2 {
            return Err(NavError::InvalidRoute(format!(
                "a route needs at least 2 points, got {}",
                coords.len()
            )));
        }
        if let Some((index, point)) = coords
            .iter()
            .enumerate()
            .find(|(_, p)| !geometry::is_valid_lon_lat(p))
        {
            return Err(NavError::InvalidRoute(format!(
                "point {index} is not a valid coordinate: ({}, {})",
                point.x(),
                point.y()
            )));
        }

        let (cumulative, segment_lengths) = Self::compute_distances(&coords);
        let total_distance = cumulative.last().copied().unwrap_or(0.0);
        if total_distance <= 0.0 {
            return Err(NavError::InvalidRoute("route has zero length".to_string()));
        }

        let maneuvers = detect_maneuvers(&coords, &cumulative, &segment_lengths, config);
        tracing::debug!(
            points = coords.len(),
            total_distance,
            maneuvers = maneuvers.len(),
            "Built route model"
        );

        Ok(Arc::new(Route {
            coords,
            cumulative,
            segment_lengths,
            total_distance,
            maneuvers,
        }))
    }

    /// Build a route from the points of a GPX document, see [`gpx_points`]
    pub fn from_gpx(gpx: &gpx::Gpx, config: &ManeuverConfig) -> Result<Arc<Self>> {
        Self::new(gpx_points(gpx), config)
    }

    /// Compute cumulative distances and segment lengths in one pass
    fn compute_distances(coords: &[Point<f64>]) -> (Vec<f64>, Vec<f64>) {
        let mut cumulative = Vec::with_capacity(coords.len());
        let mut segment_lengths = Vec::with_capacity(coords.len().saturating_sub(1));
        cumulative.push(0.0);

        let mut running = 0.0;
        for pair in coords.windows(2) {
            let length = distance_meters(pair[0], pair[1]);
            segment_lengths.push(length);
            running += length;
            cumulative.push(running);
        }

        (cumulative, segment_lengths)
    }

    #[inline]
    pub fn coords(&self) -> &[Point<f64>] {
        &self.coords
    }

    #[inline]
    pub fn cumulative_distances(&self) -> &[f64] {
        &self.cumulative
    }

    #[inline]
    pub fn segment_lengths(&self) -> &[f64] {
        &self.segment_lengths
    }

    /// Number of segments (always `coords().len() - 1`)
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segment_lengths.len()
    }

    /// Total length in meters
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    #[inline]
    pub fn maneuvers(&self) -> &[Maneuver] {
        &self.maneuvers
    }

    #[inline]
    pub fn start(&self) -> Point<f64> {
        self.coords[0]
    }

    #[inline]
    pub fn end(&self) -> Point<f64> {
        self.coords[self.coords.len() - 1]
    }

    /// Remaining distance to the end for a given progress, never negative
    #[inline]
    pub fn remaining(&self, progress: f64) -> f64 {
        (self.total_distance - progress).max(0.0)
    }

    /// Index of the segment containing an along-route distance
    pub fn segment_index_at(&self, distance: f64) -> usize {
        // First vertex strictly beyond the distance ends the containing segment
        let next_vertex = self.cumulative.partition_point(|&c| c <= distance);
        next_vertex.saturating_sub(1).min(self.segment_count() - 1)
    }

    /// Interpolated point at an along-route distance, clamped to the route
    pub fn point_at(&self, distance: f64) -> Point<f64> {
        let distance = distance.clamp(0.0, self.total_distance);
        let index = self.segment_index_at(distance);
        let length = self.segment_lengths[index];
        if length <= 0.0 {
            return self.coords[index];
        }

        let t = ((distance - self.cumulative[index]) / length).clamp(0.0, 1.0);
        let a = self.coords[index];
        let b = self.coords[index + 1];
        Point::new(a.x() + t * (b.x() - a.x()), a.y() + t * (b.y() - a.y()))
    }

    /// The part of the route between two along-route distances, as a polyline
    pub fn sub_path(&self, from: f64, to: f64) -> Vec<Point<f64>> {
        let from = from.clamp(0.0, self.total_distance);
        let to = to.clamp(0.0, self.total_distance);
        if to <= from {
            return vec![self.point_at(from)];
        }

        let mut path = vec![self.point_at(from)];
        path.extend(
            self.coords
                .iter()
                .zip(&self.cumulative)
                .filter(|(_, c)| **c > from && **c < to)
                .map(|(p, _)| *p),
        );
        path.push(self.point_at(to));
        path
    }
}

/// Every track point of a GPX document in order, or its route points when it has no tracks
pub fn gpx_points(gpx: &gpx::Gpx) -> Vec<Point<f64>> {
    let track_points: Vec<Point<f64>> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|waypoint| waypoint.point())
        .collect();
    if !track_points.is_empty() {
        return track_points;
    }
    gpx.routes
        .iter()
        .flat_map(|route| route.points.iter())
        .map(|waypoint| waypoint.point())
        .collect()
}
