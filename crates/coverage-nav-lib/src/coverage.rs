//! Road segment coverage tracking
//!
//! The tracker keeps two disjoint sets over the driveable segments of an area.
//! Each fix is tested against the undriven set only; anything within the
//! promotion radius moves to the driven set for good. Promotions are collected
//! in a pending set that the navigator flushes to persistence in batches.

use crate::area::{AreaId, CoverageSegment, SegmentId};
use crate::config::CoverageConfig;
use crate::geometry::{distance_meters, point_to_polyline_meters};
use geo::{Coord, Point, Rect};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A batch of newly driven segments handed to the persistence sink
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlushBatch {
    pub area_id: AreaId,
    pub segment_ids: Vec<SegmentId>,
}

/// Geometry of a driveable segment with its precomputed bounds
#[derive(Debug, Clone)]
struct TrackedSegment {
    geometry: Vec<Point<f64>>,
    length_meters: f64,
    /// Bounding box in degrees
    bounds: Rect<f64>,
}

impl TrackedSegment {
    fn new(geometry: Vec<Point<f64>>, length_meters: f64) -> Option<Self> {
        let first = geometry.first()?;
        let mut min = Coord { x: first.x(), y: first.y() };
        let mut max = min;
        for p in &geometry {
            min.x = min.x.min(p.x());
            min.y = min.y.min(p.y());
            max.x = max.x.max(p.x());
            max.y = max.y.max(p.y());
        }
        Some(Self {
            geometry,
            length_meters,
            bounds: Rect::new(min, max),
        })
    }

    /// Whether `point` is within `radius_m` of the segment's polyline
    fn is_within(&self, point: Point<f64>, radius_m: f64) -> bool {
        // The nearest point of the bounding box bounds the polyline distance from below
        let nearest = Point::new(
            point.x().clamp(self.bounds.min().x, self.bounds.max().x),
            point.y().clamp(self.bounds.min().y, self.bounds.max().y),
        );
        if distance_meters(point, nearest) > radius_m {
            return false;
        }
        point_to_polyline_meters(point, &self.geometry).is_some_and(|d| d <= radius_m)
    }
}

/// Driven/undriven bookkeeping for one area
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    area_id: AreaId,
    config: CoverageConfig,
    segments: HashMap<SegmentId, TrackedSegment>,
    driven: BTreeSet<SegmentId>,
    undriven: BTreeSet<SegmentId>,
    /// Promoted but not yet handed to persistence
    pending: BTreeSet<SegmentId>,
    /// Handed to persistence, awaiting the outcome
    in_flight: Option<BTreeSet<SegmentId>>,
    baseline_percent: f64,
    promoted_locally: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl CoverageTracker {
    /// Build the tracker for an area; undriveable and empty segments are excluded
    pub fn new(
        area_id: AreaId,
        segments: Vec<CoverageSegment>,
        baseline_percent: f64,
        config: CoverageConfig,
    ) -> Self {
        let mut tracked = HashMap::with_capacity(segments.len());
        let mut driven = BTreeSet::new();
        let mut undriven = BTreeSet::new();
        let mut skipped = 0usize;

        for segment in segments {
            if segment.undriveable {
                continue;
            }
            let Some(geometry) = TrackedSegment::new(segment.geometry, segment.length_meters)
            else {
                skipped += 1;
                continue;
            };
            if segment.driven {
                driven.insert(segment.segment_id);
            } else {
                undriven.insert(segment.segment_id);
            }
            tracked.insert(segment.segment_id, geometry);
        }

        if skipped > 0 {
            tracing::warn!(%area_id, skipped, "Ignoring coverage segments without geometry");
        }
        tracing::info!(
            %area_id,
            driven = driven.len(),
            undriven = undriven.len(),
            "Coverage tracker ready"
        );

        Self {
            area_id,
            config,
            segments: tracked,
            driven,
            undriven,
            pending: BTreeSet::new(),
            in_flight: None,
            baseline_percent,
            promoted_locally: false,
        }
    }

    #[inline]
    pub fn area_id(&self) -> &AreaId {
        &self.area_id
    }

    pub fn driven(&self) -> &BTreeSet<SegmentId> {
        &self.driven
    }

    pub fn undriven(&self) -> &BTreeSet<SegmentId> {
        &self.undriven
    }

    pub fn pending(&self) -> &BTreeSet<SegmentId> {
        &self.pending
    }

    #[inline]
    pub fn is_flush_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_driven(&self, id: SegmentId) -> bool {
        self.driven.contains(&id)
    }

    /// Geometry of a tracked segment, for rendering
    pub fn geometry(&self, id: SegmentId) -> Option<&[Point<f64>]> {
        self.segments.get(&id).map(|s| s.geometry.as_slice())
    }

    /// Promote every undriven segment near `point`; returns the newly driven ids
    pub fn observe(&mut self, point: Point<f64>) -> Vec<SegmentId> {
        #[cfg(feature = "profiling")]
        profiling::scope!("coverage::observe");

        let radius = self.config.promote_radius_m;
        let segments = &self.segments;
        let mut hits: Vec<SegmentId> = self
            .undriven
            .par_iter()
            .copied()
            .filter(|id| segments.get(id).is_some_and(|s| s.is_within(point, radius)))
            .collect();
        hits.sort_unstable();

        for id in &hits {
            self.undriven.remove(id);
            self.driven.insert(*id);
            self.pending.insert(*id);
        }
        if !hits.is_empty() {
            self.promoted_locally = true;
            tracing::debug!(area_id = %self.area_id, promoted = hits.len(), "Segments driven");
        }
        hits
    }

    /// Move the pending set in flight, unless a flush is already running
    pub fn begin_flush(&mut self) -> Option<FlushBatch> {
        if self.in_flight.is_some() || self.pending.is_empty() {
            return None;
        }
        let ids = std::mem::take(&mut self.pending);
        let batch = FlushBatch {
            area_id: self.area_id.clone(),
            segment_ids: ids.iter().copied().collect(),
        };
        self.in_flight = Some(ids);
        Some(batch)
    }

    /// Record the outcome of the in-flight flush
    ///
    /// A failure puts its ids back in the pending set. Driven state is never
    /// reverted. Returns whether anything was re-queued.
    pub fn complete_flush(&mut self, success: bool) -> bool {
        let Some(ids) = self.in_flight.take() else {
            tracing::debug!(area_id = %self.area_id, "Flush completion without a flush in flight");
            return false;
        };
        if success {
            return false;
        }
        let requeued = !ids.is_empty();
        self.pending.extend(ids);
        requeued
    }

    /// Take everything not yet confirmed (pending and in flight) for a final flush
    pub fn drain_unconfirmed(&mut self) -> Option<FlushBatch> {
        let mut ids = std::mem::take(&mut self.pending);
        if let Some(in_flight) = self.in_flight.take() {
            ids.extend(in_flight);
        }
        if ids.is_empty() {
            return None;
        }
        Some(FlushBatch {
            area_id: self.area_id.clone(),
            segment_ids: ids.into_iter().collect(),
        })
    }

    /// Driven share of the driveable length, in percent
    ///
    /// Reports the supplied baseline until something is promoted locally.
    pub fn coverage_percent(&self) -> f64 {
        if !self.promoted_locally {
            return self.baseline_percent;
        }
        let total: f64 = self.segments.values().map(|s| s.length_meters).sum();
        if total <= 0.0 {
            return self.baseline_percent;
        }
        let driven: f64 = self
            .driven
            .iter()
            .filter_map(|id| self.segments.get(id))
            .map(|s| s.length_meters)
            .sum();
        driven / total * 100.0
    }
}
