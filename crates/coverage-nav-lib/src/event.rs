//! Inputs the navigator consumes and side effects it asks its caller to perform

use crate::announcer::Announcement;
use crate::area::{AreaData, AreaId, SegmentId};
use crate::coverage::FlushBatch;
use crate::fix::PositionFix;
use crate::state_machine::NavState;
use crate::Route;
use geo::Point;
use std::sync::Arc;

/// What a directions request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionsPurpose {
    /// From the driver to the route start
    ToStart,
    /// From the driver to a resume point further down the route
    ResumeAhead,
}

/// User-toggled map view flags, read back from the rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewMode {
    pub follow: bool,
    pub overview: bool,
}

impl Default for ViewMode {
    fn default() -> Self {
        Self {
            follow: true,
            overview: false,
        }
    }
}

/// Camera instruction while following the driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraDirective {
    pub center: Point<f64>,
    pub bearing_deg: Option<f64>,
}

/// Everything that can happen to a navigator
#[derive(Debug, Clone)]
pub enum NavEvent {
    /// Route and coverage metadata of an area arrived from the route supply
    AreaLoaded(AreaData),
    /// A raw fix from the positioning source
    Fix(PositionFix),
    /// The driver asked to start
    Begin,
    AcceptResume,
    DismissResume,
    /// Response to an earlier `Effect::RequestDirections`
    DirectionsResolved {
        request_id: u64,
        result: Result<Vec<Point<f64>>, String>,
    },
    /// Outcome of an earlier `Effect::Persist`
    CoverageFlushed { area_id: AreaId, success: bool },
    SetViewMode(ViewMode),
    /// Time passed; runs due tasks and signal checks
    Tick,
    /// The driver ended navigation
    End,
}

/// Side effects, dispatched by whoever drives the navigator
#[derive(Debug, Clone)]
pub enum Effect {
    StateChanged { from: NavState, to: NavState },
    /// Full route geometry, sent once per load
    ShowRoute(Arc<Route>),
    /// Coverage sets of a freshly loaded area
    ShowCoverage {
        driven: Vec<SegmentId>,
        undriven: Vec<SegmentId>,
    },
    /// Segments that just became driven
    SegmentsDriven {
        area_id: AreaId,
        segment_ids: Vec<SegmentId>,
        coverage_percent: f64,
    },
    /// Position marker and the progress sub-path
    Position {
        position: Point<f64>,
        heading_deg: Option<f64>,
        progress_meters: f64,
        traveled: Vec<Point<f64>>,
    },
    Camera(CameraDirective),
    Instruction(Announcement),
    /// Guidance polyline towards the start or a resume point
    GuidancePath {
        purpose: DirectionsPurpose,
        path: Vec<Point<f64>>,
        straight_line: bool,
    },
    RequestDirections {
        request_id: u64,
        purpose: DirectionsPurpose,
        from: Point<f64>,
        to: Point<f64>,
    },
    /// Hand a batch to the persistence sink; `final_flush` batches get no completion event
    Persist { batch: FlushBatch, final_flush: bool },
    /// Store the area id in local session memory
    RememberArea(AreaId),
    SignalLost,
    SignalRestored,
}
