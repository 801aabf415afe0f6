//! Coverage Navigation Library - Route Guidance and Road Coverage Tracking
//!
//! This library guides a driver along a predefined route while recording which
//! road segments of a coverage area have been driven. It is deterministic and
//! I/O free: the caller feeds timestamped events in and dispatches the returned
//! effects to its own services.
//!
//! # Architecture
//!
//! - **[`Route`]**: Immutable polyline with cumulative distances and maneuvers
//! - **[`PositionMatcher`]**: Windowed projection of fixes onto the route
//! - **[`ProgressSmoother`]**: Monotonic, speed-limited progress filter
//! - **[`next_state`]**: Pure navigation state transitions
//! - **[`CoverageTracker`]**: Segment promotion and batched persistence
//! - **[`Navigator`]**: One `handle(now, event)` entry point over all of the above
//!
//! # Pipeline
//!
//! ```text
//! fix -> matcher -> smoother -> state machine -> announcer
//!    \-> coverage tracker -> debounced flush
//! ```

pub mod announcer;
mod area;
pub mod config;
mod coverage;
mod event;
mod fix;
pub mod geometry;
mod maneuver;
mod matcher;
mod navigator;
mod route;
mod scheduler;
pub mod services;
mod session;
mod smoother;
mod state_machine;

// Public API exports
pub use announcer::{AnnounceContext, Announcement, announce};
pub use area::{AreaData, AreaId, CoverageSegment, SegmentId};
pub use config::Config;
pub use coverage::{CoverageTracker, FlushBatch};
pub use event::{CameraDirective, DirectionsPurpose, Effect, NavEvent, ViewMode};
pub use fix::{FixRejection, PositionFix};
pub use maneuver::{Maneuver, TurnType};
pub use matcher::{MatchResult, PositionMatcher, forward_candidate};
pub use navigator::Navigator;
pub use route::{Route, gpx_points};
pub use scheduler::{TaskKey, TaskScheduler};
pub use session::{NavigationSession, PendingDirections};
pub use smoother::ProgressSmoother;
pub use state_machine::{NavState, TransitionInput, next_state};

/// Error types for the navigation core and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("No route found for area {0}")]
    NoRouteFound(AreaId),

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Directions unavailable: {0}")]
    DirectionsUnavailable(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NavError>;
