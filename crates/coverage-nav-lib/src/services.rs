//! Collaborators the navigator's effects are dispatched to
//!
//! The core never calls these itself. A driver (the CLI runner, a UI shell)
//! owns implementations and turns [`Effect`]s into calls, feeding results back
//! as [`NavEvent`](crate::NavEvent)s.

use crate::{AreaData, AreaId, Effect, FlushBatch, Result};
use geo::Point;
use std::future::Future;

/// Source of route and coverage metadata for an area
pub trait RouteSupply {
    /// # Errors
    /// `NavError::NoRouteFound` when the area has no route.
    fn load_area(&self, area_id: &AreaId) -> impl Future<Output = Result<AreaData>> + Send;
}

/// Turn-by-turn directions between two points
pub trait DirectionsService {
    /// A road-following path from `from` to `to`, both endpoints included
    ///
    /// # Errors
    /// `NavError::DirectionsUnavailable` when no path can be computed.
    fn directions(
        &self,
        from: Point<f64>,
        to: Point<f64>,
    ) -> impl Future<Output = Result<Vec<Point<f64>>>> + Send;
}

/// Durable storage for driven segment ids
pub trait PersistenceSink {
    /// # Errors
    /// `NavError::PersistenceFailure` when the batch was not stored. Stored
    /// batches are idempotent; resending one is harmless.
    fn persist(&self, batch: &FlushBatch) -> impl Future<Output = Result<()>> + Send;
}

/// Whatever shows the map, the instruction banner and the prompts
pub trait RenderSurface {
    /// Present one render effect; non-render effects are never passed here
    fn render(&mut self, effect: &Effect);
}

/// Whether an effect is meant for the rendering surface
pub fn is_render_effect(effect: &Effect) -> bool {
    matches!(
        effect,
        Effect::StateChanged { .. }
            | Effect::ShowRoute(_)
            | Effect::ShowCoverage { .. }
            | Effect::SegmentsDriven { .. }
            | Effect::Position { .. }
            | Effect::Camera(_)
            | Effect::Instruction(_)
            | Effect::GuidancePath { .. }
            | Effect::SignalLost
            | Effect::SignalRestored
    )
}
