//! Coverage Navigator - Application Library
//!
//! Drives the `coverage-nav-lib` navigator from files: a route and coverage
//! metadata per area, a recorded drive to replay, and a small JSON key/value
//! store for the last area and the driven segments.

mod app;
pub mod logging;

pub use app::{
    AppError, AppResult, FileRouteSupply, LogRenderer, RenderStats, Replay, ReplayOptions,
    Settings, StoragePersistenceSink, StraightLineDirections, load_fixes, run, storage,
};
