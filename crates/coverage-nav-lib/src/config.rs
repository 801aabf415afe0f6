//! Tuning parameters for every component of the navigation core
//!
//! The defaults are the values the navigation behaviour was tuned with. None of
//! them are protocol guarantees: deployments may override any of them (the
//! application loads overrides from a JSON file).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub maneuvers: ManeuverConfig,
    pub matcher: MatcherConfig,
    pub smoother: SmootherConfig,
    pub navigation: NavigationConfig,
    pub coverage: CoverageConfig,
}

/// Maneuver detection while building a route
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManeuverConfig {
    /// Interior vertices turning less than this are not maneuvers
    pub min_turn_deg: f64,
    /// Minimum along-route gap since the previously emitted maneuver
    pub min_spacing_m: f64,
    /// Both segments around a vertex must be at least this long (noise floor)
    pub min_segment_m: f64,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            min_turn_deg: 28.0,
            min_spacing_m: 40.0,
            min_segment_m: 8.0,
        }
    }
}

/// Windowed route matching
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherConfig {
    /// Segments searched behind the previous match
    pub look_behind: usize,
    /// Segments searched ahead of the previous match
    pub look_ahead: usize,
    /// A windowed best match further than this triggers a full scan
    pub full_scan_distance_m: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            look_behind: 3,
            look_ahead: 12,
            full_scan_distance_m: 250.0,
        }
    }
}

/// Progress smoothing
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmootherConfig {
    /// Regressions larger than this need corroboration
    pub backward_jump_m: f64,
    /// How many of the buffered samples must agree with a regression
    pub corroboration_min: usize,
    /// Ring buffer capacity (also the corroboration window)
    pub history_capacity: usize,
    /// Upper bound on accepted forward progress speed
    pub max_speed_mps: f64,
    /// Weight of the clamped raw sample in the blend (the moving average gets the rest)
    pub raw_weight: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            backward_jump_m: 50.0,
            corroboration_min: 3,
            history_capacity: 5,
            max_speed_mps: 50.0,
            raw_weight: 0.7,
        }
    }
}

/// State machine thresholds and signal handling
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NavigationConfig {
    /// Distance to the route start that counts as "at the start"
    pub start_radius_m: f64,
    /// Delay between arriving at the start and active guidance
    pub settle_delay_ms: i64,
    /// Distance from the route above which the driver is off route
    pub off_route_m: f64,
    /// Distance from the route, or jump ahead of progress, above which a resume-ahead point is sought
    pub resume_ahead_m: f64,
    /// A resume candidate must be at most this far from the driver
    pub resume_radius_m: f64,
    /// Remaining distance under which the driver has arrived
    pub arrival_m: f64,
    /// Dead-band before the next maneuver is selected
    pub announce_dead_band_m: f64,
    /// Fixes older than this (relative to the caller's clock) are ignored
    pub fix_max_age_ms: i64,
    /// Without a usable fix for this long the session waits for signal
    pub signal_timeout_ms: i64,
    /// Fixes reporting a worse accuracy are ignored
    pub max_accuracy_m: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            start_radius_m: 50.0,
            settle_delay_ms: 1_500,
            off_route_m: 60.0,
            resume_ahead_m: 500.0,
            resume_radius_m: 500.0,
            arrival_m: 25.0,
            announce_dead_band_m: 5.0,
            fix_max_age_ms: 10_000,
            signal_timeout_ms: 10_000,
            max_accuracy_m: 100.0,
        }
    }
}

/// Segment coverage tracking
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoverageConfig {
    /// A fix this close to an undriven segment marks it driven
    pub promote_radius_m: f64,
    /// Quiet period after the last promotion before a flush
    pub flush_quiet_ms: i64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            promote_radius_m: 25.0,
            flush_quiet_ms: 2_000,
        }
    }
}
