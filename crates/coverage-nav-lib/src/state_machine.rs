//! Navigation states and the pure fix-driven transition function
//!
//! Event-driven transitions (route loaded, begin, settle timer, resume
//! accept/dismiss, end) are applied by the session; everything a fix can cause
//! is decided here from plain numbers so it can be tested without a route.

use crate::config::NavigationConfig;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Navigation session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum NavState {
    #[default]
    Setup,
    RoutePreview,
    NavigatingToStart,
    ArrivedAtStart,
    ActiveNavigation,
    OffRoute,
    ResumeAhead,
    Arrived,
}

impl NavState {
    /// States in which fixes are matched against the route and progress moves
    #[inline]
    pub fn is_guiding(&self) -> bool {
        matches!(
            self,
            Self::ActiveNavigation | Self::OffRoute | Self::ResumeAhead
        )
    }

    /// States in which a driver is out on the road for this session
    #[inline]
    pub fn is_underway(&self) -> bool {
        !matches!(self, Self::Setup | Self::RoutePreview)
    }
}

impl std::fmt::Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "SETUP"),
            Self::RoutePreview => write!(f, "ROUTE_PREVIEW"),
            Self::NavigatingToStart => write!(f, "NAVIGATING_TO_START"),
            Self::ArrivedAtStart => write!(f, "ARRIVED_AT_START"),
            Self::ActiveNavigation => write!(f, "ACTIVE_NAVIGATION"),
            Self::OffRoute => write!(f, "OFF_ROUTE"),
            Self::ResumeAhead => write!(f, "RESUME_AHEAD"),
            Self::Arrived => write!(f, "ARRIVED"),
        }
    }
}

/// Everything a fix contributes to a transition decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionInput {
    pub smoothed_progress: f64,
    pub remaining_distance: f64,
    /// Shortest distance from the fix to the route
    pub perpendicular_distance: f64,
    /// The fix snapped to the route far ahead of progress in one implausible jump
    pub rejoined_ahead: bool,
    pub has_resume_candidate: bool,
    /// Straight-line distance from the fix to the route start
    pub distance_to_start: f64,
}

/// Decide the state after a fix
pub fn next_state(current: NavState, input: &TransitionInput, config: &NavigationConfig) -> NavState {
    // Rejoining far ahead leaves progress behind just like leaving the road does
    let off_route = input.perpendicular_distance > config.off_route_m || input.rejoined_ahead;
    let far_off = input.perpendicular_distance > config.resume_ahead_m || input.rejoined_ahead;

    match current {
        NavState::Setup | NavState::RoutePreview | NavState::Arrived | NavState::ArrivedAtStart => {
            current
        }
        NavState::NavigatingToStart => {
            if input.distance_to_start <= config.start_radius_m {
                NavState::ArrivedAtStart
            } else {
                current
            }
        }
        NavState::ActiveNavigation => {
            if input.remaining_distance < config.arrival_m {
                NavState::Arrived
            } else if far_off {
                NavState::ResumeAhead
            } else if off_route {
                NavState::OffRoute
            } else {
                current
            }
        }
        NavState::OffRoute => {
            if input.remaining_distance < config.arrival_m {
                NavState::Arrived
            } else if !off_route {
                NavState::ActiveNavigation
            } else if far_off && input.has_resume_candidate {
                NavState::ResumeAhead
            } else {
                current
            }
        }
        NavState::ResumeAhead => {
            if input.remaining_distance < config.arrival_m {
                NavState::Arrived
            } else if !off_route {
                NavState::ActiveNavigation
            } else if !input.has_resume_candidate {
                // Nothing to resume to any more
                NavState::OffRoute
            } else {
                current
            }
        }
    }
}
