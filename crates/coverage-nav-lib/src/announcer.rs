//! Turn-by-turn instruction text derived from progress

use crate::Route;
use crate::maneuver::{Maneuver, TurnType};
use crate::state_machine::NavState;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the driver is told right now
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Announcement {
    pub instruction_text: String,
    pub distance_to_next_label: String,
    /// Rotation of the maneuver arrow icon, clockwise from "straight ahead"
    pub icon_rotation_deg: f64,
}

/// Context the announcer needs besides the route and progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnounceContext {
    pub state: NavState,
    pub progress: f64,
    /// Straight-line distance to the route start, if a fix is known
    pub distance_to_start: Option<f64>,
    pub waiting_for_signal: bool,
    pub dead_band_m: f64,
}

fn instruction_for(turn: TurnType) -> &'static str {
    match turn {
        TurnType::Depart => "Head along the route",
        TurnType::Straight => "Continue straight",
        TurnType::SlightLeft => "Keep slightly left",
        TurnType::SlightRight => "Keep slightly right",
        TurnType::Left => "Turn left",
        TurnType::Right => "Turn right",
        TurnType::SharpLeft => "Turn sharp left",
        TurnType::SharpRight => "Turn sharp right",
        TurnType::UTurn => "Make a U-turn",
        TurnType::Arrive => "Arrive at the end of the route",
    }
}

fn icon_rotation_for(turn: TurnType) -> f64 {
    match turn {
        TurnType::Depart | TurnType::Straight | TurnType::Arrive => 0.0,
        TurnType::SlightLeft => -45.0,
        TurnType::SlightRight => 45.0,
        TurnType::Left => -90.0,
        TurnType::Right => 90.0,
        TurnType::SharpLeft => -135.0,
        TurnType::SharpRight => 135.0,
        TurnType::UTurn => 180.0,
    }
}

/// Format a distance for display: tens of meters below a kilometre, else km
pub fn format_distance(meters: f64) -> String {
    let meters = meters.max(0.0);
    // Round first, 995 m reads as 1.0 km
    let tens = (meters / 10.0).round() as i64 * 10;
    if tens >= 1000 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{tens} m")
    }
}

/// First maneuver beyond the dead-band ahead of progress
pub fn next_maneuver(route: &Route, progress: f64, dead_band_m: f64) -> Option<&Maneuver> {
    route
        .maneuvers()
        .iter()
        .find(|m| m.distance_along_meters > progress + dead_band_m)
}

/// Build the announcement for the current state
pub fn announce(route: &Route, context: &AnnounceContext) -> Announcement {
    let fixed = |text: &str, label: String| Announcement {
        instruction_text: text.to_string(),
        distance_to_next_label: label,
        icon_rotation_deg: 0.0,
    };

    if context.waiting_for_signal {
        return fixed("Waiting for GPS signal", String::new());
    }

    let start_label = context.distance_to_start.map(format_distance).unwrap_or_default();
    match context.state {
        NavState::Setup => fixed("Select an area to load its route", String::new()),
        NavState::RoutePreview => fixed("Route ready, start when you are", start_label),
        NavState::NavigatingToStart => fixed("Head to the start of the route", start_label),
        NavState::ArrivedAtStart => fixed("You are at the start, get ready", String::new()),
        NavState::OffRoute => fixed("Return to the route", String::new()),
        NavState::ResumeAhead => fixed("Resume the route further ahead?", String::new()),
        NavState::Arrived => fixed("You have arrived", String::new()),
        NavState::ActiveNavigation => {
            match next_maneuver(route, context.progress, context.dead_band_m) {
                Some(maneuver) => Announcement {
                    instruction_text: instruction_for(maneuver.turn_type).to_string(),
                    distance_to_next_label: format_distance(
                        maneuver.distance_along_meters - context.progress,
                    ),
                    icon_rotation_deg: icon_rotation_for(maneuver.turn_type),
                },
                None => fixed(instruction_for(TurnType::Arrive), String::new()),
            }
        }
    }
}
