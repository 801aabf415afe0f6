//! Turn detection along a route polyline

use crate::config::ManeuverConfig;
use crate::geometry::{angle_delta_deg, bearing_deg};
use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Turn categories, including the synthetic start and end of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TurnType {
    Depart,
    Straight,
    SlightLeft,
    SlightRight,
    Left,
    Right,
    SharpLeft,
    SharpRight,
    #[cfg_attr(feature = "serde", serde(rename = "uturn"))]
    UTurn,
    Arrive,
}

impl TurnType {
    /// Classify a signed heading change (positive = right)
    pub fn classify(delta_deg: f64) -> Self {
        let magnitude = delta_deg.abs();
        let right = delta_deg > 0.0;
        if magnitude > 150.0 {
            Self::UTurn
        } else if magnitude > 100.0 {
            if right { Self::SharpRight } else { Self::SharpLeft }
        } else if magnitude > 50.0 {
            if right { Self::Right } else { Self::Left }
        } else if magnitude > 25.0 {
            if right { Self::SlightRight } else { Self::SlightLeft }
        } else {
            Self::Straight
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Depart => "depart",
            Self::Straight => "straight",
            Self::SlightLeft => "slight-left",
            Self::SlightRight => "slight-right",
            Self::Left => "left",
            Self::Right => "right",
            Self::SharpLeft => "sharp-left",
            Self::SharpRight => "sharp-right",
            Self::UTurn => "uturn",
            Self::Arrive => "arrive",
        }
    }
}

impl std::fmt::Display for TurnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A turn instruction anchored to an along-route distance
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Maneuver {
    /// Route vertex the maneuver happens at
    pub index: usize,
    pub distance_along_meters: f64,
    pub turn_type: TurnType,
    /// Signed heading change at the vertex (positive = right)
    pub heading_delta_deg: f64,
}

/// Scan the interior vertices of a route and emit its maneuver list
///
/// `cumulative` and `segment_lengths` must be the route's derived distances.
/// The result always starts with `Depart` at 0 and ends with `Arrive` at the
/// total length.
pub(crate) fn detect_maneuvers(
    coords: &[Point<f64>],
    cumulative: &[f64],
    segment_lengths: &[f64],
    config: &ManeuverConfig,
) -> Vec<Maneuver> {
    let last = coords.len().saturating_sub(1);
    let total = cumulative.last().copied().unwrap_or(0.0);

    let mut maneuvers = vec![Maneuver {
        index: 0,
        distance_along_meters: 0.0,
        turn_type: TurnType::Depart,
        heading_delta_deg: 0.0,
    }];
    let mut last_emitted_along = 0.0;

    for i in 1..last {
        let inbound_len = segment_lengths[i - 1];
        let outbound_len = segment_lengths[i];
        if inbound_len < config.min_segment_m || outbound_len < config.min_segment_m {
            continue;
        }

        let inbound = bearing_deg(coords[i - 1], coords[i]);
        let outbound = bearing_deg(coords[i], coords[i + 1]);
        let delta = angle_delta_deg(inbound, outbound);
        if delta.abs() < config.min_turn_deg {
            continue;
        }

        let along = cumulative[i];
        if along - last_emitted_along < config.min_spacing_m {
            tracing::trace!(vertex = i, along, "Skipping turn too close to previous maneuver");
            continue;
        }

        maneuvers.push(Maneuver {
            index: i,
            distance_along_meters: along,
            turn_type: TurnType::classify(delta),
            heading_delta_deg: delta,
        });
        last_emitted_along = along;
    }

    maneuvers.push(Maneuver {
        index: last,
        distance_along_meters: total,
        turn_type: TurnType::Arrive,
        heading_delta_deg: 0.0,
    });

    maneuvers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_magnitudes() {
        assert_eq!(TurnType::classify(10.0), TurnType::Straight);
        assert_eq!(TurnType::classify(30.0), TurnType::SlightRight);
        assert_eq!(TurnType::classify(-30.0), TurnType::SlightLeft);
        assert_eq!(TurnType::classify(90.0), TurnType::Right);
        assert_eq!(TurnType::classify(-90.0), TurnType::Left);
        assert_eq!(TurnType::classify(120.0), TurnType::SharpRight);
        assert_eq!(TurnType::classify(-120.0), TurnType::SharpLeft);
        assert_eq!(TurnType::classify(170.0), TurnType::UTurn);
        assert_eq!(TurnType::classify(-170.0), TurnType::UTurn);
    }

    #[test]
    fn test_classify_boundaries_are_exclusive() {
        assert_eq!(TurnType::classify(50.0), TurnType::SlightRight);
        assert_eq!(TurnType::classify(100.0), TurnType::Right);
        assert_eq!(TurnType::classify(150.0), TurnType::SharpRight);
        assert_eq!(TurnType::classify(180.0), TurnType::UTurn);
    }

    #[test]
    fn test_turn_type_display() {
        assert_eq!(TurnType::SlightLeft.to_string(), "slight-left");
        assert_eq!(TurnType::UTurn.to_string(), "uturn");
    }
}
