//! Raw position fixes from the positioning source

use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One raw position sample
///
/// Fixes arrive irregularly and may be noisy or stale; nothing here is trusted
/// until the navigator has checked it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionFix {
    pub lat: f64,
    pub lon: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub accuracy_meters: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub heading_deg: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub speed_mps: Option<f64>,
    pub timestamp_ms: i64,
}

/// Why a fix was not applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixRejection {
    InvalidCoordinates,
    Stale { age_ms: i64 },
    Inaccurate { accuracy_meters: f64 },
}

impl std::fmt::Display for FixRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCoordinates => write!(f, "invalid coordinates"),
            Self::Stale { age_ms } => write!(f, "stale by {age_ms} ms"),
            Self::Inaccurate { accuracy_meters } => write!(f, "accuracy {accuracy_meters:.0} m"),
        }
    }
}

impl PositionFix {
    /// A bare fix with only a position and a timestamp
    pub fn new(point: Point<f64>, timestamp_ms: i64) -> Self {
        Self {
            lat: point.y(),
            lon: point.x(),
            accuracy_meters: None,
            heading_deg: None,
            speed_mps: None,
            timestamp_ms,
        }
    }

    #[inline]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Check a fix against the caller's clock and the accuracy limit
    pub fn check(&self, now_ms: i64, max_age_ms: i64, max_accuracy_m: f64) -> Result<(), FixRejection> {
        if !crate::geometry::is_valid_lon_lat(&self.point()) {
            return Err(FixRejection::InvalidCoordinates);
        }
        let age_ms = now_ms - self.timestamp_ms;
        if age_ms > max_age_ms {
            return Err(FixRejection::Stale { age_ms });
        }
        match self.accuracy_meters {
            Some(accuracy) if accuracy > max_accuracy_m => Err(FixRejection::Inaccurate {
                accuracy_meters: accuracy,
            }),
            _ => Ok(()),
        }
    }
}
