//! Coverage areas as handed over by the route supply service

use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque name of a coverage area
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct AreaId(pub String);

impl AreaId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AreaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AreaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AreaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an atomic piece of road geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SegmentId(pub u64);

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coverage metadata for one road segment
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverageSegment {
    pub segment_id: SegmentId,
    /// `[lon, lat]` polyline
    pub geometry: Vec<Point<f64>>,
    pub length_meters: f64,
    /// Already driven according to the service
    #[cfg_attr(feature = "serde", serde(default))]
    pub driven: bool,
    /// Excluded from coverage (private roads, footways, ...)
    #[cfg_attr(feature = "serde", serde(default))]
    pub undriveable: bool,
}

/// Everything needed to start a session in an area
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AreaData {
    pub area_id: AreaId,
    /// Ordered route polyline
    pub route: Vec<Point<f64>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub segments: Vec<CoverageSegment>,
    /// Coverage percentage reported by the service
    #[cfg_attr(feature = "serde", serde(default))]
    pub baseline_percent: f64,
}
