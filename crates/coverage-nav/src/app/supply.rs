//! Route supply backed by a directory of files
//!
//! An area `name` is `<dir>/name.gpx` (the route) plus an optional
//! `<dir>/name.coverage.json` holding the segment metadata:
//!
//! ```json
//! { "baseline_percent": 12.5,
//!   "segments": [ { "segment_id": 1, "length_meters": 90.0,
//!                   "geometry": [ {"x": -0.12, "y": 51.50}, {"x": -0.12, "y": 51.51} ] } ] }
//! ```

use coverage_nav_lib::services::RouteSupply;
use coverage_nav_lib::{AreaData, AreaId, CoverageSegment, NavError, Result, gpx_points};
use serde::Deserialize;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoverageFile {
    segments: Vec<CoverageSegment>,
    baseline_percent: f64,
}

pub struct FileRouteSupply {
    dir: PathBuf,
}

impl FileRouteSupply {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn route_path(&self, area_id: &AreaId) -> PathBuf {
        self.dir.join(format!("{area_id}.gpx"))
    }

    pub fn coverage_path(&self, area_id: &AreaId) -> PathBuf {
        self.dir.join(format!("{area_id}.coverage.json"))
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl RouteSupply for FileRouteSupply {
    fn load_area(&self, area_id: &AreaId) -> impl Future<Output = Result<AreaData>> + Send {
        let route_path = self.route_path(area_id);
        let coverage_path = self.coverage_path(area_id);
        let area_id = area_id.clone();

        async move {
            let Some(route_bytes) = read_optional(&route_path).await? else {
                return Err(NavError::NoRouteFound(area_id));
            };
            let gpx = gpx::read(route_bytes.as_slice())?;
            let route = gpx_points(&gpx);

            let coverage = match read_optional(&coverage_path).await? {
                Some(bytes) => serde_json::from_slice::<CoverageFile>(&bytes)
                    .map_err(std::io::Error::from)?,
                None => {
                    tracing::info!(%area_id, "No coverage metadata, tracking the route only");
                    CoverageFile::default()
                }
            };

            tracing::debug!(
                %area_id,
                points = route.len(),
                segments = coverage.segments.len(),
                "Read area files"
            );
            Ok(AreaData {
                area_id,
                route,
                segments: coverage.segments,
                baseline_percent: coverage.baseline_percent,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use coverage_nav_lib::geometry::offset_meters;
    use geo::Point;
    use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

    pub(crate) fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("coverage-nav-supply-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `<dir>/<area>.gpx` with `count` points due north, 100 m apart
    pub(crate) fn write_route(dir: &Path, area: &str, origin: Point<f64>, count: usize) {
        let mut segment = TrackSegment::default();
        segment.points.extend(
            (0..count).map(|i| Waypoint::new(offset_meters(origin, i as f64 * 100.0, 0.0))),
        );
        let mut track = Track::default();
        track.segments.push(segment);
        let mut doc = Gpx {
            version: GpxVersion::Gpx11,
            ..Default::default()
        };
        doc.tracks.push(track);

        let file = std::fs::File::create(dir.join(format!("{area}.gpx"))).unwrap();
        gpx::write(&doc, file).unwrap();
    }

    #[tokio::test]
    async fn test_missing_area_is_no_route_found() {
        let supply = FileRouteSupply::new(temp_dir("missing"));
        let result = supply.load_area(&AreaId::from("nowhere")).await;
        assert!(matches!(result, Err(NavError::NoRouteFound(id)) if id.as_str() == "nowhere"));
    }

    #[tokio::test]
    async fn test_loads_route_and_coverage() {
        let dir = temp_dir("full");
        let origin = Point::new(-0.1278, 51.5074);
        write_route(&dir, "north", origin, 5);
        std::fs::write(
            dir.join("north.coverage.json"),
            r#"{"baseline_percent": 40.0, "segments": [
                {"segment_id": 7, "length_meters": 100.0, "driven": true,
                 "geometry": [{"x": -0.1278, "y": 51.5074}, {"x": -0.1278, "y": 51.5083}]}
            ]}"#,
        )
        .unwrap();

        let area = FileRouteSupply::new(&dir)
            .load_area(&AreaId::from("north"))
            .await
            .unwrap();
        assert_eq!(area.route.len(), 5);
        assert_eq!(area.baseline_percent, 40.0);
        assert_eq!(area.segments.len(), 1);
        assert!(area.segments[0].driven);
        assert!(!area.segments[0].undriveable);
    }

    #[tokio::test]
    async fn test_coverage_file_is_optional() {
        let dir = temp_dir("route-only");
        write_route(&dir, "plain", Point::new(2.35, 48.85), 3);

        let area = FileRouteSupply::new(&dir)
            .load_area(&AreaId::from("plain"))
            .await
            .unwrap();
        assert_eq!(area.route.len(), 3);
        assert!(area.segments.is_empty());
    }
}
