//! Headless rendering surface that narrates effects through `tracing`

use coverage_nav_lib::services::RenderSurface;
use coverage_nav_lib::{Effect, NavState};

/// What a replay ended up showing, for the summary line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub state: NavState,
    pub instructions: usize,
    pub segments_driven: usize,
    pub coverage_percent: Option<f64>,
    pub progress_meters: f64,
}

#[derive(Debug, Default)]
pub struct LogRenderer {
    stats: RenderStats,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }
}

impl RenderSurface for LogRenderer {
    fn render(&mut self, effect: &Effect) {
        match effect {
            Effect::StateChanged { from, to } => {
                self.stats.state = *to;
                tracing::info!("[{from}] -> [{to}]");
            }
            Effect::ShowRoute(route) => tracing::info!(
                points = route.coords().len(),
                length_m = format!("{:.0}", route.total_distance()),
                maneuvers = route.maneuvers().len(),
                "Showing route"
            ),
            Effect::ShowCoverage { driven, undriven } => tracing::info!(
                driven = driven.len(),
                undriven = undriven.len(),
                "Showing coverage"
            ),
            Effect::SegmentsDriven {
                segment_ids,
                coverage_percent,
                ..
            } => {
                self.stats.segments_driven += segment_ids.len();
                self.stats.coverage_percent = Some(*coverage_percent);
                tracing::info!(
                    ?segment_ids,
                    coverage = format!("{coverage_percent:.1}%"),
                    "Segments driven"
                );
            }
            Effect::Position {
                position,
                heading_deg,
                progress_meters,
                ..
            } => {
                self.stats.progress_meters = *progress_meters;
                tracing::debug!(
                    lat = position.y(),
                    lon = position.x(),
                    ?heading_deg,
                    progress_m = format!("{progress_meters:.0}"),
                    "Position"
                );
            }
            Effect::Camera(camera) => tracing::trace!(?camera, "Camera"),
            Effect::Instruction(announcement) => {
                self.stats.instructions += 1;
                tracing::info!(
                    "{} {}",
                    announcement.instruction_text,
                    announcement.distance_to_next_label
                );
            }
            Effect::GuidancePath {
                purpose,
                path,
                straight_line,
            } => tracing::info!(?purpose, points = path.len(), straight_line, "Guidance path"),
            Effect::SignalLost => tracing::warn!("GPS signal lost"),
            Effect::SignalRestored => tracing::info!("GPS signal restored"),
            other => tracing::trace!(?other, "Not a render effect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverage_nav_lib::{AreaId, SegmentId};

    #[test]
    fn test_stats_follow_effects() {
        let mut renderer = LogRenderer::new();
        renderer.render(&Effect::StateChanged {
            from: NavState::RoutePreview,
            to: NavState::ActiveNavigation,
        });
        renderer.render(&Effect::SegmentsDriven {
            area_id: AreaId::from("a"),
            segment_ids: vec![SegmentId(1), SegmentId(2)],
            coverage_percent: 12.5,
        });

        let stats = renderer.stats();
        assert_eq!(stats.state, NavState::ActiveNavigation);
        assert_eq!(stats.segments_driven, 2);
        assert_eq!(stats.coverage_percent, Some(12.5));
    }
}
