//! Single entry point tying a session, its coverage tracker and the task
//! scheduler together
//!
//! Every input goes through [`Navigator::handle`] with the caller's clock, and
//! every side effect comes back as an [`Effect`]. Due tasks run first on each
//! call, so a driver that only forwards events (and an occasional `Tick`) never
//! misses a deadline.

use crate::Result;
use crate::config::Config;
use crate::coverage::CoverageTracker;
use crate::event::{CameraDirective, Effect, NavEvent, ViewMode};
use crate::fix::PositionFix;
use crate::scheduler::{TaskKey, TaskScheduler};
use crate::session::{Dispatch, NavigationSession};
use crate::state_machine::NavState;
use crate::{AreaData, AreaId, NavError, Route};

/// Owner of everything that lives for one loaded area
#[derive(Debug, Default)]
pub struct Navigator {
    config: Config,
    session: Option<NavigationSession>,
    coverage: Option<CoverageTracker>,
    scheduler: TaskScheduler,
    view: ViewMode,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Navigator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current navigation state, `Setup` when nothing is loaded
    pub fn state(&self) -> NavState {
        self.session.as_ref().map_or(NavState::Setup, NavigationSession::state)
    }

    pub fn session(&self) -> Option<&NavigationSession> {
        self.session.as_ref()
    }

    pub fn coverage(&self) -> Option<&CoverageTracker> {
        self.coverage.as_ref()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view
    }

    /// Earliest deadline the caller should wake up for with a `Tick`
    pub fn next_deadline(&self) -> Option<i64> {
        self.scheduler.next_deadline()
    }

    /// Apply one event at `now_ms` and return the effects to dispatch
    ///
    /// # Errors
    /// `NavError::InvalidRoute` when a loaded area's route is unusable. The
    /// navigator is left exactly as it was.
    pub fn handle(&mut self, now_ms: i64, event: NavEvent) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        self.run_due_tasks(now_ms, &mut effects);

        match event {
            NavEvent::AreaLoaded(area) => self.load_area(now_ms, area, &mut effects)?,
            NavEvent::Fix(fix) => self.on_fix(now_ms, &fix, &mut effects),
            NavEvent::Begin => self.with_session(now_ms, &mut effects, |s, ctx| s.begin(ctx)),
            NavEvent::AcceptResume => {
                self.with_session(now_ms, &mut effects, |s, ctx| s.accept_resume(ctx))
            }
            NavEvent::DismissResume => {
                self.with_session(now_ms, &mut effects, |s, ctx| s.dismiss_resume(ctx))
            }
            NavEvent::DirectionsResolved { request_id, result } => {
                self.with_session(now_ms, &mut effects, |s, ctx| {
                    s.directions_resolved(request_id, result, ctx)
                })
            }
            NavEvent::CoverageFlushed { area_id, success } => {
                self.on_flush_completed(now_ms, &area_id, success)
            }
            NavEvent::SetViewMode(view) => {
                tracing::debug!(?view, "View mode changed");
                self.view = view;
            }
            NavEvent::Tick => {
                self.with_session(now_ms, &mut effects, |s, ctx| s.check_signal(ctx))
            }
            NavEvent::End => self.end(now_ms, &mut effects),
        }
        Ok(effects)
    }

    fn load_area(&mut self, now_ms: i64, area: AreaData, effects: &mut Vec<Effect>) -> Result<()> {
        let AreaData {
            area_id,
            route,
            segments,
            baseline_percent,
        } = area;
        let route = Route::new(route, &self.config.maneuvers).map_err(|e| {
            tracing::error!(%area_id, error = %e, "Rejecting area");
            e
        })?;

        if self.session.is_some() {
            self.end(now_ms, effects);
        }

        tracing::info!(
            %area_id,
            length_m = route.total_distance(),
            maneuvers = route.maneuvers().len(),
            "Area loaded"
        );
        let coverage = CoverageTracker::new(
            area_id.clone(),
            segments,
            baseline_percent,
            self.config.coverage,
        );
        effects.push(Effect::ShowRoute(route.clone()));
        effects.push(Effect::ShowCoverage {
            driven: coverage.driven().iter().copied().collect(),
            undriven: coverage.undriven().iter().copied().collect(),
        });
        effects.push(Effect::StateChanged {
            from: NavState::Setup,
            to: NavState::RoutePreview,
        });
        effects.push(Effect::RememberArea(area_id.clone()));

        self.session = Some(NavigationSession::new(area_id, route, self.config));
        self.coverage = Some(coverage);
        Ok(())
    }

    fn on_fix(&mut self, now_ms: i64, fix: &PositionFix, effects: &mut Vec<Effect>) {
        profiling::scope!("navigator::on_fix");
        let navigation = &self.config.navigation;
        let Some(session) = self.session.as_mut() else {
            tracing::trace!("Fix ignored without a loaded area");
            return;
        };
        let mut ctx = Dispatch {
            now_ms,
            scheduler: &mut self.scheduler,
            effects,
        };

        if let Err(rejection) = fix.check(now_ms, navigation.fix_max_age_ms, navigation.max_accuracy_m) {
            tracing::debug!(%rejection, "Fix rejected");
            session.mark_signal_lost(&mut ctx);
            return;
        }
        session.apply_fix(fix, &mut ctx);

        if self.view.follow && !self.view.overview {
            ctx.effects.push(Effect::Camera(CameraDirective {
                center: fix.point(),
                bearing_deg: session.last_heading(),
            }));
        }

        if !session.state().is_underway() {
            return;
        }
        let Some(coverage) = self.coverage.as_mut() else {
            return;
        };
        let promoted = coverage.observe(fix.point());
        if promoted.is_empty() {
            return;
        }
        let area_id = coverage.area_id().clone();
        ctx.effects.push(Effect::SegmentsDriven {
            area_id: area_id.clone(),
            segment_ids: promoted,
            coverage_percent: coverage.coverage_percent(),
        });
        // Debounce: every promotion pushes the flush back
        ctx.scheduler.schedule(
            TaskKey::CoverageFlush(area_id),
            now_ms + self.config.coverage.flush_quiet_ms,
        );
    }

    fn on_flush_completed(&mut self, now_ms: i64, area_id: &AreaId, success: bool) {
        let Some(coverage) = self.coverage.as_mut().filter(|c| c.area_id() == area_id) else {
            tracing::debug!(%area_id, success, "Flush result for an area no longer loaded");
            return;
        };
        if coverage.complete_flush(success) {
            let error = NavError::PersistenceFailure(format!("flush of {area_id} failed"));
            tracing::warn!(%error, pending = coverage.pending().len(), "Re-queued coverage");
        }
        let key = TaskKey::CoverageFlush(area_id.clone());
        if !coverage.pending().is_empty() && !self.scheduler.is_scheduled(&key) {
            self.scheduler
                .schedule(key, now_ms + self.config.coverage.flush_quiet_ms);
        }
    }

    fn run_due_tasks(&mut self, now_ms: i64, effects: &mut Vec<Effect>) {
        for key in self.scheduler.pop_due(now_ms) {
            tracing::trace!(?key, now_ms, "Running task");
            match key {
                TaskKey::SettleDelay => {
                    self.with_session(now_ms, effects, |s, ctx| s.settle_elapsed(ctx))
                }
                TaskKey::CoverageFlush(area_id) => self.flush_coverage(now_ms, area_id, effects),
            }
        }
    }

    fn flush_coverage(&mut self, now_ms: i64, area_id: AreaId, effects: &mut Vec<Effect>) {
        let Some(coverage) = self.coverage.as_mut().filter(|c| *c.area_id() == area_id) else {
            return;
        };
        if coverage.is_flush_in_flight() {
            // One batch at a time; try again after another quiet period
            self.scheduler.schedule(
                TaskKey::CoverageFlush(area_id),
                now_ms + self.config.coverage.flush_quiet_ms,
            );
            return;
        }
        if let Some(batch) = coverage.begin_flush() {
            tracing::info!(%area_id, segments = batch.segment_ids.len(), "Flushing coverage");
            effects.push(Effect::Persist {
                batch,
                final_flush: false,
            });
        }
    }

    fn end(&mut self, now_ms: i64, effects: &mut Vec<Effect>) {
        if let Some(mut session) = self.session.take() {
            let mut ctx = Dispatch {
                now_ms,
                scheduler: &mut self.scheduler,
                effects,
            };
            session.end(&mut ctx);
        }
        if let Some(mut coverage) = self.coverage.take() {
            if let Some(batch) = coverage.drain_unconfirmed() {
                tracing::info!(
                    area_id = %batch.area_id,
                    segments = batch.segment_ids.len(),
                    "Final coverage flush"
                );
                effects.push(Effect::Persist {
                    batch,
                    final_flush: true,
                });
            }
        }
        self.scheduler.clear();
    }

    fn with_session(
        &mut self,
        now_ms: i64,
        effects: &mut Vec<Effect>,
        apply: impl FnOnce(&mut NavigationSession, &mut Dispatch<'_>),
    ) {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("Event ignored without a loaded area");
            return;
        };
        let mut ctx = Dispatch {
            now_ms,
            scheduler: &mut self.scheduler,
            effects,
        };
        apply(session, &mut ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{CoverageSegment, SegmentId};
    use crate::event::DirectionsPurpose;
    use crate::geometry::{distance_meters, offset_meters};
    use geo::Point;

    fn origin() -> Point<f64> {
        Point::new(-0.1278, 51.5074)
    }

    /// Ten points due north, 100 m apart
    fn north_area() -> AreaData {
        north_area_with(10)
    }

    /// `points` points due north, 100 m apart
    fn north_area_with(points: usize) -> AreaData {
        let o = origin();
        AreaData {
            area_id: AreaId::from("north"),
            route: (0..points).map(|i| offset_meters(o, i as f64 * 100.0, 0.0)).collect(),
            segments: vec![
                CoverageSegment {
                    segment_id: SegmentId(1),
                    geometry: vec![o, offset_meters(o, 100.0, 0.0)],
                    length_meters: 100.0,
                    driven: false,
                    undriveable: false,
                },
                CoverageSegment {
                    segment_id: SegmentId(2),
                    geometry: vec![offset_meters(o, 400.0, 0.0), offset_meters(o, 500.0, 0.0)],
                    length_meters: 100.0,
                    driven: false,
                    undriveable: false,
                },
                CoverageSegment {
                    segment_id: SegmentId(3),
                    geometry: vec![offset_meters(o, 800.0, 0.0), offset_meters(o, 900.0, 0.0)],
                    length_meters: 100.0,
                    driven: true,
                    undriveable: false,
                },
            ],
            baseline_percent: 10.0,
        }
    }

    fn fix_at(north_m: f64, east_m: f64, timestamp_ms: i64) -> NavEvent {
        NavEvent::Fix(PositionFix::new(offset_meters(origin(), north_m, east_m), timestamp_ms))
    }

    fn states(effects: &[Effect]) -> Vec<NavState> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Loaded, begun at the start and settled into active guidance
    fn active_navigator() -> Navigator {
        active_navigator_on(north_area())
    }

    fn active_navigator_on(area: AreaData) -> Navigator {
        let mut nav = Navigator::new(Config::default());
        nav.handle(0, NavEvent::AreaLoaded(area)).unwrap();
        nav.handle(0, fix_at(0.0, 0.0, 0)).unwrap();
        nav.handle(0, NavEvent::Begin).unwrap();
        assert_eq!(nav.state(), NavState::ActiveNavigation);
        nav
    }

    #[test]
    fn test_load_area_enters_preview() {
        let mut nav = Navigator::new(Config::default());
        assert_eq!(nav.state(), NavState::Setup);

        let effects = nav.handle(0, NavEvent::AreaLoaded(north_area())).unwrap();
        assert_eq!(nav.state(), NavState::RoutePreview);
        assert_eq!(states(&effects), vec![NavState::RoutePreview]);
        assert!(effects.iter().any(|e| matches!(e, Effect::ShowRoute(_))));
        assert!(effects.iter().any(|e| matches!(e, Effect::RememberArea(id) if id.as_str() == "north")));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::ShowCoverage { driven, undriven } if driven.len() == 1 && undriven.len() == 2
        )));
    }

    #[test]
    fn test_invalid_area_leaves_navigator_untouched() {
        let mut nav = active_navigator();
        let mut broken = north_area();
        broken.route.truncate(1);

        let result = nav.handle(10, NavEvent::AreaLoaded(broken));
        assert!(matches!(result, Err(NavError::InvalidRoute(_))));
        assert_eq!(nav.state(), NavState::ActiveNavigation);
    }

    #[test]
    fn test_drive_the_whole_route_to_arrival() {
        let mut nav = active_navigator();
        let mut seen = Vec::new();
        let mut last_progress = 0.0;

        for step in 1..=90 {
            let t = step * 1_000;
            let effects = nav.handle(t, fix_at(step as f64 * 10.0, 0.0, t)).unwrap();
            seen.extend(states(&effects));

            let progress = nav.session().unwrap().progress();
            assert!(progress >= last_progress, "progress went backwards at step {step}");
            last_progress = progress;
        }

        assert_eq!(seen, vec![NavState::Arrived]);
        assert_eq!(nav.state(), NavState::Arrived);
        assert!(nav.session().unwrap().remaining() < 25.0);
    }

    #[test]
    fn test_gps_spike_does_not_move_progress_backwards() {
        let mut nav = active_navigator();
        for step in 1..=30 {
            let t = step * 1_000;
            nav.handle(t, fix_at(step as f64 * 10.0, 0.0, t)).unwrap();
        }
        let before = nav.session().unwrap().progress();

        // One fix snapping 200 m behind
        nav.handle(31_000, fix_at(100.0, 0.0, 31_000)).unwrap();
        assert!(nav.session().unwrap().progress() >= before);
    }

    #[test]
    fn test_off_route_and_back() {
        let mut nav = active_navigator();
        for step in 1..=20 {
            let t = step * 1_000;
            nav.handle(t, fix_at(step as f64 * 10.0, 0.0, t)).unwrap();
        }

        let effects = nav.handle(21_000, fix_at(200.0, 120.0, 21_000)).unwrap();
        assert_eq!(states(&effects), vec![NavState::OffRoute]);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Instruction(a) if a.instruction_text == "Return to the route"
        )));

        let effects = nav.handle(22_000, fix_at(205.0, 0.0, 22_000)).unwrap();
        assert_eq!(states(&effects), vec![NavState::ActiveNavigation]);
    }

    /// Near the start, then back on the route 700 m further on a second later
    fn resume_offered() -> (Navigator, u64) {
        let mut nav = active_navigator_on(north_area_with(30));
        nav.handle(1_000, fix_at(5.0, 0.0, 1_000)).unwrap();
        let effects = nav.handle(2_000, fix_at(700.0, 0.0, 2_000)).unwrap();
        assert_eq!(states(&effects), vec![NavState::ResumeAhead]);
        assert!(nav.session().unwrap().progress() < 200.0);

        let request_id = effects
            .iter()
            .find_map(|e| match e {
                Effect::RequestDirections {
                    request_id,
                    purpose: DirectionsPurpose::ResumeAhead,
                    ..
                } => Some(*request_id),
                _ => None,
            })
            .expect("resume directions requested");
        (nav, request_id)
    }

    #[test]
    fn test_resume_ahead_accept_jumps_progress() {
        let (mut nav, _) = resume_offered();
        let candidate = *nav.session().unwrap().resume_candidate().unwrap();
        assert!((candidate.along_route_meters - 700.0).abs() < 1.0);

        let effects = nav.handle(3_000, NavEvent::AcceptResume).unwrap();
        assert_eq!(states(&effects), vec![NavState::ActiveNavigation]);
        assert_eq!(nav.session().unwrap().progress(), candidate.along_route_meters);

        // Back on the route a little further on, guidance continues from there
        let effects = nav.handle(4_000, fix_at(710.0, 0.0, 4_000)).unwrap();
        assert!(states(&effects).is_empty());
        assert!(nav.session().unwrap().progress() >= candidate.along_route_meters);
    }

    #[test]
    fn test_resume_ahead_dismiss_suppresses_offer() {
        let (mut nav, _) = resume_offered();
        let effects = nav.handle(3_000, NavEvent::DismissResume).unwrap();
        assert_eq!(states(&effects), vec![NavState::OffRoute]);

        // Another jump ahead that would be offered, were it not dismissed
        let effects = nav.handle(4_000, fix_at(1_400.0, 0.0, 4_000)).unwrap();
        assert!(states(&effects).is_empty());
        assert_eq!(nav.state(), NavState::OffRoute);
        assert!(nav.session().unwrap().resume_candidate().is_none());
    }

    #[test]
    fn test_far_off_without_resume_point_settles_off_route() {
        let mut nav = active_navigator();
        for step in 1..=20 {
            let t = step * 1_000;
            nav.handle(t, fix_at(step as f64 * 10.0, 0.0, t)).unwrap();
        }

        // Too far to the side for any route point to be within reach
        let effects = nav.handle(21_000, fix_at(200.0, 550.0, 21_000)).unwrap();
        assert_eq!(states(&effects), vec![NavState::ResumeAhead, NavState::OffRoute]);
        assert_eq!(nav.state(), NavState::OffRoute);
        assert!(!effects.iter().any(|e| matches!(e, Effect::RequestDirections { .. })));

        let effects = nav.handle(21_500, NavEvent::AcceptResume).unwrap();
        assert!(states(&effects).is_empty());
    }

    #[test]
    fn test_sparse_fixes_on_the_route_stay_on_route() {
        let mut nav = active_navigator_on(north_area_with(101));
        let mut seen = Vec::new();

        // 30 m/s with a fix every five seconds
        for step in 1..=60 {
            let t = step * 5_000;
            let effects = nav.handle(t, fix_at(step as f64 * 150.0, 0.0, t)).unwrap();
            seen.extend(states(&effects));
        }

        assert!(seen.is_empty(), "unexpected transitions {seen:?}");
        assert_eq!(nav.state(), NavState::ActiveNavigation);
        assert!(nav.session().unwrap().progress() > 8_500.0);
    }

    #[test]
    fn test_signal_gap_on_the_route_stays_on_route() {
        let mut nav = active_navigator_on(north_area_with(101));
        let mut seen = Vec::new();
        let mut drive = |nav: &mut Navigator, seconds: std::ops::RangeInclusive<i64>| {
            for second in seconds {
                let t = second * 1_000;
                let effects = nav.handle(t, fix_at(second as f64 * 25.0, 0.0, t)).unwrap();
                seen.extend(states(&effects));
            }
        };

        // 25 m/s, then two minutes without a fix, then on again further down the road
        drive(&mut nav, 1..=20);
        drive(&mut nav, 140..=150);

        assert!(seen.is_empty(), "unexpected transitions {seen:?}");
        assert_eq!(nav.state(), NavState::ActiveNavigation);
        assert!(nav.session().unwrap().resume_candidate().is_none());
    }

    #[test]
    fn test_directions_response_is_applied_once() {
        let (mut nav, request_id) = resume_offered();
        let path = vec![origin(), offset_meters(origin(), 700.0, 0.0)];

        let effects = nav
            .handle(
                3_000,
                NavEvent::DirectionsResolved {
                    request_id,
                    result: Ok(path.clone()),
                },
            )
            .unwrap();
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::GuidancePath { straight_line: false, path: p, .. } if *p == path
        )));

        let effects = nav
            .handle(3_100, NavEvent::DirectionsResolved { request_id, result: Ok(path) })
            .unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn test_stale_directions_response_is_discarded() {
        let (mut nav, request_id) = resume_offered();
        nav.handle(3_000, NavEvent::AcceptResume).unwrap();

        let effects = nav
            .handle(
                3_500,
                NavEvent::DirectionsResolved {
                    request_id,
                    result: Ok(vec![origin(), offset_meters(origin(), 600.0, 0.0)]),
                },
            )
            .unwrap();
        assert!(!effects.iter().any(|e| matches!(e, Effect::GuidancePath { .. })));
    }

    #[test]
    fn test_failed_directions_fall_back_to_straight_line() {
        let (mut nav, request_id) = resume_offered();
        let effects = nav
            .handle(
                3_000,
                NavEvent::DirectionsResolved {
                    request_id,
                    result: Err("no route".to_string()),
                },
            )
            .unwrap();
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::GuidancePath { straight_line: true, path, .. } if path.len() == 2
        )));
    }

    #[test]
    fn test_begin_away_from_start_navigates_there() {
        let mut nav = Navigator::new(Config::default());
        nav.handle(0, NavEvent::AreaLoaded(north_area())).unwrap();
        nav.handle(0, fix_at(-300.0, 0.0, 0)).unwrap();

        let effects = nav.handle(0, NavEvent::Begin).unwrap();
        assert_eq!(states(&effects), vec![NavState::NavigatingToStart]);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::RequestDirections { purpose: DirectionsPurpose::ToStart, .. }
        )));

        let effects = nav.handle(1_000, fix_at(-20.0, 0.0, 1_000)).unwrap();
        assert_eq!(states(&effects), vec![NavState::ArrivedAtStart]);
        assert_eq!(nav.next_deadline(), Some(2_500));

        // Nothing happens before the settle delay
        nav.handle(2_000, NavEvent::Tick).unwrap();
        assert_eq!(nav.state(), NavState::ArrivedAtStart);

        let effects = nav.handle(2_500, NavEvent::Tick).unwrap();
        assert_eq!(states(&effects), vec![NavState::ActiveNavigation]);
    }

    #[test]
    fn test_begin_without_a_fix_requests_directions_on_first_fix() {
        let mut nav = Navigator::new(Config::default());
        nav.handle(0, NavEvent::AreaLoaded(north_area())).unwrap();
        let effects = nav.handle(0, NavEvent::Begin).unwrap();
        assert_eq!(states(&effects), vec![NavState::NavigatingToStart]);
        assert!(!effects.iter().any(|e| matches!(e, Effect::RequestDirections { .. })));

        let effects = nav.handle(1_000, fix_at(-300.0, 0.0, 1_000)).unwrap();
        assert!(effects.iter().any(|e| matches!(e, Effect::RequestDirections { .. })));
    }

    #[test]
    fn test_coverage_flush_is_debounced() {
        let mut nav = active_navigator();
        let effects = nav.handle(1_000, fix_at(50.0, 0.0, 1_000)).unwrap();
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::SegmentsDriven { segment_ids, .. } if *segment_ids == vec![SegmentId(1)]
        )));
        assert_eq!(nav.next_deadline(), Some(3_000));

        // Another promotion pushes the flush back
        nav.handle(2_000, fix_at(60.0, 0.0, 2_000)).unwrap();
        nav.handle(2_500, fix_at(420.0, 0.0, 2_500)).unwrap();
        assert_eq!(nav.next_deadline(), Some(4_500));

        let effects = nav.handle(3_000, NavEvent::Tick).unwrap();
        assert!(!effects.iter().any(|e| matches!(e, Effect::Persist { .. })));

        let effects = nav.handle(4_500, NavEvent::Tick).unwrap();
        let batch = effects
            .iter()
            .find_map(|e| match e {
                Effect::Persist { batch, final_flush: false } => Some(batch.clone()),
                _ => None,
            })
            .expect("flush after the quiet period");
        assert_eq!(batch.segment_ids, vec![SegmentId(1), SegmentId(2)]);
    }

    #[test]
    fn test_failed_flush_is_retried() {
        let mut nav = active_navigator();
        nav.handle(1_000, fix_at(50.0, 0.0, 1_000)).unwrap();
        nav.handle(3_000, NavEvent::Tick).unwrap();
        assert!(nav.coverage().unwrap().is_flush_in_flight());

        nav.handle(
            3_200,
            NavEvent::CoverageFlushed {
                area_id: AreaId::from("north"),
                success: false,
            },
        )
        .unwrap();
        assert_eq!(nav.coverage().unwrap().pending().len(), 1);
        assert_eq!(nav.next_deadline(), Some(5_200));

        let effects = nav.handle(5_200, NavEvent::Tick).unwrap();
        assert!(effects.iter().any(|e| matches!(e, Effect::Persist { final_flush: false, .. })));
    }

    #[test]
    fn test_end_flushes_unconfirmed_coverage() {
        let mut nav = active_navigator();
        nav.handle(1_000, fix_at(50.0, 0.0, 1_000)).unwrap();

        let effects = nav.handle(1_500, NavEvent::End).unwrap();
        assert_eq!(states(&effects), vec![NavState::Setup]);
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Persist { batch, final_flush: true } if batch.segment_ids == vec![SegmentId(1)]
        )));
        assert_eq!(nav.state(), NavState::Setup);
        assert!(nav.next_deadline().is_none());
    }

    #[test]
    fn test_no_coverage_before_navigation_starts() {
        let mut nav = Navigator::new(Config::default());
        nav.handle(0, NavEvent::AreaLoaded(north_area())).unwrap();
        let effects = nav.handle(1_000, fix_at(50.0, 0.0, 1_000)).unwrap();
        assert!(!effects.iter().any(|e| matches!(e, Effect::SegmentsDriven { .. })));
    }

    #[test]
    fn test_signal_loss_and_recovery() {
        let mut nav = active_navigator();
        nav.handle(1_000, fix_at(10.0, 0.0, 1_000)).unwrap();

        let effects = nav.handle(12_000, NavEvent::Tick).unwrap();
        assert!(effects.iter().any(|e| matches!(e, Effect::SignalLost)));
        assert!(nav.session().unwrap().is_waiting_for_signal());
        assert_eq!(nav.state(), NavState::ActiveNavigation);

        let effects = nav.handle(13_000, fix_at(20.0, 0.0, 13_000)).unwrap();
        assert!(effects.iter().any(|e| matches!(e, Effect::SignalRestored)));
    }

    #[test]
    fn test_stale_fix_is_not_applied() {
        let mut nav = active_navigator();
        nav.handle(1_000, fix_at(10.0, 0.0, 1_000)).unwrap();
        let before = nav.session().unwrap().progress();

        let effects = nav.handle(60_000, fix_at(300.0, 0.0, 1_500)).unwrap();
        assert!(effects.iter().any(|e| matches!(e, Effect::SignalLost)));
        assert_eq!(nav.session().unwrap().progress(), before);
    }

    #[test]
    fn test_camera_follows_unless_overview() {
        let mut nav = active_navigator();
        let effects = nav.handle(1_000, fix_at(10.0, 0.0, 1_000)).unwrap();
        assert!(effects.iter().any(|e| matches!(e, Effect::Camera(_))));

        nav.handle(
            1_500,
            NavEvent::SetViewMode(ViewMode {
                follow: true,
                overview: true,
            }),
        )
        .unwrap();
        let effects = nav.handle(2_000, fix_at(20.0, 0.0, 2_000)).unwrap();
        assert!(!effects.iter().any(|e| matches!(e, Effect::Camera(_))));
    }

    #[test]
    fn test_loading_another_area_replaces_the_session() {
        let mut nav = active_navigator();
        nav.handle(1_000, fix_at(50.0, 0.0, 1_000)).unwrap();

        let mut other = north_area();
        other.area_id = AreaId::from("other");
        let effects = nav.handle(2_000, NavEvent::AreaLoaded(other)).unwrap();

        assert!(effects.iter().any(|e| matches!(e, Effect::Persist { final_flush: true, .. })));
        assert_eq!(nav.state(), NavState::RoutePreview);
        assert_eq!(nav.session().unwrap().area_id().as_str(), "other");

        // A late flush result for the old area is ignored
        nav.handle(
            2_100,
            NavEvent::CoverageFlushed {
                area_id: AreaId::from("north"),
                success: false,
            },
        )
        .unwrap();
        assert!(nav.coverage().unwrap().pending().is_empty());
        let start = nav.session().unwrap().route().start();
        assert!(distance_meters(start, origin()) < 1.0);
    }
}
