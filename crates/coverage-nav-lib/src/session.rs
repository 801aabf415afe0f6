//! One navigation session over one loaded route
//!
//! The session owns the matcher, the smoother and the navigation state. It
//! turns accepted fixes and driver actions into state changes and effects.
//! Deferred work goes through the caller's [`TaskScheduler`], so a session is
//! fully deterministic for a given sequence of `(now, input)` pairs.

use crate::announcer::{AnnounceContext, Announcement, announce};
use crate::area::AreaId;
use crate::config::Config;
use crate::event::{DirectionsPurpose, Effect};
use crate::fix::PositionFix;
use crate::geometry::{bearing_deg, distance_meters};
use crate::matcher::{MatchResult, PositionMatcher, forward_candidate};
use crate::scheduler::{TaskKey, TaskScheduler};
use crate::smoother::ProgressSmoother;
use crate::state_machine::{NavState, TransitionInput, next_state};
use crate::{NavError, Route};
use geo::Point;
use std::sync::Arc;

/// Minimum movement before a heading is derived from consecutive fixes
const HEADING_MIN_MOVE_M: f64 = 2.0;

/// Clock, scheduler and effect sink for one dispatch
pub(crate) struct Dispatch<'a> {
    pub now_ms: i64,
    pub scheduler: &'a mut TaskScheduler,
    pub effects: &'a mut Vec<Effect>,
}

/// A directions request that has not been answered yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingDirections {
    pub request_id: u64,
    pub purpose: DirectionsPurpose,
    pub from: Point<f64>,
    pub to: Point<f64>,
}

/// Route guidance for the duration of one loaded area
#[derive(Debug)]
pub struct NavigationSession {
    area_id: AreaId,
    route: Arc<Route>,
    config: Config,
    state: NavState,
    matcher: PositionMatcher,
    smoother: ProgressSmoother,
    resume_candidate: Option<MatchResult>,
    /// The driver jumped onto the route far ahead of progress; held until progress catches up
    rejoined_ahead: bool,
    /// Set by a dismissal, cleared once the driver is back on the route
    resume_dismissed: bool,
    pending_directions: Option<PendingDirections>,
    next_request_id: u64,
    last_position: Option<Point<f64>>,
    last_heading: Option<f64>,
    /// Receipt time of the last accepted fix, or of the moment guidance started
    last_signal_ms: Option<i64>,
    waiting_for_signal: bool,
    last_announcement: Option<Announcement>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl NavigationSession {
    /// A fresh session in route preview
    pub fn new(area_id: AreaId, route: Arc<Route>, config: Config) -> Self {
        Self {
            area_id,
            matcher: PositionMatcher::new(config.matcher),
            smoother: ProgressSmoother::new(config.smoother),
            route,
            config,
            state: NavState::RoutePreview,
            resume_candidate: None,
            rejoined_ahead: false,
            resume_dismissed: false,
            pending_directions: None,
            next_request_id: 1,
            last_position: None,
            last_heading: None,
            last_signal_ms: None,
            waiting_for_signal: false,
            last_announcement: None,
        }
    }

    pub fn area_id(&self) -> &AreaId {
        &self.area_id
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    /// Smoothed along-route progress in meters
    pub fn progress(&self) -> f64 {
        self.smoother.last_valid()
    }

    pub fn remaining(&self) -> f64 {
        self.route.remaining(self.progress())
    }

    pub fn resume_candidate(&self) -> Option<&MatchResult> {
        self.resume_candidate.as_ref()
    }

    pub fn pending_directions(&self) -> Option<&PendingDirections> {
        self.pending_directions.as_ref()
    }

    pub fn last_position(&self) -> Option<Point<f64>> {
        self.last_position
    }

    pub fn last_heading(&self) -> Option<f64> {
        self.last_heading
    }

    pub fn is_waiting_for_signal(&self) -> bool {
        self.waiting_for_signal
    }

    /// Apply a fix that already passed validation
    pub(crate) fn apply_fix(&mut self, fix: &PositionFix, ctx: &mut Dispatch<'_>) {
        let point = fix.point();
        self.last_heading = fix
            .heading_deg
            .or_else(|| {
                self.last_position
                    .filter(|&previous| distance_meters(previous, point) >= HEADING_MIN_MOVE_M)
                    .map(|previous| bearing_deg(previous, point))
            })
            .or(self.last_heading);
        self.last_position = Some(point);
        self.last_signal_ms = Some(ctx.now_ms);
        if self.waiting_for_signal {
            self.waiting_for_signal = false;
            tracing::info!(area_id = %self.area_id, "Position signal restored");
            ctx.effects.push(Effect::SignalRestored);
        }

        let distance_to_start = distance_meters(point, self.route.start());
        let next = match self.state {
            NavState::NavigatingToStart => {
                if self.pending_directions.is_none() && self.guidance_never_requested() {
                    self.request_directions(DirectionsPurpose::ToStart, point, self.route.start(), ctx);
                }
                let input = TransitionInput {
                    smoothed_progress: 0.0,
                    remaining_distance: self.route.total_distance(),
                    perpendicular_distance: distance_to_start,
                    rejoined_ahead: false,
                    has_resume_candidate: false,
                    distance_to_start,
                };
                next_state(self.state, &input, &self.config.navigation)
            }
            state if state.is_guiding() => self.track(point, fix.timestamp_ms, distance_to_start),
            state => state,
        };
        self.transition(next, ctx);
        if self.state == NavState::ResumeAhead && self.resume_candidate.is_none() {
            tracing::debug!(area_id = %self.area_id, "No resume point ahead, staying off route");
            self.transition(NavState::OffRoute, ctx);
        }

        ctx.effects.push(Effect::Position {
            position: point,
            heading_deg: self.last_heading,
            progress_meters: self.progress(),
            traveled: self.route.sub_path(0.0, self.progress()),
        });
        self.refresh_announcement(ctx);
    }

    /// Match, smooth and decide while guiding along the route
    fn track(&mut self, point: Point<f64>, timestamp_ms: i64, distance_to_start: f64) -> NavState {
        let navigation = &self.config.navigation;
        let matched = self.matcher.match_position(&self.route, point);
        let progress = self.smoother.update(matched.along_route_meters, timestamp_ms);

        let perpendicular = matched.perpendicular_distance_meters;
        // A lagging progress alone is not a rejoin, the raw match has to jump there
        let ahead = matched.along_route_meters - progress;
        if ahead <= navigation.resume_ahead_m {
            self.rejoined_ahead = false;
        } else if self.smoother.outran_speed_limit() {
            self.rejoined_ahead = true;
        }

        let off_route = perpendicular > navigation.off_route_m || self.rejoined_ahead;
        let far_off = perpendicular > navigation.resume_ahead_m || self.rejoined_ahead;
        if !off_route {
            self.resume_dismissed = false;
        }
        self.resume_candidate = if far_off && !self.resume_dismissed {
            forward_candidate(&self.route, point, progress, navigation.resume_radius_m)
        } else {
            None
        };

        tracing::trace!(
            raw = matched.along_route_meters,
            progress,
            perpendicular,
            rejoined_ahead = self.rejoined_ahead,
            candidate = self.resume_candidate.is_some(),
            "Tracked fix"
        );

        let input = TransitionInput {
            smoothed_progress: progress,
            remaining_distance: self.route.remaining(progress),
            perpendicular_distance: perpendicular,
            rejoined_ahead: self.rejoined_ahead,
            has_resume_candidate: self.resume_candidate.is_some(),
            distance_to_start,
        };
        next_state(self.state, &input, navigation)
    }

    /// The driver asked to start guidance
    pub(crate) fn begin(&mut self, ctx: &mut Dispatch<'_>) {
        if self.state != NavState::RoutePreview {
            tracing::debug!(state = %self.state, "Begin ignored outside of route preview");
            return;
        }
        self.last_signal_ms = Some(ctx.now_ms);

        let at_start = self.last_position.is_some_and(|p| {
            distance_meters(p, self.route.start()) <= self.config.navigation.start_radius_m
        });
        let next = if at_start {
            NavState::ActiveNavigation
        } else {
            NavState::NavigatingToStart
        };
        self.transition(next, ctx);
        self.refresh_announcement(ctx);
    }

    /// The settle delay after reaching the start has elapsed
    pub(crate) fn settle_elapsed(&mut self, ctx: &mut Dispatch<'_>) {
        if self.state == NavState::ArrivedAtStart {
            self.transition(NavState::ActiveNavigation, ctx);
            self.refresh_announcement(ctx);
        }
    }

    /// Jump progress to the offered resume point
    pub(crate) fn accept_resume(&mut self, ctx: &mut Dispatch<'_>) {
        let Some(candidate) = self.resume_candidate.filter(|_| self.state == NavState::ResumeAhead)
        else {
            tracing::debug!(state = %self.state, "Accept ignored without a resume offer");
            return;
        };

        tracing::info!(
            from = self.progress(),
            to = candidate.along_route_meters,
            "Resuming route ahead"
        );
        self.smoother.force_set(candidate.along_route_meters);
        self.matcher.reseed(candidate.segment_index);
        self.resume_candidate = None;
        self.rejoined_ahead = false;
        self.resume_dismissed = false;
        self.transition(NavState::ActiveNavigation, ctx);

        if let Some(position) = self.last_position {
            ctx.effects.push(Effect::Position {
                position,
                heading_deg: self.last_heading,
                progress_meters: self.progress(),
                traveled: self.route.sub_path(0.0, self.progress()),
            });
        }
        self.refresh_announcement(ctx);
    }

    /// Decline the resume offer; no new offer until the driver is back on route
    pub(crate) fn dismiss_resume(&mut self, ctx: &mut Dispatch<'_>) {
        if self.state != NavState::ResumeAhead {
            tracing::debug!(state = %self.state, "Dismiss ignored without a resume offer");
            return;
        }
        self.resume_dismissed = true;
        self.resume_candidate = None;
        self.transition(NavState::OffRoute, ctx);
        self.refresh_announcement(ctx);
    }

    /// A directions response arrived
    ///
    /// Responses for a request that was superseded, or whose purpose no longer
    /// matches the state, are discarded. Failures fall back to a straight line.
    pub(crate) fn directions_resolved(
        &mut self,
        request_id: u64,
        result: Result<Vec<Point<f64>>, String>,
        ctx: &mut Dispatch<'_>,
    ) {
        let Some(pending) = self
            .pending_directions
            .filter(|p| p.request_id == request_id && self.state == purpose_state(p.purpose))
        else {
            tracing::debug!(request_id, state = %self.state, "Discarding stale directions response");
            return;
        };
        self.pending_directions = None;

        let (path, straight_line) = match result {
            Ok(path) if path.len() >= 2 => (path, false),
            Ok(_) => {
                let error = NavError::DirectionsUnavailable("empty path".to_string());
                tracing::warn!(request_id, %error, "Falling back to a straight line");
                (vec![pending.from, pending.to], true)
            }
            Err(reason) => {
                let error = NavError::DirectionsUnavailable(reason);
                tracing::warn!(request_id, %error, "Falling back to a straight line");
                (vec![pending.from, pending.to], true)
            }
        };
        ctx.effects.push(Effect::GuidancePath {
            purpose: pending.purpose,
            path,
            straight_line,
        });
    }

    /// No accepted fix for longer than the signal timeout
    pub(crate) fn check_signal(&mut self, ctx: &mut Dispatch<'_>) {
        if self.waiting_for_signal || !self.expects_fixes() {
            return;
        }
        let Some(last) = self.last_signal_ms else {
            return;
        };
        if ctx.now_ms - last > self.config.navigation.signal_timeout_ms {
            self.mark_signal_lost(ctx);
        }
    }

    /// Enter the waiting-for-signal sub-state without touching the navigation state
    pub(crate) fn mark_signal_lost(&mut self, ctx: &mut Dispatch<'_>) {
        if self.waiting_for_signal || !self.expects_fixes() {
            return;
        }
        self.waiting_for_signal = true;
        let error = NavError::PositionUnavailable("no usable fix".to_string());
        tracing::warn!(area_id = %self.area_id, state = %self.state, %error, "Waiting for signal");
        ctx.effects.push(Effect::SignalLost);
        self.refresh_announcement(ctx);
    }

    /// Tear down guidance, returning to setup
    pub(crate) fn end(&mut self, ctx: &mut Dispatch<'_>) {
        self.transition(NavState::Setup, ctx);
        self.resume_candidate = None;
        self.rejoined_ahead = false;
        self.pending_directions = None;
        self.waiting_for_signal = false;
    }

    fn transition(&mut self, to: NavState, ctx: &mut Dispatch<'_>) {
        let from = self.state;
        if from == to {
            return;
        }
        tracing::info!(area_id = %self.area_id, %from, %to, "Navigation state changed");
        self.state = to;
        ctx.effects.push(Effect::StateChanged { from, to });

        if from == NavState::ArrivedAtStart {
            ctx.scheduler.cancel(&TaskKey::SettleDelay);
        }
        if self
            .pending_directions
            .is_some_and(|p| purpose_state(p.purpose) != to)
        {
            self.pending_directions = None;
        }
        if to != NavState::ResumeAhead {
            self.resume_candidate = None;
        }

        match to {
            NavState::NavigatingToStart => {
                if let Some(position) = self.last_position {
                    self.request_directions(DirectionsPurpose::ToStart, position, self.route.start(), ctx);
                }
            }
            NavState::ArrivedAtStart => {
                let due = ctx.now_ms + self.config.navigation.settle_delay_ms;
                ctx.scheduler.schedule(TaskKey::SettleDelay, due);
            }
            NavState::ActiveNavigation if !from.is_guiding() => {
                self.matcher.reset();
                self.smoother.reset();
                self.rejoined_ahead = false;
            }
            NavState::ResumeAhead => {
                if let (Some(position), Some(candidate)) = (self.last_position, self.resume_candidate) {
                    self.request_directions(
                        DirectionsPurpose::ResumeAhead,
                        position,
                        candidate.projected_point,
                        ctx,
                    );
                }
            }
            _ => {}
        }
    }

    fn request_directions(
        &mut self,
        purpose: DirectionsPurpose,
        from: Point<f64>,
        to: Point<f64>,
        ctx: &mut Dispatch<'_>,
    ) {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending_directions = Some(PendingDirections {
            request_id,
            purpose,
            from,
            to,
        });
        tracing::debug!(request_id, ?purpose, "Requesting directions");
        ctx.effects.push(Effect::RequestDirections {
            request_id,
            purpose,
            from,
            to,
        });
    }

    fn expects_fixes(&self) -> bool {
        self.state.is_underway() && self.state != NavState::Arrived
    }

    fn guidance_never_requested(&self) -> bool {
        self.next_request_id == 1
    }

    fn refresh_announcement(&mut self, ctx: &mut Dispatch<'_>) {
        let context = AnnounceContext {
            state: self.state,
            progress: self.progress(),
            distance_to_start: self
                .last_position
                .map(|p| distance_meters(p, self.route.start())),
            waiting_for_signal: self.waiting_for_signal,
            dead_band_m: self.config.navigation.announce_dead_band_m,
        };
        let announcement = announce(&self.route, &context);
        if self.last_announcement.as_ref() != Some(&announcement) {
            self.last_announcement = Some(announcement.clone());
            ctx.effects.push(Effect::Instruction(announcement));
        }
    }
}

/// The state in which a directions response of this purpose is still wanted
fn purpose_state(purpose: DirectionsPurpose) -> NavState {
    match purpose {
        DirectionsPurpose::ToStart => NavState::NavigatingToStart,
        DirectionsPurpose::ResumeAhead => NavState::ResumeAhead,
    }
}
