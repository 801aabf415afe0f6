//! Replay loop: feeds fixes to the navigator and carries out its effects
//!
//! Everything runs on one task. Collaborator calls are spawned and report back
//! on an unbounded channel, so their completions re-enter the same loop that
//! feeds fixes. Time is the replay clock: fix timestamps, optionally paced in
//! real time by a speed-up factor.

use super::error::AppResult;
use super::storage::{LAST_AREA_KEY, StorageBackend};
use coverage_nav_lib::services::{DirectionsService, PersistenceSink, RenderSurface, is_render_effect};
use coverage_nav_lib::{AreaData, Config, Effect, NavEvent, NavState, Navigator, PositionFix, ViewMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayOptions {
    /// Replay time over wall time; 0 or less runs unpaced
    pub speedup: f64,
    /// Accept resume-ahead offers as soon as they are made
    pub auto_resume: bool,
    pub follow: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            speedup: 0.0,
            auto_resume: false,
            follow: true,
        }
    }
}

pub struct Replay<D, P, R> {
    navigator: Navigator,
    directions: Arc<D>,
    sink: Arc<P>,
    render: R,
    storage: Arc<dyn StorageBackend>,
    options: ReplayOptions,
    events_tx: UnboundedSender<NavEvent>,
    events_rx: UnboundedReceiver<NavEvent>,
    clock_ms: i64,
}

impl<D, P, R> Replay<D, P, R>
where
    D: DirectionsService + Send + Sync + 'static,
    P: PersistenceSink + Send + Sync + 'static,
    R: RenderSurface,
{
    pub fn new(
        config: Config,
        directions: D,
        sink: P,
        render: R,
        storage: Arc<dyn StorageBackend>,
        options: ReplayOptions,
    ) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            navigator: Navigator::new(config),
            directions: Arc::new(directions),
            sink: Arc::new(sink),
            render,
            storage,
            options,
            events_tx,
            events_rx,
            clock_ms: 0,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn clock_ms(&self) -> i64 {
        self.clock_ms
    }

    /// Hand a loaded area to the navigator
    pub async fn load(&mut self, area: AreaData) -> AppResult<()> {
        let view = ViewMode {
            follow: self.options.follow,
            overview: false,
        };
        self.handle(NavEvent::SetViewMode(view)).await?;
        self.handle(NavEvent::AreaLoaded(area)).await
    }

    /// Replay fixes in order; guidance begins right after the first one
    pub async fn drive(&mut self, fixes: Vec<PositionFix>) -> AppResult<()> {
        let mut fixes = fixes.into_iter();
        let Some(first) = fixes.next() else {
            tracing::warn!("No fixes to replay");
            return Ok(());
        };
        self.clock_ms = first.timestamp_ms;
        self.handle(NavEvent::Fix(first)).await?;
        self.handle(NavEvent::Begin).await?;

        for fix in fixes {
            self.advance_to(fix.timestamp_ms).await?;
            self.handle(NavEvent::Fix(fix)).await?;
            if self.navigator.state() == NavState::Arrived {
                tracing::info!(clock_ms = self.clock_ms, "Arrived, stopping replay");
                break;
            }
        }
        Ok(())
    }

    /// End navigation, waiting for the final coverage flush
    pub async fn finish(mut self) -> AppResult<R> {
        // Collect completions that are already on their way
        tokio::task::yield_now().await;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event).await?;
        }
        self.handle(NavEvent::End).await?;
        Ok(self.render)
    }

    /// Run the clock forward to `target_ms`, firing due tasks and completions
    async fn advance_to(&mut self, target_ms: i64) -> AppResult<()> {
        loop {
            // Let spawned collaborator calls make progress
            tokio::task::yield_now().await;

            let deadline = self.navigator.next_deadline().filter(|&d| d <= target_ms);
            let step_to = deadline.unwrap_or(target_ms).max(self.clock_ms);
            let wait = self.wall_delay(step_to - self.clock_ms);

            tokio::select! {
                biased;
                Some(event) = self.events_rx.recv() => self.handle(event).await?,
                _ = tokio::time::sleep(wait) => {
                    self.clock_ms = step_to;
                    match deadline {
                        Some(_) => self.handle(NavEvent::Tick).await?,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    fn wall_delay(&self, replay_ms: i64) -> Duration {
        if self.options.speedup <= 0.0 || replay_ms <= 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(replay_ms as f64 / 1000.0 / self.options.speedup)
    }

    async fn handle(&mut self, event: NavEvent) -> AppResult<()> {
        let effects = self.navigator.handle(self.clock_ms, event)?;
        for effect in effects {
            self.dispatch(effect).await;
        }
        Ok(())
    }

    async fn dispatch(&mut self, effect: Effect) {
        match effect {
            Effect::RequestDirections {
                request_id,
                purpose,
                from,
                to,
            } => {
                let directions = Arc::clone(&self.directions);
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = directions
                        .directions(from, to)
                        .await
                        .map_err(|e| e.to_string());
                    tracing::debug!(request_id, ?purpose, ok = result.is_ok(), "Directions answered");
                    let _ = tx.send(NavEvent::DirectionsResolved { request_id, result });
                });
            }
            Effect::Persist {
                batch,
                final_flush: false,
            } => {
                let sink = Arc::clone(&self.sink);
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let success = sink.persist(&batch).await.is_ok();
                    let _ = tx.send(NavEvent::CoverageFlushed {
                        area_id: batch.area_id,
                        success,
                    });
                });
            }
            Effect::Persist {
                batch,
                final_flush: true,
            } => {
                // Nothing will be around to retry this one
                if let Err(e) = self.sink.persist(&batch).await {
                    tracing::error!(
                        area_id = %batch.area_id,
                        segments = batch.segment_ids.len(),
                        error = %e,
                        "Final coverage flush failed"
                    );
                }
            }
            Effect::RememberArea(area_id) => {
                if let Err(e) = self.storage.set_string(LAST_AREA_KEY, area_id.as_str()) {
                    tracing::warn!(%area_id, error = %e, "Could not remember area");
                }
            }
            effect => {
                if self.options.auto_resume
                    && matches!(effect, Effect::StateChanged { to: NavState::ResumeAhead, .. })
                {
                    let _ = self.events_tx.send(NavEvent::AcceptResume);
                }
                if is_render_effect(&effect) {
                    self.render.render(&effect);
                } else {
                    tracing::debug!(?effect, "Effect has no handler in replay");
                }
            }
        }
    }
}
