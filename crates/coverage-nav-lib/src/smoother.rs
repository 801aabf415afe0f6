//! Progress smoothing
//!
//! Raw along-route distances jitter with GPS noise and occasionally jump when the
//! matcher snaps to the wrong part of the route. The smoother turns them into a
//! progress value that only regresses when several samples agree, never advances
//! faster than a plausible vehicle, and is blended with a short moving average.

use crate::config::SmootherConfig;
use std::collections::VecDeque;

/// Progress filter state, mutated once per fix
#[derive(Debug, Clone)]
pub struct ProgressSmoother {
    config: SmootherConfig,
    last_valid_progress_meters: f64,
    /// Most recent raw samples, bounded by `config.history_capacity`
    history: VecDeque<f64>,
    last_update_timestamp_ms: Option<i64>,
    /// The latest raw sample ran ahead of the previous one faster than `max_speed_mps`
    outran_speed_limit: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ProgressSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_capacity),
            config,
            last_valid_progress_meters: 0.0,
            last_update_timestamp_ms: None,
            outran_speed_limit: false,
        }
    }

    #[inline]
    pub fn last_valid(&self) -> f64 {
        self.last_valid_progress_meters
    }

    #[inline]
    pub fn last_update_timestamp_ms(&self) -> Option<i64> {
        self.last_update_timestamp_ms
    }

    /// Whether the latest raw sample advanced faster than a vehicle could drive
    ///
    /// Compared against the previous raw sample rather than the smoothed
    /// progress, so a progress value that lags after a signal gap does not
    /// count as a jump.
    #[inline]
    pub fn outran_speed_limit(&self) -> bool {
        self.outran_speed_limit
    }

    /// Get the number of samples currently in the history
    pub fn history_size(&self) -> usize {
        self.history.len()
    }

    /// Feed one raw along-route sample and return the smoothed progress
    pub fn update(&mut self, raw: f64, timestamp_ms: i64) -> f64 {
        let previous_timestamp = self.last_update_timestamp_ms.replace(timestamp_ms);
        let elapsed_s = previous_timestamp.map_or(0.0, |previous| {
            (timestamp_ms - previous).max(0) as f64 / 1000.0
        });
        self.outran_speed_limit = self
            .history
            .back()
            .is_some_and(|&previous_raw| raw - previous_raw > self.config.max_speed_mps * elapsed_s);

        self.history.push_back(raw);
        while self.history.len() > self.config.history_capacity.max(1) {
            self.history.pop_front();
        }

        if previous_timestamp.is_none() {
            // Nothing to compare against yet
            self.last_valid_progress_meters = raw;
            return raw;
        }

        let last_valid = self.last_valid_progress_meters;
        if last_valid - raw > self.config.backward_jump_m {
            let corroborating = self
                .history
                .iter()
                .filter(|&&sample| last_valid - sample > self.config.backward_jump_m)
                .count();
            if corroborating < self.config.corroboration_min {
                tracing::debug!(
                    raw,
                    last_valid,
                    corroborating,
                    "Rejecting uncorroborated backward jump"
                );
                return last_valid;
            }
            tracing::debug!(raw, last_valid, corroborating, "Accepting corroborated regression");
        }

        let max_advance = last_valid + self.config.max_speed_mps * elapsed_s;
        let clamped = raw.min(max_advance);

        let average = self.history.iter().sum::<f64>() / self.history.len() as f64;
        let weight = self.config.raw_weight;
        let smoothed = weight * clamped + (1.0 - weight) * average;

        self.last_valid_progress_meters = smoothed;
        smoothed
    }

    /// Set progress exactly, bypassing every filter
    ///
    /// Used when the driver accepts a resume point further down the route.
    pub fn force_set(&mut self, progress: f64) {
        self.last_valid_progress_meters = progress;
        self.history.clear();
        self.outran_speed_limit = false;
    }

    /// Reset the smoother to its initial state
    pub fn reset(&mut self) {
        self.last_valid_progress_meters = 0.0;
        self.history.clear();
        self.last_update_timestamp_ms = None;
        self.outran_speed_limit = false;
    }
}
