//! Demo collaborators: straight-line directions and storage-backed persistence

use super::storage::{StorageBackend, coverage_key, load_json_backend, save_json_backend};
use coverage_nav_lib::services::{DirectionsService, PersistenceSink};
use coverage_nav_lib::{AreaId, FlushBatch, NavError, Result, SegmentId};
use geo::Point;
use std::collections::BTreeSet;
use std::future::{Future, ready};
use std::sync::Arc;

/// Directions without a road network: the straight line between the endpoints
#[derive(Debug, Default, Clone, Copy)]
pub struct StraightLineDirections;

impl DirectionsService for StraightLineDirections {
    fn directions(
        &self,
        from: Point<f64>,
        to: Point<f64>,
    ) -> impl Future<Output = Result<Vec<Point<f64>>>> + Send {
        ready(Ok(vec![from, to]))
    }
}

/// Unions flushed segment ids into the key/value store, one key per area
#[derive(Clone)]
pub struct StoragePersistenceSink {
    storage: Arc<dyn StorageBackend>,
}

impl StoragePersistenceSink {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Every segment id persisted so far for an area
    pub fn driven(&self, area_id: &AreaId) -> Result<BTreeSet<SegmentId>> {
        load_json_backend(self.storage.as_ref(), &coverage_key(area_id.as_str()))
            .map(Option::unwrap_or_default)
            .map_err(|e| NavError::PersistenceFailure(e.to_string()))
    }

    fn store(&self, batch: &FlushBatch) -> Result<()> {
        let mut driven = self.driven(&batch.area_id)?;
        driven.extend(batch.segment_ids.iter().copied());
        save_json_backend(
            self.storage.as_ref(),
            &coverage_key(batch.area_id.as_str()),
            &driven,
        )
        .map_err(|e| NavError::PersistenceFailure(e.to_string()))
    }
}

impl PersistenceSink for StoragePersistenceSink {
    fn persist(&self, batch: &FlushBatch) -> impl Future<Output = Result<()>> + Send {
        let result = self.store(batch);
        match &result {
            Ok(()) => tracing::debug!(
                area_id = %batch.area_id,
                segments = batch.segment_ids.len(),
                "Persisted coverage batch"
            ),
            Err(e) => tracing::warn!(area_id = %batch.area_id, error = %e, "Coverage batch not persisted"),
        }
        ready(result)
    }
}
