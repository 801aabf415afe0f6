//! Replay application: files in, guidance and coverage out

mod error;
mod fixes;
mod render;
mod runner;
mod settings;
mod sink;
pub mod storage;
mod supply;

pub use error::{AppError, AppResult};
pub use fixes::load_fixes;
pub use render::{LogRenderer, RenderStats};
pub use runner::{Replay, ReplayOptions};
pub use settings::Settings;
pub use sink::{StoragePersistenceSink, StraightLineDirections};
pub use supply::FileRouteSupply;

use coverage_nav_lib::services::RouteSupply;
use coverage_nav_lib::{AreaData, AreaId};
use std::sync::Arc;
use storage::{FileStorage, LAST_AREA_KEY, StorageBackend};

/// Area named on the command line, else the one loaded last time
fn resolve_area(settings: &Settings, storage: &dyn StorageBackend) -> AppResult<AreaId> {
    if let Some(area) = &settings.area {
        return Ok(AreaId::from(area.as_str()));
    }
    if settings.ignore_persisted {
        return Err(AppError::NoArea);
    }
    match storage.get_string(LAST_AREA_KEY)? {
        Some(area) => {
            tracing::info!(%area, "Using the area loaded last time");
            Ok(AreaId::from(area))
        }
        None => Err(AppError::NoArea),
    }
}

/// Mark segments persisted by earlier runs as driven
fn apply_persisted(area: &mut AreaData, sink: &StoragePersistenceSink) {
    let driven = match sink.driven(&area.area_id) {
        Ok(driven) => driven,
        Err(e) => {
            tracing::warn!(area_id = %area.area_id, error = %e, "Ignoring persisted coverage");
            return;
        }
    };
    let mut restored = 0usize;
    for segment in &mut area.segments {
        if !segment.driven && driven.contains(&segment.segment_id) {
            segment.driven = true;
            restored += 1;
        }
    }
    if restored > 0 {
        tracing::info!(area_id = %area.area_id, restored, "Restored persisted coverage");
    }
}

/// Load the area, replay the fixes and end navigation
pub async fn run(settings: Settings) -> AppResult<RenderStats> {
    let config = settings.load_config()?;
    let file_storage = FileStorage::new_with_path(settings.storage.clone())?;
    tracing::info!(path = %file_storage.path().display(), "Using local storage");
    let storage: Arc<dyn StorageBackend> = Arc::new(file_storage);
    let area_id = resolve_area(&settings, storage.as_ref())?;
    let fixes = load_fixes(&settings.fixes, settings.gpx_interval_ms)?;

    let supply = FileRouteSupply::new(&settings.data_dir);
    let sink = StoragePersistenceSink::new(Arc::clone(&storage));
    let mut area = supply.load_area(&area_id).await?;
    if !settings.ignore_persisted {
        apply_persisted(&mut area, &sink);
    }

    let options = ReplayOptions {
        speedup: settings.speedup,
        auto_resume: settings.auto_resume,
        follow: !settings.no_follow,
    };
    let mut replay = Replay::new(
        config,
        StraightLineDirections,
        sink,
        LogRenderer::new(),
        storage,
        options,
    );
    replay.load(area).await?;
    replay.drive(fixes).await?;
    let renderer = replay.finish().await?;
    Ok(renderer.stats().clone())
}
