use coverage_nav::{AppError, Settings, logging, run};
use coverage_nav_lib::NavError;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Settings::from_cli();
    logging::setup_logging_and_profiling();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Coverage Navigator starting");

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(settings)) {
        Ok(stats) => {
            tracing::info!(
                instructions = stats.instructions,
                segments_driven = stats.segments_driven,
                coverage = ?stats.coverage_percent,
                progress_m = format!("{:.0}", stats.progress_meters),
                "Replay finished"
            );
            ExitCode::SUCCESS
        }
        Err(AppError::Nav(NavError::NoRouteFound(area))) => {
            tracing::error!(%area, "No route for this area; generate one and place it in the data directory");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Replay failed");
            ExitCode::FAILURE
        }
    }
}
