use super::error::AppResult;
use clap::Parser;
use coverage_nav_lib::Config;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Coverage Navigator - Replay a drive along a coverage route with turn-by-turn guidance
pub struct Settings {
    /// Area to load (defaults to the area loaded last time)
    #[clap(short, long)]
    pub area: Option<String>,

    /// Directory holding `<area>.gpx` and an optional `<area>.coverage.json`
    #[clap(short, long, value_name = "DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Fixes to replay: JSON lines of fixes, or a GPX track
    #[clap(short, long, value_name = "FILE")]
    pub fixes: PathBuf,

    /// JSON file overriding navigation thresholds
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Key/value storage file (defaults to a per-user location)
    #[clap(long, value_name = "FILE")]
    pub storage: Option<PathBuf>,

    /// Replay speed-up factor; 0 replays as fast as possible
    #[clap(long, default_value = "0")]
    pub speedup: f64,

    /// Milliseconds between points when replaying a GPX track
    #[clap(long, default_value = "1000")]
    pub gpx_interval_ms: i64,

    /// Do not emit camera directives that follow the driver
    #[clap(long, default_value = "false")]
    pub no_follow: bool,

    /// Accept resume-ahead offers as soon as they are made
    #[clap(long, default_value = "false")]
    pub auto_resume: bool,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

impl Settings {
    /// Parse the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Library defaults, overridden by the JSON config file when given
    pub fn load_config(&self) -> AppResult<Config> {
        let Some(path) = &self.config else {
            return Ok(Config::default());
        };
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        tracing::info!(path = %path.display(), "Loaded config overrides");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_from(["coverage-nav", "--fixes", "drive.jsonl"]);
        assert_eq!(settings.fixes, PathBuf::from("drive.jsonl"));
        assert_eq!(settings.data_dir, PathBuf::from("."));
        assert!(settings.area.is_none());
        assert_eq!(settings.speedup, 0.0);
        assert!(!settings.auto_resume);
        assert_eq!(settings.load_config().unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config_override() {
        let path = std::env::temp_dir().join(format!("coverage-nav-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"navigation": {"off_route_m": 80.0}}"#).unwrap();

        let settings = Settings::parse_from([
            "coverage-nav",
            "--fixes",
            "drive.jsonl",
            "--config",
            path.to_str().unwrap(),
        ]);
        let config = settings.load_config().unwrap();
        assert_eq!(config.navigation.off_route_m, 80.0);
        assert_eq!(config.navigation.resume_ahead_m, 500.0);
        assert_eq!(config.coverage, Config::default().coverage);
    }
}
