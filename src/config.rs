use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ssvep_engine::EngineConfig;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "127.0.0.1:23335";
pub const DEFAULT_TIMESERIES_DIR: &str = "asset/timeseries";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Address of the control listener
    pub bind: String,
    /// Directory of `<name>.csv` tables for StartSSVEP's `time_series`
    pub timeseries_dir: PathBuf,
    /// Font for the overlays; common system fonts are tried when unset
    pub font: Option<PathBuf>,
    pub fullscreen: bool,
    pub title: String,
    pub engine: EngineConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            timeseries_dir: PathBuf::from(DEFAULT_TIMESERIES_DIR),
            font: None,
            fullscreen: true,
            title: "SSVEP Display".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl DisplayConfig {
    /// Reads a JSON config file; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DisplayConfig::default();
        assert_eq!(cfg.bind, "127.0.0.1:23335");
        assert_eq!(cfg.timeseries_dir, PathBuf::from("asset/timeseries"));
        assert_eq!(cfg.engine.event_history, 16);
        assert!(cfg.fullscreen);
        assert!(cfg.font.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg = DisplayConfig::from_json(
            r#"{"bind":"0.0.0.0:9000","fullscreen":false,"engine":{"event_history":3}}"#,
        )
        .unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:9000");
        assert!(!cfg.fullscreen);
        assert_eq!(cfg.engine.event_history, 3);
        assert_eq!(cfg.engine.cue_intensity, 1.0);
        assert_eq!(cfg.title, "SSVEP Display");
    }

    #[test]
    fn test_load_reports_path() {
        let err = DisplayConfig::load(Path::new("/nonexistent/display.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/display.json"));

        let path = std::env::temp_dir().join(format!("ssvep-config-{}.json", std::process::id()));
        std::fs::write(&path, "{not json").unwrap();
        assert!(DisplayConfig::load(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
