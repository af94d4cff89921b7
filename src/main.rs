//! SSVEP stimulus display: flickering patches driven by remote StartSSVEP
//! commands, with phase and key events reported back over the control channel.

mod app;
mod config;

use anyhow::Result;
use app::App;
use clap::Parser;
use config::DisplayConfig;
use ssvep_control::{ControlServer, CsvTimeSeriesStore};
use ssvep_engine::EngineContext;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_LOG_FILTER: &str = "ssvep_display=info,ssvep_engine=info,ssvep_control=info";

#[derive(Parser, Debug)]
#[command(name = "ssvep-display", about = "SSVEP stimulus display with a TCP control channel")]
struct Cli {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control listener address (default 127.0.0.1:23335)
    #[arg(long)]
    bind: Option<String>,

    /// Directory of `<name>.csv` time-series tables
    #[arg(long)]
    timeseries_dir: Option<PathBuf>,

    /// TTF/OTF font for the text overlays
    #[arg(long)]
    font: Option<PathBuf>,

    /// Open a window instead of going fullscreen
    #[arg(long)]
    windowed: bool,
}

impl Cli {
    fn apply(self, config: &mut DisplayConfig) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(dir) = self.timeseries_dir {
            config.timeseries_dir = dir;
        }
        if self.font.is_some() {
            config.font = self.font;
        }
        if self.windowed {
            config.fullscreen = false;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => DisplayConfig::load(path)?,
        None => DisplayConfig::default(),
    };
    cli.apply(&mut config);
    info!("ssvep-display v{} starting", env!("CARGO_PKG_VERSION"));

    let ctx = Arc::new(EngineContext::new(&config.engine));
    let store = CsvTimeSeriesStore::new(&config.timeseries_dir);
    if !store.root().is_dir() {
        warn!(
            "time-series directory {} not found; only inline series will resolve",
            store.root().display()
        );
    }
    let mut control = ControlServer::new(Arc::clone(&ctx), Arc::new(store)).spawn(config.bind.as_str())?;

    let result = App::new(config, ctx).run();
    control.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "ssvep-display",
            "--bind",
            "0.0.0.0:4000",
            "--timeseries-dir",
            "/data/ts",
            "--windowed",
        ])
        .unwrap();
        let mut config = DisplayConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.bind, "0.0.0.0:4000");
        assert_eq!(config.timeseries_dir, PathBuf::from("/data/ts"));
        assert!(!config.fullscreen);
        assert!(config.font.is_none());
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::try_parse_from(["ssvep-display"]).unwrap();
        let mut config = DisplayConfig {
            bind: "10.0.0.1:1".into(),
            ..Default::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.bind, "10.0.0.1:1");
        assert!(config.fullscreen);
    }
}
