//! Turns wire-level references (table names, encoded images) into data before a
//! command reaches the engine. Everything here may block.

use crate::store::TimeSeriesStore;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::imageops::FilterType;
use ssvep_core::{BackgroundImage, DisplayError, Result, SsvepCommand, TimeSeriesSource};
use tracing::debug;

/// Decodes a `data:image/...;base64,` URL (or bare base64) and scales the
/// image to the run resolution.
pub fn decode_background(data_url: &str, resolution: (u32, u32)) -> Result<BackgroundImage> {
    let payload = data_url
        .split_once("base64,")
        .map_or(data_url, |(_, payload)| payload);
    let payload: String = payload
        .replace("\\n", "")
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DisplayError::command(format!("background image is not valid base64: {e}")))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| DisplayError::command(format!("cannot decode background image: {e}")))?;

    let (w, h) = resolution;
    let rgba = img.resize_exact(w, h, FilterType::Triangle).to_rgba8();
    debug!(bytes = bytes.len(), w, h, "background image decoded");
    Ok(BackgroundImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Fills in `resolved_series` and `background` from the command's references.
pub fn resolve_command(
    mut cmd: SsvepCommand,
    store: &dyn TimeSeriesStore,
) -> Result<SsvepCommand> {
    cmd.resolved_series = match &cmd.time_series {
        None => Default::default(),
        Some(TimeSeriesSource::Table(name)) => store.load(name)?,
        Some(TimeSeriesSource::Inline(series)) => series.clone(),
    };

    if let Some(data_url) = cmd.background_image.as_deref().filter(|p| !p.is_empty()) {
        // the engine reports a missing or invalid resolution itself
        if let Ok(resolution) = cmd.resolution() {
            cmd.background = Some(decode_background(data_url, resolution)?);
        }
    }
    Ok(cmd)
}
