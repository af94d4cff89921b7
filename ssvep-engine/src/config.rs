use serde::{Deserialize, Serialize};
use ssvep_core::SAMPLING_INTERVAL;

/// Gray level of patches that are neither cued nor flickering
pub const NEUTRAL_INTENSITY: f32 = 100.0 / 255.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between compiled series samples
    pub sampling_interval: f64,
    pub neutral_intensity: f32,
    pub cue_intensity: f32,
    /// Completed runs kept for status queries
    pub event_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampling_interval: SAMPLING_INTERVAL,
            neutral_intensity: NEUTRAL_INTENSITY,
            cue_intensity: 1.0,
            event_history: 16,
        }
    }
}
