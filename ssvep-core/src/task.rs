use crate::error::{DisplayError, Result};
use crate::series::ExternalSeries;
use crate::stimulus::PatchShape;
use crate::trial::{CuePolicy, TrialPlan};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Work handed from the control channel to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    StartSsvep(Box<SsvepCommand>),
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::StartSsvep(_) => "StartSSVEP",
        }
    }
}

/// Where the body-phase brightness comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSeriesSource {
    /// Name of a table in the time-series store
    Table(String),
    Inline(ExternalSeries),
}

/// Decoded RGBA8 background, already scaled to the run resolution
#[derive(Clone, PartialEq)]
pub struct BackgroundImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for BackgroundImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// StartSSVEP payload. Every field is optional on the wire so a missing
/// one is rejected by the engine as a command error, not as a broken message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SsvepCommand {
    pub resolution_x: Option<u32>,
    pub resolution_y: Option<u32>,
    pub repeats: Option<usize>,
    pub cue: Option<String>,
    pub patch_layout_text: Option<String>,
    pub time_series: Option<TimeSeriesSource>,
    pub head_length: Option<f64>,
    pub body_length: Option<f64>,
    pub tail_length: Option<f64>,
    /// `data:image/...;base64,` URL of the stimulus background
    pub background_image: Option<String>,
    pub patch_shape: Option<String>,

    /// Series resolved off the render thread from `time_series`
    #[serde(skip)]
    pub resolved_series: ExternalSeries,
    #[serde(skip)]
    pub background: Option<BackgroundImage>,
}

/// Largest accepted run resolution along either axis
pub const MAX_RESOLUTION: u32 = 16_384;

fn require<T: Copy>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| DisplayError::missing_field(field))
}

impl SsvepCommand {
    pub fn resolution(&self) -> Result<(u32, u32)> {
        let x = require(self.resolution_x, "resolution_x")?;
        let y = require(self.resolution_y, "resolution_y")?;
        if x == 0 || y == 0 {
            return Err(DisplayError::command(format!("resolution {x}x{y} is empty")));
        }
        if x > MAX_RESOLUTION || y > MAX_RESOLUTION {
            return Err(DisplayError::command(format!(
                "resolution {x}x{y} exceeds {MAX_RESOLUTION} pixels per side"
            )));
        }
        Ok((x, y))
    }

    pub fn plan(&self) -> Result<TrialPlan> {
        TrialPlan::new(
            require(self.repeats, "repeats")?,
            CuePolicy::from_cue(self.cue.as_deref()),
            require(self.head_length, "head_length")?,
            require(self.body_length, "body_length")?,
            require(self.tail_length, "tail_length")?,
        )
    }

    pub fn layout_text(&self) -> Result<&str> {
        self.patch_layout_text
            .as_deref()
            .ok_or_else(|| DisplayError::missing_field("patch_layout_text"))
    }

    pub fn shape(&self) -> Result<PatchShape> {
        match self.patch_shape.as_deref() {
            None => Ok(PatchShape::default()),
            Some(s) => s.parse(),
        }
    }
}
