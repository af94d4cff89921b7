use crate::error::{DisplayError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One flickering patch of the layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSpec {
    pub id: String,
    pub name: String,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    /// Angular frequency (rad/s)
    pub omega: f64,
    pub phi: f64,
}

impl PatchSpec {
    /// Bounding box as (left, top, right, bottom)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.center_x - self.width / 2.0,
            self.center_y - self.height / 2.0,
            self.center_x + self.width / 2.0,
            self.center_y + self.height / 2.0,
        )
    }

    /// Brightness when no external series drives the patch
    pub fn synthesized(&self, seconds: f64) -> f64 {
        0.5 + 0.5 * (self.omega * seconds + self.phi).cos()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchShape {
    #[default]
    Rectangle,
    Ellipse,
}

impl FromStr for PatchShape {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangle" | "rect" => Ok(Self::Rectangle),
            "ellipse" | "circle" => Ok(Self::Ellipse),
            other => Err(DisplayError::command(format!(
                "unknown patch_shape `{other}` (expected rectangle|ellipse)"
            ))),
        }
    }
}
