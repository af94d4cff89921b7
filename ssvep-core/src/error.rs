//! Error taxonomy shared by every crate of the display.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DisplayError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisplayError {
    /// Layout or time-series text could not be parsed
    #[error("format error: {0}")]
    Format(String),

    /// A command field is missing or carries an unusable value
    #[error("command error: {0}")]
    Command(String),

    /// Transport fault or malformed message on a single control connection
    #[error("connection error: {0}")]
    Connection(String),

    /// Drawing surface or device is unavailable
    #[error("render resource unavailable: {0}")]
    RenderResource(String),
}

impl DisplayError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    pub fn missing_field(field: &str) -> Self {
        Self::Command(format!("missing required field `{field}`"))
    }

    /// Short hint for the controller, sent next to the error text.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Format(_) => {
                "layout rows are `index,name,x,y,w,h,omega,phi` separated by `;`; check field count and numbers"
            }
            Self::Command(_) => {
                "send every StartSSVEP field (resolution, repeats, lengths > 0, patch_layout_text)"
            }
            Self::Connection(_) => "send one JSON object per line with a known `type`",
            Self::RenderResource(_) => "check the display and graphics driver, then restart",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RenderResource(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_render_errors_are_fatal() {
        assert!(DisplayError::RenderResource("gone".into()).is_fatal());
        assert!(!DisplayError::format("x").is_fatal());
        assert!(!DisplayError::command("x").is_fatal());
        assert!(!DisplayError::Connection("x".into()).is_fatal());
    }

    #[test]
    fn test_missing_field_message() {
        let e = DisplayError::missing_field("repeats");
        assert_eq!(e.to_string(), "command error: missing required field `repeats`");
        assert!(!e.suggestion().is_empty());
    }
}
