use crate::phase::DisplayPhase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something the subject saw or did, stamped with run time in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    DisplayPhaseEntered {
        phase: DisplayPhase,
        trial: usize,
        cue: Option<String>,
        elapsed: f64,
    },
    KeyPressed {
        key: String,
        elapsed: f64,
    },
}

impl Event {
    pub fn elapsed(&self) -> f64 {
        match self {
            Self::DisplayPhaseEntered { elapsed, .. } | Self::KeyPressed { elapsed, .. } => *elapsed,
        }
    }

    pub fn phase(&self) -> Option<DisplayPhase> {
        match self {
            Self::DisplayPhaseEntered { phase, .. } => Some(*phase),
            Self::KeyPressed { .. } => None,
        }
    }
}

/// One tab-separated line per event, as shipped in status replies
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisplayPhaseEntered {
                phase: DisplayPhase::Head,
                trial,
                cue,
                elapsed,
            } => write!(
                f,
                "{}\t{trial}\t{}\t{elapsed:.4}",
                DisplayPhase::Head.event_name(),
                cue.as_deref().unwrap_or("-")
            ),
            Self::DisplayPhaseEntered {
                phase,
                trial,
                elapsed,
                ..
            } => write!(f, "{}\t{trial}\t{elapsed:.4}", phase.event_name()),
            Self::KeyPressed { key, elapsed } => write!(f, "keyPress\t{key}\t{elapsed:.4}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_lines() {
        let head = Event::DisplayPhaseEntered {
            phase: DisplayPhase::Head,
            trial: 0,
            cue: Some("A".into()),
            elapsed: 0.0166,
        };
        assert_eq!(head.to_string(), "displayHead\t0\tA\t0.0166");

        let uncued = Event::DisplayPhaseEntered {
            phase: DisplayPhase::Head,
            trial: 2,
            cue: None,
            elapsed: 8.5,
        };
        assert_eq!(uncued.to_string(), "displayHead\t2\t-\t8.5000");

        let body = Event::DisplayPhaseEntered {
            phase: DisplayPhase::Body,
            trial: 1,
            cue: Some("ignored".into()),
            elapsed: 5.01,
        };
        assert_eq!(body.to_string(), "displayBody\t1\t5.0100");

        let key = Event::KeyPressed {
            key: "Space".into(),
            elapsed: 1.23456,
        };
        assert_eq!(key.to_string(), "keyPress\tSpace\t1.2346");
        assert_eq!(key.phase(), None);
        assert_eq!(body.phase(), Some(DisplayPhase::Body));
    }
}
