use serde::{Deserialize, Serialize};
use std::fmt;

/// Phases of one trial, always visited head -> body -> tail
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayPhase {
    Head,
    Body,
    Tail,
}

impl DisplayPhase {
    pub const ALL: [DisplayPhase; 3] = [DisplayPhase::Head, DisplayPhase::Body, DisplayPhase::Tail];

    /// Position inside the trial (0, 1, 2)
    pub fn index(&self) -> usize {
        match self {
            Self::Head => 0,
            Self::Body => 1,
            Self::Tail => 2,
        }
    }

    pub fn from_index(i: usize) -> Self {
        Self::ALL[i % 3]
    }

    pub fn next(&self) -> Option<Self> {
        use DisplayPhase::*;
        Some(match self {
            Head => Body,
            Body => Tail,
            Tail => return None,
        })
    }

    /// Name used in the event log
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Head => "displayHead",
            Self::Body => "displayBody",
            Self::Tail => "displayTail",
        }
    }
}

impl fmt::Display for DisplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Head => "head",
            Self::Body => "body",
            Self::Tail => "tail",
        })
    }
}

#[derive(Copy, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Idle,
    Running,
}

impl EngineState {
    /// Task label reported to the controller
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "SSVEP",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(DisplayPhase::Head.next(), Some(DisplayPhase::Body));
        assert_eq!(DisplayPhase::Body.next(), Some(DisplayPhase::Tail));
        assert_eq!(DisplayPhase::Tail.next(), None);
        for p in DisplayPhase::ALL {
            assert_eq!(DisplayPhase::from_index(p.index()), p);
        }
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(EngineState::Idle.as_wire(), "IDLE");
        assert_eq!(EngineState::Running.to_string(), "SSVEP");
    }
}
