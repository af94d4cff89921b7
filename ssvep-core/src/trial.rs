use crate::error::{DisplayError, Result};
use crate::phase::DisplayPhase;
use serde::{Deserialize, Serialize};

/// How the head phase of each trial highlights a patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CuePolicy {
    FixedName(String),
    RandomPerTrial,
    NoCue,
}

impl CuePolicy {
    pub const RANDOM: &'static str = "!Random";
    pub const NO_CUE: &'static str = "!NoCue";

    pub fn from_cue(cue: Option<&str>) -> Self {
        match cue.map(str::trim) {
            None | Some("") => Self::NoCue,
            Some(Self::RANDOM) => Self::RandomPerTrial,
            Some(Self::NO_CUE) => Self::NoCue,
            Some(name) => Self::FixedName(name.to_string()),
        }
    }
}

/// Timing of a run: `repeats` trials of head + body + tail seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialPlan {
    pub repeats: usize,
    pub cue_policy: CuePolicy,
    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,
}

impl TrialPlan {
    pub const MAX_REPEATS: usize = 10_000;
    /// Longest accepted run, in seconds
    pub const MAX_TOTAL_LENGTH: f64 = 86_400.0;

    pub fn new(
        repeats: usize,
        cue_policy: CuePolicy,
        head_length: f64,
        body_length: f64,
        tail_length: f64,
    ) -> Result<Self> {
        if repeats == 0 {
            return Err(DisplayError::command("repeats must be at least 1"));
        }
        if repeats > Self::MAX_REPEATS {
            return Err(DisplayError::command(format!(
                "repeats must be at most {}, got {repeats}",
                Self::MAX_REPEATS
            )));
        }
        for (label, v) in [
            ("head_length", head_length),
            ("body_length", body_length),
            ("tail_length", tail_length),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(DisplayError::command(format!(
                    "{label} must be a positive number of seconds, got {v}"
                )));
            }
        }
        let plan = Self {
            repeats,
            cue_policy,
            head_length,
            body_length,
            tail_length,
        };
        if plan.total_length() > Self::MAX_TOTAL_LENGTH {
            return Err(DisplayError::command(format!(
                "run of {}s exceeds the {}s limit",
                plan.total_length(),
                Self::MAX_TOTAL_LENGTH
            )));
        }
        Ok(plan)
    }

    pub fn trial_length(&self) -> f64 {
        self.head_length + self.body_length + self.tail_length
    }

    pub fn total_length(&self) -> f64 {
        self.trial_length() * self.repeats as f64
    }

    /// Maps run time to `(trial_index, phase, seconds into the trial)`.
    ///
    /// The final trial does not wrap, so `elapsed == total_length` stays in its tail.
    pub fn locate(&self, elapsed: f64) -> (usize, DisplayPhase, f64) {
        let trial_length = self.trial_length();
        let elapsed = elapsed.max(0.0);
        let trial = ((elapsed / trial_length).floor() as usize).min(self.repeats - 1);
        let t = elapsed - trial as f64 * trial_length;

        let phase = if t <= self.head_length {
            DisplayPhase::Head
        } else if t <= self.head_length + self.body_length {
            DisplayPhase::Body
        } else {
            DisplayPhase::Tail
        };
        (trial, phase, t)
    }

    /// Nominal run time at which `phase` of `trial` begins
    pub fn phase_start(&self, trial: usize, phase: DisplayPhase) -> f64 {
        let offset = match phase {
            DisplayPhase::Head => 0.0,
            DisplayPhase::Body => self.head_length,
            DisplayPhase::Tail => self.head_length + self.body_length,
        };
        trial as f64 * self.trial_length() + offset
    }
}
