use super::config::EngineConfig;
use super::context::{EngineContext, EngineStatus};
use super::event_log::EventLog;
use super::trial::{RunConfig, select_cues};
use rand::Rng;
use ssvep_core::{DisplayError, DisplayPhase, EngineState, Event, Task};
use ssvep_timing::{FrameClock, Timer};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const WELCOME_PROMPT: &str = "Welcome to the SSVEP display";
pub const FINISHED_PROMPT: &str = "SSVEP experiment finished";
pub const EMPTY_PROFILE: &str = "Empty user profile";

/// What the renderer should put on screen this frame
#[derive(Debug)]
pub enum Frame<'a> {
    Idle {
        osd: String,
        prompt: &'a str,
        profile: &'a str,
        marker: [u8; 3],
    },
    Stimulus {
        /// Changes whenever a new run starts
        run_id: u64,
        run: &'a RunConfig,
        /// Gray level per layout patch, 0..=1
        fills: &'a [f32],
        trial: usize,
        phase: DisplayPhase,
        osd: String,
        marker: [u8; 3],
    },
}

impl Frame<'_> {
    pub fn osd(&self) -> &str {
        match self {
            Frame::Idle { osd, .. } | Frame::Stimulus { osd, .. } => osd,
        }
    }

    pub fn marker(&self) -> [u8; 3] {
        match self {
            Frame::Idle { marker, .. } | Frame::Stimulus { marker, .. } => *marker,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Frame::Idle { .. })
    }
}

struct ActiveRun {
    id: u64,
    config: RunConfig,
    cues: Vec<Option<String>>,
    cue_patch: Vec<Option<usize>>,
    /// Next `trial * 3 + phase` slot whose entry has not been logged
    next_slot: usize,
    trial: usize,
    phase: DisplayPhase,
}

impl ActiveRun {
    /// Logs phase entries up to and including `last`. Slots skipped by a
    /// stalled frame are stamped with their nominal start.
    fn enter_through(&mut self, log: &mut EventLog, last: usize, stamp: Option<f64>) {
        let plan = &self.config.plan;
        for s in self.next_slot..=last {
            let (trial, phase) = (s / 3, DisplayPhase::from_index(s));
            let nominal = plan.phase_start(trial, phase);
            let elapsed = match stamp {
                Some(e) if s == last => e,
                _ => nominal,
            };
            let cue = match phase {
                DisplayPhase::Head => self.cues[trial].clone(),
                _ => None,
            };
            debug!(trial, %phase, elapsed, "phase entered");
            log.record(Event::DisplayPhaseEntered {
                phase,
                trial,
                cue,
                elapsed,
            });
        }
        self.next_slot = self.next_slot.max(last + 1);
    }
}

/// Trial state machine, driven once per presented frame
pub struct StimulusEngine<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    ctx: Arc<EngineContext>,
    config: EngineConfig,
    clock: FrameClock<T>,
    rng: R,
    run: Option<ActiveRun>,
    runs_started: u64,
    fills: Vec<f32>,
    prompt: String,
    prompt_seen: u64,
    profile: String,
    profile_seen: u64,
    last_error: Option<DisplayError>,
    marker: [u8; 3],
}

impl<T, R> StimulusEngine<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(ctx: Arc<EngineContext>, config: EngineConfig, timer: T, rng: R) -> Self {
        Self {
            ctx,
            config,
            clock: FrameClock::new(timer),
            rng,
            run: None,
            runs_started: 0,
            fills: Vec::new(),
            prompt: WELCOME_PROMPT.to_string(),
            prompt_seen: 0,
            profile: EMPTY_PROFILE.to_string(),
            profile_seen: 0,
            last_error: None,
            marker: [255; 3],
        }
    }

    /// Advances the state machine by one frame.
    pub fn tick(&mut self) -> Frame<'_> {
        let mut elapsed = self.clock.tick();
        self.marker = [self.rng.random(), self.rng.random(), self.rng.random()];

        if let Some(prompt) = self.ctx.prompt.try_read_newer(&mut self.prompt_seen) {
            self.prompt = prompt;
        }
        if let Some(profile) = self.ctx.profile.try_read_newer(&mut self.profile_seen) {
            self.profile = profile_text(&profile);
            info!(entries = profile.len(), "user profile updated");
        }

        if self.run.is_none() && self.drain_one() {
            elapsed = 0.0;
        }

        if let Some(run) = &self.run {
            if elapsed > run.config.plan.total_length() {
                self.finish_run();
                elapsed = 0.0;
            } else {
                self.step_run(elapsed);
            }
        }

        self.publish_status(elapsed);
        self.frame()
    }

    fn frame(&self) -> Frame<'_> {
        let mut osd = self.clock.osd_text();
        match &self.run {
            Some(run) => {
                osd.push_str(&format!(" | {} trial | {}", run.trial + 1, run.phase));
                Frame::Stimulus {
                    run_id: run.id,
                    run: &run.config,
                    fills: &self.fills,
                    trial: run.trial,
                    phase: run.phase,
                    osd,
                    marker: self.marker,
                }
            }
            None => Frame::Idle {
                osd,
                prompt: &self.prompt,
                profile: &self.profile,
                marker: self.marker,
            },
        }
    }

    /// Pops at most one task. Returns true if it started a run.
    fn drain_one(&mut self) -> bool {
        let Some(task) = self.ctx.tasks.pop_if_any() else {
            return false;
        };
        debug!(kind = task.kind(), remaining = self.ctx.tasks.len(), "popped task");

        match task {
            Task::StartSsvep(cmd) => match RunConfig::build(*cmd, &self.config) {
                Ok(config) => {
                    self.start_run(config);
                    true
                }
                Err(e) => {
                    error!(error = %e, "failed to start SSVEP run");
                    self.prompt = e.to_string();
                    self.last_error = Some(e);
                    false
                }
            },
        }
    }

    fn start_run(&mut self, config: RunConfig) {
        let names: Vec<&str> = config.layout.names().collect();
        let cues = select_cues(
            &config.plan.cue_policy,
            &names,
            config.plan.repeats,
            &mut self.rng,
        );
        let cue_patch = cues
            .iter()
            .map(|c| c.as_deref().and_then(|n| config.layout.index_of(n)))
            .collect();

        self.runs_started += 1;
        self.fills = vec![self.config.neutral_intensity; config.layout.len()];
        self.ctx.events().begin_run();
        self.clock.reset();

        info!(
            run = self.runs_started,
            repeats = config.plan.repeats,
            total = config.plan.total_length(),
            patches = config.layout.len(),
            "SSVEP run started"
        );
        self.run = Some(ActiveRun {
            id: self.runs_started,
            config,
            cues,
            cue_patch,
            next_slot: 0,
            trial: 0,
            phase: DisplayPhase::Head,
        });
    }

    fn step_run(&mut self, elapsed: f64) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let (trial, phase, t) = run.config.plan.locate(elapsed);
        let head_length = run.config.plan.head_length;
        let slot = trial * 3 + phase.index();

        run.enter_through(&mut self.ctx.events(), slot, Some(elapsed));
        run.trial = trial;
        run.phase = phase;

        let neutral = self.config.neutral_intensity;
        match phase {
            DisplayPhase::Head => {
                let cued = run.cue_patch[trial];
                for (i, fill) in self.fills.iter_mut().enumerate() {
                    *fill = if Some(i) == cued {
                        self.config.cue_intensity
                    } else {
                        neutral
                    };
                }
            }
            DisplayPhase::Body => {
                let series = &run.config.series;
                let j = series.index_at(t - head_length);
                for (i, fill) in self.fills.iter_mut().enumerate() {
                    // past the last sample the patch keeps its previous level
                    if let Some(v) = series.value_at(i, j) {
                        *fill = v.clamp(0.0, 1.0) as f32;
                    }
                }
            }
            DisplayPhase::Tail => self.fills.fill(neutral),
        }
    }

    fn finish_run(&mut self) {
        let Some(mut run) = self.run.take() else {
            return;
        };
        let logged = {
            let mut log = self.ctx.events();
            // a stall past the end still logs every remaining phase
            run.enter_through(&mut log, run.config.plan.repeats * 3 - 1, None);
            log.finish_run()
        };
        info!(
            run = run.id,
            events = logged,
            timing = %self.clock.stats(),
            "SSVEP run finished"
        );
        self.prompt = FINISHED_PROMPT.to_string();
        self.fills.clear();
        self.clock.reset();
    }

    fn publish_status(&self, elapsed: f64) {
        let status = EngineStatus {
            state: self.state(),
            elapsed,
            total: self.run.as_ref().map(|r| r.config.plan.total_length()),
        };
        self.ctx.status.offer(status);
    }

    /// Logs a key press against the running trial; idle presses are only traced.
    pub fn record_key(&mut self, key: &str) {
        let elapsed = self.clock.elapsed();
        if self.run.is_some() {
            self.ctx.events().record(Event::KeyPressed {
                key: key.to_string(),
                elapsed,
            });
            debug!(key, elapsed, "key press recorded");
        } else {
            info!(key, "key press while idle");
        }
    }

    pub fn state(&self) -> EngineState {
        if self.run.is_some() {
            EngineState::Running
        } else {
            EngineState::Idle
        }
    }

    pub fn last_error(&self) -> Option<&DisplayError> {
        self.last_error.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn frame_stats(&self) -> ssvep_timing::CalibrationStats {
        self.clock.stats()
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }
}

fn profile_text(profile: &BTreeMap<String, String>) -> String {
    if profile.is_empty() {
        return EMPTY_PROFILE.to_string();
    }
    profile
        .iter()
        .map(|(k, v)| format!("{k}\t{v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_text() {
        let profile = BTreeMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("age".to_string(), "36".to_string()),
        ]);
        assert_eq!(profile_text(&profile), "age\t36\nname\tAda");
        assert_eq!(profile_text(&BTreeMap::new()), EMPTY_PROFILE);
    }
}
