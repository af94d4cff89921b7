//! Run clock shown on screen and used to place every frame in a trial.

use crate::timer::{CalibrationStats, Timer};
use std::time::Duration;
use tracing::debug;

const NANOS_PER_SEC: f64 = 1e9;
const REPORT_EVERY_NS: u64 = 1_000_000_000;

pub struct FrameClock<T: Timer<Timestamp = u64>> {
    timer: T,
    origin: u64,
    last_tick: Option<u64>,
    last_elapsed: f64,
    frames: u64,
    report_start: u64,
    report_frames: u64,
}

impl<T: Timer<Timestamp = u64>> FrameClock<T> {
    pub fn new(timer: T) -> Self {
        let origin = timer.now();
        Self {
            timer,
            origin,
            last_tick: None,
            last_elapsed: 0.0,
            frames: 0,
            report_start: origin,
            report_frames: 0,
        }
    }

    /// Restart elapsed time and frame counters at the current instant
    pub fn reset(&mut self) {
        let now = self.timer.now();
        self.origin = now;
        self.last_tick = None;
        self.last_elapsed = 0.0;
        self.frames = 0;
        self.report_start = now;
        self.report_frames = 0;
    }

    /// Marks one presented frame and returns seconds since the last reset.
    pub fn tick(&mut self) -> f64 {
        let now = self.timer.now();
        if let Some(prev) = self.last_tick {
            self.timer
                .record_frame(Duration::from_nanos(now.saturating_sub(prev)));
        }
        self.last_tick = Some(now);
        self.frames += 1;
        self.report_frames += 1;

        let window = now.saturating_sub(self.report_start);
        if window >= REPORT_EVERY_NS {
            debug!(
                fps = self.report_frames as f64 * NANOS_PER_SEC / window as f64,
                frames = self.frames,
                "frame rate"
            );
            self.report_start = now;
            self.report_frames = 0;
        }

        self.last_elapsed = now.saturating_sub(self.origin) as f64 / NANOS_PER_SEC;
        self.last_elapsed
    }

    /// Live seconds since the last reset
    pub fn elapsed(&self) -> f64 {
        self.timer.now().saturating_sub(self.origin) as f64 / NANOS_PER_SEC
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn frame_rate(&self) -> f64 {
        self.frames as f64 / self.last_elapsed.max(0.1)
    }

    /// `m:ss:cc | <fps>Hz`, as of the last tick
    pub fn osd_text(&self) -> String {
        let centis = (self.last_elapsed * 100.0).floor() as u64;
        format!(
            "{}:{:02}:{:02} | {:.2}Hz",
            centis / 6000,
            (centis / 100) % 60,
            centis % 100,
            self.frame_rate()
        )
    }

    pub fn stats(&self) -> CalibrationStats {
        self.timer.calibration_stats()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}
