//! Debounce state machine: noisy level samples in, at most one click out.
//!
//! ```text
//! Idle ──asserted──▶ PressedCandidate ──(sleep debounce)──┬─ released ─▶ Noise
//!                                                         └─ asserted ─▶ PressedConfirmed
//! PressedConfirmed ──poll until released (or stop ▶ Aborted)──▶ ReleaseCandidate
//! ReleaseCandidate ──(sleep debounce)──┬─ asserted ─▶ Bounce
//!                                      └─ released ─▶ duration check ─▶ Click | OutOfRange
//! ```
//!
//! A re-assertion during `ReleaseCandidate` cancels the click outright; it
//! does not restart the press timing.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::TriggerConfig;

use super::line::{sample, LevelReader};
use super::{ClickEvent, StopFlag};

// ---------------------------------------------------------------------------
// DebounceSettings
// ---------------------------------------------------------------------------

/// Timing policy for [`DebounceDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebounceSettings {
    /// Settling time before a level change is re-sampled.
    pub debounce_delay: Duration,
    /// Sampling interval while waiting for release.
    pub poll_interval: Duration,
    /// Shortest accepted press.
    pub min_press: Duration,
    /// Longest accepted press.
    pub max_press: Duration,
}

impl DebounceSettings {
    pub fn from_config(config: &TriggerConfig) -> Self {
        Self {
            debounce_delay: config.debounce_delay(),
            poll_interval: config.poll_interval(),
            min_press: Duration::from_secs_f64(config.min_press_secs),
            max_press: Duration::from_secs_f64(config.max_press_secs),
        }
    }

    fn accepts(&self, duration: Duration) -> bool {
        self.min_press <= duration && duration <= self.max_press
    }
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self::from_config(&TriggerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// DetectOutcome
// ---------------------------------------------------------------------------

/// Result of one [`DebounceDetector::detect`] invocation.
#[derive(Debug, PartialEq, Eq)]
pub enum DetectOutcome {
    /// The line was not asserted.
    Idle,
    /// Asserted, but released again before the debounce delay elapsed.
    Noise,
    /// Re-asserted within the debounce window after release.
    Bounce,
    /// The stop flag was raised while the button was held.
    Aborted,
    /// A clean cycle whose duration fell outside the accepted range.
    OutOfRange(Duration),
    /// A genuine click.
    Click(ClickEvent),
}

// ---------------------------------------------------------------------------
// DebounceStats
// ---------------------------------------------------------------------------

/// Running counts of what the detector has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    pub clicks: u64,
    pub noise: u64,
    pub bounces: u64,
    pub out_of_range: u64,
}

// ---------------------------------------------------------------------------
// DebounceDetector
// ---------------------------------------------------------------------------

/// Turns a noisy digital line into at most one [`ClickEvent`] per press.
///
/// `detect` takes `&mut self` and `&mut` line access, so one detector can
/// never run concurrently on the same line.
#[derive(Debug)]
pub struct DebounceDetector {
    settings: DebounceSettings,
    stats: DebounceStats,
}

impl DebounceDetector {
    pub fn new(settings: DebounceSettings) -> Self {
        Self {
            settings,
            stats: DebounceStats::default(),
        }
    }

    pub fn settings(&self) -> &DebounceSettings {
        &self.settings
    }

    pub fn stats(&self) -> DebounceStats {
        self.stats
    }

    /// Run one detection cycle starting from `Idle`.
    ///
    /// Returns immediately with [`DetectOutcome::Idle`] when the line is not
    /// asserted; otherwise blocks until the press resolves. The release wait
    /// is unbounded but checks `stop` every poll interval.
    ///
    /// The click's `release_ts` is the first sample that saw the line
    /// released, so `duration` excludes the release confirmation delay.
    pub fn detect(&mut self, line: &mut dyn LevelReader, stop: &StopFlag) -> DetectOutcome {
        // Idle
        if !sample(line) {
            return DetectOutcome::Idle;
        }
        let press_ts = Instant::now();

        // PressedCandidate
        thread::sleep(self.settings.debounce_delay);
        if !sample(line) {
            self.stats.noise += 1;
            log::trace!("trigger: press did not survive debounce");
            return DetectOutcome::Noise;
        }

        // PressedConfirmed
        while sample(line) {
            if stop.is_stopped() {
                log::debug!("trigger: stop requested while button held");
                return DetectOutcome::Aborted;
            }
            thread::sleep(self.settings.poll_interval);
        }
        let release_ts = Instant::now();

        // ReleaseCandidate
        thread::sleep(self.settings.debounce_delay);
        if sample(line) {
            self.stats.bounces += 1;
            log::debug!("trigger: re-asserted after release, click discarded");
            return DetectOutcome::Bounce;
        }

        let click = ClickEvent::new(press_ts, release_ts);
        if !self.settings.accepts(click.duration()) {
            self.stats.out_of_range += 1;
            log::debug!(
                "trigger: press of {:.2}s outside [{:.2}s, {:.2}s], discarded",
                click.duration().as_secs_f64(),
                self.settings.min_press.as_secs_f64(),
                self.settings.max_press.as_secs_f64()
            );
            return DetectOutcome::OutOfRange(click.duration());
        }

        self.stats.clicks += 1;
        log::info!(
            "trigger: click detected, pressed for {:.2}s",
            click.duration().as_secs_f64()
        );
        DetectOutcome::Click(click)
    }

    /// [`detect`](Self::detect), keeping only a genuine click.
    pub fn detect_click(
        &mut self,
        line: &mut dyn LevelReader,
        stop: &StopFlag,
    ) -> Option<ClickEvent> {
        match self.detect(line, stop) {
            DetectOutcome::Click(click) => Some(click),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
