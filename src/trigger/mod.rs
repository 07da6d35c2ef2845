//! Physical trigger: level lines, debounce policy and the listener thread.
//!
//! # Flow
//!
//! ```text
//! LevelReader (GPIO / keyboard)
//!        │  bool samples every poll_interval
//!        ▼
//! DebounceDetector::detect()   ← trigger-listener thread, only while armed
//!        │  ClickEvent (duration within [min_press, max_press])
//!        ▼
//! crossbeam bounded channel ──▶ TriggerCoordinator
//! ```
//!
//! In simulation mode the listener thread skips the detector and sends a
//! synthetic [`ClickEvent`] every `simulation_interval` of armed time.
//!
//! The coordinator disarms the [`TriggerGate`] while a run is active, so
//! presses made during a run are never observed.

pub mod debounce;
pub mod keyboard;
pub mod line;
pub mod source;

#[cfg(target_os = "linux")]
pub mod gpio;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

pub use debounce::{DebounceDetector, DebounceSettings, DebounceStats, DetectOutcome};
pub use keyboard::{parse_key, KeyboardLine};
pub use line::{LevelReader, LineError};
pub use source::SignalSource;

#[cfg(target_os = "linux")]
pub use gpio::GpioLine;

// ---------------------------------------------------------------------------
// ClickEvent
// ---------------------------------------------------------------------------

/// One validated press-and-release cycle.
///
/// Deliberately not `Clone`: an event is moved into the coordinator and
/// consumed exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct ClickEvent {
    press_ts: Instant,
    release_ts: Instant,
    duration: Duration,
}

impl ClickEvent {
    pub(crate) fn new(press_ts: Instant, release_ts: Instant) -> Self {
        Self {
            press_ts,
            release_ts,
            duration: release_ts.saturating_duration_since(press_ts),
        }
    }

    /// A zero-length click fired by the simulation timer.
    pub fn synthetic() -> Self {
        let now = Instant::now();
        Self::new(now, now)
    }

    pub fn press_ts(&self) -> Instant {
        self.press_ts
    }

    pub fn release_ts(&self) -> Instant {
        self.release_ts
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_synthetic(&self) -> bool {
        self.duration.is_zero()
    }
}

// ---------------------------------------------------------------------------
// StopFlag
// ---------------------------------------------------------------------------

/// Cooperative shutdown flag shared by every loop in the process.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// TriggerGate
// ---------------------------------------------------------------------------

/// Armed/disarmed switch between the coordinator and the listener thread.
///
/// Starts armed. The listener samples the line (or runs the simulation
/// timer) only while armed.
#[derive(Debug, Clone)]
pub struct TriggerGate(Arc<AtomicBool>);

impl TriggerGate {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for TriggerGate {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
