//! Trigger source selection and the `trigger-listener` thread.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};

use crate::config::{TriggerBackend, TriggerConfig};

use super::debounce::{DebounceDetector, DebounceSettings};
use super::line::{LevelReader, LineError};
use super::{ClickEvent, KeyboardLine, StopFlag, TriggerGate};

/// Where clicks come from. Chosen once at startup and moved into the
/// listener thread.
pub enum SignalSource {
    /// A real line sampled through the debounce detector.
    Hardware(Box<dyn LevelReader>),
    /// A synthetic click every `interval` of armed time.
    Simulated { interval: Duration },
}

impl std::fmt::Debug for SignalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hardware(line) => f.debug_tuple("Hardware").field(&line.backend()).finish(),
            Self::Simulated { interval } => f
                .debug_struct("Simulated")
                .field("interval", interval)
                .finish(),
        }
    }
}

impl SignalSource {
    /// Build the source described by `config`.
    ///
    /// If the configured hardware line cannot be opened, falls back to
    /// simulation with a warning rather than refusing to start.
    pub fn from_config(config: &TriggerConfig) -> Self {
        let simulated = Self::Simulated {
            interval: config.simulation_interval(),
        };

        if config.simulation_mode {
            log::info!(
                "trigger: simulation mode, one click every {:.1}s",
                config.simulation_interval().as_secs_f64()
            );
            return simulated;
        }

        match open_line(config) {
            Ok(line) => Self::Hardware(line),
            Err(e) => {
                log::warn!("trigger: {e}; falling back to simulation mode");
                simulated
            }
        }
    }

    /// Backend name for logs.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Hardware(line) => line.backend(),
            Self::Simulated { .. } => "simulation",
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated { .. })
    }

    /// Run this source on a dedicated `trigger-listener` thread.
    ///
    /// The thread samples only while `gate` is armed, forwards clicks with
    /// `try_send` (a full channel drops the click), and exits when `stop` is
    /// raised or the receiving side is dropped. The hardware line is
    /// released when the thread exits.
    pub fn spawn(
        self,
        settings: DebounceSettings,
        events: Sender<ClickEvent>,
        gate: TriggerGate,
        stop: StopFlag,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("trigger-listener".into())
            .spawn(move || match self {
                Self::Hardware(line) => listen_hardware(line, settings, &events, &gate, &stop),
                Self::Simulated { interval } => {
                    listen_simulated(interval, settings.poll_interval, &events, &gate, &stop)
                }
            })
    }
}

fn open_line(config: &TriggerConfig) -> Result<Box<dyn LevelReader>, LineError> {
    match config.backend {
        TriggerBackend::Keyboard => Ok(Box::new(KeyboardLine::start(&config.key)?)),
        TriggerBackend::Gpio => open_gpio(config),
    }
}

#[cfg(target_os = "linux")]
fn open_gpio(config: &TriggerConfig) -> Result<Box<dyn LevelReader>, LineError> {
    let line = super::GpioLine::open(
        &config.gpio_chip,
        config.gpio_line,
        config.active_low,
        config.bias,
    )?;
    Ok(Box::new(line))
}

#[cfg(not(target_os = "linux"))]
fn open_gpio(_config: &TriggerConfig) -> Result<Box<dyn LevelReader>, LineError> {
    Err(LineError::Unavailable(
        "GPIO character devices are only available on Linux".into(),
    ))
}

/// `false` when the coordinator has gone away.
fn forward(events: &Sender<ClickEvent>, click: ClickEvent) -> bool {
    match events.try_send(click) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            log::debug!("trigger: event channel full, click dropped");
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

fn listen_hardware(
    mut line: Box<dyn LevelReader>,
    settings: DebounceSettings,
    events: &Sender<ClickEvent>,
    gate: &TriggerGate,
    stop: &StopFlag,
) {
    let mut detector = DebounceDetector::new(settings);
    log::debug!("trigger: listener started on {}", line.backend());

    while !stop.is_stopped() {
        if !gate.is_armed() {
            thread::sleep(settings.poll_interval);
            continue;
        }
        match detector.detect_click(line.as_mut(), stop) {
            Some(click) => {
                if !forward(events, click) {
                    break;
                }
            }
            None => thread::sleep(settings.poll_interval),
        }
    }

    let stats = detector.stats();
    log::debug!(
        "trigger: listener stopped (clicks={}, noise={}, bounces={}, out_of_range={})",
        stats.clicks,
        stats.noise,
        stats.bounces,
        stats.out_of_range
    );
}

fn listen_simulated(
    interval: Duration,
    poll: Duration,
    events: &Sender<ClickEvent>,
    gate: &TriggerGate,
    stop: &StopFlag,
) {
    // Counts armed time only; restarts whenever the gate is disarmed.
    let mut armed_since: Option<Instant> = None;

    while !stop.is_stopped() {
        if !gate.is_armed() {
            armed_since = None;
            thread::sleep(poll);
            continue;
        }
        let since = *armed_since.get_or_insert_with(Instant::now);
        if since.elapsed() >= interval {
            log::info!("trigger: simulated click");
            if !forward(events, ClickEvent::synthetic()) {
                break;
            }
            armed_since = None;
        }
        thread::sleep(poll);
    }
    log::debug!("trigger: simulation timer stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
