//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! needs to name the values it changes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// TriggerBackend
// ---------------------------------------------------------------------------

/// Which hardware line feeds the debounce detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerBackend {
    /// A push button on a GPIO character-device line.
    Gpio,
    /// A keyboard key, observed through a global key listener.
    Keyboard,
}

impl Default for TriggerBackend {
    fn default() -> Self {
        Self::Gpio
    }
}

/// Internal bias requested on the GPIO input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpioBias {
    /// Pull the line high; a button wired to ground reads low when pressed.
    #[default]
    PullUp,
    PullDown,
    /// No internal bias; the board must provide an external resistor.
    Disabled,
    /// Leave whatever bias the line already has.
    AsIs,
}

// ---------------------------------------------------------------------------
// TriggerConfig
// ---------------------------------------------------------------------------

/// Trigger line identity, debounce policy and simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Hardware backend used when `simulation_mode` is off.
    pub backend: TriggerBackend,
    /// GPIO character device, e.g. `/dev/gpiochip0`, or `"auto"` to probe
    /// the usual Raspberry Pi chips.
    pub gpio_chip: String,
    /// Line offset on `gpio_chip` (BCM numbering on a Raspberry Pi).
    pub gpio_line: u32,
    /// Treat a low level as "pressed" (button wired to ground with pull-up).
    pub active_low: bool,
    /// Internal bias for the GPIO line. Pull-up matches the default
    /// active-low wiring.
    pub bias: GpioBias,
    /// Key name for the keyboard backend (e.g. `"F9"`, `"Space"`).
    pub key: String,
    /// Settling time before a level change is re-sampled, in seconds.
    pub debounce_delay_secs: f64,
    /// Sampling interval while idle or waiting for release, in milliseconds.
    pub poll_interval_ms: u64,
    /// Shortest press accepted as a click, in seconds.
    pub min_press_secs: f64,
    /// Longest press accepted as a click, in seconds.
    pub max_press_secs: f64,
    /// Skip the hardware line and fire synthetic clicks on a timer.
    pub simulation_mode: bool,
    /// Seconds between synthetic clicks in simulation mode.
    pub simulation_interval_secs: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            backend: TriggerBackend::default(),
            gpio_chip: "auto".into(),
            gpio_line: 17,
            active_low: true,
            bias: GpioBias::PullUp,
            key: "F9".into(),
            debounce_delay_secs: 0.2,
            poll_interval_ms: 10,
            min_press_secs: 0.1,
            max_press_secs: 5.0,
            simulation_mode: false,
            simulation_interval_secs: 10.0,
        }
    }
}

impl TriggerConfig {
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_secs_f64(self.debounce_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_secs_f64(self.simulation_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// CameraConfig
// ---------------------------------------------------------------------------

/// Still-capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture command; must write one JPEG to stdout.
    pub command: Vec<String>,
    /// Upper bound on one capture, in seconds.
    pub capture_timeout_secs: u64,
    /// Serve this JPEG instead of running `command` (bench testing).
    pub still_image: Option<PathBuf>,
    /// Keep a copy of every captured frame on disk.
    pub save_captured_image: bool,
    /// Where saved frames go; `None` means [`AppPaths::captures_dir`].
    pub image_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: ["rpicam-jpeg", "--nopreview", "-t", "500", "-o", "-"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            capture_timeout_secs: 10,
            still_image: None,
            save_captured_image: false,
            image_dir: None,
        }
    }
}

impl CameraConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    /// Directory for saved frames, or `None` when saving is off.
    pub fn save_dir(&self) -> Option<PathBuf> {
        if !self.save_captured_image {
            return None;
        }
        Some(
            self.image_dir
                .clone()
                .unwrap_or_else(|| AppPaths::new().captures_dir),
        )
    }
}

// ---------------------------------------------------------------------------
// OcrConfig
// ---------------------------------------------------------------------------

/// OCR service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Base URL of the OCR service, e.g. `http://192.168.1.20:5000`.
    pub base_url: String,
    /// Path appended to `base_url`.
    pub endpoint: String,
    /// Instruction sent when no classifier-provided instruction exists.
    pub default_instruction: String,
    /// Maximum seconds to wait for an OCR response.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            endpoint: "/ocr".into(),
            default_instruction: crate::ocr::DEFAULT_INSTRUCTION.into(),
            timeout_secs: 30,
        }
    }
}

impl OcrConfig {
    /// Full request URL (`base_url` without trailing slash + `endpoint`).
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.endpoint)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// VisionConfig
// ---------------------------------------------------------------------------

/// Pre-classification ("does this frame contain text?") settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Run the classifier before OCR.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// API key; falls back to `OPENAI_API_KEY` when `None`.
    pub api_key: Option<String>,
    /// Vision-capable model identifier.
    pub model: String,
    /// Maximum seconds to wait for a classification.
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            timeout_secs: 20,
        }
    }
}

impl VisionConfig {
    /// Key from the config file, else from the `OPENAI_API_KEY` variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Feedback cue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Play cues at all; when off every cue is a no-op.
    pub enabled: bool,
    /// Output gain, 0.0 – 1.0.
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.8,
        }
    }
}

// ---------------------------------------------------------------------------
// CoordinatorConfig
// ---------------------------------------------------------------------------

/// Foreground loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Status polling rate of the preview loop.
    pub status_poll_hz: u32,
    /// How long shutdown waits for an in-flight run before abandoning it.
    pub join_timeout_secs: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            status_poll_hz: 30,
            join_timeout_secs: 2.0,
        }
    }
}

impl CoordinatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.status_poll_hz.max(1)))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.join_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use book_reader::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub trigger: TriggerConfig,
    pub camera: CameraConfig,
    pub ocr: OcrConfig,
    pub vision: VisionConfig,
    pub audio: AudioConfig,
    pub coordinator: CoordinatorConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the trigger and pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.trigger;
        check_seconds("trigger.debounce_delay_secs", t.debounce_delay_secs, true)?;
        if t.poll_interval_ms == 0 {
            bail!("trigger.poll_interval_ms must be > 0");
        }
        check_seconds("trigger.min_press_secs", t.min_press_secs, true)?;
        check_seconds("trigger.max_press_secs", t.max_press_secs, true)?;
        if t.max_press_secs < t.min_press_secs {
            bail!(
                "trigger.max_press_secs ({}) must be >= min_press_secs ({})",
                t.max_press_secs,
                t.min_press_secs
            );
        }
        check_seconds(
            "trigger.simulation_interval_secs",
            t.simulation_interval_secs,
            false,
        )?;
        if self.camera.still_image.is_none() && self.camera.command.is_empty() {
            bail!("camera.command must not be empty when camera.still_image is unset");
        }
        if self.ocr.timeout_secs == 0 {
            bail!("ocr.timeout_secs must be > 0");
        }
        if !(0.0..=1.0).contains(&self.audio.volume) {
            bail!("audio.volume must be within 0.0 – 1.0");
        }
        if self.coordinator.status_poll_hz == 0 {
            bail!("coordinator.status_poll_hz must be > 0");
        }
        check_seconds(
            "coordinator.join_timeout_secs",
            self.coordinator.join_timeout_secs,
            true,
        )?;
        Ok(())
    }
}

/// `value` must be a representable [`Duration`]; zero only when `allow_zero`.
fn check_seconds(name: &str, value: f64, allow_zero: bool) -> Result<()> {
    if Duration::try_from_secs_f64(value).is_err() {
        bail!("{name} must be a finite, non-negative number of seconds (got {value})");
    }
    if !allow_zero && value == 0.0 {
        bail!("{name} must be > 0");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
