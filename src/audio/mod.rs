//! Audible feedback at the end of a pipeline run.
//!
//! # Playback
//!
//! ```text
//! Cue ──synthesize()──▶ mono f32 samples ──cpal output stream──▶ speaker
//! ```
//!
//! * [`AudioPlayer`] - blocking playback trait consumed by the pipeline.
//! * [`Cue`] - which sound to play.
//! * [`CpalCuePlayer`] - default output device via `cpal`.
//! * [`SilentPlayer`] - used when audio is disabled or no device exists.

pub mod cue;
pub mod playback;

use thiserror::Error;

pub use cue::{synthesize, Tone};
pub use playback::CpalCuePlayer;

// ---------------------------------------------------------------------------
// Cue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Text was recognized.
    Success,
    /// Capture or recognition failed.
    Failure,
}

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported output sample format: {0}")]
    SampleFormat(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The device never drained the cue.
    #[error("playback did not finish in time")]
    Stalled,
}

// ---------------------------------------------------------------------------
// AudioPlayer trait
// ---------------------------------------------------------------------------

/// Plays one cue and returns once it has finished.
///
/// Blocking: call from `spawn_blocking` inside async code.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, cue: Cue) -> Result<(), PlaybackError>;
}

// ---------------------------------------------------------------------------
// SilentPlayer
// ---------------------------------------------------------------------------

/// Logs the cue instead of playing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayer;

impl AudioPlayer for SilentPlayer {
    fn play(&self, cue: Cue) -> Result<(), PlaybackError> {
        log::debug!("audio: {cue:?} cue (silent)");
        Ok(())
    }
}
