//! Button-triggered book reader.
//!
//! A push button (GPIO line or keyboard key) is debounced into click
//! events; each click starts one pipeline run that captures a still frame,
//! optionally asks a vision model whether it contains text, sends it to an
//! OCR service and plays an audio cue. A foreground loop polls the run's
//! status at ~30 Hz while the worker runs.
//!
//! * [`config`] - `AppConfig`, TOML persistence, paths.
//! * [`trigger`] - level lines, debounce, listener thread.
//! * [`pipeline`] - run state, status channel, worker, coordinator, preview.
//! * [`camera`], [`vision`], [`ocr`], [`audio`] - pipeline collaborators.

pub mod audio;
pub mod camera;
pub mod config;
pub mod ocr;
pub mod pipeline;
pub mod trigger;
pub mod vision;

#[cfg(test)]
mod test_support;
