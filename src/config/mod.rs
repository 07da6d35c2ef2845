//! Configuration module for the book reader.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AudioConfig, CameraConfig, CoordinatorConfig, GpioBias, OcrConfig,
    TriggerBackend, TriggerConfig, VisionConfig,
};
