//! Single-flight processing pipeline and its foreground coordinator.
//!
//! # Architecture
//!
//! ```text
//! crossbeam Receiver<ClickEvent>
//!        │
//!        ▼
//! TriggerCoordinator::run()          ← main thread, ~30 Hz
//!        │  handle_click: disarm gate, move StatusWriter into worker
//!        ▼
//! tokio task: Pipeline::run()
//!        ├─ Camera::capture                    [Starting]
//!        ├─ VisionClassifier::classify (opt.)  [Classifying]
//!        ├─ OcrClient::recognize               [Recognizing]
//!        └─ spawn_blocking(AudioPlayer::play)
//!        │
//!        ▼  publish (ArcSwap, whole snapshot)
//! StatusReader ──▶ PreviewLoop::tick
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use book_reader::audio::SilentPlayer;
//! use book_reader::camera::FileCamera;
//! use book_reader::config::AppConfig;
//! use book_reader::ocr::HttpOcrClient;
//! use book_reader::pipeline::{
//!     Collaborators, CoordinatorSettings, Pipeline, PipelineSettings, TriggerCoordinator,
//! };
//! use book_reader::trigger::{ClickEvent, StopFlag, TriggerGate};
//!
//! let config = AppConfig::default();
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//!
//! let pipeline = Pipeline::new(
//!     Collaborators {
//!         camera: Arc::new(FileCamera::new("page.jpg")),
//!         classifier: None,
//!         ocr: Arc::new(HttpOcrClient::from_config(&config.ocr)),
//!         player: Arc::new(SilentPlayer),
//!     },
//!     PipelineSettings::from_config(&config),
//! );
//!
//! let (_tx, rx) = crossbeam_channel::bounded::<ClickEvent>(1);
//! let mut coordinator = TriggerCoordinator::new(
//!     Arc::new(pipeline),
//!     runtime.handle().clone(),
//!     rx,
//!     TriggerGate::new(),
//!     StopFlag::new(),
//!     CoordinatorSettings::from_config(&config.coordinator),
//! );
//! let run = coordinator.handle_click(ClickEvent::synthetic());
//! println!("{:?}", run.map(|r| r.phase));
//! ```

pub mod coordinator;
pub mod preview;
pub mod runner;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use coordinator::{CoordinatorSettings, CoordinatorSummary, TriggerCoordinator};
pub use preview::{status_text, PreviewLoop};
pub use runner::{Collaborators, Pipeline, PipelineSettings};
pub use state::{
    status_channel, Phase, PipelineRun, RunError, RunOutcome, StatusReader, StatusSnapshot,
    StatusWriter,
};
