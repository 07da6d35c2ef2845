//! The pipeline worker: capture → (classify) → recognize → feedback.
//!
//! # Run flow
//!
//! ```text
//! Camera::capture                       [Starting]
//!   ├─ Err ─▶ Failed(Capture) + failure cue
//!   └─ Ok(frame)
//!        ├─ classifier enabled ─▶ VisionClassifier::classify   [Classifying]
//!        │     ├─ no text ─▶ Skipped (no OCR, no cue)
//!        │     ├─ text    ─▶ classifier's instruction
//!        │     └─ Err     ─▶ default instruction (fail-open)
//!        └─ OcrClient::recognize                               [Recognizing]
//!              ├─ text  ─▶ Completed + success cue
//!              ├─ blank ─▶ Failed(EmptyResult) + failure cue
//!              └─ Err   ─▶ Failed(Ocr) + failure cue
//! ```
//!
//! Cues are played on the blocking pool and the terminal status is only
//! published after playback returns. A panic anywhere in the stages is
//! caught and becomes `Failed(Internal)`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::audio::{AudioPlayer, Cue};
use crate::camera::{Camera, Frame};
use crate::config::AppConfig;
use crate::ocr::{OcrClient, DEFAULT_INSTRUCTION};
use crate::vision::VisionClassifier;

use super::state::{Phase, PipelineRun, RunError, RunOutcome, StatusWriter};

// ---------------------------------------------------------------------------
// Collaborators / settings
// ---------------------------------------------------------------------------

/// External services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub camera: Arc<dyn Camera>,
    /// `None` skips the classifying phase entirely.
    pub classifier: Option<Arc<dyn VisionClassifier>>,
    pub ocr: Arc<dyn OcrClient>,
    pub player: Arc<dyn AudioPlayer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Instruction used without (or despite) a classifier verdict.
    pub default_instruction: String,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_instruction: config.ocr.default_instruction.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_instruction: DEFAULT_INSTRUCTION.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    pub fn classifies(&self) -> bool {
        self.collaborators.classifier.is_some()
    }

    /// Execute one run to a terminal phase.
    ///
    /// Never fails: every error, panics included, ends as a
    /// [`Phase::Failed`] run. Exactly one feedback action happens per run.
    pub async fn run(&self, run_id: u64, status: &StatusWriter) -> PipelineRun {
        let mut run = PipelineRun::new(run_id);
        status.publish_run(&run);
        log::info!("pipeline: run #{run_id} started");

        let outcome = match AssertUnwindSafe(self.execute(&mut run, status))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("pipeline: run #{run_id} panicked: {message}");
                RunOutcome::Failed(RunError::Internal(message))
            }
        };

        self.feedback(run_id, &outcome).await;

        run.finish(outcome);
        status.publish_run(&run);
        log::info!(
            "pipeline: run #{run_id} {} in {:.2}s",
            run.phase.label().to_lowercase(),
            run.elapsed().as_secs_f64()
        );
        run
    }

    async fn execute(&self, run: &mut PipelineRun, status: &StatusWriter) -> RunOutcome {
        // ── Starting: capture ────────────────────────────────────────────
        let frame = match self.collaborators.camera.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("pipeline: run #{} capture failed: {e}", run.run_id);
                return RunOutcome::Failed(RunError::Capture(e.to_string()));
            }
        };

        let outcome = self.process_frame(&frame, run, status).await;
        run.frame = Some(frame);
        outcome
    }

    async fn process_frame(
        &self,
        frame: &Frame,
        run: &mut PipelineRun,
        status: &StatusWriter,
    ) -> RunOutcome {
        // ── Classifying (optional) ───────────────────────────────────────
        let instruction = match &self.collaborators.classifier {
            Some(classifier) => {
                run.advance(Phase::Classifying);
                status.publish_run(run);
                match classifier.classify(frame).await {
                    Ok(verdict) if !verdict.has_text => {
                        log::info!(
                            "pipeline: run #{} skipped: {}",
                            run.run_id,
                            verdict.instruction_or_reason
                        );
                        return RunOutcome::Skipped(verdict.instruction_or_reason);
                    }
                    Ok(verdict) => verdict.instruction_or_reason,
                    Err(e) => {
                        log::warn!(
                            "pipeline: run #{} classifier failed ({e}), continuing with default instruction",
                            run.run_id
                        );
                        self.settings.default_instruction.clone()
                    }
                }
            }
            None => self.settings.default_instruction.clone(),
        };

        // ── Recognizing ──────────────────────────────────────────────────
        run.advance(Phase::Recognizing);
        status.publish_run(run);

        match self.collaborators.ocr.recognize(frame, &instruction).await {
            Ok(text) if text.trim().is_empty() => {
                log::warn!("pipeline: run #{} OCR returned no text", run.run_id);
                RunOutcome::Failed(RunError::EmptyResult)
            }
            Ok(text) => RunOutcome::Completed(text),
            Err(e) => {
                log::error!("pipeline: run #{} OCR failed: {e}", run.run_id);
                RunOutcome::Failed(RunError::Ocr(e))
            }
        }
    }

    /// Play the cue for `outcome`, blocking until playback ends.
    async fn feedback(&self, run_id: u64, outcome: &RunOutcome) {
        let cue = match outcome {
            RunOutcome::Completed(text) => {
                log::info!("pipeline: run #{run_id} recognized text:\n{text}");
                Cue::Success
            }
            RunOutcome::Failed(e) => {
                log::error!("pipeline: run #{run_id} failed [{}]: {e}", e.kind());
                Cue::Failure
            }
            RunOutcome::Skipped(_) => return,
        };

        let player = Arc::clone(&self.collaborators.player);
        match tokio::task::spawn_blocking(move || player.play(cue)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("audio: {cue:?} cue failed: {e}"),
            Err(e) => log::warn!("audio: playback task failed: {e}"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
