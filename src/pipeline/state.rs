//! Run phases, run records and the status channel.
//!
//! [`Phase`] is the per-run state machine. [`PipelineRun`] is the record the
//! worker owns while it runs. [`StatusWriter`] / [`StatusReader`] publish a
//! read-only projection of the active run to the foreground loop.
//!
//! The status channel is an [`ArcSwap`]: every publish replaces the whole
//! snapshot, so readers never see a half-written one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::camera::Frame;
use crate::ocr::OcrError;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Phases of one pipeline run.
///
/// ```text
/// Idle ─▶ Starting ──capture failed──────────────────────▶ Failed
///            │
///            ├─(classifier enabled)─▶ Classifying ─no text─▶ Skipped
///            │                            │
///            ▼                            ▼
///         Recognizing ◀───────────────────┘
///            ├─ text ───────────▶ Completed
///            └─ blank / error ──▶ Failed
/// ```
///
/// Phases only move forward. `Idle` is the state of the status channel
/// before the first run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Starting,
    Classifying,
    Recognizing,
    Completed,
    Skipped,
    Failed,
}

impl Phase {
    fn rank(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Starting => 1,
            Phase::Classifying => 2,
            Phase::Recognizing => 3,
            Phase::Completed | Phase::Skipped | Phase::Failed => 4,
        }
    }

    /// Whether a run may move from `self` to `next`.
    ///
    /// ```
    /// use book_reader::pipeline::Phase;
    ///
    /// assert!(Phase::Starting.can_advance_to(Phase::Recognizing));
    /// assert!(Phase::Classifying.can_advance_to(Phase::Skipped));
    /// assert!(!Phase::Recognizing.can_advance_to(Phase::Skipped));
    /// assert!(!Phase::Completed.can_advance_to(Phase::Failed));
    /// ```
    pub fn can_advance_to(self, next: Phase) -> bool {
        if self.is_terminal() || next.rank() <= self.rank() {
            return false;
        }
        match next {
            Phase::Skipped => self == Phase::Classifying,
            Phase::Completed => self == Phase::Recognizing,
            _ => true,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Skipped | Phase::Failed)
    }

    /// `true` while a run is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Phase::Starting | Phase::Classifying | Phase::Recognizing
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Starting => "Starting",
            Phase::Classifying => "Classifying",
            Phase::Recognizing => "Recognizing",
            Phase::Completed => "Completed",
            Phase::Skipped => "Skipped",
            Phase::Failed => "Failed",
        }
    }
}

// ---------------------------------------------------------------------------
// RunError / RunOutcome
// ---------------------------------------------------------------------------

/// Why a run ended in [`Phase::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    /// OCR answered with no usable text.
    #[error("OCR returned no text")]
    EmptyResult,

    /// The worker panicked.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    /// Short kind name for logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Capture(_) => "CaptureError",
            RunError::Ocr(OcrError::Timeout) => "Timeout",
            RunError::Ocr(OcrError::Connection(_)) => "ConnectionError",
            RunError::Ocr(OcrError::Protocol(_)) => "ProtocolError",
            RunError::Ocr(OcrError::Unknown(_)) => "Unknown",
            RunError::EmptyResult => "EmptyResult",
            RunError::Internal(_) => "Internal",
        }
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Recognized text (never blank).
    Completed(String),
    /// The classifier found no text; carries its reason.
    Skipped(String),
    Failed(RunError),
}

impl RunOutcome {
    pub fn phase(&self) -> Phase {
        match self {
            RunOutcome::Completed(_) => Phase::Completed,
            RunOutcome::Skipped(_) => Phase::Skipped,
            RunOutcome::Failed(_) => Phase::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// One capture → classify → recognize → feedback attempt.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: u64,
    pub frame: Option<Frame>,
    pub phase: Phase,
    pub outcome: Option<RunOutcome>,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
}

impl PipelineRun {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            frame: None,
            phase: Phase::Starting,
            outcome: None,
            started_at: Instant::now(),
            ended_at: None,
        }
    }

    /// Move to `next`; an illegal transition is logged and ignored.
    pub fn advance(&mut self, next: Phase) {
        if self.phase.can_advance_to(next) {
            log::debug!(
                "pipeline: run #{} {} → {}",
                self.run_id,
                self.phase.label(),
                next.label()
            );
            self.phase = next;
        } else {
            log::warn!(
                "pipeline: run #{} ignoring transition {} → {}",
                self.run_id,
                self.phase.label(),
                next.label()
            );
        }
    }

    /// Record the terminal outcome and end time.
    pub fn finish(&mut self, outcome: RunOutcome) {
        self.advance(outcome.phase());
        self.outcome = Some(outcome);
        self.ended_at = Some(Instant::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Recognized text of a completed run.
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            Some(RunOutcome::Completed(text)) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RunError> {
        match &self.outcome {
            Some(RunOutcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// Wall-clock time from start to end (or to now, while running).
    pub fn elapsed(&self) -> Duration {
        self.ended_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started_at)
    }
}

// ---------------------------------------------------------------------------
// Status channel
// ---------------------------------------------------------------------------

/// What the foreground loop sees of the active (or last) run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub run_id: Option<u64>,
    pub phase: Phase,
    pub outcome: Option<RunOutcome>,
}

impl From<&PipelineRun> for StatusSnapshot {
    fn from(run: &PipelineRun) -> Self {
        Self {
            run_id: Some(run.run_id),
            phase: run.phase,
            outcome: run.outcome.clone(),
        }
    }
}

/// Create a connected writer/reader pair, starting at [`Phase::Idle`].
pub fn status_channel() -> (StatusWriter, StatusReader) {
    let inner = Arc::new(ArcSwap::from_pointee(StatusSnapshot::default()));
    (
        StatusWriter {
            inner: Arc::clone(&inner),
        },
        StatusReader { inner },
    )
}

/// The single writing end. Not `Clone`: whoever holds it is the only
/// component allowed to publish.
#[derive(Debug)]
pub struct StatusWriter {
    inner: Arc<ArcSwap<StatusSnapshot>>,
}

impl StatusWriter {
    pub fn publish(&self, snapshot: StatusSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    pub fn publish_run(&self, run: &PipelineRun) {
        self.publish(StatusSnapshot::from(run));
    }

    pub fn reader(&self) -> StatusReader {
        StatusReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A reading end; cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusReader {
    inner: Arc<ArcSwap<StatusSnapshot>>,
}

impl StatusReader {
    pub fn snapshot(&self) -> Arc<StatusSnapshot> {
        self.inner.load_full()
    }

    pub fn phase(&self) -> Phase {
        self.inner.load().phase
    }

    /// Mint a new writer onto this channel. Only valid once the previous
    /// writer is known to be dropped (its worker task has been torn down).
    pub(crate) fn reclaim_writer(&self) -> StatusWriter {
        StatusWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
