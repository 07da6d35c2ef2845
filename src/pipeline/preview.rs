//! Foreground status loop body.
//!
//! The coordinator calls [`PreviewLoop::tick`] at the status poll rate
//! (~30 Hz) both while idle and while a worker runs. Each tick reads the
//! latest [`StatusSnapshot`](super::StatusSnapshot) and renders a status
//! line when the phase (or run) changed since the previous tick.

use super::state::{Phase, StatusReader};

/// Status line shown for `phase`.
pub fn status_text(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "Live Preview - Ready",
        Phase::Starting => "Live Preview - Preparing...",
        Phase::Classifying => "Live Preview - AI Analyzing...",
        Phase::Recognizing => "Live Preview - OCR Processing...",
        Phase::Completed => "Live Preview - Completed",
        Phase::Skipped => "Live Preview - Skipped",
        Phase::Failed => "Live Preview - Error",
    }
}

#[derive(Debug, Default)]
pub struct PreviewLoop {
    last: Option<(Option<u64>, Phase)>,
    frames: u64,
}

impl PreviewLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll `status` once. Returns the new status line when it changed.
    pub fn tick(&mut self, status: &StatusReader) -> Option<&'static str> {
        self.frames += 1;
        let snapshot = status.snapshot();
        let key = (snapshot.run_id, snapshot.phase);
        if self.last == Some(key) {
            return None;
        }
        self.last = Some(key);

        let text = status_text(snapshot.phase);
        match snapshot.run_id {
            Some(id) => log::info!("preview: [run #{id}] {text}"),
            None => log::info!("preview: {text}"),
        }
        Some(text)
    }

    /// Ticks since construction.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Phase rendered by the most recent change.
    pub fn current(&self) -> Option<Phase> {
        self.last.map(|(_, phase)| phase)
    }
}
