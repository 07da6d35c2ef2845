//! Hand-written collaborator doubles that count their calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::audio::{AudioPlayer, Cue, PlaybackError};
use crate::camera::{test_jpeg, Camera, CaptureError, Frame};
use crate::ocr::{OcrClient, OcrError};
use crate::vision::{Classification, ClassifierError, VisionClassifier};

use super::state::{Phase, StatusReader};

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

pub(crate) struct CountingCamera {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl CountingCamera {
    pub(crate) fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    /// Succeeds after `delay`.
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for CountingCamera {
    async fn capture(&self) -> Result<Frame, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(CaptureError::Unavailable("camera unplugged".into()));
        }
        Frame::from_jpeg(test_jpeg())
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

pub(crate) struct CountingClassifier {
    calls: AtomicUsize,
    verdict: Option<Classification>,
}

impl CountingClassifier {
    pub(crate) fn ok(verdict: Classification) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            verdict: Some(verdict),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            verdict: None,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClassifier for CountingClassifier {
    async fn classify(&self, _frame: &Frame) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone().ok_or(ClassifierError::Timeout)
    }
}

// ---------------------------------------------------------------------------
// OCR
// ---------------------------------------------------------------------------

enum OcrBehaviour {
    Text(String),
    Error(OcrError),
    Panic,
}

pub(crate) struct CountingOcr {
    calls: AtomicUsize,
    behaviour: OcrBehaviour,
    last_instruction: Mutex<Option<String>>,
    status: Mutex<Option<StatusReader>>,
    phase_seen: Mutex<Option<Phase>>,
}

impl CountingOcr {
    fn with(behaviour: OcrBehaviour) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            behaviour,
            last_instruction: Mutex::new(None),
            status: Mutex::new(None),
            phase_seen: Mutex::new(None),
        }
    }

    pub(crate) fn ok(text: &str) -> Self {
        Self::with(OcrBehaviour::Text(text.into()))
    }

    pub(crate) fn err(error: OcrError) -> Self {
        Self::with(OcrBehaviour::Error(error))
    }

    pub(crate) fn panicking() -> Self {
        Self::with(OcrBehaviour::Panic)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_instruction(&self) -> Option<String> {
        self.last_instruction.lock().unwrap().clone()
    }

    /// Record the published phase at the moment `recognize` is called.
    pub(crate) fn observe_status(&self, reader: StatusReader) {
        *self.status.lock().unwrap() = Some(reader);
    }

    pub(crate) fn phase_seen(&self) -> Option<Phase> {
        *self.phase_seen.lock().unwrap()
    }
}

#[async_trait]
impl OcrClient for CountingOcr {
    async fn recognize(&self, _frame: &Frame, instruction: &str) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_instruction.lock().unwrap() = Some(instruction.to_string());
        if let Some(reader) = self.status.lock().unwrap().as_ref() {
            *self.phase_seen.lock().unwrap() = Some(reader.phase());
        }
        match &self.behaviour {
            OcrBehaviour::Text(text) => Ok(text.clone()),
            OcrBehaviour::Error(e) => Err(e.clone()),
            OcrBehaviour::Panic => panic!("ocr exploded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct CountingPlayer {
    played: Mutex<Vec<Cue>>,
    fail: bool,
    delay: Duration,
}

impl CountingPlayer {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn played(&self) -> Vec<Cue> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioPlayer for CountingPlayer {
    fn play(&self, cue: Cue) -> Result<(), PlaybackError> {
        self.played.lock().unwrap().push(cue);
        std::thread::sleep(self.delay);
        if self.fail {
            return Err(PlaybackError::NoDevice);
        }
        Ok(())
    }
}
