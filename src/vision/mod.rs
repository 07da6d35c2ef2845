//! Optional pre-classification: does this frame contain text at all?
//!
//! * [`VisionClassifier`] - async trait consumed by the pipeline.
//! * [`OpenAiVisionClassifier`] - OpenAI-compatible chat-completions backend.
//! * [`SceneAnalysis`] - parsed model reply and instruction selection.
//! * [`Classification`] / [`ClassifierError`].
//!
//! Classification is advisory. The pipeline treats any [`ClassifierError`]
//! as "has text" and falls back to the default OCR instruction.

pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

use crate::camera::Frame;

pub use openai::OpenAiVisionClassifier;
pub use prompt::SceneAnalysis;

// ---------------------------------------------------------------------------
// ClassifierError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// HTTP transport or API error.
    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier request timed out")]
    Timeout,

    /// The reply was not the expected JSON.
    #[error("failed to parse classifier reply: {0}")]
    Parse(String),

    /// The model returned no content.
    #[error("classifier returned an empty reply")]
    EmptyResponse,
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifierError::Timeout
        } else {
            ClassifierError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Verdict for one frame.
///
/// With `has_text` the second field is the OCR instruction to use; without
/// it, the human-readable reason OCR is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub has_text: bool,
    pub instruction_or_reason: String,
}

impl Classification {
    pub fn text(instruction: impl Into<String>) -> Self {
        Self {
            has_text: true,
            instruction_or_reason: instruction.into(),
        }
    }

    pub fn no_text(reason: impl Into<String>) -> Self {
        Self {
            has_text: false,
            instruction_or_reason: reason.into(),
        }
    }
}

impl From<&SceneAnalysis> for Classification {
    fn from(analysis: &SceneAnalysis) -> Self {
        if analysis.has_text {
            Self::text(analysis.instruction())
        } else {
            Self::no_text(analysis.skip_reason())
        }
    }
}

// ---------------------------------------------------------------------------
// VisionClassifier trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VisionClassifier: Send + Sync {
    async fn classify(&self, frame: &Frame) -> Result<Classification, ClassifierError>;
}
