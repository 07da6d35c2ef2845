//! Text recognition over the network.
//!
//! * [`OcrClient`] - async trait consumed by the pipeline.
//! * [`HttpOcrClient`] - multipart upload to an OCR HTTP service.
//! * [`OcrError`] - failure kinds reported back to the pipeline.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::camera::Frame;

pub use http::HttpOcrClient;

/// Instruction used when the classifier is disabled, unsure, or failed.
pub const DEFAULT_INSTRUCTION: &str = "<image>\nFree OCR.";

// ---------------------------------------------------------------------------
// OcrError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    /// No response within the configured timeout.
    #[error("OCR request timed out")]
    Timeout,

    /// The service could not be reached.
    #[error("cannot connect to OCR service: {0}")]
    Connection(String),

    /// The service answered, but not with a usable result.
    #[error("OCR protocol error: {0}")]
    Protocol(String),

    #[error("OCR request failed: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for OcrError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OcrError::Timeout
        } else if e.is_connect() {
            OcrError::Connection(e.to_string())
        } else if e.is_decode() || e.is_body() {
            OcrError::Protocol(e.to_string())
        } else {
            OcrError::Unknown(e.to_string())
        }
    }
}

/// A client whose every request is bounded by `timeout`.
///
/// Falls back to a default client (no timeout) only if the builder fails,
/// and says so loudly.
pub(crate) fn timeout_client(timeout: Duration, subsystem: &str) -> reqwest::Client {
    or_default_client(
        reqwest::Client::builder().timeout(timeout).build(),
        subsystem,
    )
}

fn or_default_client(built: reqwest::Result<reqwest::Client>, subsystem: &str) -> reqwest::Client {
    built.unwrap_or_else(|e| {
        log::warn!("{subsystem}: HTTP client setup failed ({e}), requests will have no timeout");
        reqwest::Client::new()
    })
}

// ---------------------------------------------------------------------------
// OcrClient trait
// ---------------------------------------------------------------------------

/// Recognizes the text in one frame.
///
/// An empty string is a valid answer here; the pipeline decides what an
/// empty result means.
#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn recognize(&self, frame: &Frame, instruction: &str) -> Result<String, OcrError>;
}
