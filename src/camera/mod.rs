//! Still-image capture.
//!
//! * [`Camera`] - async trait consumed by the pipeline.
//! * [`Frame`] - one captured JPEG.
//! * [`CommandCamera`] - runs an external capture command (`rpicam-jpeg`).
//! * [`FileCamera`] - serves a fixed JPEG from disk (bench testing).
//! * [`CaptureError`] - why a capture produced no frame.

pub mod command;
pub mod file;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use thiserror::Error;

pub use command::CommandCamera;
pub use file::FileCamera;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture command could not be started or read.
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The capture command exited unsuccessfully.
    #[error("capture command failed ({status}): {stderr}")]
    Command { status: String, stderr: String },

    /// No frame within the capture timeout.
    #[error("capture timed out after {0}s")]
    Timeout(u64),

    /// Output was empty or not a JPEG.
    #[error("captured data is not a JPEG image ({0} bytes)")]
    InvalidImage(usize),

    /// The camera is not configured.
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];

/// One captured JPEG image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    jpeg: Vec<u8>,
    captured_at: DateTime<Local>,
}

impl Frame {
    /// Wrap JPEG bytes, rejecting anything that does not start with the
    /// JPEG SOI marker.
    pub fn from_jpeg(jpeg: Vec<u8>) -> Result<Self, CaptureError> {
        if !jpeg.starts_with(&JPEG_MAGIC) {
            return Err(CaptureError::InvalidImage(jpeg.len()));
        }
        Ok(Self {
            jpeg,
            captured_at: Local::now(),
        })
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// `capture_YYYYMMDD_HHMMSS.jpg`
    pub fn file_name(&self) -> String {
        format!("capture_{}.jpg", self.captured_at.format("%Y%m%d_%H%M%S"))
    }

    /// Write the frame into `dir` (created if missing) and return its path.
    pub async fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.file_name());
        tokio::fs::write(&path, &self.jpeg).await?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Camera trait
// ---------------------------------------------------------------------------

/// Produces one still frame per call.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn capture(&self) -> Result<Frame, CaptureError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) fn test_jpeg() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9]
}
