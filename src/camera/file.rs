//! Camera that serves a fixed JPEG from disk.

use std::path::PathBuf;

use async_trait::async_trait;

use super::{Camera, CaptureError, Frame};

/// Reads `path` on every capture, so the image can be swapped while the
/// process runs.
pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn capture(&self) -> Result<Frame, CaptureError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let frame = Frame::from_jpeg(bytes)?;
        log::info!("camera: loaded {} ({} bytes)", self.path.display(), frame.len());
        Ok(frame)
    }
}
