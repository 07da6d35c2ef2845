//! Camera backed by an external still-capture command.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::CameraConfig;

use super::{Camera, CaptureError, Frame};

/// Runs `command` once per capture and reads a JPEG from its stdout.
///
/// The default command is `rpicam-jpeg --nopreview -t 500 -o -`. The child
/// is killed if it outlives the capture timeout.
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    save_dir: Option<PathBuf>,
}

impl CommandCamera {
    pub fn from_config(config: &CameraConfig) -> Result<Self, CaptureError> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| CaptureError::Unavailable("empty capture command".into()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: config.capture_timeout(),
            save_dir: config.save_dir(),
        })
    }

    async fn run_command(&self) -> Result<Vec<u8>, CaptureError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CaptureError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(CaptureError::Command {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture(&self) -> Result<Frame, CaptureError> {
        log::debug!("camera: running {}", self.program);
        let frame = Frame::from_jpeg(self.run_command().await?)?;
        log::info!("camera: captured {} bytes", frame.len());

        if let Some(dir) = &self.save_dir {
            match frame.save_to(dir).await {
                Ok(path) => log::info!("camera: saved {}", path.display()),
                Err(e) => log::warn!("camera: could not save frame to {}: {e}", dir.display()),
            }
        }
        Ok(frame)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
