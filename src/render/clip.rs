//! Builds a fixed-duration transparent video clip from a raster layer.
//!
//! Shells out to ffmpeg. The clip is encoded with qtrle because the
//! compositing stage blends by alpha; a codec without per-pixel
//! transparency would composite a solid rectangle.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Trait seam for the clip stage (tests substitute doubles)
#[async_trait]
pub trait ClipBuilder: Send + Sync {
    /// Turn a transparent PNG into a `duration`-second transparent video
    async fn build_clip(&self, layer: &Path, output: &Path, duration: f64) -> Result<()>;
}

/// ffmpeg-backed clip builder
pub struct FfmpegClipBuilder {
    binary: String,
    call_timeout: Duration,
}

impl FfmpegClipBuilder {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            call_timeout,
        }
    }

    /// Use a custom ffmpeg binary path
    pub fn with_binary(binary: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            call_timeout,
        }
    }
}

#[async_trait]
impl ClipBuilder for FfmpegClipBuilder {
    async fn build_clip(&self, layer: &Path, output: &Path, duration: f64) -> Result<()> {
        if duration <= 0.0 {
            return Err(PipelineError::Input(format!(
                "clip duration must be positive, got {}",
                duration
            )));
        }
        if !layer.exists() {
            return Err(PipelineError::Input(format!(
                "layer not found: {}",
                layer.display()
            )));
        }

        let child = Command::new(&self.binary)
            .arg("-y")
            .args(["-loop", "1"])
            .args(["-t", &duration.to_string()])
            .arg("-i")
            .arg(layer)
            .args(["-vf", "format=rgba"])
            .args(["-c:v", "qtrle"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out encode must not keep running detached
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::encode("ffmpeg", format!("spawn: {}", e)))?;

        let out = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                PipelineError::encode(
                    "ffmpeg",
                    format!("clip encode timed out after {:?}", self.call_timeout),
                )
            })?
            .map_err(|e| PipelineError::encode("ffmpeg", format!("wait: {}", e)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let exit_code = out.status.code().unwrap_or(-1);
            return Err(PipelineError::encode(
                "ffmpeg",
                format!("clip encode exit {}: {}", exit_code, stderr.trim()),
            ));
        }

        debug!(path = %output.display(), duration, "Built overlay clip");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_zero_duration_is_input_error() {
        let temp = TempDir::new().unwrap();
        let layer = temp.path().join("text.png");
        std::fs::write(&layer, b"png").unwrap();

        let builder = FfmpegClipBuilder::new(Duration::from_secs(5));
        let err = builder
            .build_clip(&layer, &temp.path().join("text.mov"), 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
    }

    #[tokio::test]
    async fn test_missing_layer_is_input_error() {
        let temp = TempDir::new().unwrap();

        let builder = FfmpegClipBuilder::new(Duration::from_secs(5));
        let err = builder
            .build_clip(
                &temp.path().join("absent.png"),
                &temp.path().join("text.mov"),
                10.0,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
    }

    #[tokio::test]
    async fn test_failing_encoder_is_encode_error() {
        let temp = TempDir::new().unwrap();
        let layer = temp.path().join("text.png");
        std::fs::write(&layer, b"png").unwrap();

        // `false` exits 1 regardless of arguments
        let builder = FfmpegClipBuilder::with_binary("false", Duration::from_secs(5));
        let err = builder
            .build_clip(&layer, &temp.path().join("text.mov"), 10.0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encode { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_encoder_is_killed() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let layer = temp.path().join("text.png");
        std::fs::write(&layer, b"png").unwrap();

        // Stand-in encoder that outlives the timeout, then leaves a marker
        let marker = temp.path().join("marker");
        let script = temp.path().join("slow-encoder.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep 1\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let builder = FfmpegClipBuilder::with_binary(
            script.to_string_lossy().into_owned(),
            Duration::from_millis(100),
        );
        let err = builder
            .build_clip(&layer, &temp.path().join("text.mov"), 10.0)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encode { .. }));

        // A killed encoder never reaches the touch
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!marker.exists(), "encoder kept running past the timeout");
    }
}
