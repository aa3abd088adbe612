//! Composites the overlay clip onto the template video.
//!
//! The overlay fades in over `[start, start+fade]`, holds full opacity,
//! fades out over `[end-fade, end]`, and is not composited at all outside
//! `[start, end]`. Output is yuv420p/libx264 for broad playback support;
//! the template's audio track passes through untouched.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Time interval during which the overlay is visible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayWindow {
    /// Overlay appears at this time (seconds)
    pub start: f64,
    /// Overlay is gone by this time (seconds)
    pub end: f64,
    /// Fade-in and fade-out length (seconds)
    pub fade: f64,
}

impl OverlayWindow {
    pub fn new(start: f64, end: f64, fade: f64) -> Self {
        Self { start, end, fade }
    }

    /// Validate interval ordering and the fade bound. Fades longer than
    /// half the window would overlap each other.
    pub fn validate(&self) -> Result<()> {
        if self.start < 0.0 || self.end <= self.start {
            return Err(PipelineError::Input(format!(
                "overlay window [{}, {}] is not a valid interval",
                self.start, self.end
            )));
        }
        let half = (self.end - self.start) / 2.0;
        if self.fade <= 0.0 || self.fade > half {
            return Err(PipelineError::Input(format!(
                "fade {} must be in (0, {}]",
                self.fade, half
            )));
        }
        Ok(())
    }

    /// Check the window fits inside a video of `duration` seconds
    pub fn fits_within(&self, duration: f64) -> Result<()> {
        self.validate()?;
        if self.end > duration {
            return Err(PipelineError::Input(format!(
                "overlay window ends at {}s but template is only {}s long",
                self.end, duration
            )));
        }
        Ok(())
    }
}

/// Top-left pixel position of the overlay on the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

/// Trait seam for the compositing stage (tests substitute doubles)
#[async_trait]
pub trait Composer: Send + Sync {
    /// Duration of a video file in seconds
    async fn probe_duration(&self, video: &Path) -> Result<f64>;

    /// Blend `overlay` onto `template` during `window` at `position`,
    /// writing the final video to `output` (replacing any prior file)
    async fn compose(
        &self,
        template: &Path,
        overlay: &Path,
        window: OverlayWindow,
        position: Position,
        output: &Path,
    ) -> Result<()>;
}

/// ffmpeg/ffprobe-backed composer
pub struct FfmpegComposer {
    ffmpeg: String,
    ffprobe: String,
    call_timeout: Duration,
}

impl FfmpegComposer {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            call_timeout,
        }
    }

    /// Use custom ffmpeg/ffprobe binary paths
    pub fn with_binaries(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            call_timeout,
        }
    }

    fn filter_graph(window: OverlayWindow, position: Position) -> String {
        let fade_out_start = window.end - window.fade;
        format!(
            "[1:v]fade=t=in:st={start}:d={fade}:alpha=1,\
             fade=t=out:st={fade_out_start}:d={fade}:alpha=1[overlay];\
             [0:v][overlay]overlay=x={x}:y={y}:enable='between(t,{start},{end})'",
            start = window.start,
            end = window.end,
            fade = window.fade,
            fade_out_start = fade_out_start,
            x = position.x,
            y = position.y,
        )
    }
}

/// ffprobe `-of json -show_entries format=duration` output
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: String,
}

#[async_trait]
impl Composer for FfmpegComposer {
    async fn probe_duration(&self, video: &Path) -> Result<f64> {
        if !video.exists() {
            return Err(PipelineError::Input(format!(
                "video not found: {}",
                video.display()
            )));
        }

        let child = Command::new(&self.ffprobe)
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "json"])
            .arg(video)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A hung probe must not stall the run or linger after it
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::encode("ffprobe", format!("spawn: {}", e)))?;

        let out = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                PipelineError::encode(
                    "ffprobe",
                    format!("probe timed out after {:?}", self.call_timeout),
                )
            })?
            .map_err(|e| PipelineError::encode("ffprobe", format!("wait: {}", e)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(PipelineError::encode(
                "ffprobe",
                format!("probe failed: {}", stderr.trim()),
            ));
        }

        let probe: ProbeOutput = serde_json::from_slice(&out.stdout)
            .map_err(|e| PipelineError::encode("ffprobe", format!("parse output: {}", e)))?;

        probe
            .format
            .duration
            .parse::<f64>()
            .map_err(|e| PipelineError::encode("ffprobe", format!("parse duration: {}", e)))
    }

    async fn compose(
        &self,
        template: &Path,
        overlay: &Path,
        window: OverlayWindow,
        position: Position,
        output: &Path,
    ) -> Result<()> {
        window.validate()?;
        if !template.exists() {
            return Err(PipelineError::Input(format!(
                "template not found: {}",
                template.display()
            )));
        }

        // Replace, never append to, a prior output file
        match tokio::fs::remove_file(output).await {
            Ok(()) => debug!(path = %output.display(), "Removed prior output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PipelineError::Input(format!(
                    "cannot replace {}: {}",
                    output.display(),
                    e
                )))
            }
        }

        let filter = Self::filter_graph(window, position);

        let child = Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(template)
            .arg("-i")
            .arg(overlay)
            .args(["-filter_complex", &filter])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-c:v", "libx264"])
            .args(["-c:a", "copy"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out compose must not keep running detached
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::encode("ffmpeg", format!("spawn: {}", e)))?;

        let out = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                PipelineError::encode(
                    "ffmpeg",
                    format!("compose timed out after {:?}", self.call_timeout),
                )
            })?
            .map_err(|e| PipelineError::encode("ffmpeg", format!("wait: {}", e)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let exit_code = out.status.code().unwrap_or(-1);
            return Err(PipelineError::encode(
                "ffmpeg",
                format!("compose exit {}: {}", exit_code, stderr.trim()),
            ));
        }

        debug!(path = %output.display(), "Composed final video");
        Ok(())
    }
}
