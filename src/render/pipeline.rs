//! Sequences the three render stages for one recipient.
//!
//! Scratch artifacts (text layer, overlay clip) live in a per-call temp
//! directory and are removed on every exit path; removal failures are
//! logged, never escalated. The first stage failure aborts the remaining
//! stages and is surfaced unchanged.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::{EncodeSettings, OverlaySettings};
use crate::error::{PipelineError, Result};

use super::clip::ClipBuilder;
use super::compose::{Composer, OverlayWindow, Position};
use super::text_layer::{TextRenderer, TextStyle};

/// Runs the per-recipient video pipeline
pub struct PipelineOrchestrator<R, B, C> {
    renderer: R,
    clips: B,
    composer: C,
    overlay: OverlaySettings,
    encode: EncodeSettings,
}

impl<R, B, C> PipelineOrchestrator<R, B, C>
where
    R: TextRenderer,
    B: ClipBuilder,
    C: Composer,
{
    pub fn new(
        renderer: R,
        clips: B,
        composer: C,
        overlay: OverlaySettings,
        encode: EncodeSettings,
    ) -> Self {
        Self {
            renderer,
            clips,
            composer,
            overlay,
            encode,
        }
    }

    fn window(&self) -> OverlayWindow {
        OverlayWindow::new(self.overlay.start, self.overlay.end, self.overlay.fade)
    }

    fn position(&self) -> Position {
        Position {
            x: self.overlay.x,
            y: self.overlay.y,
        }
    }

    fn style(&self) -> TextStyle {
        TextStyle {
            angle_degrees: self.overlay.angle_degrees,
            ..TextStyle::default()
        }
    }

    /// Produce the personalized video for one recipient.
    ///
    /// The window is validated against the template before any encoder is
    /// invoked, so a template shorter than the overlay window fails fast.
    #[instrument(skip(self, template, output), fields(recipient = %name))]
    pub async fn generate_video(
        &self,
        name: &str,
        template: &Path,
        output: &Path,
    ) -> Result<PathBuf> {
        let window = self.window();
        window.validate()?;

        let template_duration = self.composer.probe_duration(template).await?;
        window.fits_within(template_duration)?;

        let scratch = tempfile::Builder::new()
            .prefix("bdaycast-")
            .tempdir()
            .map_err(|e| {
                PipelineError::asset(std::env::temp_dir(), format!("scratch dir: {}", e))
            })?;
        let layer_path = scratch.path().join("text.png");
        let clip_path = scratch.path().join("text.mov");

        let result = self
            .run_stages(name, template, &layer_path, &clip_path, window, output)
            .await;

        // Scratch artifacts never outlive this call, success or not
        Self::cleanup(&[&layer_path, &clip_path]).await;

        match result {
            Ok(()) => {
                info!(output = %output.display(), "Generated greeting video");
                Ok(output.to_path_buf())
            }
            Err(e) => Err(e),
        }
    }

    async fn run_stages(
        &self,
        name: &str,
        template: &Path,
        layer_path: &Path,
        clip_path: &Path,
        window: OverlayWindow,
        output: &Path,
    ) -> Result<()> {
        let text = format!("{}{}", self.overlay.text_prefix, name);
        self.renderer.render(&text, &self.style(), layer_path)?;

        self.with_retry("clip", || {
            self.clips
                .build_clip(layer_path, clip_path, self.overlay.clip_duration)
        })
        .await?;

        self.with_retry("compose", || {
            self.composer
                .compose(template, clip_path, window, self.position(), output)
        })
        .await?;

        Ok(())
    }

    /// Bounded retry around an encoder call. Only encode failures are
    /// retried; invalid input fails immediately.
    async fn with_retry<F, Fut>(&self, stage: &str, mut call: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match call().await {
                Ok(()) => return Ok(()),
                Err(e @ PipelineError::Encode { .. }) if attempt < self.encode.max_attempts => {
                    warn!(stage, attempt, error = %e, "Encode failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn cleanup(paths: &[&Path]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(path = %path.display(), "Removed scratch artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove scratch artifact")
                }
            }
        }
    }
}
