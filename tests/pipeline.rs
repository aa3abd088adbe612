//! Pipeline Integration Tests
//!
//! Drives the orchestrator through the public trait seams with encoder
//! doubles, asserting stage ordering, fail-fast validation, retry
//! recovery, and scratch cleanup without invoking real external tools.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use bdaycast::config::{EncodeSettings, OverlaySettings};
use bdaycast::error::PipelineError;
use bdaycast::render::{
    ClipBuilder, Composer, OverlayWindow, Position, TextRenderer, TextStyle,
};
use bdaycast::PipelineOrchestrator;

/// Shared observation point: each stage records its calls and every
/// scratch path it wrote, so tests can assert after the orchestrator
/// has consumed the doubles.
#[derive(Default)]
struct StageLog {
    renders: AtomicU32,
    clips: AtomicU32,
    composes: AtomicU32,
    scratch: Mutex<Vec<PathBuf>>,
}

impl StageLog {
    fn record_scratch(&self, path: &Path) {
        self.scratch.lock().unwrap().push(path.to_path_buf());
    }

    fn assert_scratch_removed(&self) {
        for path in self.scratch.lock().unwrap().iter() {
            assert!(!path.exists(), "{} not cleaned up", path.display());
        }
    }
}

struct StubRenderer {
    log: Arc<StageLog>,
}

impl TextRenderer for StubRenderer {
    fn render(&self, _text: &str, _style: &TextStyle, output: &Path) -> Result<(), PipelineError> {
        self.log.renders.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, b"layer").unwrap();
        self.log.record_scratch(output);
        Ok(())
    }
}

struct StubClipBuilder {
    log: Arc<StageLog>,
    fail_first: u32,
}

#[async_trait]
impl ClipBuilder for StubClipBuilder {
    async fn build_clip(
        &self,
        layer: &Path,
        output: &Path,
        _duration: f64,
    ) -> Result<(), PipelineError> {
        let attempt = self.log.clips.fetch_add(1, Ordering::SeqCst) + 1;
        assert!(layer.exists(), "clip stage ran before the text layer");
        if attempt <= self.fail_first {
            return Err(PipelineError::encode(
                "ffmpeg",
                format!("simulated failure on attempt {}", attempt),
            ));
        }
        std::fs::write(output, b"clip").unwrap();
        self.log.record_scratch(output);
        Ok(())
    }
}

struct StubComposer {
    log: Arc<StageLog>,
    template_duration: f64,
}

#[async_trait]
impl Composer for StubComposer {
    async fn probe_duration(&self, _video: &Path) -> Result<f64, PipelineError> {
        Ok(self.template_duration)
    }

    async fn compose(
        &self,
        _template: &Path,
        overlay: &Path,
        window: OverlayWindow,
        _position: Position,
        output: &Path,
    ) -> Result<(), PipelineError> {
        self.log.composes.fetch_add(1, Ordering::SeqCst);
        window.validate()?;
        assert!(overlay.exists(), "compose ran before the clip was built");
        std::fs::write(output, b"final").unwrap();
        Ok(())
    }
}

fn orchestrator(
    clip_fail_first: u32,
    template_duration: f64,
    max_attempts: u32,
) -> (
    PipelineOrchestrator<StubRenderer, StubClipBuilder, StubComposer>,
    Arc<StageLog>,
) {
    let log = Arc::new(StageLog::default());
    let orch = PipelineOrchestrator::new(
        StubRenderer { log: log.clone() },
        StubClipBuilder {
            log: log.clone(),
            fail_first: clip_fail_first,
        },
        StubComposer {
            log: log.clone(),
            template_duration,
        },
        OverlaySettings::default(),
        EncodeSettings {
            timeout_seconds: 5,
            max_attempts,
        },
    );
    (orch, log)
}

#[tokio::test]
async fn test_full_pipeline_writes_output_and_cleans_scratch() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("Dana.mp4");

    let (orch, log) = orchestrator(0, 10.0, 1);
    let produced = orch
        .generate_video("Dana", Path::new("template.mp4"), &output)
        .await
        .unwrap();

    assert_eq!(produced, output);
    assert_eq!(std::fs::read(&output).unwrap(), b"final");
    assert_eq!(log.renders.load(Ordering::SeqCst), 1);
    assert_eq!(log.clips.load(Ordering::SeqCst), 1);
    assert_eq!(log.composes.load(Ordering::SeqCst), 1);
    log.assert_scratch_removed();
}

#[tokio::test]
async fn test_template_shorter_than_window_fails_without_encoding() {
    // Default window ends at 8.5s; template is 6s
    let temp = TempDir::new().unwrap();
    let (orch, log) = orchestrator(0, 6.0, 1);

    let err = orch
        .generate_video("Dana", Path::new("template.mp4"), &temp.path().join("o.mp4"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Input(_)));
    assert_eq!(log.renders.load(Ordering::SeqCst), 0);
    assert_eq!(log.clips.load(Ordering::SeqCst), 0);
    assert_eq!(log.composes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_persistent_encode_failure_cleans_scratch_and_propagates() {
    let temp = TempDir::new().unwrap();
    let (orch, log) = orchestrator(u32::MAX, 10.0, 2);

    let err = orch
        .generate_video("Dana", Path::new("template.mp4"), &temp.path().join("o.mp4"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Encode { .. }));
    assert_eq!(log.clips.load(Ordering::SeqCst), 2);
    assert_eq!(log.composes.load(Ordering::SeqCst), 0);
    log.assert_scratch_removed();
}

#[tokio::test]
async fn test_transient_encode_failure_recovers_via_retry() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("Dana.mp4");

    // First clip attempt fails, second succeeds; policy allows 2 attempts
    let (orch, log) = orchestrator(1, 10.0, 2);
    orch.generate_video("Dana", Path::new("template.mp4"), &output)
        .await
        .unwrap();

    assert!(output.exists());
    assert_eq!(log.clips.load(Ordering::SeqCst), 2);
    assert_eq!(log.composes.load(Ordering::SeqCst), 1);
    log.assert_scratch_removed();
}
