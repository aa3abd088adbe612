//! Video composition pipeline.
//!
//! Three stages per recipient, each behind its own seam so tests can swap
//! in doubles for the external tools:
//! - `text_layer`: name string -> transparent rotated PNG
//! - `clip`: PNG -> fixed-duration transparent MOV (ffmpeg, qtrle)
//! - `compose`: MOV overlaid on the template with fades (ffmpeg, libx264)
//!
//! `pipeline` sequences the stages and guarantees scratch cleanup.

pub mod clip;
pub mod compose;
pub mod pipeline;
pub mod text_layer;

pub use clip::{ClipBuilder, FfmpegClipBuilder};
pub use compose::{Composer, FfmpegComposer, OverlayWindow, Position};
pub use pipeline::PipelineOrchestrator;
pub use text_layer::{TextLayerRenderer, TextRenderer, TextStyle};
