//! Error taxonomy for the video pipeline and ledger.
//!
//! Errors abort processing for the current recipient only; the daily run
//! logs them and moves on to the next name.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the rendering pipeline, ledger, and publisher.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required asset (font, template video) is missing or unreadable
    #[error("asset unavailable: {path}: {reason}")]
    Asset { path: PathBuf, reason: String },

    /// Text layout produced nothing drawable
    #[error("text layout degenerate: {0}")]
    Render(String),

    /// An external encoder process exited non-zero or timed out
    #[error("{tool} failed: {detail}")]
    Encode { tool: &'static str, detail: String },

    /// Invalid caller input (bad overlay window, missing input path)
    #[error("invalid input: {0}")]
    Input(String),

    /// Ledger store could not be read or written
    #[error("ledger store error: {0}")]
    Ledger(String),

    /// Telegram publish/delete call failed
    #[error("remote call failed: {0}")]
    Remote(String),
}

impl PipelineError {
    pub fn asset(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Asset {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn encode(tool: &'static str, detail: impl Into<String>) -> Self {
        Self::Encode {
            tool,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
