//! Publishing interface for the messaging backend.
//!
//! The rest of the crate only sees the [`Publisher`] trait, so retention and
//! the daily run can be tested against doubles instead of the live API.

pub mod telegram;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

pub use telegram::{TelegramConfig, TelegramPublisher};

/// Metadata of a successfully published video
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    /// Remote message identifier
    pub id: i64,

    /// Caption the message carries
    pub caption: String,

    /// When the backend accepted the message
    pub published_at: DateTime<Utc>,
}

/// Trait for the messaging backend
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload a video with a caption, returning its remote metadata
    async fn publish(&self, video_path: &Path, caption: &str) -> Result<PublishedMessage>;

    /// Delete a previously published message
    async fn delete_remote(&self, message_id: i64) -> Result<()>;
}
