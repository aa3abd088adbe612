//! Telegram Bot API publisher.
//!
//! Uploads greeting videos to the configured group chat and deletes
//! yesterday's messages during reconciliation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::{PublishedMessage, Publisher};
use crate::error::{PipelineError, Result};

/// Telegram Bot API client
pub struct TelegramPublisher {
    /// Bot token
    bot_token: String,
    /// Target chat ID
    chat_id: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response envelope from the Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Message result from sendVideo
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
    #[serde(default)]
    caption: Option<String>,
    /// Unix timestamp
    #[serde(default)]
    date: Option<i64>,
}

/// Configuration for the Telegram publisher, passed in explicitly by the
/// caller (never read as ambient state)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramPublisher {
    /// Create a new Telegram publisher
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: reqwest::Client::new(),
        }
    }

    /// Create from config
    pub fn from_config(config: TelegramConfig) -> Self {
        Self::new(config.bot_token, config.chat_id)
    }

    /// Build API URL
    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Unwrap the API envelope, mapping `ok: false` to a remote error
    fn unwrap_response<T>(result: TelegramResponse<T>) -> Result<T> {
        if !result.ok {
            return Err(PipelineError::Remote(format!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            )));
        }
        result
            .result
            .ok_or_else(|| PipelineError::Remote("Telegram response missing result".to_string()))
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn publish(&self, video_path: &Path, caption: &str) -> Result<PublishedMessage> {
        let url = self.api_url("sendVideo");

        let file_name = video_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file_bytes = tokio::fs::read(video_path).await.map_err(|e| {
            PipelineError::Remote(format!("read video {}: {}", video_path.display(), e))
        })?;

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("video/mp4")
            .map_err(|e| PipelineError::Remote(e.to_string()))?;

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part("video", file_part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Remote(format!("sendVideo: {}", e)))?;

        let result: TelegramResponse<MessageResult> = response
            .json()
            .await
            .map_err(|e| PipelineError::Remote(format!("parse sendVideo response: {}", e)))?;

        let message = Self::unwrap_response(result)?;

        let published_at = message
            .date
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(PublishedMessage {
            id: message.message_id,
            caption: message.caption.unwrap_or_else(|| caption.to_string()),
            published_at,
        })
    }

    async fn delete_remote(&self, message_id: i64) -> Result<()> {
        let url = self.api_url("deleteMessage");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "message_id": message_id,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::Remote(format!("deleteMessage: {}", e)))?;

        let result: TelegramResponse<bool> = response
            .json()
            .await
            .map_err(|e| PipelineError::Remote(format!("parse deleteMessage response: {}", e)))?;

        Self::unwrap_response(result)?;
        Ok(())
    }
}
