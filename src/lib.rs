//! bdaycast - Daily birthday greeting videos for a Telegram group
//!
//! Renders a personalized greeting video per recipient by overlaying their
//! name on a template clip, publishes it to the group, and retires
//! yesterday's videos using a local ledger of published messages.
//!
//! # Architecture
//!
//! A run is a straight line: reconcile retention first, then for each of
//! today's recipients render -> publish -> record -> discard the local file.
//! External tools (ffmpeg, ffprobe) and the Telegram API sit behind traits
//! so the sequencing logic is testable without them.
//!
//! # Modules
//!
//! - `render`: the three-stage video pipeline and its orchestrator
//! - `ledger`: durable record of published messages + retention
//! - `publish`: Telegram Bot API client behind the `Publisher` trait
//! - `birthdays`: the birthday list and today's recipients
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # The daily job (meant for cron)
//! bdaycast run
//!
//! # Render one video without publishing
//! bdaycast render "Dana" --output dana.mp4
//!
//! # Retention pass only
//! bdaycast reconcile
//! ```

pub mod birthdays;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod publish;
pub mod render;

// Re-export main types at crate root for convenience
pub use birthdays::BirthdayBook;
pub use error::PipelineError;
pub use ledger::retention::{RetentionReconciler, StalePolicy};
pub use ledger::{Ledger, LedgerEntry, LedgerStore};
pub use publish::{PublishedMessage, Publisher, TelegramConfig, TelegramPublisher};
pub use render::{PipelineOrchestrator, TextLayerRenderer, TextStyle};
