//! Command-line interface for bdaycast.
//!
//! Provides the daily `run` job plus commands for rendering a single video,
//! reconciling retention on demand, and inspecting the ledger and config.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use crate::birthdays::BirthdayBook;
use crate::config::{self, ResolvedConfig};
use crate::ledger::retention::RetentionReconciler;
use crate::ledger::{LedgerEntry, LedgerStore};
use crate::publish::{Publisher, TelegramPublisher};
use crate::render::{
    FfmpegClipBuilder, FfmpegComposer, PipelineOrchestrator, TextLayerRenderer,
};

/// bdaycast - birthday greeting videos for a Telegram group
#[derive(Parser, Debug)]
#[command(name = "bdaycast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full daily job: reconcile, then render and publish for
    /// each of today's recipients (meant for cron)
    Run {
        /// Treat this date as "today" (YYYY-MM-DD, for testing)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Render one greeting video without publishing
    Render {
        /// Recipient name to render
        name: String,

        /// Where to write the video (default: <assets>/<name>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete stale remote videos and prune the ledger
    Reconcile {
        /// Keep videos published on this date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List ledger entries
    Ledger,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run { date } => run_daily(date).await,
            Commands::Render { name, output } => render_one(&name, output).await,
            Commands::Reconcile { date } => reconcile(date).await,
            Commands::Ledger => show_ledger().await,
            Commands::Config => show_config().await,
        }
    }
}

/// Build the render pipeline from resolved configuration
fn build_orchestrator(
    cfg: &ResolvedConfig,
) -> PipelineOrchestrator<TextLayerRenderer, FfmpegClipBuilder, FfmpegComposer> {
    let call_timeout = Duration::from_secs(cfg.encode.timeout_seconds);

    PipelineOrchestrator::new(
        TextLayerRenderer::new(cfg.font.clone()),
        FfmpegClipBuilder::new(call_timeout),
        FfmpegComposer::new(call_timeout),
        cfg.overlay.clone(),
        cfg.encode.clone(),
    )
}

/// Telegram publisher from config; fails with a setup hint when unconfigured
fn build_publisher(cfg: &ResolvedConfig) -> Result<TelegramPublisher> {
    let telegram = cfg.telegram.clone().context(
        "Telegram is not configured. Set telegram.bot_token and telegram.chat_id \
         in .bdaycast/config.yaml or BDAYCAST_BOT_TOKEN / BDAYCAST_CHAT_ID",
    )?;
    Ok(TelegramPublisher::from_config(telegram))
}

/// The daily job: reconcile, then render + publish each recipient
async fn run_daily(date: Option<NaiveDate>) -> Result<()> {
    let cfg = config::config()?;
    let today = date.unwrap_or_else(|| Utc::now().date_naive());

    let publisher = build_publisher(cfg)?;
    let store = LedgerStore::new(&cfg.ledger);

    // Purge yesterday's videos before posting today's
    let reconciler =
        RetentionReconciler::new(&store, &publisher, cfg.retention.stale_policy);
    let outcome = reconciler
        .reconcile(&cfg.retention.caption, today)
        .await
        .context("Retention reconciliation failed")?;
    info!(
        deleted = outcome.deleted,
        kept = outcome.kept,
        failed = outcome.failed,
        "Reconciled ledger"
    );

    let book = BirthdayBook::from_file(&cfg.birthdays)?;
    let recipients = book.recipients_on(today);

    if recipients.is_empty() {
        info!(%today, "No birthdays today");
        return Ok(());
    }

    info!(count = recipients.len(), %today, "Processing birthdays");
    let orchestrator = build_orchestrator(cfg);
    let mut failures = 0usize;

    for name in &recipients {
        // One recipient's failure must not abort the batch
        if let Err(e) = process_recipient(cfg, &orchestrator, &publisher, &store, name).await {
            error!(recipient = %name, error = %e, "Failed to process recipient");
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} recipients failed", failures, recipients.len());
    }
    Ok(())
}

/// Render, publish, record, and discard one recipient's video
async fn process_recipient(
    cfg: &ResolvedConfig,
    orchestrator: &PipelineOrchestrator<TextLayerRenderer, FfmpegClipBuilder, FfmpegComposer>,
    publisher: &TelegramPublisher,
    store: &LedgerStore,
    name: &str,
) -> Result<()> {
    let output = cfg.assets.join(format!("{}.mp4", name));

    let video = orchestrator
        .generate_video(name, &cfg.template, &output)
        .await?;

    let message = publisher
        .publish(&video, &cfg.retention.caption)
        .await
        .with_context(|| format!("Failed to publish video for {}", name))?;

    store
        .append(LedgerEntry::new(
            message.id,
            message.caption,
            message.published_at,
        ))
        .await?;

    info!(recipient = %name, message_id = message.id, "Published greeting video");

    // The published copy lives remotely; the local file is scratch
    if let Err(e) = tokio::fs::remove_file(&video).await {
        warn!(path = %video.display(), error = %e, "Failed to remove local video");
    }

    Ok(())
}

/// Render one video locally, without publishing
async fn render_one(name: &str, output: Option<PathBuf>) -> Result<()> {
    let cfg = config::config()?;
    let output = output.unwrap_or_else(|| cfg.assets.join(format!("{}.mp4", name)));

    let orchestrator = build_orchestrator(cfg);
    let video = orchestrator
        .generate_video(name, &cfg.template, &output)
        .await?;

    println!("{}", video.display());
    Ok(())
}

/// Retention pass only
async fn reconcile(date: Option<NaiveDate>) -> Result<()> {
    let cfg = config::config()?;
    let keep_date = date.unwrap_or_else(|| Utc::now().date_naive());

    let publisher = build_publisher(cfg)?;
    let store = LedgerStore::new(&cfg.ledger);
    let reconciler =
        RetentionReconciler::new(&store, &publisher, cfg.retention.stale_policy);

    let outcome = reconciler
        .reconcile(&cfg.retention.caption, keep_date)
        .await?;

    println!(
        "Reconciled: {} kept, {} deleted, {} failed",
        outcome.kept, outcome.deleted, outcome.failed
    );
    Ok(())
}

/// List ledger entries
async fn show_ledger() -> Result<()> {
    let cfg = config::config()?;
    let store = LedgerStore::new(&cfg.ledger);
    let ledger = store.load().await;

    if ledger.is_empty() {
        println!("Ledger is empty");
        return Ok(());
    }

    println!("{:<12} {:<15} {:<25}", "MESSAGE ID", "CAPTION", "PUBLISHED");
    println!("{}", "-".repeat(55));

    for entry in &ledger.entries {
        println!(
            "{:<12} {:<15} {:<25}",
            entry.id,
            entry.caption,
            entry.published_at.to_rfc3339()
        );
    }

    println!("\nTotal: {} entries", ledger.len());
    Ok(())
}

/// Show the resolved configuration (for debugging)
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("bdaycast configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Assets:    {}", cfg.assets.display());
    println!("  Template:  {}", cfg.template.display());
    println!("  Font:      {}", cfg.font.display());
    println!("  Birthdays: {}", cfg.birthdays.display());
    println!("  Ledger:    {}", cfg.ledger.display());
    println!();
    println!(
        "Telegram: {}",
        if cfg.telegram.is_some() {
            "configured"
        } else {
            "NOT configured"
        }
    );
    println!();
    println!("Overlay:");
    println!(
        "  Window: {}s - {}s, fade {}s",
        cfg.overlay.start, cfg.overlay.end, cfg.overlay.fade
    );
    println!("  Position: ({}, {})", cfg.overlay.x, cfg.overlay.y);
    println!("  Angle: {} degrees", cfg.overlay.angle_degrees);
    println!("  Clip duration: {}s", cfg.overlay.clip_duration);
    println!();
    println!("Retention:");
    println!("  Caption: {}", cfg.retention.caption);
    println!("  Stale policy: {:?}", cfg.retention.stale_policy);
    println!();
    println!("Encoding:");
    println!("  Timeout: {}s", cfg.encode.timeout_seconds);
    println!("  Max attempts: {}", cfg.encode.max_attempts);

    Ok(())
}
