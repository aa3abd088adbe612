//! Configuration for bdaycast paths and settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BDAYCAST_HOME, BDAYCAST_BOT_TOKEN, BDAYCAST_CHAT_ID)
//! 2. Config file (.bdaycast/config.yaml)
//! 3. Defaults (~/.bdaycast)
//!
//! Config file discovery:
//! - Searches current directory and parents for .bdaycast/config.yaml
//! - Paths in the config file are relative to the config file's parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ledger::retention::StalePolicy;
use crate::publish::TelegramConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub telegram: Option<TelegramFileConfig>,
    #[serde(default)]
    pub overlay: Option<OverlayConfig>,
    #[serde(default)]
    pub retention: Option<RetentionConfig>,
    #[serde(default)]
    pub encode: Option<EncodeConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory, holds the ledger (relative to config file)
    pub home: Option<String>,
    /// Assets directory: template video, font, birthday list
    pub assets: Option<String>,
    /// Template video (default: <assets>/birthday.mp4)
    pub template: Option<String>,
    /// Font for the name overlay (default: <assets>/greeting.ttf)
    pub font: Option<String>,
    /// Birthday list (default: <assets>/birthdays.yaml)
    pub birthdays: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramFileConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub fade: Option<f64>,
    pub x: Option<u32>,
    pub y: Option<u32>,
    pub angle_degrees: Option<f32>,
    pub clip_duration: Option<f64>,
    pub text_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    pub caption: Option<String>,
    pub stale_policy: Option<StalePolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodeConfig {
    pub timeout_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to bdaycast home (ledger lives here)
    pub home: PathBuf,
    /// Assets directory
    pub assets: PathBuf,
    /// Template video
    pub template: PathBuf,
    /// Overlay font
    pub font: PathBuf,
    /// Birthday list
    pub birthdays: PathBuf,
    /// Ledger document ($home/messages.json)
    pub ledger: PathBuf,
    /// Telegram credentials (None until configured)
    pub telegram: Option<TelegramConfig>,
    /// Overlay timing, placement and text settings
    pub overlay: OverlaySettings,
    /// Retention settings
    pub retention: RetentionSettings,
    /// External-encoder call settings
    pub encode: EncodeSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Where and when the name overlay appears on the template.
///
/// Defaults match the reference template: the overlay fades in at 5.65s,
/// out by 8.5s, sits at (1085, 487), tilted 3.5 degrees.
#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub start: f64,
    pub end: f64,
    pub fade: f64,
    pub x: u32,
    pub y: u32,
    pub angle_degrees: f32,
    pub clip_duration: f64,
    /// Prepended to the recipient name before rendering (e.g. a greeting
    /// particle for Hebrew text)
    pub text_prefix: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            start: 5.65,
            end: 8.5,
            fade: 0.1,
            x: 1085,
            y: 487,
            angle_degrees: 3.5,
            clip_duration: 10.0,
            text_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionSettings {
    /// Caption tagging our videos in the group; retention only touches these
    pub caption: String,
    /// What to do with a ledger entry whose remote deletion failed
    pub stale_policy: StalePolicy,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            caption: "birthday".to_string(),
            stale_policy: StalePolicy::Retry,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub timeout_seconds: u64,
    pub max_attempts: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
            max_attempts: 2,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".bdaycast").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".bdaycast");

    let config_file = find_config_file();

    let file: Option<ConfigFile> = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    // Base directory for relative paths is the parent of .bdaycast/
    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = if let Ok(env_home) = std::env::var("BDAYCAST_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = paths.home {
        resolve_path(&base_dir, home_path)
    } else {
        default_home
    };

    let assets = match paths.assets {
        Some(ref p) => resolve_path(&base_dir, p),
        None => home.join("assets"),
    };

    let template = match paths.template {
        Some(ref p) => resolve_path(&base_dir, p),
        None => assets.join("birthday.mp4"),
    };
    let font = match paths.font {
        Some(ref p) => resolve_path(&base_dir, p),
        None => assets.join("greeting.ttf"),
    };
    let birthdays = match paths.birthdays {
        Some(ref p) => resolve_path(&base_dir, p),
        None => assets.join("birthdays.yaml"),
    };
    let ledger = home.join("messages.json");

    // Telegram: env vars override the file, both values are required
    let file_telegram = file.as_ref().and_then(|f| f.telegram.clone());
    let bot_token = std::env::var("BDAYCAST_BOT_TOKEN")
        .ok()
        .or_else(|| file_telegram.as_ref().and_then(|t| t.bot_token.clone()));
    let chat_id = std::env::var("BDAYCAST_CHAT_ID")
        .ok()
        .or_else(|| file_telegram.as_ref().and_then(|t| t.chat_id.clone()));
    let telegram = match (bot_token, chat_id) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
        _ => None,
    };

    let overlay = {
        let defaults = OverlaySettings::default();
        let o = file.as_ref().and_then(|f| f.overlay.clone());
        OverlaySettings {
            start: o.as_ref().and_then(|o| o.start).unwrap_or(defaults.start),
            end: o.as_ref().and_then(|o| o.end).unwrap_or(defaults.end),
            fade: o.as_ref().and_then(|o| o.fade).unwrap_or(defaults.fade),
            x: o.as_ref().and_then(|o| o.x).unwrap_or(defaults.x),
            y: o.as_ref().and_then(|o| o.y).unwrap_or(defaults.y),
            angle_degrees: o
                .as_ref()
                .and_then(|o| o.angle_degrees)
                .unwrap_or(defaults.angle_degrees),
            clip_duration: o
                .as_ref()
                .and_then(|o| o.clip_duration)
                .unwrap_or(defaults.clip_duration),
            text_prefix: o
                .as_ref()
                .and_then(|o| o.text_prefix.clone())
                .unwrap_or(defaults.text_prefix),
        }
    };

    let retention = {
        let defaults = RetentionSettings::default();
        let r = file.as_ref().and_then(|f| f.retention.clone());
        RetentionSettings {
            caption: r
                .as_ref()
                .and_then(|r| r.caption.clone())
                .unwrap_or(defaults.caption),
            stale_policy: r
                .as_ref()
                .and_then(|r| r.stale_policy)
                .unwrap_or(defaults.stale_policy),
        }
    };

    let encode = {
        let defaults = EncodeSettings::default();
        let e = file.as_ref().and_then(|f| f.encode.clone());
        EncodeSettings {
            timeout_seconds: e
                .as_ref()
                .and_then(|e| e.timeout_seconds)
                .unwrap_or(defaults.timeout_seconds),
            max_attempts: e
                .as_ref()
                .and_then(|e| e.max_attempts)
                .unwrap_or(defaults.max_attempts),
        }
    };

    Ok(ResolvedConfig {
        home,
        assets,
        template,
        font,
        birthdays,
        ledger,
        telegram,
        overlay,
        retention,
        encode,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
