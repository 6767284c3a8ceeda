use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the webhook listener.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Append-only activity store (CSV with a fixed header row).
    pub events_path: String,
    /// Durable per-cadence watermark file.
    pub watermarks_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            events_path: "data/activity.csv".to_string(),
            watermarks_path: "data/watermarks.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// OpenAI-compatible endpoint root. Overridden at runtime by the
    /// `DEEPSEEK_BASE_URL` environment variable when set.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Hard deadline on each completion request. The scheduler isolates
    /// cadences in separate tasks, but a hung call should still not pin a
    /// cadence forever.
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

/// Digest firing intervals, in seconds. Defaults match the four fixed
/// cadences (5 minutes, 1 hour, 6 hours, 24 hours); tests and unusual
/// deployments can shorten them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub five_min_secs: u64,
    pub hourly_secs: u64,
    pub six_hour_secs: u64,
    pub daily_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            five_min_secs: 5 * 60,
            hourly_secs: 60 * 60,
            six_hour_secs: 6 * 60 * 60,
            daily_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Master switch for Telegram delivery. Credentials come only from the
    /// `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID` environment variables;
    /// their absence disables delivery with a warning even when enabled.
    pub enabled: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// When non-empty, logs are also written to a daily-rotated file in
    /// this directory.
    pub log_dir: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub summarizer: SummarizerConfig,
    pub digest: DigestConfig,
    pub telegram: TelegramConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from a TOML file, falling back to defaults when the file does
    /// not exist, then apply environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("DEEPSEEK_BASE_URL") {
            if !value.is_empty() {
                config.summarizer.base_url = value;
            }
        }
        if let Ok(value) = env::var("FEEDPULSE_BIND") {
            if !value.is_empty() {
                config.server.bind = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
