//! Telegram delivery for finished digests.
//!
//! Talks to the raw Bot API over reqwest. Credentials come from the
//! environment; when they are absent the notifier simply is not attached,
//! delivery failures are logged by the scheduler and never escalate.

use anyhow::{Result, bail};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use feedpulse_digest::{Cadence, DigestSink};

/// Telegram messages cap out at 4096 chars; stay under it with headroom
/// for the digest header.
const MAX_CHUNK_CHARS: usize = 3500;

pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`. Missing or
    /// empty values are an error; the caller decides whether that disables
    /// delivery or aborts.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not set"))?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID")
            .map_err(|_| anyhow::anyhow!("TELEGRAM_CHAT_ID is not set"))?;
        if token.trim().is_empty() || chat_id.trim().is_empty() {
            bail!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID is empty");
        }
        Ok(Self {
            client: Client::new(),
            base_url: format!("https://api.telegram.org/bot{token}"),
            chat_id,
        })
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);
        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: TelegramResponse<serde_json::Value> = response.json().await?;
        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "telegram sendMessage failed".to_string());
            bail!(description);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DigestSink for TelegramNotifier {
    async fn deliver(&self, cadence: Cadence, summary: &str) -> Result<()> {
        let message = format!(
            "Twitter {cadence} digest\ntime: {}\n{}\n\n{summary}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(30),
        );
        for chunk in chunk_message(&message, MAX_CHUNK_CHARS) {
            self.send_message(&chunk).await?;
        }
        tracing::info!(cadence = %cadence, "digest delivered to telegram");
        Ok(())
    }
}

fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        // A single line over the limit is split hard at max_chars; every
        // chunk must fit inside one sendMessage call.
        if line.chars().count() > max_chars {
            if current_len > 0 {
                chunks.push(current.trim_end().to_string());
                current.clear();
                current_len = 0;
            }
            chunks.extend(split_line(line, max_chars));
            continue;
        }

        let line_len = line.chars().count() + 1;
        if current_len > 0 && current_len + line_len > max_chars {
            chunks.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }

    if chunks.is_empty() {
        chunks.push(text.to_string());
    }
    chunks
}

fn split_line(line: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0;
    for ch in line.chars() {
        if piece_len == max_chars {
            pieces.push(std::mem::take(&mut piece));
            piece_len = 0;
        }
        piece.push(ch);
        piece_len += 1;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[allow(dead_code)]
    result: Option<T>,
    description: Option<String>,
}

// ── Tests ────────────────────────────────────────────────────────────────────
