use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use feedpulse_event::ActivityRecord;
use feedpulse_llm::ChatCompletion;
use feedpulse_store::{EventStore, WatermarkTracker};

use crate::Cadence;

pub struct DigestGenerator {
    store: Arc<EventStore>,
    watermarks: Arc<WatermarkTracker>,
    client: Arc<dyn ChatCompletion>,
}

impl DigestGenerator {
    pub fn new(
        store: Arc<EventStore>,
        watermarks: Arc<WatermarkTracker>,
        client: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            store,
            watermarks,
            client,
        }
    }

    /// Produce the digest text for one cadence window.
    ///
    /// Never fails outward: any error along the way is logged and returned
    /// as an in-band description, so a bad window can never take down a
    /// cadence task. The watermark advances at the read step in all cases:
    /// a window is consumed once, whether or not its summarization
    /// succeeds.
    pub async fn summarize(&self, cadence: Cadence) -> String {
        match self.try_summarize(cadence).await {
            Ok(text) => text,
            Err(err) => {
                error!(cadence = %cadence, error = ?err, "digest generation failed");
                format!("failed to generate {cadence} digest: {err:#}")
            }
        }
    }

    async fn try_summarize(&self, cadence: Cadence) -> Result<String> {
        let now = Utc::now();
        let since = self
            .watermarks
            .get(cadence.label())
            .await
            .context("cadence has no watermark")?;

        let events = self.store.read_since(since)?;
        self.watermarks.advance(cadence.label(), now).await?;

        if events.is_empty() {
            info!(cadence = %cadence, "no new activity in window");
            return Ok(format!(
                "no new activity in the last {}",
                cadence.window_text()
            ));
        }

        info!(cadence = %cadence, events = events.len(), "summarizing window");
        let body = render_events(&events);
        let user_message = format!("Summarize the following Twitter activity:\n{body}");
        self.client.complete(cadence.instruction(), &user_message).await
    }
}

/// Render records into the line format fed to the summarizer, one event per
/// line, append order preserved.
pub fn render_events(records: &[ActivityRecord]) -> String {
    records
        .iter()
        .map(|r| {
            format!(
                "time: {}, user: {}, event: {}, content: {}",
                r.timestamp.to_rfc3339(),
                r.user_name,
                r.event_type,
                r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
    use tokio::sync::Mutex;

    struct CannedClient {
        reply: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatCompletion for CannedClient {
        async fn complete(&self, system: &str, user: &str) -> Result<String> {
            self.prompts
                .lock()
                .await
                .push((system.to_string(), user.to_string()));
            Ok(self.reply.clone())
        }
    }

    struct FailingClient;

    #[async_trait::async_trait]
    impl ChatCompletion for FailingClient {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            bail!("connection reset by peer")
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn record(at: DateTime<Utc>, content: &str) -> ActivityRecord {
        ActivityRecord {
            timestamp: at,
            user_name: "bob".to_string(),
            event_type: "new_tweet".to_string(),
            content: content.to_string(),
        }
    }

    async fn fixture(
        dir: &tempfile::TempDir,
        client: Arc<dyn ChatCompletion>,
        watermark_default: DateTime<Utc>,
    ) -> (DigestGenerator, Arc<EventStore>, Arc<WatermarkTracker>) {
        let store = Arc::new(EventStore::open(dir.path().join("activity.csv")).unwrap());
        let watermarks = Arc::new(
            WatermarkTracker::load(
                dir.path().join("wm.json"),
                &Cadence::labels(),
                watermark_default,
            )
            .unwrap(),
        );
        (
            DigestGenerator::new(store.clone(), watermarks.clone(), client),
            store,
            watermarks,
        )
    }

    #[tokio::test]
    async fn three_events_in_window_reach_the_summarizer() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(CannedClient::new("busy morning on the timeline"));
        let (generator, store, watermarks) = fixture(&dir, client.clone(), t0()).await;

        for minutes in [1, 2, 3] {
            store
                .append(&record(
                    t0() + ChronoDuration::minutes(minutes),
                    &format!("post {minutes}"),
                ))
                .await
                .unwrap();
        }

        let before = Utc::now();
        let summary = generator.summarize(Cadence::FiveMin).await;
        let after = Utc::now();

        assert_eq!(summary, "busy morning on the timeline");

        let prompts = client.prompts.lock().await;
        assert_eq!(prompts.len(), 1);
        let (system, user) = &prompts[0];
        assert_eq!(*system, Cadence::FiveMin.instruction());
        for minutes in [1, 2, 3] {
            assert!(user.contains(&format!("post {minutes}")));
        }

        let mark = watermarks.get("5min").await.unwrap();
        assert!(mark >= before && mark <= after);
    }

    #[tokio::test]
    async fn empty_window_returns_quiet_message_without_calling_out() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(CannedClient::new("should not be used"));
        let (generator, _store, _) = fixture(&dir, client.clone(), t0()).await;

        let summary = generator.summarize(Cadence::Hourly).await;
        assert_eq!(summary, "no new activity in the last hour");
        assert!(client.prompts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn second_call_with_no_new_events_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(CannedClient::new("digest"));
        let (generator, store, _) = fixture(&dir, client, t0()).await;

        store.append(&record(Utc::now(), "fresh")).await.unwrap();
        let first = generator.summarize(Cadence::FiveMin).await;
        assert_eq!(first, "digest");
        let second = generator.summarize(Cadence::FiveMin).await;
        assert_eq!(second, "no new activity in the last 5 minutes");
    }

    #[tokio::test]
    async fn events_already_below_watermark_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(CannedClient::new("digest"));
        // Watermark starts *after* the only stored event.
        let (generator, store, _) =
            fixture(&dir, client.clone(), t0() + ChronoDuration::hours(1)).await;
        store.append(&record(t0(), "stale")).await.unwrap();

        let summary = generator.summarize(Cadence::SixHour).await;
        assert_eq!(summary, "no new activity in the last 6 hours");
    }

    #[tokio::test]
    async fn failed_completion_becomes_in_band_error_and_still_advances() {
        let dir = tempfile::tempdir().unwrap();
        let (generator, store, watermarks) = fixture(&dir, Arc::new(FailingClient), t0()).await;
        store.append(&record(Utc::now(), "doomed")).await.unwrap();

        let before = Utc::now();
        let summary = generator.summarize(Cadence::Daily).await;
        assert!(summary.starts_with("failed to generate 24hour digest"));
        assert!(summary.contains("connection reset by peer"));

        // The window was consumed despite the failure.
        let mark = watermarks.get("24hour").await.unwrap();
        assert!(mark >= before);
        let retry = generator.summarize(Cadence::Daily).await;
        assert_eq!(retry, "no new activity in the last 24 hours");
    }

    #[test]
    fn render_events_line_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 1, 0).unwrap();
        let rendered = render_events(&[
            record(at, "hello"),
            ActivityRecord {
                timestamp: at,
                user_name: String::new(),
                event_type: "new_follower".to_string(),
                content: "followed user: alice".to_string(),
            },
        ]);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!("time: {}, user: bob, event: new_tweet, content: hello", at.to_rfc3339())
        );
        assert_eq!(
            lines[1],
            format!(
                "time: {}, user: , event: new_follower, content: followed user: alice",
                at.to_rfc3339()
            )
        );
    }
}
