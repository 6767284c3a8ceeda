use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::Cadence;

/// Destination for a finished digest. Delivery is best-effort; a sink
/// failure is the caller's to log, never to escalate.
#[async_trait::async_trait]
pub trait DigestSink: Send + Sync {
    async fn deliver(&self, cadence: Cadence, summary: &str) -> Result<()>;
}

/// Prints each digest as a console block and mirrors it into the log.
pub struct ConsoleSink;

#[async_trait::async_trait]
impl DigestSink for ConsoleSink {
    async fn deliver(&self, cadence: Cadence, summary: &str) -> Result<()> {
        println!("\n=== {cadence} scheduled digest ===");
        println!("generated at: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        println!("{summary}");
        println!("{}", "=".repeat(50));
        info!(cadence = %cadence, "digest delivered to console");
        Ok(())
    }
}
