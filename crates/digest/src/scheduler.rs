//! Background cadence tasks.
//!
//! One task per cadence, so a slow completion call on one cadence never
//! delays another's firing. Each task waits out its interval, generates a
//! digest, and hands it to every sink; it exits when the shutdown channel
//! flips. Timer phase is not persisted; all intervals count from spawn.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use feedpulse_config::DigestConfig;

use crate::{Cadence, DigestGenerator, DigestSink};

pub fn spawn_cadence_task(
    cadence: Cadence,
    interval: Duration,
    generator: Arc<DigestGenerator>,
    sinks: Arc<Vec<Arc<dyn DigestSink>>>,
    shutdown: &watch::Sender<bool>,
) -> JoinHandle<()> {
    let mut rx = shutdown.subscribe();
    tokio::spawn(async move {
        info!(cadence = %cadence, interval_secs = interval.as_secs(), "cadence task started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let summary = generator.summarize(cadence).await;
                    for sink in sinks.iter() {
                        if let Err(err) = sink.deliver(cadence, &summary).await {
                            warn!(cadence = %cadence, error = ?err, "digest delivery failed");
                        }
                    }
                }
                changed = rx.changed() => {
                    if changed.is_ok() && *rx.borrow() {
                        info!(cadence = %cadence, "cadence task stopping");
                        break;
                    }
                }
            }
        }
    })
}

/// Spawn all four cadence tasks with intervals taken from config.
pub fn spawn_all_cadence_tasks(
    config: &DigestConfig,
    generator: Arc<DigestGenerator>,
    sinks: Arc<Vec<Arc<dyn DigestSink>>>,
    shutdown: &watch::Sender<bool>,
) -> Vec<JoinHandle<()>> {
    Cadence::ALL
        .into_iter()
        .map(|cadence| {
            spawn_cadence_task(
                cadence,
                cadence.interval(config),
                generator.clone(),
                sinks.clone(),
                shutdown,
            )
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
