//! Durable state for the digest pipeline: the append-only activity store
//! and the per-cadence watermark file.

mod event_store;
mod watermark;

pub use event_store::EventStore;
pub use watermark::WatermarkTracker;
