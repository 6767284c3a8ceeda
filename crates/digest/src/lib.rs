//! Periodic digest generation.
//!
//! Four cadences fire independently; each firing reads the activity newer
//! than its watermark, advances the watermark, and turns the window into a
//! natural-language digest via the chat-completion client. A failed digest
//! is reported in-band and never stops a cadence task.

mod cadence;
mod generator;
mod scheduler;
mod sink;

pub use cadence::Cadence;
pub use generator::{DigestGenerator, render_events};
pub use scheduler::{spawn_all_cadence_tasks, spawn_cadence_task};
pub use sink::{ConsoleSink, DigestSink};
