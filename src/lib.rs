// src/lib.rs
// Public library surface for the `qst` binary and integration tests.

pub mod config;
pub mod error;
pub mod logging;
pub mod position;
pub mod qst;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::config::{QstConfig, QstEntry, QstPort, Settings};
pub use crate::error::QstError;
pub use crate::logging::init_logging;
pub use crate::qst::{Capabilities, FireOutcome, ProducerContext, QstFired, QstKind, QstSource};
pub use crate::scheduler::{schedule_from_config, spawn_scheduler, Frequency, ScheduledQst};
