// src/scheduler.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Timelike};
use metrics::gauge;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::config::{QstConfig, QstPort};
use crate::error::QstError;
use crate::qst::{Capabilities, FireOutcome, ProducerContext, QstFired, QstSource};

/// How often an entry fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    /// Every N minutes.
    Every(u32),
    /// Once an hour, at this minute.
    AtMinute(u32),
}

impl Frequency {
    pub fn parse(s: &str) -> Result<Self, QstError> {
        let t = s.trim();
        let bad = || QstError::BadFrequency(s.to_string());
        if let Some(minute) = t.strip_prefix(':') {
            let m: u32 = minute.parse().map_err(|_| bad())?;
            if m > 59 {
                return Err(bad());
            }
            Ok(Frequency::AtMinute(m))
        } else {
            let n: u32 = t.parse().map_err(|_| bad())?;
            if n == 0 {
                return Err(bad());
            }
            Ok(Frequency::Every(n))
        }
    }

    /// Next fire time strictly after `now`.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        match *self {
            Frequency::Every(n) => now.clone() + Duration::minutes(i64::from(n)),
            Frequency::AtMinute(m) => {
                let into_hour = i64::from(now.minute()) * 60 + i64::from(now.second());
                let mut wait = i64::from(m) * 60 - into_hour;
                if wait <= 0 {
                    wait += 3600;
                }
                now.clone() - Duration::nanoseconds(i64::from(now.nanosecond()))
                    + Duration::seconds(wait)
            }
        }
    }
}

/// A source with its schedule and transmission port.
pub struct ScheduledQst {
    pub source: Arc<QstSource>,
    pub frequency: Frequency,
    pub port: QstPort,
}

/// Build schedulable sources from enabled entries. Entries with an unknown
/// type or bad frequency are logged and skipped.
pub fn schedule_from_config(
    config: &QstConfig,
    caps: Capabilities,
    ctx: &ProducerContext,
) -> Vec<ScheduledQst> {
    let mut out = Vec::new();
    for (ident, entry) in config.enabled_entries() {
        let frequency = match Frequency::parse(&entry.freq) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(key = %ident, error = %e, "skipping QST entry");
                continue;
            }
        };
        let source = match QstSource::from_entry(ident, entry, caps, ctx) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(key = %ident, error = %e, "skipping QST entry");
                continue;
            }
        };
        out.push(ScheduledQst {
            source: Arc::new(source),
            frequency,
            port: entry.port(),
        });
    }
    gauge!("qst_sources_scheduled").set(out.len() as f64);
    out
}

/// One tokio task per source; each sleeps until its next fire time and
/// fires. Tasks end once the consumer side of `tx` is dropped.
pub fn spawn_scheduler(
    entries: Vec<ScheduledQst>,
    tx: UnboundedSender<QstFired>,
) -> Vec<JoinHandle<()>> {
    entries
        .into_iter()
        .map(|entry| spawn_one(entry, tx.clone()))
        .collect()
}

fn spawn_one(entry: ScheduledQst, tx: UnboundedSender<QstFired>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let next = entry.frequency.next_after(&now);
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if tx.is_closed() {
                break;
            }
            let outcome = entry.source.fire(&tx);
            tracing::debug!(
                target: "qst",
                key = %entry.source.key(),
                ?outcome,
                port = %entry.port,
                "scheduled tick"
            );
            if outcome == FireOutcome::Skipped {
                tracing::info!(target: "qst", key = %entry.source.key(), "previous fetch still running; tick dropped");
            }
        }
    })
}
