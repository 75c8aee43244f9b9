// src/qst/source.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::QstEntry;
use crate::error::QstError;
use crate::qst::types::Producer;
use crate::qst::{ensure_metrics_described, Capabilities, ProducerContext, QstFired, QstKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// A background task was spawned.
    Started,
    /// The previous task for this source is still running.
    Skipped,
}

/// One configured broadcast: producer plus the single-flight flag.
pub struct QstSource {
    key: String,
    kind: QstKind,
    content: String,
    prefix: String,
    producer: Arc<dyn Producer>,
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the task ends, including by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl QstSource {
    pub fn new(key: &str, kind: QstKind, content: &str, ctx: &ProducerContext) -> Self {
        let producer: Arc<dyn Producer> = Arc::from(kind.build(content, ctx));
        Self::with_producer(key, kind, content, producer)
    }

    /// Source around an already-built producer.
    pub fn with_producer(
        key: &str,
        kind: QstKind,
        content: &str,
        producer: Arc<dyn Producer>,
    ) -> Self {
        ensure_metrics_described();
        Self {
            key: key.to_string(),
            kind,
            content: content.to_string(),
            prefix: kind.prefix().to_string(),
            producer,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build from a config entry, resolving its type name.
    pub fn from_entry(
        key: &str,
        entry: &QstEntry,
        caps: Capabilities,
        ctx: &ProducerContext,
    ) -> Result<Self, QstError> {
        let kind = QstKind::resolve(&entry.kind, caps)?;
        Ok(Self::new(key, kind, &entry.content, ctx))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> QstKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Raw sources go out without the prefix.
    pub fn raw_output(&self) -> bool {
        self.kind.is_raw()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run the producer inline. Never fails: errors are logged and become `None`.
    pub async fn produce(&self) -> Option<String> {
        run_producer(self.producer.as_ref(), &self.key).await
    }

    /// Start a background fetch unless one is already running for this source.
    /// A non-empty result is sent on `tx` as `prefix + value`.
    pub fn fire(&self, tx: &UnboundedSender<QstFired>) -> FireOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(target: "qst", key = %self.key, "QST task still running, not starting another");
            counter!("qst_skipped_total").increment(1);
            return FireOutcome::Skipped;
        }

        let guard = BusyGuard(self.busy.clone());
        let producer = self.producer.clone();
        let key = self.key.clone();
        let prefix = self.prefix.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let value = run_producer(producer.as_ref(), &key).await;
            // Idle again before the consumer sees the result.
            drop(guard);

            let Some(value) = value else {
                tracing::info!(target: "qst", key = %key, "Skipping QST because no data was returned");
                return;
            };
            let fired = QstFired {
                text: format!("{prefix}{value}"),
                key,
            };
            match tx.send(fired) {
                Ok(()) => counter!("qst_fired_total").increment(1),
                Err(e) => {
                    tracing::warn!(target: "qst", key = %e.0.key, "QST consumer gone, dropping payload")
                }
            }
        });

        tracing::debug!(target: "qst", key = %self.key, kind = %self.kind, "Started a task for QST data");
        FireOutcome::Started
    }
}

async fn run_producer(producer: &dyn Producer, key: &str) -> Option<String> {
    match producer.produce().await {
        Ok(Some(v)) if !v.is_empty() => Some(v),
        Ok(_) => {
            counter!("qst_empty_total").increment(1);
            None
        }
        Err(e) => {
            tracing::warn!(target: "qst", key, producer = producer.name(), error = ?e, "QST producer failed");
            counter!("qst_producer_errors_total").increment(1);
            None
        }
    }
}
