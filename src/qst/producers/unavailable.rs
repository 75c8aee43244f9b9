use anyhow::Result;
use async_trait::async_trait;

use crate::qst::types::Producer;

/// Stand-in for kinds that still resolve from old configs but cannot run.
pub struct UnavailableProducer {
    kind: &'static str,
    reason: &'static str,
}

impl UnavailableProducer {
    pub fn new(kind: &'static str, reason: &'static str) -> Self {
        Self { kind, reason }
    }
}

#[async_trait]
impl Producer for UnavailableProducer {
    async fn produce(&self) -> Result<Option<String>> {
        tracing::info!(kind = self.kind, reason = self.reason, "QST kind unavailable");
        Ok(None)
    }

    fn name(&self) -> &'static str {
        self.kind
    }
}
