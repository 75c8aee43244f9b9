// src/qst/types.rs
use anyhow::Result;

/// Content strategy behind one configured QST.
///
/// `Ok(None)` (or an empty string) means "nothing new this cycle". Errors are
/// logged by the owning source and treated the same way, so implementations
/// can use `?` freely.
#[async_trait::async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self) -> Result<Option<String>>;
    fn name(&self) -> &'static str;
}
