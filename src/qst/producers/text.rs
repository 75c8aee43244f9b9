use anyhow::Result;
use async_trait::async_trait;

use crate::qst::types::Producer;

/// Configured message, sent as-is.
pub struct TextProducer {
    text: String,
}

impl TextProducer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl Producer for TextProducer {
    async fn produce(&self) -> Result<Option<String>> {
        Ok(Some(self.text.clone()))
    }

    fn name(&self) -> &'static str {
        "Text"
    }
}
