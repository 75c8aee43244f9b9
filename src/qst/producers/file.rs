use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::qst::net::{open_net_file, TextFetcher};
use crate::qst::truncate_bytes;
use crate::qst::types::Producer;

/// Sends the contents of a local file or an http(s) URL.
pub struct FileProducer {
    location: String,
    size_limit: usize,
    fetcher: Arc<dyn TextFetcher>,
}

impl FileProducer {
    pub fn new(location: &str, size_limit: usize, fetcher: Arc<dyn TextFetcher>) -> Self {
        Self {
            location: location.to_string(),
            size_limit,
            fetcher,
        }
    }
}

#[async_trait]
impl Producer for FileProducer {
    async fn produce(&self) -> Result<Option<String>> {
        let text = open_net_file(self.fetcher.as_ref(), &self.location).await?;
        Ok(Some(truncate_bytes(&text, self.size_limit)))
    }

    fn name(&self) -> &'static str {
        "File"
    }
}
