use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    OffsetDateTime,
};

use crate::qst::net::TextFetcher;
use crate::qst::types::Producer;
use crate::qst::{scrub_html_entities_for_xml, strip_markup, truncate_chars, FEED_TEXT_LIMIT};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    guid: Option<TextNode>,
    description: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<TextNode>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    updated: Option<String>,
    published: Option<String>,
}

/// Element text, ignoring attributes such as `isPermaLink` or `type`.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

fn node_text(n: Option<TextNode>) -> Option<String> {
    n.map(|n| n.value.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Feed entry reduced to what dedup and output need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: Option<String>,
    pub description: String,
    /// Unix seconds.
    pub published: Option<i64>,
}

impl FeedEntry {
    /// Explicit id, or a hash of the description when the feed has none.
    pub fn identity(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => Sha256::digest(self.description.as_bytes())
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect(),
        }
    }
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.unix_timestamp())
}

fn parse_rfc3339_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .ok()
        .map(|dt| dt.unix_timestamp())
}

/// Parse an RSS 2.0 or Atom document into entries, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let xml_clean = scrub_html_entities_for_xml(xml);

    if !xml_clean.contains("<rss") && xml_clean.contains("<feed") {
        let feed: AtomFeed = from_str(&xml_clean).context("parsing atom feed xml")?;
        return Ok(feed
            .entry
            .into_iter()
            .map(|e| FeedEntry {
                id: node_text(e.id),
                description: node_text(e.summary)
                    .or_else(|| node_text(e.content))
                    .unwrap_or_default(),
                published: e
                    .updated
                    .or(e.published)
                    .as_deref()
                    .and_then(parse_rfc3339_to_unix),
            })
            .collect());
    }

    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| FeedEntry {
            id: node_text(it.guid),
            description: node_text(it.description).unwrap_or_default(),
            published: it.pub_date.as_deref().and_then(parse_rfc2822_to_unix),
        })
        .collect())
}

/// Newest entry by date when every entry is dated, else the last one listed.
pub fn latest_entry(entries: &[FeedEntry]) -> Option<&FeedEntry> {
    if !entries.is_empty() && entries.iter().all(|e| e.published.is_some()) {
        entries.iter().max_by_key(|e| e.published)
    } else {
        entries.last()
    }
}

/// News feed producer: sends the latest entry once.
pub struct RssProducer {
    url: String,
    fetcher: Arc<dyn TextFetcher>,
    last_id: Mutex<Option<String>>,
}

impl RssProducer {
    pub fn new(url: &str, fetcher: Arc<dyn TextFetcher>) -> Self {
        Self {
            url: url.trim().to_string(),
            fetcher,
            last_id: Mutex::new(None),
        }
    }

    pub fn last_seen(&self) -> Option<String> {
        self.last_id.lock().ok().and_then(|g| g.clone())
    }
}

#[async_trait]
impl Producer for RssProducer {
    async fn produce(&self) -> Result<Option<String>> {
        let body = self.fetcher.fetch(&self.url).await?.into_success(&self.url)?;
        let entries = parse_feed(&body)?;

        let Some(entry) = latest_entry(&entries) else {
            tracing::info!(url = %self.url, "RSS feed had no entries");
            return Ok(None);
        };

        let id = entry.identity();
        {
            let mut last = self
                .last_id
                .lock()
                .map_err(|_| anyhow!("feed marker lock poisoned"))?;
            if last.as_deref() == Some(id.as_str()) {
                return Ok(None);
            }
            *last = Some(id);
        }

        let text = truncate_chars(&strip_markup(&entry.description), FEED_TEXT_LIMIT);
        Ok(Some(text))
    }

    fn name(&self) -> &'static str {
        "RSS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>t</title>
<item><guid isPermaLink="false">one</guid><description>first</description></item>
<item><guid>two</guid><description><![CDATA[<i>second</i>&nbsp;item]]></description></item>
</channel></rss>"#;

    #[test]
    fn parses_rss_items_in_order() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id.as_deref(), Some("one"));
        assert_eq!(entries[1].id.as_deref(), Some("two"));
        assert_eq!(latest_entry(&entries).unwrap().id.as_deref(), Some("two"));
    }

    #[test]
    fn dated_entries_pick_newest() {
        let entries = vec![
            FeedEntry {
                id: Some("new".into()),
                description: String::new(),
                published: Some(200),
            },
            FeedEntry {
                id: Some("old".into()),
                description: String::new(),
                published: Some(100),
            },
        ];
        assert_eq!(latest_entry(&entries).unwrap().id.as_deref(), Some("new"));
    }

    #[test]
    fn identity_falls_back_to_hash() {
        let e = FeedEntry {
            id: None,
            description: "abc".into(),
            published: None,
        };
        assert_eq!(
            e.identity(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parses_atom_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>x</title>
<entry><id>urn:1</id><updated>2024-01-01T00:00:00Z</updated><summary type="html">&lt;b&gt;A&lt;/b&gt;</summary></entry>
<entry><id>urn:2</id><updated>2024-01-02T00:00:00Z</updated><content type="html">B</content></entry>
</feed>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "<b>A</b>");
        assert_eq!(entries[1].description, "B");
        assert_eq!(latest_entry(&entries).unwrap().id.as_deref(), Some("urn:2"));
    }
}
