//! Common Alerting Protocol feeds.
//!
//! Accepts either a CAP `<alert>` document (one event per `<info>` block) or
//! an Atom index whose entries carry `cap:*` fields, as published by most
//! national weather services. Elements are matched by local name so the
//! `cap:` prefix does not matter.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::qst::net::TextFetcher;
use crate::qst::scrub_html_entities_for_xml;
use crate::qst::types::Producer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapEvent {
    pub event: String,
    pub headline: String,
    pub description: String,
    pub instruction: String,
    pub severity: String,
    pub urgency: String,
    pub certainty: String,
    pub area: String,
    pub sender: String,
    pub effective: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
}

impl CapEvent {
    /// Human-readable summary sent over the air.
    pub fn report(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let title = if self.headline.is_empty() {
            &self.event
        } else {
            &self.headline
        };
        if !title.is_empty() {
            lines.push(title.clone());
        }
        if !self.event.is_empty() && title != &self.event {
            lines.push(format!("Event: {}", self.event));
        }
        let grading: Vec<String> = [
            ("Severity", &self.severity),
            ("Urgency", &self.urgency),
            ("Certainty", &self.certainty),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();
        if !grading.is_empty() {
            lines.push(grading.join(" "));
        }
        lines.push(format!(
            "Effective: {}",
            self.effective.format("%Y-%m-%d %H:%M UTC")
        ));
        if let Some(exp) = self.expires {
            lines.push(format!("Expires: {}", exp.format("%Y-%m-%d %H:%M UTC")));
        }
        if !self.area.is_empty() {
            lines.push(format!("Area: {}", self.area));
        }
        if !self.sender.is_empty() {
            lines.push(format!("From: {}", self.sender));
        }
        for body in [&self.description, &self.instruction] {
            if !body.is_empty() {
                lines.push(String::new());
                lines.push(body.clone());
            }
        }
        lines.join("\r\n")
    }
}

#[derive(Debug, Default)]
struct Fields {
    event: String,
    headline: String,
    title: String,
    description: String,
    summary: String,
    instruction: String,
    severity: String,
    urgency: String,
    certainty: String,
    area: String,
    sender: String,
    effective: String,
    sent: String,
    expires: String,
}

impl Fields {
    fn set(&mut self, name: &str, value: &str) {
        let slot = match name {
            "event" => &mut self.event,
            "headline" => &mut self.headline,
            "title" => &mut self.title,
            "description" => &mut self.description,
            "summary" => &mut self.summary,
            "instruction" => &mut self.instruction,
            "severity" => &mut self.severity,
            "urgency" => &mut self.urgency,
            "certainty" => &mut self.certainty,
            "areaDesc" => &mut self.area,
            "senderName" => &mut self.sender,
            "effective" => &mut self.effective,
            "sent" => &mut self.sent,
            "expires" => &mut self.expires,
            _ => return,
        };
        // First occurrence wins (several <area> blocks each have an areaDesc).
        if slot.is_empty() {
            *slot = value.to_string();
        }
    }

    /// A missing effective time means the alert's `sent` time.
    fn into_event(self, alert_sent: &str) -> Option<CapEvent> {
        let effective = [self.effective.as_str(), self.sent.as_str(), alert_sent]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .and_then(parse_cap_time)?;
        Some(CapEvent {
            event: self.event,
            headline: if self.headline.is_empty() {
                self.title
            } else {
                self.headline
            },
            description: if self.description.is_empty() {
                self.summary
            } else {
                self.description
            },
            instruction: self.instruction,
            severity: self.severity,
            urgency: self.urgency,
            certainty: self.certainty,
            area: self.area,
            sender: self.sender,
            effective,
            expires: parse_cap_time(&self.expires),
        })
    }
}

fn parse_cap_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse CAP alerts; entries without a usable effective time are dropped.
pub fn parse_cap(xml: &str) -> Result<Vec<CapEvent>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&xml_clean);

    let mut events = Vec::new();
    let mut current: Option<Fields> = None;
    let mut alert_sent = String::new();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                if name == "info" || name == "entry" {
                    current = Some(Fields::default());
                }
                text.clear();
            }
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(e) => {
                let name = local_name(e.local_name().as_ref());
                if name == "info" || name == "entry" {
                    if let Some(fields) = current.take() {
                        match fields.into_event(&alert_sent) {
                            Some(ev) => events.push(ev),
                            None => tracing::debug!("CAP entry without effective time skipped"),
                        }
                    }
                } else if let Some(fields) = current.as_mut() {
                    fields.set(&name, text.trim());
                } else if name == "sent" {
                    alert_sent = text.trim().to_string();
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(events)
}

/// Events effective strictly after `after`, oldest first.
pub fn events_effective_after(events: &[CapEvent], after: DateTime<Utc>) -> Vec<&CapEvent> {
    let mut out: Vec<&CapEvent> = events.iter().filter(|e| e.effective > after).collect();
    out.sort_by_key(|e| e.effective);
    out
}

/// Alert feed producer. The cursor is the effective time of the newest
/// event already sent.
pub struct CapProducer {
    url: String,
    fetcher: Arc<dyn TextFetcher>,
    last_date: Mutex<Option<DateTime<Utc>>>,
}

impl CapProducer {
    pub fn new(url: &str, fetcher: Arc<dyn TextFetcher>) -> Self {
        Self {
            url: url.trim().to_string(),
            fetcher,
            last_date: Mutex::new(None),
        }
    }

    pub fn last_effective(&self) -> Option<DateTime<Utc>> {
        self.last_date.lock().ok().and_then(|g| *g)
    }
}

/// Starting cursor: just before the newest event, so it is sent once; now
/// when the feed is empty.
fn starting_cursor(events: &[CapEvent]) -> DateTime<Utc> {
    match events.iter().map(|e| e.effective).max() {
        Some(latest) => latest - Duration::seconds(1),
        None => Utc::now(),
    }
}

#[async_trait]
impl Producer for CapProducer {
    async fn produce(&self) -> Result<Option<String>> {
        let body = self.fetcher.fetch(&self.url).await?.into_success(&self.url)?;
        let events = parse_cap(&body)?;

        let mut last = self
            .last_date
            .lock()
            .map_err(|_| anyhow!("CAP cursor lock poisoned"))?;
        let cursor = *last.get_or_insert_with(|| starting_cursor(&events));
        tracing::debug!(url = %self.url, %cursor, "CAP cursor");

        let fresh = events_effective_after(&events, cursor);
        let Some(newest) = fresh.last() else {
            return Ok(None);
        };
        *last = Some(newest.effective);

        let mut out = String::new();
        for ev in &fresh {
            tracing::info!(effective = %ev.effective, event = %ev.event, "Sending CAP event");
            out.push_str(&format!("\r\n-----\r\n{}\r\n-----\r\n", ev.report()));
        }
        Ok(Some(out))
    }

    fn name(&self) -> &'static str {
        "CAP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ALERT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<alert xmlns="urn:oasis:names:tc:emergency:cap:1.2">
  <identifier>X1</identifier>
  <sender>w-nws.webmaster@noaa.gov</sender>
  <info>
    <event>Flood Warning</event>
    <urgency>Immediate</urgency>
    <severity>Severe</severity>
    <certainty>Observed</certainty>
    <effective>2024-03-01T10:00:00-05:00</effective>
    <expires>2024-03-01T18:00:00-05:00</expires>
    <senderName>NWS Portland</senderName>
    <headline>Flood Warning issued</headline>
    <description>River &amp; creek flooding.</description>
    <instruction><![CDATA[Avoid low areas.]]></instruction>
    <area><areaDesc>Multnomah</areaDesc><polygon>1,2 3,4</polygon></area>
  </info>
</alert>"#;

    #[test]
    fn parses_single_alert() {
        let evs = parse_cap(ALERT).unwrap();
        assert_eq!(evs.len(), 1);
        let e = &evs[0];
        assert_eq!(e.event, "Flood Warning");
        assert_eq!(e.area, "Multnomah");
        assert_eq!(e.description, "River & creek flooding.");
        assert_eq!(e.instruction, "Avoid low areas.");
        assert_eq!(
            e.effective,
            Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn report_contains_key_fields() {
        let r = parse_cap(ALERT).unwrap()[0].report();
        assert!(r.starts_with("Flood Warning issued\r\n"));
        assert!(r.contains("Severity: Severe Urgency: Immediate Certainty: Observed"));
        assert!(r.contains("Effective: 2024-03-01 15:00 UTC"));
        assert!(r.contains("Area: Multnomah"));
        assert!(r.ends_with("Avoid low areas."));
    }

    #[test]
    fn parses_prefixed_atom_entries() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:cap="urn:oasis:names:tc:emergency:cap:1.1">
<entry><title>Wind Advisory</title><summary>Gusts to 50 mph</summary>
<cap:event>Wind Advisory</cap:event><cap:effective>2024-03-02T08:00:00Z</cap:effective>
<cap:areaDesc>Coast</cap:areaDesc></entry>
<entry><title>No date</title></entry>
</feed>"#;
        let evs = parse_cap(xml).unwrap();
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].headline, "Wind Advisory");
        assert_eq!(evs[0].description, "Gusts to 50 mph");
        assert_eq!(evs[0].area, "Coast");
    }

    #[test]
    fn missing_effective_falls_back_to_sent() {
        let xml = r#"<alert xmlns="urn:oasis:names:tc:emergency:cap:1.2">
  <identifier>X2</identifier>
  <sent>2024-03-05T06:00:00Z</sent>
  <info><event>Dense Fog Advisory</event><headline>Fog until noon</headline></info>
</alert>"#;
        let evs = parse_cap(xml).unwrap();
        assert_eq!(evs.len(), 1);
        assert_eq!(evs[0].event, "Dense Fog Advisory");
        assert_eq!(
            evs[0].effective,
            Utc.with_ymd_and_hms(2024, 3, 5, 6, 0, 0).unwrap()
        );

        let entry = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:cap="urn:oasis:names:tc:emergency:cap:1.1">
<entry><title>Fog</title><cap:sent>2024-03-05T07:00:00Z</cap:sent></entry></feed>"#;
        let evs = parse_cap(entry).unwrap();
        assert_eq!(
            evs[0].effective,
            Utc.with_ymd_and_hms(2024, 3, 5, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn effective_filter_is_strict_and_sorted() {
        let mut a = parse_cap(ALERT).unwrap().remove(0);
        let mut b = a.clone();
        a.effective = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        b.effective = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let evs = vec![a.clone(), b.clone()];
        let after = events_effective_after(&evs, b.effective - Duration::seconds(1));
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].effective, b.effective);
        assert_eq!(events_effective_after(&evs, a.effective).len(), 0);
    }
}
