// src/qst/mod.rs
pub mod net;
pub mod producers;
pub mod source;
pub mod types;

use std::fmt;
use std::sync::Arc;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

use crate::config::{QstConfig, Settings};
use crate::error::QstError;
use crate::position::{FixProvider, StaticFixProvider, StaticStations, StationDirectory};
use crate::qst::net::{HttpFetcher, TextFetcher};
use crate::qst::producers::{
    cap::CapProducer,
    exec::ExecProducer,
    file::FileProducer,
    position::{GpsProducer, PositionFormat, StationProducer},
    text::TextProducer,
    unavailable::UnavailableProducer,
    weather::OpenWeatherProducer,
};
use crate::qst::types::Producer;

pub use source::{FireOutcome, QstSource};

/// Prefix put in front of every non-raw payload.
pub const DEFAULT_PREFIX: &str = "[QST] ";

/// Feed entries are cut to this many characters after markup removal.
pub const FEED_TEXT_LIMIT: usize = 8192;

/// Payload handed to the transmission queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QstFired {
    pub text: String,
    pub key: String,
}

/// One-time metrics registration.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("qst_fired_total", "QST payloads handed to the consumer.");
        describe_counter!(
            "qst_skipped_total",
            "Fires dropped because the source was still running."
        );
        describe_counter!("qst_empty_total", "Cycles that produced no new data.");
        describe_counter!(
            "qst_producer_errors_total",
            "Producer fetch/parse/exec failures."
        );
        describe_gauge!(
            "qst_sources_scheduled",
            "Sources scheduled at startup."
        );
    });
}

/// Optional producer support, computed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// RSS/Atom news producer compiled in.
    pub feeds: bool,
}

impl Capabilities {
    pub fn detect() -> Self {
        let feeds = cfg!(feature = "rss");
        if !feeds {
            tracing::info!("RSS producer not available in this build");
        }
        Self { feeds }
    }

    pub fn all() -> Self {
        Self { feeds: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QstKind {
    Text,
    Exec,
    File,
    Gps,
    GpsA,
    Station,
    Rss,
    Cap,
    /// Retired Weather Underground producer; configs may still name it.
    WeatherWu,
    OpenWeather,
}

impl QstKind {
    pub const ALL: [QstKind; 10] = [
        QstKind::Text,
        QstKind::Exec,
        QstKind::File,
        QstKind::Gps,
        QstKind::GpsA,
        QstKind::Station,
        QstKind::Rss,
        QstKind::Cap,
        QstKind::WeatherWu,
        QstKind::OpenWeather,
    ];

    /// Name used in the `type` field of a config entry.
    pub fn type_name(self) -> &'static str {
        match self {
            QstKind::Text => "Text",
            QstKind::Exec => "Exec",
            QstKind::File => "File",
            QstKind::Gps => "GPS",
            QstKind::GpsA => "GPS-A",
            QstKind::Station => "Station",
            QstKind::Rss => "RSS",
            QstKind::Cap => "CAP",
            QstKind::WeatherWu => "Weather (WU)",
            QstKind::OpenWeather => "OpenWeather",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.type_name().eq_ignore_ascii_case(name))
    }

    pub fn is_available(self, caps: Capabilities) -> bool {
        match self {
            QstKind::Rss => caps.feeds,
            _ => true,
        }
    }

    /// Kinds that can be offered for new entries. The retired WU kind still
    /// resolves for old configs but is never offered.
    pub fn available(caps: Capabilities) -> Vec<QstKind> {
        Self::ALL
            .into_iter()
            .filter(|k| *k != QstKind::WeatherWu && k.is_available(caps))
            .collect()
    }

    pub fn resolve(name: &str, caps: Capabilities) -> Result<Self, QstError> {
        let kind =
            Self::from_type_name(name).ok_or_else(|| QstError::UnknownType(name.to_string()))?;
        if !kind.is_available(caps) {
            return Err(QstError::Unavailable(kind.type_name().to_string()));
        }
        Ok(kind)
    }

    /// Position reports go out verbatim, without the QST prefix.
    pub fn is_raw(self) -> bool {
        matches!(self, QstKind::Gps | QstKind::GpsA | QstKind::Station)
    }

    pub fn prefix(self) -> &'static str {
        if self.is_raw() {
            ""
        } else {
            DEFAULT_PREFIX
        }
    }

    /// Short human summary of an entry's content.
    pub fn describe(self, content: &str) -> String {
        match self {
            QstKind::Text => content.to_string(),
            QstKind::File => format!("Read: {content}"),
            QstKind::Exec => format!("Run: {content}"),
            QstKind::Gps | QstKind::GpsA => format!("Message: {content}"),
            QstKind::Station => format!("Station: {content}"),
            QstKind::Rss | QstKind::Cap => format!("Source: {content}"),
            QstKind::WeatherWu | QstKind::OpenWeather => content.to_string(),
        }
    }

    /// Registration switch from kind to producer.
    pub fn build(self, content: &str, ctx: &ProducerContext) -> Box<dyn Producer> {
        let settings = &ctx.settings;
        match self {
            QstKind::Text => Box::new(TextProducer::new(content)),
            QstKind::Exec => Box::new(ExecProducer::new(content, settings.qst_size_limit)),
            QstKind::File => Box::new(FileProducer::new(
                content,
                settings.qst_size_limit,
                ctx.fetcher.clone(),
            )),
            QstKind::Gps => Box::new(GpsProducer::new(
                gps_message(content, settings),
                PositionFormat::Nmea,
                ctx.fixes.clone(),
            )),
            QstKind::GpsA => Box::new(GpsProducer::new(
                gps_message(content, settings),
                settings.aprs_format(),
                ctx.fixes.clone(),
            )),
            QstKind::Station => Box::new(StationProducer::new(
                content,
                &settings.callsign,
                settings.aprs_format(),
                ctx.stations.clone(),
            )),
            #[cfg(feature = "rss")]
            QstKind::Rss => Box::new(producers::rss::RssProducer::new(
                content,
                ctx.fetcher.clone(),
            )),
            #[cfg(not(feature = "rss"))]
            QstKind::Rss => Box::new(UnavailableProducer::new(
                "RSS",
                "built without the `rss` feature",
            )),
            QstKind::Cap => Box::new(CapProducer::new(content, ctx.fetcher.clone())),
            QstKind::WeatherWu => Box::new(UnavailableProducer::new(
                "Weather (WU)",
                "retired; use OpenWeather",
            )),
            QstKind::OpenWeather => Box::new(OpenWeatherProducer::new(
                content,
                &settings.qst_owuri,
                &settings.qst_owappid,
                ctx.fetcher.clone(),
            )),
        }
    }
}

/// Empty GPS messages fall back to the configured default comment.
fn gps_message<'a>(content: &'a str, settings: &'a Settings) -> &'a str {
    if content.trim().is_empty() {
        &settings.default_gps_comment
    } else {
        content
    }
}

impl fmt::Display for QstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Collaborators shared by every producer.
#[derive(Clone)]
pub struct ProducerContext {
    pub settings: Arc<Settings>,
    pub fetcher: Arc<dyn TextFetcher>,
    pub fixes: Arc<dyn FixProvider>,
    pub stations: Arc<dyn StationDirectory>,
}

impl ProducerContext {
    /// Production wiring: reqwest fetcher, configured static position and
    /// station list.
    pub fn from_config(config: &QstConfig) -> anyhow::Result<Self> {
        let settings = config.settings.clone();
        let fetcher = HttpFetcher::new(settings.http_timeout())?;
        Ok(Self {
            fixes: Arc::new(StaticFixProvider::from_settings(&settings)),
            stations: Arc::new(StaticStations::new(config.stations.clone())),
            fetcher: Arc::new(fetcher),
            settings: Arc::new(settings),
        })
    }
}

/// Remove markup tags, then decode HTML entities.
pub fn strip_markup(s: &str) -> String {
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?s)<[^>]*?>").unwrap());
    let stripped = re_tags.replace_all(s, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}

/// Keep at most `limit` characters.
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Keep at most `limit` bytes, cut back to a character boundary.
pub fn truncate_bytes(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// HTML entities that feeds routinely embed but XML does not define.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
