// src/config/settings.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::qst::producers::position::PositionFormat;

fn default_size_limit() -> usize {
    2048
}
fn default_owuri() -> String {
    "http://api.openweathermap.org/data/2.5/".to_string()
}
fn default_symtab() -> String {
    "/".to_string()
}
fn default_symbol() -> String {
    ">".to_string()
}
fn default_gps_comment() -> String {
    "ON D-RATS".to_string()
}
fn default_http_timeout() -> u64 {
    15
}

/// Station-wide `[settings]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub callsign: String,
    /// Max bytes taken from file and command output (cut on a character boundary).
    #[serde(default = "default_size_limit")]
    pub qst_size_limit: usize,
    #[serde(default = "default_owuri")]
    pub qst_owuri: String,
    /// "ENV" means: read from OPENWEATHER_APPID.
    #[serde(default)]
    pub qst_owappid: String,
    #[serde(default = "default_symtab")]
    pub aprssymtab: String,
    #[serde(default = "default_symbol")]
    pub aprssymbol: String,
    #[serde(default = "default_gps_comment")]
    pub default_gps_comment: String,
    /// Static position used when no GPS receiver is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Meters.
    #[serde(default)]
    pub altitude: f64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            callsign: String::new(),
            qst_size_limit: default_size_limit(),
            qst_owuri: default_owuri(),
            qst_owappid: String::new(),
            aprssymtab: default_symtab(),
            aprssymbol: default_symbol(),
            default_gps_comment: default_gps_comment(),
            latitude: None,
            longitude: None,
            altitude: 0.0,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl Settings {
    /// Fix up values that would make producers misbehave.
    pub(crate) fn sanitize(&mut self) {
        self.callsign = self.callsign.trim().to_ascii_uppercase();

        if self.qst_owappid.trim().eq_ignore_ascii_case("env") {
            self.qst_owappid = std::env::var("OPENWEATHER_APPID").unwrap_or_else(|_| {
                tracing::warn!("qst_owappid = \"ENV\" but OPENWEATHER_APPID is not set");
                String::new()
            });
        }

        if self.aprssymtab.chars().count() != 1 {
            self.aprssymtab = default_symtab();
        }
        if self.aprssymbol.chars().count() != 1 {
            self.aprssymbol = default_symbol();
        }
        if self.http_timeout_secs == 0 {
            self.http_timeout_secs = default_http_timeout();
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn aprs_format(&self) -> PositionFormat {
        PositionFormat::Aprs {
            symtab: self.aprssymtab.chars().next().unwrap_or('/'),
            symbol: self.aprssymbol.chars().next().unwrap_or('>'),
        }
    }
}
