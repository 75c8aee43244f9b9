// src/config/mod.rs
pub mod settings;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::QstError;
use crate::position::StationPoint;

pub use settings::Settings;

pub const ENV_CONFIG_PATH: &str = "QST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/qst.toml";

fn default_freq() -> String {
    "60".to_string()
}
fn default_port() -> String {
    "all".to_string()
}
fn default_enabled() -> bool {
    true
}

/// One `[qst.<ident>]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QstEntry {
    /// Producer kind name, e.g. "Text", "RSS", "OpenWeather".
    #[serde(rename = "type")]
    pub kind: String,
    /// Minutes between fires, or ":MM" for a minute of every hour.
    #[serde(default = "default_freq")]
    pub freq: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl QstEntry {
    pub fn port(&self) -> QstPort {
        QstPort::parse(&self.port)
    }
}

/// Where a fired QST is queued for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QstPort {
    All,
    Current,
    Named(String),
}

impl QstPort {
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("all") {
            QstPort::All
        } else if t.eq_ignore_ascii_case("current") {
            QstPort::Current
        } else {
            QstPort::Named(t.to_string())
        }
    }
}

impl fmt::Display for QstPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QstPort::All => f.write_str("all"),
            QstPort::Current => f.write_str("current"),
            QstPort::Named(p) => f.write_str(p),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QstConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub qst: BTreeMap<String, QstEntry>,
    #[serde(default)]
    pub stations: Vec<StationPoint>,
}

impl QstConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: QstConfig = toml::from_str(s).context("parsing qst config toml")?;
        cfg.settings.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading qst config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using explicit path, then env var, then fallback:
    /// 1) `explicit` (must exist)
    /// 2) $QST_CONFIG_PATH (must exist)
    /// 3) config/qst.toml (optional; empty config when absent)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        tracing::info!("no qst config found; starting with no entries");
        Ok(Self::default())
    }

    pub fn entry(&self, ident: &str) -> Result<&QstEntry, QstError> {
        self.qst
            .get(ident)
            .ok_or_else(|| QstError::UnknownEntry(ident.to_string()))
    }

    /// Insert or replace an entry. New entries start enabled; an existing
    /// entry keeps its enabled flag.
    pub fn upsert(&mut self, ident: &str, mut entry: QstEntry) {
        entry.enabled = self.qst.get(ident).map_or(true, |old| old.enabled);
        self.qst.insert(ident.to_string(), entry);
    }

    pub fn remove(&mut self, ident: &str) -> Option<QstEntry> {
        self.qst.remove(ident)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self).context("serializing qst config")?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating config dir {}", dir.display()))?;
        }
        fs::write(path, s).with_context(|| format!("writing qst config to {}", path.display()))
    }

    /// Enabled entries in ident order.
    pub fn enabled_entries(&self) -> impl Iterator<Item = (&String, &QstEntry)> {
        self.qst.iter().filter(|(_, e)| e.enabled)
    }
}
