//! Position fixes and their over-the-air encodings (NMEA GGA, APRS).
//!
//! The GPS receiver and the map/station database live outside this crate;
//! they are reached through [`FixProvider`] and [`StationDirectory`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::qst::truncate_chars;

/// Comments are limited to what fits in a GPS message field.
pub const COMMENT_LIMIT: usize = 20;

const METERS_TO_FEET: f64 = 3.280_839_9;

#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level.
    pub altitude: f64,
    /// Knots.
    pub speed: f64,
    /// Degrees true.
    pub direction: f64,
    pub satellites: u32,
    pub station: String,
    pub comment: String,
    pub valid: bool,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, station: &str) -> Self {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        Self {
            latitude,
            longitude,
            altitude: 0.0,
            speed: 0.0,
            direction: 0.0,
            satellites: 0,
            station: station.to_string(),
            comment: String::new(),
            valid,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.set_comment(comment);
        self
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = truncate_chars(comment, COMMENT_LIMIT);
    }

    /// `$GPGGA` sentence followed by the station/comment line.
    pub fn to_nmea_gga(&self, at: DateTime<Utc>) -> String {
        let data = format!(
            "GPGGA,{},{:08.3},{},{:09.3},{},1,{:02},0,{:.1},M,0.0,M,,",
            at.format("%H%M%S"),
            nmea_degrees(self.latitude),
            if self.latitude >= 0.0 { 'N' } else { 'S' },
            nmea_degrees(self.longitude),
            if self.longitude >= 0.0 { 'E' } else { 'W' },
            self.satellites,
            self.altitude,
        );
        format!(
            "${}*{:02X}\r\n{:<8.8},{:<20.20}\r\n",
            data,
            nmea_checksum(&data),
            self.station,
            self.comment
        )
    }

    /// APRS position report with timestamp, symbol, optional course/speed
    /// and altitude, then the comment.
    pub fn to_aprs(&self, at: DateTime<Utc>, symtab: char, symbol: char) -> String {
        let station = self.station.trim().replace(' ', "-");
        let mut s = format!("{station}>APRATS,DSTAR*:/{}h", at.format("%H%M%S"));
        s.push_str(&format!(
            "{:07.2}{}{}{:08.2}{}{}",
            nmea_degrees(self.latitude),
            if self.latitude >= 0.0 { 'N' } else { 'S' },
            symtab,
            nmea_degrees(self.longitude),
            if self.longitude >= 0.0 { 'E' } else { 'W' },
            symbol,
        ));
        if self.speed > 0.0 && self.direction > 0.0 {
            s.push_str(&format!("{:03.0}/{:03.0}", self.direction, self.speed));
        }
        if self.altitude > 0.0 {
            s.push_str(&format!(
                "/A={:06}",
                (self.altitude * METERS_TO_FEET).round() as i64
            ));
        }
        s.push_str(&self.comment);
        s.push('\r');
        s
    }
}

/// Decimal degrees to NMEA `DDDMM.mmm` (sign dropped).
fn nmea_degrees(value: f64) -> f64 {
    let v = value.abs();
    let deg = v.trunc();
    deg * 100.0 + (v - deg) * 60.0
}

/// XOR of every byte between `$` and `*`.
pub fn nmea_checksum(data: &str) -> u8 {
    data.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Source of the station's own position.
pub trait FixProvider: Send + Sync {
    fn current_fix(&self) -> Option<Fix>;
}

/// Fixed position taken from settings; used when no receiver is attached.
pub struct StaticFixProvider {
    fix: Option<Fix>,
}

impl StaticFixProvider {
    pub fn new(fix: Option<Fix>) -> Self {
        Self { fix }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let fix = match (settings.latitude, settings.longitude) {
            (Some(lat), Some(lon)) => {
                let mut fix = Fix::new(lat, lon, &settings.callsign);
                fix.altitude = settings.altitude;
                Some(fix)
            }
            _ => None,
        };
        Self { fix }
    }
}

impl FixProvider for StaticFixProvider {
    fn current_fix(&self) -> Option<Fix> {
        self.fix.clone()
    }
}

/// Named point in a station group (map source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationPoint {
    pub group: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub trait StationDirectory: Send + Sync {
    fn has_group(&self, group: &str) -> bool;
    fn find(&self, group: &str, station: &str) -> Option<StationPoint>;
}

/// Station list loaded from `[[stations]]` in the config.
pub struct StaticStations {
    points: Vec<StationPoint>,
}

impl StaticStations {
    pub fn new(points: Vec<StationPoint>) -> Self {
        Self { points }
    }
}

impl StationDirectory for StaticStations {
    fn has_group(&self, group: &str) -> bool {
        self.points.iter().any(|p| p.group == group)
    }

    fn find(&self, group: &str, station: &str) -> Option<StationPoint> {
        self.points
            .iter()
            .find(|p| p.group == group && p.name == station)
            .cloned()
    }
}
