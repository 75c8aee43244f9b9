use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::position::{Fix, FixProvider, StationDirectory};
use crate::qst::types::Producer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFormat {
    Nmea,
    Aprs { symtab: char, symbol: char },
}

impl PositionFormat {
    fn encode(self, fix: &Fix) -> String {
        match self {
            PositionFormat::Nmea => fix.to_nmea_gga(Utc::now()),
            PositionFormat::Aprs { symtab, symbol } => fix.to_aprs(Utc::now(), symtab, symbol),
        }
    }
}

/// Own-position report (GPS / GPS-A kinds).
pub struct GpsProducer {
    message: String,
    format: PositionFormat,
    fixes: Arc<dyn FixProvider>,
}

impl GpsProducer {
    pub fn new(message: &str, format: PositionFormat, fixes: Arc<dyn FixProvider>) -> Self {
        Self {
            message: message.to_string(),
            format,
            fixes,
        }
    }
}

#[async_trait]
impl Producer for GpsProducer {
    async fn produce(&self) -> Result<Option<String>> {
        let Some(mut fix) = self.fixes.current_fix() else {
            tracing::debug!("no position fix available");
            return Ok(None);
        };

        // APRS messages of the form `group::station` keep the fix comment.
        let keep_comment =
            matches!(self.format, PositionFormat::Aprs { .. }) && self.message.contains("::");
        if !keep_comment {
            fix.set_comment(&self.message);
        }

        if !fix.valid {
            tracing::debug!(station = %fix.station, "position fix not valid");
            return Ok(None);
        }
        Ok(Some(self.format.encode(&fix)))
    }

    fn name(&self) -> &'static str {
        match self.format {
            PositionFormat::Nmea => "GPS",
            PositionFormat::Aprs { .. } => "GPS-A",
        }
    }
}

/// Position of a named station, relayed "VIA" our callsign.
pub struct StationProducer {
    target: String,
    callsign: String,
    format: PositionFormat,
    stations: Arc<dyn StationDirectory>,
}

impl StationProducer {
    pub fn new(
        target: &str,
        callsign: &str,
        format: PositionFormat,
        stations: Arc<dyn StationDirectory>,
    ) -> Self {
        Self {
            target: target.to_string(),
            callsign: callsign.to_string(),
            format,
            stations,
        }
    }
}

#[async_trait]
impl Producer for StationProducer {
    async fn produce(&self) -> Result<Option<String>> {
        let Some((group, station)) = self.target.split_once("::") else {
            tracing::warn!(target = %self.target, "station QST must be `group::station`");
            return Ok(None);
        };

        if !self.stations.has_group(group) {
            tracing::warn!(group, "Unknown station group");
            return Ok(None);
        }
        let Some(point) = self.stations.find(group, station) else {
            tracing::warn!(group, station, "Unknown station in group");
            return Ok(None);
        };

        let fix = Fix::new(point.latitude, point.longitude, &point.name)
            .with_comment(&format!("VIA {}", self.callsign));
        if !fix.valid {
            return Ok(None);
        }

        tracing::info!(group, station, "Sending station position");
        Ok(Some(self.format.encode(&fix)))
    }

    fn name(&self) -> &'static str {
        "Station"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{StaticFixProvider, StaticStations, StationPoint};

    fn aprs() -> PositionFormat {
        PositionFormat::Aprs {
            symtab: '/',
            symbol: '>',
        }
    }

    #[tokio::test]
    async fn gps_without_fix_yields_nothing() {
        let p = GpsProducer::new("hi", PositionFormat::Nmea, Arc::new(StaticFixProvider::new(None)));
        assert_eq!(p.produce().await.unwrap(), None);
    }

    #[tokio::test]
    async fn gps_sets_comment_from_message() {
        let fixes = Arc::new(StaticFixProvider::new(Some(Fix::new(45.0, -122.0, "N0CALL"))));
        let p = GpsProducer::new("ON D-RATS", PositionFormat::Nmea, fixes);
        let out = p.produce().await.unwrap().unwrap();
        assert!(out.starts_with("$GPGGA,"));
        assert!(out.contains("N0CALL  ,ON D-RATS"));
    }

    #[tokio::test]
    async fn gps_a_keeps_comment_for_station_style_message() {
        let fix = Fix::new(45.0, -122.0, "N0CALL").with_comment("orig");
        let fixes = Arc::new(StaticFixProvider::new(Some(fix)));
        let p = GpsProducer::new("grp::stn", aprs(), fixes);
        let out = p.produce().await.unwrap().unwrap();
        assert!(out.ends_with("orig\r"));
    }

    #[tokio::test]
    async fn invalid_fix_yields_nothing() {
        let fixes = Arc::new(StaticFixProvider::new(Some(Fix::new(99.0, 0.0, "N0CALL"))));
        let p = GpsProducer::new("x", aprs(), fixes);
        assert_eq!(p.produce().await.unwrap(), None);
    }

    #[tokio::test]
    async fn station_lookup_paths() {
        let dir = Arc::new(StaticStations::new(vec![StationPoint {
            group: "Local".into(),
            name: "W1AW".into(),
            latitude: 41.5,
            longitude: -72.75,
        }]));
        let ok = StationProducer::new("Local::W1AW", "N0CALL", aprs(), dir.clone());
        let out = ok.produce().await.unwrap().unwrap();
        assert!(out.starts_with("W1AW>APRATS,DSTAR*:/"));
        assert!(out.ends_with("VIA N0CALL\r"));

        for bad in ["Local", "Nope::W1AW", "Local::K1ABC"] {
            let p = StationProducer::new(bad, "N0CALL", aprs(), dir.clone());
            assert_eq!(p.produce().await.unwrap(), None, "{bad}");
        }
    }
}
