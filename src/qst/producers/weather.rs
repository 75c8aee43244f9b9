use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::qst::net::TextFetcher;
use crate::qst::types::Producer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherMode {
    Current,
    Forecast,
}

impl WeatherMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Some(WeatherMode::Current),
            "forecast" => Some(WeatherMode::Forecast),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct Readings {
    /// Kelvin.
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    /// hPa.
    pub pressure: f64,
}

#[derive(Debug, Deserialize)]
pub struct Wind {
    /// Meters per second.
    pub speed: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sys {
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrentWeather {
    pub name: String,
    #[serde(default)]
    pub sys: Sys,
    pub coord: Coord,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub main: Readings,
    pub wind: Wind,
}

#[derive(Debug, Deserialize)]
pub struct City {
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub coord: Coord,
}

#[derive(Debug, Deserialize)]
pub struct ForecastItem {
    pub dt_txt: String,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub main: Readings,
    pub wind: Wind,
}

#[derive(Debug, Deserialize)]
pub struct Forecast {
    pub city: City,
    #[serde(default)]
    pub list: Vec<ForecastItem>,
}

fn celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

fn fahrenheit(kelvin: f64) -> f64 {
    kelvin * 9.0 / 5.0 - 459.67
}

fn kmh(meters_per_sec: f64) -> f64 {
    meters_per_sec * 3.6
}

fn temp(kelvin: f64) -> String {
    format!("{:.2} C ({:.2} F)", celsius(kelvin), fahrenheit(kelvin))
}

fn conditions(weather: &[Condition]) -> &str {
    weather
        .first()
        .map(|c| c.description.as_str())
        .unwrap_or("unknown")
}

pub fn format_current(w: &CurrentWeather) -> String {
    let mut s = format!(
        "\nCurrent weather at {} - {} lat: {} Lon: {}\n",
        w.name, w.sys.country, w.coord.lat, w.coord.lon
    );
    s.push_str(&format!("Conditions: {}\n", conditions(&w.weather)));
    s.push_str(&format!("Current Temperature: {}\n", temp(w.main.temp)));
    s.push_str(&format!("Minimum Temperature: {}\n", temp(w.main.temp_min)));
    s.push_str(&format!("Maximum Temperature: {}\n", temp(w.main.temp_max)));
    s.push_str(&format!("Humidity: {:.0} %\n", w.main.humidity));
    s.push_str(&format!("Pressure: {:.0} hpa\n", w.main.pressure));
    s.push_str(&format!("Wind Speed: {:.2} km/hr\n", kmh(w.wind.speed)));
    s
}

/// `2018-04-15 06:00:00` into (`15/04/2018`, 6).
fn split_slot(dt_txt: &str) -> Option<(String, u32)> {
    let (date, time) = dt_txt.trim().split_once(' ')?;
    let mut parts = date.split('-');
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    let hour = time.get(..2)?.parse().ok()?;
    Some((format!("{d}/{m}/{y}"), hour))
}

fn twelve_hour(hour: u32) -> (u32, &'static str) {
    match hour {
        0 => (12, "AM"),
        1..=11 => (hour, "AM"),
        12 => (12, "PM"),
        h => (h - 12, "PM"),
    }
}

pub fn format_forecast(f: &Forecast) -> String {
    let mut s = format!(
        "\nForecast weather for {} - {} lat: {} Lon: {}\n",
        f.city.name, f.city.country, f.city.coord.lat, f.city.coord.lon
    );

    let mut current_date = String::new();
    for item in &f.list {
        let Some((date, hour)) = split_slot(&item.dt_txt) else {
            tracing::debug!(dt_txt = %item.dt_txt, "skipping forecast slot");
            continue;
        };
        if date != current_date {
            s.push_str(&format!("\n{date}"));
            current_date = date;
        }
        let (h, meridiem) = twelve_hour(hour);
        s.push_str(&format!(
            "\n{h}:00 {meridiem} Weather condition: {}\n",
            conditions(&item.weather)
        ));
        s.push_str(&format!("Avg Temp: {}\n", temp(item.main.temp)));
        s.push_str(&format!("Min Temp: {}\n", temp(item.main.temp_min)));
        s.push_str(&format!("Max Temp: {}\n", temp(item.main.temp_max)));
        s.push_str(&format!(
            "Humidity: {:.0} %  Pressure: {:.0} hpa  Wind Speed: {:.2} km/hr\n",
            item.main.humidity,
            item.main.pressure,
            kmh(item.wind.speed)
        ));
    }
    s
}

/// OpenWeather signals errors in-band; `cod` is a string or a number
/// depending on the endpoint.
fn is_not_found(v: &Value) -> bool {
    match v.get("cod") {
        Some(Value::String(s)) => s.trim() == "404",
        Some(Value::Number(n)) => n.as_u64() == Some(404),
        _ => false,
    }
}

pub fn build_url(base: &str, mode: WeatherMode, location: &str, app_id: &str) -> Result<Url> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let url = match mode {
        WeatherMode::Current => {
            Url::parse_with_params(&format!("{base}weather"), &[("q", location), ("appid", app_id)])
        }
        WeatherMode::Forecast => Url::parse_with_params(
            &format!("{base}forecast"),
            &[("q", location), ("appid", app_id), ("mode", "json")],
        ),
    };
    url.with_context(|| format!("invalid OpenWeather base URI {base}"))
}

/// OpenWeather report for `"<Current|Forecast>/<location>"`.
pub struct OpenWeatherProducer {
    spec: String,
    base_uri: String,
    app_id: String,
    fetcher: Arc<dyn TextFetcher>,
}

impl OpenWeatherProducer {
    pub fn new(spec: &str, base_uri: &str, app_id: &str, fetcher: Arc<dyn TextFetcher>) -> Self {
        Self {
            spec: spec.to_string(),
            base_uri: base_uri.to_string(),
            app_id: app_id.to_string(),
            fetcher,
        }
    }
}

#[async_trait]
impl Producer for OpenWeatherProducer {
    async fn produce(&self) -> Result<Option<String>> {
        let Some((mode, location)) = self.spec.split_once('/') else {
            tracing::warn!(spec = %self.spec, "Unable to split weather QST");
            return Ok(None);
        };
        let Some(mode) = WeatherMode::parse(mode) else {
            tracing::warn!(mode, "Unknown weather type");
            return Ok(None);
        };
        let location = location.trim();

        let url = build_url(&self.base_uri, mode, location, &self.app_id)?;
        let fetched = self.fetcher.fetch(url.as_str()).await?;
        let json: Value =
            serde_json::from_str(&fetched.body).context("parsing OpenWeather response")?;

        if is_not_found(&json) {
            tracing::info!(location, "weather: city not found");
            return Ok(None);
        }

        let report = match mode {
            WeatherMode::Current => {
                let w: CurrentWeather =
                    serde_json::from_value(json).context("unexpected current-weather json")?;
                format_current(&w)
            }
            WeatherMode::Forecast => {
                let f: Forecast =
                    serde_json::from_value(json).context("unexpected forecast json")?;
                format_forecast(&f)
            }
        };
        tracing::debug!(location, bytes = report.len(), "weather report ready");
        Ok(Some(report))
    }

    fn name(&self) -> &'static str {
        "OpenWeather"
    }
}
