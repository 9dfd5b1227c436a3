/*
 *  weather.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  TODO:
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fmt::{self, Display};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveDate};
use flate2::read::GzDecoder;
use log::{error, info};
use reqwest::{header, Client};
use serde_json::{Error as JsonError, Value};
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::constants::{BULLET, FORECAST_DAYS, POLL_JITTER_SECS, WEATHER_PLACEHOLDER};
use crate::surface::{Region, SignSurface};
use crate::tasks::{jittered, TaskHandle};

// Custom error type for weather API operations.
#[derive(Debug)]
pub enum WeatherApiError {
    HttpRequestError(reqwest::Error),
    DeserializationError(JsonError),
    MissingData(String),
    InvalidInput(String),
}

impl Display for WeatherApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherApiError::HttpRequestError(e) => write!(f, "HTTP request error: {}", e),
            WeatherApiError::DeserializationError(e) => write!(f, "JSON deserialization error: {}", e),
            WeatherApiError::MissingData(msg) => write!(f, "Missing weather data: {}", msg),
            WeatherApiError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for WeatherApiError {}

impl From<reqwest::Error> for WeatherApiError {
    fn from(err: reqwest::Error) -> Self {
        WeatherApiError::HttpRequestError(err)
    }
}

impl From<JsonError> for WeatherApiError {
    fn from(err: JsonError) -> Self {
        WeatherApiError::DeserializationError(err)
    }
}

/// Icon glyph and label for one condition code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub glyph: &'static str,
    pub label: &'static str,
}

/// WMO condition-code groupings.
///
/// Exact codes for 0 and 3, small ranges for the rest; anything outside
/// the table gets the generic pair.
pub fn condition_from_code(code: i64) -> Condition {
    match code {
        0 => Condition { glyph: "☀️", label: "CLEAR" },
        1..=2 => Condition { glyph: "⛅", label: "PARTLY CLOUDY" },
        3 => Condition { glyph: "☁️", label: "OVERCAST" },
        45..=48 => Condition { glyph: "🌫️", label: "FOG" },
        51..=57 => Condition { glyph: "🌦️", label: "DRIZZLE" },
        61..=67 => Condition { glyph: "🌧️", label: "RAIN" },
        71..=77 => Condition { glyph: "🌨️", label: "SNOW" },
        80..=82 => Condition { glyph: "🌧️", label: "SHOWERS" },
        85..=86 => Condition { glyph: "🌨️", label: "SNOW SHOWERS" },
        95..=99 => Condition { glyph: "⛈️", label: "THUNDERSTORM" },
        _ => Condition { glyph: "🌡️", label: "N/A" },
    }
}

/// Per-day forecast icon, from precipitation and daily high.
///
/// Precedence: freezing precipitation, heavy rain (>= 5 mm), light rain,
/// clear.
pub fn daily_icon(precip_mm: f64, high_c: f64) -> &'static str {
    if high_c <= 0.0 && precip_mm > 0.0 {
        "❄️"
    } else if precip_mm >= 5.0 {
        "🌧️"
    } else if precip_mm > 0.0 {
        "🌦️"
    } else {
        "☀️"
    }
}

/// One day of the 7-day forecast strip.
#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub high_c: f64,
    pub low_c: f64,
    pub precip_mm: f64,
    pub icon: &'static str,
}

impl DayForecast {
    /// Ticker entry, e.g. "SAT 06/01 ☀️ 25°/14°".
    pub fn entry(&self) -> String {
        format!(
            "{} {} {} {}°/{}°",
            self.date.format("%a").to_string().to_uppercase(),
            self.date.format("%m/%d"),
            self.icon,
            self.high_c.round() as i64,
            self.low_c.round() as i64,
        )
    }
}

/// Instantaneous conditions shown in the current-conditions regions.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub feels_like_c: Option<f64>,
    pub humidity_pct: Option<i64>,
    pub wind_kmh: Option<f64>,
    pub code: i64,
}

/// Everything the rest of the sign needs from one weather cycle.
///
/// Replaced wholesale on success; on failure the ticker line degrades to
/// the placeholder while the last good current conditions stay put.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub current: Option<CurrentConditions>,
    pub days: Vec<DayForecast>,
    pub ticker_line: String,
    pub last_updated: DateTime<Local>,
}

impl Default for WeatherReport {
    fn default() -> Self {
        Self {
            current: None,
            days: Vec::new(),
            ticker_line: WEATHER_PLACEHOLDER.to_string(),
            last_updated: Local::now(),
        }
    }
}

impl WeatherReport {
    /// True once at least one fetch has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.current.is_some() || !self.days.is_empty()
    }
}

/// Parse a forecast body into current conditions and daily entries.
///
/// Tolerates the two historical current-conditions shapes: the `current`
/// object with `temperature_2m`/`weather_code`/`wind_speed_10m`, and the
/// legacy `current_weather` object with `temperature`/`weathercode`/
/// `windspeed`.
pub fn parse_forecast(body: &str) -> Result<(Option<CurrentConditions>, Vec<DayForecast>), WeatherApiError> {
    let the_json: Value = serde_json::from_str(body)?;

    let cur = the_json.get("current");
    let legacy = the_json.get("current_weather");

    let temp = cur
        .and_then(|c| c.get("temperature_2m"))
        .and_then(Value::as_f64)
        .or_else(|| legacy.and_then(|c| c.get("temperature")).and_then(Value::as_f64));
    let wind = cur
        .and_then(|c| c.get("wind_speed_10m"))
        .and_then(Value::as_f64)
        .or_else(|| legacy.and_then(|c| c.get("windspeed")).and_then(Value::as_f64));
    let code = cur
        .and_then(|c| c.get("weather_code"))
        .and_then(Value::as_i64)
        .or_else(|| legacy.and_then(|c| c.get("weathercode")).and_then(Value::as_i64));
    let feels = cur
        .and_then(|c| c.get("apparent_temperature"))
        .and_then(Value::as_f64);
    let humidity = cur
        .and_then(|c| c.get("relative_humidity_2m"))
        .and_then(Value::as_i64);

    let current = temp.map(|t| CurrentConditions {
        temp_c: t,
        feels_like_c: feels,
        humidity_pct: humidity,
        wind_kmh: wind,
        code: code.unwrap_or(-1),
    });

    let daily = the_json
        .get("daily")
        .ok_or_else(|| WeatherApiError::MissingData("daily".to_string()))?;
    let times = daily
        .get("time")
        .and_then(Value::as_array)
        .ok_or_else(|| WeatherApiError::MissingData("daily.time".to_string()))?;
    let highs = daily.get("temperature_2m_max").and_then(Value::as_array);
    let lows = daily.get("temperature_2m_min").and_then(Value::as_array);
    let rain = daily.get("precipitation_sum").and_then(Value::as_array);

    let mut days: Vec<DayForecast> = Vec::new();
    for (i, t) in times.iter().take(FORECAST_DAYS).enumerate() {
        let Some(date_str) = t.as_str() else { continue };
        let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else { continue };

        let high = highs.and_then(|a| a.get(i)).and_then(Value::as_f64).unwrap_or(0.0);
        let low = lows.and_then(|a| a.get(i)).and_then(Value::as_f64).unwrap_or(0.0);
        let precip = rain.and_then(|a| a.get(i)).and_then(Value::as_f64).unwrap_or(0.0);

        days.push(DayForecast {
            date,
            high_c: high,
            low_c: low,
            precip_mm: precip,
            icon: daily_icon(precip, high),
        });
    }

    if days.is_empty() {
        return Err(WeatherApiError::MissingData("daily entries".to_string()));
    }

    Ok((current, days))
}

/// Labelled forecast strip for the ticker, day entries joined with the
/// bullet separator.
pub fn compose_line(days: &[DayForecast]) -> String {
    let entries: Vec<String> = days.iter().map(DayForecast::entry).collect();
    format!("WEATHER: {}", entries.join(BULLET))
}

/// Meta line for the current-conditions region, e.g.
/// "PARTLY CLOUDY  FEELS 21°  HUM 55%  WIND 12 KM/H".
pub fn meta_line(cur: &CurrentConditions) -> String {
    let mut line = condition_from_code(cur.code).label.to_string();
    if let Some(feels) = cur.feels_like_c {
        line.push_str(&format!("  FEELS {}°", feels.round() as i64));
    }
    if let Some(hum) = cur.humidity_pct {
        line.push_str(&format!("  HUM {}%", hum));
    }
    if let Some(wind) = cur.wind_kmh {
        line.push_str(&format!("  WIND {} KM/H", wind.round() as i64));
    }
    line
}

// Main weather client
pub struct Weather {
    pub active: bool,
    base_url: String,
    lat: f64,
    lng: f64,
    timezone: String,
    refresh: Duration,
    client: Client,
    surface: Arc<dyn SignSurface>,
    pub report: WeatherReport,
    report_tx: Option<watch::Sender<WeatherReport>>,
    pub last_fetch_time: Option<Instant>, // track last fetched
}

impl Weather {
    /// Creates a new `Weather` instance from the merged config.
    pub fn new(cfg: &Config, surface: Arc<dyn SignSurface>) -> Result<Self, WeatherApiError> {
        const VERSION: &'static str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let loc = cfg
            .location
            .as_ref()
            .ok_or_else(|| WeatherApiError::InvalidInput("no location configured".to_string()))?;
        let lat = loc
            .latitude
            .ok_or_else(|| WeatherApiError::InvalidInput("latitude not set".to_string()))?;
        let lng = loc
            .longitude
            .ok_or_else(|| WeatherApiError::InvalidInput("longitude not set".to_string()))?;
        let timezone = loc.timezone.clone().unwrap_or_else(|| "auto".to_string());

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept-Encoding", header::HeaderValue::from_static("gzip"));
        // the sign must never render a stale cached forecast
        headers.insert("Cache-Control", header::HeaderValue::from_static("no-store"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(WeatherApiError::HttpRequestError)?;

        Ok(Weather {
            active: false,
            base_url: cfg.forecast_api_base(),
            lat,
            lng,
            timezone,
            refresh: cfg.weather_refresh(),
            client,
            surface,
            report: WeatherReport::default(),
            report_tx: None,
            last_fetch_time: None,
        })
    }

    async fn send_request(&self) -> Result<String, reqwest::Error> {
        let params = [
            ("latitude", self.lat.to_string()),
            ("longitude", self.lng.to_string()),
            (
                "current",
                "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m"
                    .to_string(),
            ),
            (
                "daily",
                "temperature_2m_max,temperature_2m_min,precipitation_sum".to_string(),
            ),
            ("forecast_days", FORECAST_DAYS.to_string()),
            ("timezone", self.timezone.clone()),
        ];

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;
        let raw = response.bytes().await?;

        // Try to decode as gzip first, fall back to plain text if it fails
        let plain = {
            let mut decoder = GzDecoder::new(&raw[..]);
            let mut decoded = String::new();
            match decoder.read_to_string(&mut decoded) {
                Ok(_) => decoded,
                Err(_) => String::from_utf8_lossy(&raw).to_string(),
            }
        };
        Ok(plain)
    }

    /// Apply one successful fetch body to the report.
    ///
    /// A body with daily data but no recognizable current shape keeps the
    /// previous current conditions; the forecast line always refreshes.
    pub fn ingest(&mut self, body: &str) -> Result<(), WeatherApiError> {
        let (current, days) = parse_forecast(body)?;
        if current.is_some() {
            self.report.current = current;
        }
        self.report.days = days;
        self.report.ticker_line = compose_line(&self.report.days);
        self.report.last_updated = Local::now();
        self.active = true;
        self.last_fetch_time = Some(Instant::now());
        Ok(())
    }

    /// Degrade the report after a failed cycle. The ticker-facing line is
    /// always overwritten; current conditions keep their last good value.
    pub fn apply_failure(&mut self) {
        self.report.ticker_line = WEATHER_PLACEHOLDER.to_string();
        self.report.last_updated = Local::now();
    }

    /// Fetches current conditions and the 7-day forecast.
    pub async fn fetch_weather_data(&mut self) -> Result<(), WeatherApiError> {
        info!("Fetching weather for {:.4}, {:.4}...", self.lat, self.lng);
        let body = self
            .send_request()
            .await
            .map_err(WeatherApiError::HttpRequestError)?;
        self.ingest(&body)?;
        info!("Weather data fetched successfully.");
        Ok(())
    }

    /// Write current conditions to their display regions.
    pub fn render_current(&self) {
        if let Some(cur) = &self.report.current {
            let cond = condition_from_code(cur.code);
            self.surface.set_text(Region::ConditionIcon, cond.glyph);
            self.surface
                .set_text(Region::ConditionTemp, &format!("{}°C", cur.temp_c.round() as i64));
            self.surface.set_text(Region::ConditionMeta, &meta_line(cur));
        }
    }

    /// The unavailability message always lands in the meta region, even
    /// when stale icon/temp values are left showing.
    pub fn render_failure(&self) {
        self.surface.set_text(Region::ConditionMeta, WEATHER_PLACEHOLDER);
    }

    fn publish(&self) {
        if let Some(tx) = &self.report_tx {
            let _ = tx.send(self.report.clone());
        }
    }

    /// One fetch-then-render cycle. Failures degrade, never propagate.
    pub async fn run_cycle(&mut self) {
        match self.fetch_weather_data().await {
            Ok(_) => self.render_current(),
            Err(e) => {
                error!("Weather fetch failed: {}", e);
                self.apply_failure();
                self.render_failure();
            }
        }
        self.publish();
    }

    /// Starts the background polling task with lock-free updates via a
    /// watch channel. Takes ownership of the instance; the returned
    /// handle is the only way to stop it.
    pub fn start_polling_with_watch(mut self) -> (TaskHandle, watch::Receiver<WeatherReport>) {
        let (report_tx, report_rx) = watch::channel(self.report.clone());
        self.report_tx = Some(report_tx);

        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let join = tokio::spawn(async move {
            self.run_cycle().await;
            loop {
                let sleep_for = jittered(self.refresh, Duration::from_secs(POLL_JITTER_SECS));
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => self.run_cycle().await,
                    _ = stop_rx.recv() => {
                        info!("Weather polling task received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        (TaskHandle::new("weather", join, stop_tx), report_rx)
    }
}
