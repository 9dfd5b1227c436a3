/*
 *  config.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Layered configuration: defaults, then YAML file, then CLI overrides.
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

use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::{Path, PathBuf}};

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;
use crate::headlines::FeedSpec;
use crate::ticker::TickerStyle;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. All fields optional so layers stack.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    pub location: Option<LocationConfig>,
    pub weather: Option<WeatherConfig>,
    pub headlines: Option<HeadlinesConfig>,
    pub ticker: Option<TickerConfig>,
    pub promo: Option<PromoConfig>,
    /// Local hour (0-23) of the daily full restart.
    pub reload_hour: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// IANA timezone id passed to the forecast API, e.g. "America/Toronto".
    pub timezone: Option<String>,
    /// Free-form label shown in the location region.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherConfig {
    pub refresh_secs: Option<u64>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HeadlinesConfig {
    pub refresh_secs: Option<u64>,
    /// Titles kept per feed (6-10 reads well on a storefront ticker).
    pub item_cap: Option<usize>,
    pub feeds: Option<Vec<FeedSpec>>,
    pub reader_base: Option<String>,
    pub relay_base: Option<String>,
    pub rss2json_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TickerConfig {
    pub min_chars: Option<usize>,
    pub refresh_secs: Option<u64>,
    pub style: Option<TickerStyle>,
    /// Duration of one full scroll pass, used as the mode hold in
    /// alternate style.
    pub scroll_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromoConfig {
    pub interval_secs: Option<u64>,
    pub candidates: Option<Vec<String>>,
    /// Extra candidates keyed by 3-letter uppercase weekday ("MON").
    pub day_candidates: Option<HashMap<String, Vec<String>>>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "vitrine", about = "Vitrine storefront signage", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub latitude: Option<f64>,
    #[arg(long)]
    pub longitude: Option<f64>,
    #[arg(long)]
    pub timezone: Option<String>,
    #[arg(long)]
    pub reload_hour: Option<u32>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    load_with_cli(cli)
}

pub fn load_with_cli(cli: Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli);

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/vitrine/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/vitrine/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/vitrine.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["vitrine.yaml", "config.yaml", "config/vitrine.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, section by section.
pub fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()   { dst.log_level = src.log_level; }
    if src.reload_hour.is_some() { dst.reload_hour = src.reload_hour; }
    if src.location.is_some()    { dst.location = src.location; }
    if src.weather.is_some()     { dst.weather = src.weather; }
    if src.headlines.is_some()   { dst.headlines = src.headlines; }
    if src.ticker.is_some()      { dst.ticker = src.ticker; }
    if src.promo.is_some()       { dst.promo = src.promo; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()   { cfg.log_level = cli.log_level.clone(); }
    if cli.reload_hour.is_some() { cfg.reload_hour = cli.reload_hour; }

    let any_loc = cli.latitude.is_some() || cli.longitude.is_some() || cli.timezone.is_some();
    if any_loc && cfg.location.is_none() {
        cfg.location = Some(LocationConfig::default());
    }
    if let Some(loc) = cfg.location.as_mut() {
        if cli.latitude.is_some()  { loc.latitude = cli.latitude; }
        if cli.longitude.is_some() { loc.longitude = cli.longitude; }
        if cli.timezone.is_some()  { loc.timezone = cli.timezone.clone(); }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(loc) = cfg.location.as_ref() {
        if let Some(lat) = loc.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ConfigError::Validation("latitude must be -90..=90".into()));
            }
        }
        if let Some(lng) = loc.longitude {
            if !(-180.0..=180.0).contains(&lng) {
                return Err(ConfigError::Validation("longitude must be -180..=180".into()));
            }
        }
    }
    if let Some(hour) = cfg.reload_hour {
        if hour > 23 {
            return Err(ConfigError::Validation("reload_hour must be 0..=23".into()));
        }
    }
    if let Some(ticker) = cfg.ticker.as_ref() {
        if let Some(min) = ticker.min_chars {
            if min == 0 || min > 10_000 {
                return Err(ConfigError::Validation("ticker min_chars must be 1..=10000".into()));
            }
        }
        if ticker.refresh_secs == Some(0) {
            return Err(ConfigError::Validation("ticker refresh_secs must be > 0".into()));
        }
    }
    if let Some(weather) = cfg.weather.as_ref() {
        if weather.refresh_secs == Some(0) {
            return Err(ConfigError::Validation("weather refresh_secs must be > 0".into()));
        }
    }
    if let Some(headlines) = cfg.headlines.as_ref() {
        if headlines.refresh_secs == Some(0) {
            return Err(ConfigError::Validation("headlines refresh_secs must be > 0".into()));
        }
    }
    if let Some(promo) = cfg.promo.as_ref() {
        if promo.interval_secs == Some(0) {
            return Err(ConfigError::Validation("promo interval_secs must be > 0".into()));
        }
    }
    Ok(())
}

// Resolved accessors: the component code reads these instead of chasing
// Options through the section structs.
impl Config {
    pub fn weather_refresh(&self) -> Duration {
        let secs = self
            .weather
            .as_ref()
            .and_then(|w| w.refresh_secs)
            .unwrap_or(constants::WEATHER_REFRESH_SECS);
        Duration::from_secs(secs)
    }

    pub fn forecast_api_base(&self) -> String {
        self.weather
            .as_ref()
            .and_then(|w| w.api_base.clone())
            .unwrap_or_else(|| constants::FORECAST_API_BASE.to_string())
    }

    pub fn headline_refresh(&self) -> Duration {
        let secs = self
            .headlines
            .as_ref()
            .and_then(|h| h.refresh_secs)
            .unwrap_or(constants::HEADLINE_REFRESH_SECS);
        Duration::from_secs(secs)
    }

    pub fn headline_feeds(&self) -> Vec<FeedSpec> {
        self.headlines
            .as_ref()
            .and_then(|h| h.feeds.clone())
            .unwrap_or_default()
    }

    pub fn headline_item_cap(&self) -> usize {
        self.headlines
            .as_ref()
            .and_then(|h| h.item_cap)
            .unwrap_or(constants::HEADLINE_ITEM_CAP)
    }

    pub fn ticker_min_chars(&self) -> usize {
        self.ticker
            .as_ref()
            .and_then(|t| t.min_chars)
            .unwrap_or(constants::TICKER_MIN_CHARS)
    }

    pub fn ticker_refresh(&self) -> Duration {
        let secs = self
            .ticker
            .as_ref()
            .and_then(|t| t.refresh_secs)
            .unwrap_or(constants::TICKER_REFRESH_SECS);
        Duration::from_secs(secs)
    }

    pub fn ticker_style(&self) -> TickerStyle {
        self.ticker
            .as_ref()
            .and_then(|t| t.style)
            .unwrap_or(TickerStyle::Combined)
    }

    pub fn scroll_secs(&self) -> u64 {
        self.ticker
            .as_ref()
            .and_then(|t| t.scroll_secs)
            .unwrap_or(constants::MIN_MODE_HOLD_SECS)
    }

    pub fn promo_interval(&self) -> Duration {
        let secs = self
            .promo
            .as_ref()
            .and_then(|p| p.interval_secs)
            .unwrap_or(constants::PROMO_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    pub fn promo_candidates(&self) -> Vec<String> {
        self.promo
            .as_ref()
            .and_then(|p| p.candidates.clone())
            .unwrap_or_default()
    }

    pub fn promo_day_candidates(&self) -> HashMap<String, Vec<String>> {
        self.promo
            .as_ref()
            .and_then(|p| p.day_candidates.clone())
            .unwrap_or_default()
    }

    pub fn reload_hour(&self) -> u32 {
        self.reload_hour.unwrap_or(constants::RELOAD_HOUR)
    }
}
