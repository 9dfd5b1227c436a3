/*
 *  headlines.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Headline feeds: fetch titles through an ordered proxy chain, tag them
 *  with a category glyph, compose one ticker line per feed.
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

use std::time::Duration;

use log::{error, info};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::constants::{self, BULLET, POLL_JITTER_SECS};
use crate::fallback::{first_success, Attempt, FetchError};
use crate::tasks::{jittered, TaskHandle};

/// Which glyph family a feed's titles get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Sports,
    Local,
    World,
}

/// One configured headline feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSpec {
    pub url: String,
    /// Label prefixed to the feed's ticker line, e.g. "SPORTS".
    pub category: String,
    pub kind: FeedKind,
}

// Sports keyword table: first category whose keyword matches wins.
const SPORT_TAGS: &[(&str, &[&str])] = &[
    ("🏒", &["hockey", "nhl"]),
    ("🏀", &["basketball", "nba"]),
    ("⚾", &["baseball", "mlb"]),
    ("🏈", &["football", "nfl", "cfl"]),
    ("⚽", &["soccer", "mls", "fifa"]),
];
const SPORT_DEFAULT: &str = "📰";
const LOCAL_GLYPH: &str = "📍";
const WORLD_GLYPH: &str = "🌍";

/// Glyph for one sports title, by ordered keyword match.
pub fn classify_sports(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    for (glyph, keywords) in SPORT_TAGS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return glyph;
        }
    }
    SPORT_DEFAULT
}

/// Prefix each title with its category glyph.
pub fn tag_titles(kind: FeedKind, titles: &[String]) -> Vec<String> {
    titles
        .iter()
        .map(|t| {
            let glyph = match kind {
                FeedKind::Sports => classify_sports(t),
                FeedKind::Local => LOCAL_GLYPH,
                FeedKind::World => WORLD_GLYPH,
            };
            format!("{} {}", glyph, t)
        })
        .collect()
}

/// One feed's ticker line, e.g. "SPORTS: 🏒 title   •   🏀 title".
pub fn feed_line(category: &str, tagged: &[String]) -> String {
    format!("{}: {}", category.to_uppercase(), tagged.join(BULLET))
}

pub fn unavailable_line(category: &str) -> String {
    format!("{}: UNAVAILABLE", category.to_uppercase())
}

/// Extract up to `cap` non-empty titles from an RSS/XML body.
pub fn titles_from_xml(body: &str, cap: usize) -> Result<Vec<String>, FetchError> {
    let channel = rss::Channel::read_from(body.as_bytes())
        .map_err(|e| FetchError::Parse(e.to_string()))?;
    let titles: Vec<String> = channel
        .items()
        .iter()
        .filter_map(|item| item.title())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(cap)
        .map(String::from)
        .collect();
    if titles.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(titles)
}

/// Extract up to `cap` non-empty titles from an RSS→JSON converter body
/// (`{"items": [{"title": ...}]}`).
pub fn titles_from_rss2json(body: &str, cap: usize) -> Result<Vec<String>, FetchError> {
    let json: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    let items = json
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Parse("no items array".to_string()))?;
    let titles: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("title").and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .take(cap)
        .map(String::from)
        .collect();
    if titles.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(titles)
}

/// Upstream proxy bases, overridable from config.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub reader_base: String,
    pub relay_base: String,
    pub rss2json_base: String,
}

impl Endpoints {
    pub fn from_config(cfg: &Config) -> Self {
        let section = cfg.headlines.as_ref();
        Self {
            reader_base: section
                .and_then(|h| h.reader_base.clone())
                .unwrap_or_else(|| constants::READER_PROXY_BASE.to_string()),
            relay_base: section
                .and_then(|h| h.relay_base.clone())
                .unwrap_or_else(|| constants::RELAY_PROXY_BASE.to_string()),
            rss2json_base: section
                .and_then(|h| h.rss2json_base.clone())
                .unwrap_or_else(|| constants::RSS2JSON_BASE.to_string()),
        }
    }
}

// Strategy 1: read-through text-extraction proxy; body is the feed XML.
async fn via_reader(
    client: Client,
    base: String,
    feed_url: String,
    cap: usize,
) -> Result<Vec<String>, FetchError> {
    let url = format!("{}{}", base, feed_url);
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }
    let body = response.text().await?;
    titles_from_xml(&body, cap)
}

// Strategy 2: CORS relay returning `{"contents": "<xml>"}`.
async fn via_relay(
    client: Client,
    base: String,
    feed_url: String,
    cap: usize,
) -> Result<Vec<String>, FetchError> {
    let response = client.get(&base).query(&[("url", feed_url)]).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }
    let json: Value = response.json().await?;
    let contents = json
        .get("contents")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::Parse("relay response has no contents".to_string()))?;
    titles_from_xml(contents, cap)
}

// Strategy 3: RSS→JSON converter.
async fn via_rss2json(
    client: Client,
    base: String,
    feed_url: String,
    cap: usize,
) -> Result<Vec<String>, FetchError> {
    let response = client
        .get(&base)
        .query(&[("rss_url", feed_url)])
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }
    let body = response.text().await?;
    titles_from_rss2json(&body, cap)
}

/// Titles for one feed via the ordered proxy chain.
pub async fn fetch_feed_titles(
    client: &Client,
    endpoints: &Endpoints,
    feed: &FeedSpec,
    cap: usize,
) -> Result<Vec<String>, FetchError> {
    let attempts: Vec<(&'static str, Attempt<Vec<String>>)> = vec![
        (
            "reader",
            Box::pin(via_reader(
                client.clone(),
                endpoints.reader_base.clone(),
                feed.url.clone(),
                cap,
            )),
        ),
        (
            "relay",
            Box::pin(via_relay(
                client.clone(),
                endpoints.relay_base.clone(),
                feed.url.clone(),
                cap,
            )),
        ),
        (
            "rss2json",
            Box::pin(via_rss2json(
                client.clone(),
                endpoints.rss2json_base.clone(),
                feed.url.clone(),
                cap,
            )),
        ),
    ];
    first_success(&feed.category, attempts).await
}

/// Outcome of one feed's last cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedStatus {
    pub category: String,
    pub kind: FeedKind,
    pub line: String,
    /// True if this feed has ever produced titles this session.
    pub ok: bool,
}

/// Latest composed lines for all configured feeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlineBundle {
    pub feeds: Vec<FeedStatus>,
}

impl HeadlineBundle {
    pub fn ticker_segments(&self) -> Vec<&str> {
        self.feeds.iter().map(|f| f.line.as_str()).collect()
    }

    pub fn sports(&self) -> Option<&FeedStatus> {
        self.feeds.iter().find(|f| f.kind == FeedKind::Sports)
    }

    pub fn sports_loaded(&self) -> bool {
        self.sports().map_or(false, |f| f.ok)
    }
}

/// Headline polling client.
pub struct Headlines {
    feeds: Vec<FeedSpec>,
    endpoints: Endpoints,
    cap: usize,
    refresh: Duration,
    client: Client,
    pub bundle: HeadlineBundle,
    bundle_tx: Option<watch::Sender<HeadlineBundle>>,
}

impl Headlines {
    pub fn new(cfg: &Config) -> Result<Self, FetchError> {
        const VERSION: &'static str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        let feeds = cfg.headline_feeds();
        // one placeholder line per feed until its first cycle lands
        let bundle = HeadlineBundle {
            feeds: feeds
                .iter()
                .map(|f| FeedStatus {
                    category: f.category.clone(),
                    kind: f.kind,
                    line: unavailable_line(&f.category),
                    ok: false,
                })
                .collect(),
        };

        Ok(Self {
            feeds,
            endpoints: Endpoints::from_config(cfg),
            cap: cfg.headline_item_cap(),
            refresh: cfg.headline_refresh(),
            client,
            bundle,
            bundle_tx: None,
        })
    }

    /// Refresh every feed in parallel; each failure is isolated to its
    /// own line.
    pub async fn refresh_all(&mut self) {
        let mut set = JoinSet::new();
        for (idx, feed) in self.feeds.iter().cloned().enumerate() {
            let client = self.client.clone();
            let endpoints = self.endpoints.clone();
            let cap = self.cap;
            set.spawn(async move {
                let result = fetch_feed_titles(&client, &endpoints, &feed, cap).await;
                (idx, feed, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let Ok((idx, feed, result)) = joined else {
                error!("headline fetch task panicked");
                continue;
            };
            let status = &mut self.bundle.feeds[idx];
            match result {
                Ok(titles) => {
                    info!("{}: {} titles", feed.category, titles.len());
                    status.line = feed_line(&feed.category, &tag_titles(feed.kind, &titles));
                    status.ok = true;
                }
                Err(e) => {
                    error!("{}: all strategies failed: {}", feed.category, e);
                    // a feed that once loaded keeps ok=true for mode gating,
                    // but its line still degrades to the placeholder
                    status.line = unavailable_line(&feed.category);
                }
            }
        }
    }

    fn publish(&self) {
        if let Some(tx) = &self.bundle_tx {
            let _ = tx.send(self.bundle.clone());
        }
    }

    /// Starts the background polling task; same shape as the weather
    /// poller.
    pub fn start_polling_with_watch(mut self) -> (TaskHandle, watch::Receiver<HeadlineBundle>) {
        let (bundle_tx, bundle_rx) = watch::channel(self.bundle.clone());
        self.bundle_tx = Some(bundle_tx);

        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let join = tokio::spawn(async move {
            self.refresh_all().await;
            self.publish();
            loop {
                let sleep_for = jittered(self.refresh, Duration::from_secs(POLL_JITTER_SECS));
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {
                        self.refresh_all().await;
                        self.publish();
                    }
                    _ = stop_rx.recv() => {
                        info!("Headline polling task received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        (TaskHandle::new("headlines", join, stop_tx), bundle_rx)
    }
}
