/*
 *  promo.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Promo rotation: probe a candidate list, build the day's playlist,
 *  cycle two crossfade slots with a preload gate so a swap never shows a
 *  half-loaded frame.
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
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{info, warn};
use reqwest::{header, Client};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::fallback::FetchError;
use crate::reloader::delay_until_midnight;
use crate::surface::{ImageSlot, SignSurface};
use crate::tasks::TaskHandle;

/// 3-letter uppercase weekday key for the day-candidates map, e.g. "SAT".
pub fn day_key(now: &DateTime<Local>) -> String {
    now.format("%a").to_string().to_uppercase()
}

/// Base candidates followed by today's extras, first occurrence wins.
pub fn merged_candidates(
    base: &[String],
    day_map: &HashMap<String, Vec<String>>,
    key: &str,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let extras = day_map.get(key).map(Vec::as_slice).unwrap_or(&[]);
    for candidate in base.iter().chain(extras.iter()) {
        if !out.iter().any(|c| c == candidate) {
            out.push(candidate.clone());
        }
    }
    out
}

/// Session-fixed cache-bust parameter, applied to http(s) sources only so
/// repeated preloads of one image hit the same cache entry all day.
pub fn cache_busted(source: &str, token: u32) -> String {
    if source.starts_with("http://") || source.starts_with("https://") {
        let sep = if source.contains('?') { '&' } else { '?' };
        format!("{}{}v={:08x}", source, sep, token)
    } else {
        source.to_string()
    }
}

/// Reachable candidates in candidate order, with a cyclic cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    entries: Vec<String>,
    index: usize,
}

impl Playlist {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> &str {
        &self.entries[self.index]
    }

    /// Advance the cursor by one (mod playlist length) and return the new
    /// current entry.
    pub fn advance(&mut self) -> &str {
        self.index = (self.index + 1) % self.entries.len();
        self.current()
    }
}

/// Promo rotation component.
pub struct Promo {
    surface: Arc<dyn SignSurface>,
    client: Client,
    interval: Duration,
    candidates: Vec<String>,
    day_candidates: HashMap<String, Vec<String>>,
    session_token: u32,
}

impl Promo {
    pub fn new(cfg: &Config, surface: Arc<dyn SignSurface>) -> Result<Self, FetchError> {
        const VERSION: &'static str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Cache-Control", header::HeaderValue::from_static("no-store"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            surface,
            client,
            interval: cfg.promo_interval(),
            candidates: cfg.promo_candidates(),
            day_candidates: cfg.promo_day_candidates(),
            session_token: rand::random::<u32>(),
        })
    }

    /// Lightweight existence check, no body download.
    pub async fn probe(client: &Client, source: &str) -> bool {
        if source.starts_with("http://") || source.starts_with("https://") {
            match client.head(source).send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        } else {
            tokio::fs::metadata(source).await.is_ok()
        }
    }

    /// Probe today's merged candidate list and keep the reachable ones.
    pub async fn build_playlist(&self) -> Playlist {
        let key = day_key(&Local::now());
        let candidates = merged_candidates(&self.candidates, &self.day_candidates, &key);

        let mut reachable = Vec::new();
        for candidate in candidates {
            if Self::probe(&self.client, &candidate).await {
                reachable.push(candidate);
            } else {
                info!("promo: candidate not reachable, skipping: {}", candidate);
            }
        }
        info!("promo: playlist has {} entries ({})", reachable.len(), key);
        Playlist::new(reachable)
    }

    /// Fetch the full image so the swap never shows a blank or partially
    /// loaded frame. For local paths this reads the file once, warming
    /// the page cache.
    async fn preload(client: &Client, source: &str) -> Result<(), FetchError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = client.get(source).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status()));
            }
            let _ = response.bytes().await?;
        } else {
            tokio::fs::read(source)
                .await
                .map_err(|e| FetchError::Parse(e.to_string()))?;
        }
        Ok(())
    }

    async fn show(&self, slot: ImageSlot, source: &str) -> bool {
        let busted = cache_busted(source, self.session_token);
        match Self::preload(&self.client, &busted).await {
            Ok(()) => {
                self.surface.set_image(slot, &busted);
                self.surface.set_visible(slot, true);
                self.surface.set_visible(slot.other(), false);
                true
            }
            Err(e) => {
                warn!("promo: preload failed for {}: {}", source, e);
                false
            }
        }
    }

    /// Spawn the rotation task. The playlist is rebuilt at startup and at
    /// each local midnight; a rebuild replaces the rotation loop, never
    /// stacks a second one.
    pub fn start(self) -> TaskHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let join = tokio::spawn(async move {
            'rebuild: loop {
                let mut playlist = self.build_playlist().await;
                let midnight = tokio::time::sleep(delay_until_midnight(Local::now().naive_local()));
                tokio::pin!(midnight);

                if playlist.is_empty() {
                    // nothing reachable: stay idle until the next rebuild
                    tokio::select! {
                        _ = &mut midnight => continue 'rebuild,
                        _ = stop_rx.recv() => break 'rebuild,
                    }
                }

                if playlist.len() == 1 {
                    // single promo: show it once, no rotation timer
                    self.show(ImageSlot::PromoA, playlist.current()).await;
                    tokio::select! {
                        _ = &mut midnight => continue 'rebuild,
                        _ = stop_rx.recv() => break 'rebuild,
                    }
                }

                let mut active = ImageSlot::PromoA;
                if !self.show(active, playlist.current()).await {
                    // first frame failed; the interval loop advances past it
                    warn!("promo: first entry did not load");
                }

                let mut ticker = tokio::time::interval(self.interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await; // first tick completes immediately

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let next = playlist.advance().to_string();
                            let incoming = active.other();
                            if self.show(incoming, &next).await {
                                active = incoming;
                            }
                        }
                        _ = &mut midnight => {
                            info!("promo: midnight playlist rebuild");
                            continue 'rebuild;
                        }
                        _ = stop_rx.recv() => break 'rebuild,
                    }
                }
            }
            info!("Promo task received stop signal. Exiting.");
        });

        TaskHandle::new("promo", join, stop_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_key() {
        // 2024-06-01 is a Saturday
        let t = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(day_key(&t), "SAT");
    }

    #[test]
    fn test_merged_candidates_order_and_dedup() {
        let base = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        let mut day_map = HashMap::new();
        day_map.insert(
            "SAT".to_string(),
            vec!["sat.jpg".to_string(), "a.jpg".to_string()],
        );

        let merged = merged_candidates(&base, &day_map, "SAT");
        assert_eq!(merged, vec!["a.jpg", "b.jpg", "sat.jpg"]);

        // day without extras keeps the base list
        let merged = merged_candidates(&base, &day_map, "MON");
        assert_eq!(merged, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_cache_busted() {
        assert_eq!(
            cache_busted("https://cdn.example/p.jpg", 0xdead_beef),
            "https://cdn.example/p.jpg?v=deadbeef"
        );
        assert_eq!(
            cache_busted("https://cdn.example/p.jpg?w=800", 0xdead_beef),
            "https://cdn.example/p.jpg?w=800&v=deadbeef"
        );
        // local paths are never decorated
        assert_eq!(cache_busted("promo1.jpg", 1), "promo1.jpg");
    }

    #[test]
    fn test_cache_busted_is_session_stable() {
        let a = cache_busted("https://cdn.example/p.jpg", 42);
        let b = cache_busted("https://cdn.example/p.jpg", 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_playlist_advance_covers_all_entries() {
        let mut playlist = Playlist::new(vec![
            "a.jpg".to_string(),
            "b.jpg".to_string(),
            "c.jpg".to_string(),
        ]);
        assert_eq!(playlist.current(), "a.jpg");
        assert_eq!(playlist.advance(), "b.jpg");
        assert_eq!(playlist.advance(), "c.jpg");
        // wraps back to the first entry
        assert_eq!(playlist.advance(), "a.jpg");
    }

    #[tokio::test]
    async fn test_probe_filesystem_candidates() {
        let dir = std::env::temp_dir();
        let present = dir.join(format!("vitrine_probe_{}.jpg", std::process::id()));
        tokio::fs::write(&present, b"jpg").await.unwrap();
        let missing = dir.join(format!("vitrine_missing_{}.jpg", std::process::id()));

        let client = Client::new();
        assert!(Promo::probe(&client, present.to_str().unwrap()).await);
        assert!(!Promo::probe(&client, missing.to_str().unwrap()).await);

        tokio::fs::remove_file(&present).await.unwrap();
    }
}
