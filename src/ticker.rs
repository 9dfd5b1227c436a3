/*
 *  ticker.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Ticker composer: joins the cached weather and headline lines, pads
 *  the result so the fixed-speed scroll never runs dry, and optionally
 *  alternates between weather-only and sports-only modes.
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

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::constants::{BULLET, MIN_MODE_HOLD_SECS};
use crate::headlines::{unavailable_line, HeadlineBundle};
use crate::surface::{Region, SignSurface};
use crate::tasks::TaskHandle;
use crate::weather::WeatherReport;

/// How the ticker presents its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerStyle {
    /// All sources concatenated into one long line (the default).
    Combined,
    /// Alternate between weather-only and sports-only, gated per mode.
    Alternate,
}

/// Active source in alternate style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerMode {
    Weather,
    Sports,
}

/// Join non-empty segments with the bullet separator.
pub fn compose(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(BULLET)
}

/// Repeat `base` (bullet-separated) until the result reaches `min_chars`.
///
/// The scroll animation runs at a fixed pixel speed; short text would
/// cross the screen and leave a gap. Repetition units are never cut.
pub fn pad_to_min(base: &str, min_chars: usize) -> String {
    if base.is_empty() {
        return String::new();
    }
    let mut out = base.to_string();
    let mut len = out.chars().count();
    let unit = BULLET.chars().count() + base.chars().count();
    while len < min_chars {
        out.push_str(BULLET);
        out.push_str(base);
        len += unit;
    }
    out
}

/// Mode switcher for alternate style.
///
/// Gating: never switch to a source that has not loaded at least once,
/// and hold each mode for one full scroll cycle (at least
/// [`MIN_MODE_HOLD_SECS`]) so a pass is never cut short.
pub struct TickerModeController {
    hold: Duration,
    current: TickerMode,
    last_switch: Instant,
    weather_loaded: bool,
    sports_loaded: bool,
}

impl TickerModeController {
    pub fn new(scroll_secs: u64) -> Self {
        Self {
            hold: Duration::from_secs(scroll_secs.max(MIN_MODE_HOLD_SECS)),
            current: TickerMode::Weather,
            last_switch: Instant::now(),
            weather_loaded: false,
            sports_loaded: false,
        }
    }

    pub fn set_loaded(&mut self, weather: bool, sports: bool) {
        self.weather_loaded = weather;
        self.sports_loaded = sports;
    }

    pub fn current_mode(&self) -> TickerMode {
        self.current
    }

    /// Switch modes if the hold has elapsed and the other source has
    /// loaded. Returns the new mode when a switch happens.
    pub fn maybe_switch(&mut self, now: Instant) -> Option<TickerMode> {
        if now.saturating_duration_since(self.last_switch) < self.hold {
            return None;
        }
        let target = match self.current {
            TickerMode::Weather => TickerMode::Sports,
            TickerMode::Sports => TickerMode::Weather,
        };
        let target_loaded = match target {
            TickerMode::Weather => self.weather_loaded,
            TickerMode::Sports => self.sports_loaded,
        };
        if !target_loaded {
            return None;
        }
        self.current = target;
        self.last_switch = now;
        Some(target)
    }
}

/// Ticker recompose task.
pub struct Ticker {
    surface: Arc<dyn SignSurface>,
    weather_rx: watch::Receiver<WeatherReport>,
    headlines_rx: watch::Receiver<HeadlineBundle>,
    style: TickerStyle,
    min_chars: usize,
    refresh: Duration,
    controller: TickerModeController,
}

impl Ticker {
    pub fn new(
        cfg: &Config,
        surface: Arc<dyn SignSurface>,
        weather_rx: watch::Receiver<WeatherReport>,
        headlines_rx: watch::Receiver<HeadlineBundle>,
    ) -> Self {
        Self {
            surface,
            weather_rx,
            headlines_rx,
            style: cfg.ticker_style(),
            min_chars: cfg.ticker_min_chars(),
            refresh: cfg.ticker_refresh(),
            controller: TickerModeController::new(cfg.scroll_secs()),
        }
    }

    /// Rebuild the ticker text from the latest cached lines and write it
    /// in one assignment.
    fn recompose(&mut self) {
        let report = self.weather_rx.borrow().clone();
        let bundle = self.headlines_rx.borrow().clone();

        let base = match self.style {
            TickerStyle::Combined => {
                let mut segments = vec![report.ticker_line.as_str()];
                segments.extend(bundle.ticker_segments());
                compose(&segments)
            }
            TickerStyle::Alternate => {
                self.controller
                    .set_loaded(report.is_loaded(), bundle.sports_loaded());
                if self.controller.maybe_switch(Instant::now()).is_some() {
                    // a new pass always starts from the same edge
                    self.surface.reset_scroll(Region::Ticker);
                }
                match self.controller.current_mode() {
                    TickerMode::Weather => report.ticker_line.clone(),
                    TickerMode::Sports => bundle
                        .sports()
                        .map(|f| f.line.clone())
                        .unwrap_or_else(|| unavailable_line("sports")),
                }
            }
        };

        self.surface
            .set_text(Region::Ticker, &pad_to_min(&base, self.min_chars));
    }

    pub fn start(mut self) -> TaskHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let join = tokio::spawn(async move {
            loop {
                self.recompose();
                tokio::select! {
                    _ = tokio::time::sleep(self.refresh) => {}
                    _ = stop_rx.recv() => {
                        info!("Ticker task received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        TaskHandle::new("ticker", join, stop_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_skips_empty_segments() {
        assert_eq!(compose(&["a", "", "b"]), format!("a{}b", BULLET));
        assert_eq!(compose(&[]), "");
        assert_eq!(compose(&["solo"]), "solo");
    }

    #[test]
    fn test_pad_reaches_minimum() {
        let base = "WEATHER: SAT 06/01 ☀️ 25°/14°";
        let out = pad_to_min(base, 1600);
        assert!(out.chars().count() >= 1600);
        assert!(out.starts_with(base));
    }

    #[test]
    fn test_pad_never_cuts_a_repetition() {
        let base = "short line";
        let out = pad_to_min(base, 100);
        // removing every full repetition must leave only bullet separators
        for piece in out.split(base) {
            assert!(piece.is_empty() || piece == BULLET);
        }
        // and the text must end on a complete repetition
        assert!(out.ends_with(base));
    }

    #[test]
    fn test_pad_already_long_enough() {
        let base = "x".repeat(50);
        assert_eq!(pad_to_min(&base, 10), base);
        assert_eq!(pad_to_min("", 500), "");
    }

    #[test]
    fn test_mode_holds_before_switch() {
        let mut ctl = TickerModeController::new(10);
        ctl.set_loaded(true, true);
        let now = Instant::now();
        assert_eq!(ctl.maybe_switch(now + Duration::from_secs(3)), None);
        assert_eq!(ctl.current_mode(), TickerMode::Weather);
    }

    #[test]
    fn test_mode_switches_after_hold() {
        let mut ctl = TickerModeController::new(10);
        ctl.set_loaded(true, true);
        let now = Instant::now();
        assert_eq!(
            ctl.maybe_switch(now + Duration::from_secs(11)),
            Some(TickerMode::Sports)
        );
        assert_eq!(ctl.current_mode(), TickerMode::Sports);
        // and holds again before flipping back
        assert_eq!(ctl.maybe_switch(now + Duration::from_secs(12)), None);
        assert_eq!(
            ctl.maybe_switch(now + Duration::from_secs(22)),
            Some(TickerMode::Weather)
        );
    }

    #[test]
    fn test_mode_never_switches_to_unloaded_source() {
        let mut ctl = TickerModeController::new(10);
        ctl.set_loaded(true, false);
        let now = Instant::now();
        assert_eq!(ctl.maybe_switch(now + Duration::from_secs(60)), None);
        assert_eq!(ctl.current_mode(), TickerMode::Weather);

        // once sports loads, the switch goes through
        ctl.set_loaded(true, true);
        assert_eq!(
            ctl.maybe_switch(now + Duration::from_secs(61)),
            Some(TickerMode::Sports)
        );
    }

    #[test]
    fn test_scroll_cycle_floor() {
        // a 3-second scroll config still holds the 10-second minimum
        let mut ctl = TickerModeController::new(3);
        ctl.set_loaded(true, true);
        let now = Instant::now();
        assert_eq!(ctl.maybe_switch(now + Duration::from_secs(5)), None);
        assert!(ctl.maybe_switch(now + Duration::from_secs(11)).is_some());
    }
}
