/*
 *  surface.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Render-target abstraction. Components own disjoint regions and never
 *  touch each other's; the surface is the only thing they share.
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
use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, info};

/// Text render targets on the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Clock,
    Date,
    Location,
    ConditionIcon,
    ConditionTemp,
    ConditionMeta,
    Ticker,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Clock => "clock",
            Region::Date => "date",
            Region::Location => "location",
            Region::ConditionIcon => "cond-icon",
            Region::ConditionTemp => "cond-temp",
            Region::ConditionMeta => "cond-meta",
            Region::Ticker => "ticker",
        };
        write!(f, "{}", name)
    }
}

/// The two alternating promo slots used for crossfading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    PromoA,
    PromoB,
}

impl ImageSlot {
    /// The opposite slot of a crossfade pair.
    pub fn other(self) -> Self {
        match self {
            ImageSlot::PromoA => ImageSlot::PromoB,
            ImageSlot::PromoB => ImageSlot::PromoA,
        }
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSlot::PromoA => write!(f, "promo-a"),
            ImageSlot::PromoB => write!(f, "promo-b"),
        }
    }
}

/// Sink for everything the components render.
///
/// Every call is a single atomic assignment; a sink that does not carry a
/// given region treats the call as a no-op. Implementations must tolerate
/// concurrent callers - each component writes only its own regions, but
/// their timers fire independently.
pub trait SignSurface: Send + Sync {
    /// Replace the text content of a region.
    fn set_text(&self, region: Region, text: &str);

    /// Restart the region's scroll animation from its starting edge.
    fn reset_scroll(&self, region: Region);

    /// Point an image slot at a new source. Does not change visibility.
    fn set_image(&self, slot: ImageSlot, source: &str);

    /// Show or hide an image slot.
    fn set_visible(&self, slot: ImageSlot, visible: bool);
}

/// Reference sink: renders region writes as log lines.
///
/// The deployed sign feeds a kiosk layer outside this crate; the console
/// surface is what you get when running the daemon standalone.
pub struct ConsoleSurface {
    text: Mutex<HashMap<Region, String>>,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self {
            text: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl SignSurface for ConsoleSurface {
    fn set_text(&self, region: Region, text: &str) {
        let mut map = self.text.lock().unwrap();
        // unchanged content is not worth a log line
        if map.get(&region).map(String::as_str) == Some(text) {
            return;
        }
        map.insert(region, text.to_string());
        if region == Region::Ticker {
            debug!("[{}] {} chars", region, text.chars().count());
        } else {
            info!("[{}] {}", region, text);
        }
    }

    fn reset_scroll(&self, region: Region) {
        debug!("[{}] scroll reset", region);
    }

    fn set_image(&self, slot: ImageSlot, source: &str) {
        info!("[{}] <- {}", slot, source);
    }

    fn set_visible(&self, slot: ImageSlot, visible: bool) {
        debug!("[{}] visible={}", slot, visible);
    }
}

/// Shared state recorded by [`MockSurface`] for inspection in tests.
#[derive(Debug, Default)]
pub struct MockSurfaceState {
    /// Full per-region text history, in write order.
    pub texts: HashMap<Region, Vec<String>>,

    /// Number of scroll restarts per region.
    pub scroll_resets: HashMap<Region, usize>,

    /// Full per-slot image source history, in write order.
    pub images: HashMap<ImageSlot, Vec<String>>,

    /// Last visibility set per slot.
    pub visible: HashMap<ImageSlot, bool>,
}

/// Surface that records every mutation without rendering anything.
///
/// Useful for unit tests, integration tests, and CI where no sign is
/// attached. Clone it freely; clones share the recorded state.
#[derive(Clone, Default)]
pub struct MockSurface {
    state: Arc<Mutex<MockSurfaceState>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference to the recorded state for inspection in tests.
    pub fn state(&self) -> Arc<Mutex<MockSurfaceState>> {
        Arc::clone(&self.state)
    }

    /// Last text written to a region, if any.
    pub fn last_text(&self, region: Region) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .texts
            .get(&region)
            .and_then(|v| v.last().cloned())
    }

    /// Number of writes a region has received.
    pub fn write_count(&self, region: Region) -> usize {
        self.state
            .lock()
            .unwrap()
            .texts
            .get(&region)
            .map_or(0, Vec::len)
    }

    /// Image sources a slot has been pointed at, in order.
    pub fn image_history(&self, slot: ImageSlot) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .images
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    /// Last visibility set for a slot (false if never touched).
    pub fn is_visible(&self, slot: ImageSlot) -> bool {
        self.state
            .lock()
            .unwrap()
            .visible
            .get(&slot)
            .copied()
            .unwrap_or(false)
    }

    pub fn scroll_reset_count(&self, region: Region) -> usize {
        self.state
            .lock()
            .unwrap()
            .scroll_resets
            .get(&region)
            .copied()
            .unwrap_or(0)
    }
}

impl SignSurface for MockSurface {
    fn set_text(&self, region: Region, text: &str) {
        self.state
            .lock()
            .unwrap()
            .texts
            .entry(region)
            .or_default()
            .push(text.to_string());
    }

    fn reset_scroll(&self, region: Region) {
        *self
            .state
            .lock()
            .unwrap()
            .scroll_resets
            .entry(region)
            .or_default() += 1;
    }

    fn set_image(&self, slot: ImageSlot, source: &str) {
        self.state
            .lock()
            .unwrap()
            .images
            .entry(slot)
            .or_default()
            .push(source.to_string());
    }

    fn set_visible(&self, slot: ImageSlot, visible: bool) {
        self.state.lock().unwrap().visible.insert(slot, visible);
    }
}
