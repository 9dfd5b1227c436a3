//! Global constants shared across the signage components.

/// Separator between ticker items and between repeated ticker passes.
pub const BULLET: &str = "   •   ";

/// Days of daily forecast requested and rendered.
pub const FORECAST_DAYS: usize = 7;

/// Fixed ticker/meta text when the forecast fetch fails.
pub const WEATHER_PLACEHOLDER: &str = "WEATHER: UNAVAILABLE";

/// Titles kept per headline feed.
pub const HEADLINE_ITEM_CAP: usize = 8;

/// Ticker text is repeated until it reaches at least this many characters,
/// so the fixed-speed scroll never runs dry mid-animation.
pub const TICKER_MIN_CHARS: usize = 2000;

/// Clock/date redraw cadence. The displayed minute is never stale by more
/// than this many seconds.
pub const CLOCK_TICK_SECS: u64 = 10;

pub const WEATHER_REFRESH_SECS: u64 = 5 * 60;
pub const HEADLINE_REFRESH_SECS: u64 = 10 * 60;
pub const TICKER_REFRESH_SECS: u64 = 30;
pub const PROMO_INTERVAL_SECS: u64 = 12;

/// Local hour of the once-a-day full restart.
pub const RELOAD_HOUR: u32 = 2;

/// Minimum hold per ticker mode in alternate style, regardless of the
/// configured scroll cycle.
pub const MIN_MODE_HOLD_SECS: u64 = 10;

/// Upper bound of the random jitter added to each polling sleep.
pub const POLL_JITTER_SECS: u64 = 15;

// Default upstream endpoints. All four are overridable from config so
// deployments (and tests) can point at a different relay.
pub const FORECAST_API_BASE: &str = "https://api.open-meteo.com/v1/forecast";
pub const READER_PROXY_BASE: &str = "https://r.jina.ai/";
pub const RELAY_PROXY_BASE: &str = "https://api.allorigins.win/get";
pub const RSS2JSON_BASE: &str = "https://api.rss2json.com/v1/api.json";
