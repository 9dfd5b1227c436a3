/*
 *  tests/signage_integration.rs
 *
 *  Integration tests for the signage components, driven against the
 *  mock surface and loopback HTTP endpoints.
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;

use vitrine::clock::ClockTicker;
use vitrine::config::{Config, LocationConfig, PromoConfig, WeatherConfig};
use vitrine::constants::WEATHER_PLACEHOLDER;
use vitrine::fallback::FetchError;
use vitrine::headlines::{fetch_feed_titles, Endpoints, FeedKind, FeedSpec, HeadlineBundle};
use vitrine::promo::Promo;
use vitrine::surface::{ImageSlot, MockSurface, Region, SignSurface};
use vitrine::ticker::Ticker;
use vitrine::weather::{Weather, WeatherReport};

const WEATHER_FIXTURE: &str = r#"{
    "current": {
        "temperature_2m": 21.4,
        "relative_humidity_2m": 55,
        "apparent_temperature": 20.9,
        "weather_code": 2,
        "wind_speed_10m": 12.3
    },
    "daily": {
        "time": ["2024-06-01","2024-06-02","2024-06-03","2024-06-04","2024-06-05","2024-06-06","2024-06-07"],
        "temperature_2m_max": [25, 24, 19, 18, 22, 23, 26],
        "temperature_2m_min": [14, 13, 11, 9, 12, 13, 15],
        "precipitation_sum": [0, 0, 0, 0, 0, 0, 0]
    }
}"#;

const RSS_FIXTURE: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>f</title><link>x</link><description>d</description>
<item><title>Hockey team clinches title</title></item>
<item><title>NBA playoffs open tonight</title></item>
</channel></rss>"#;

/// Tiny loopback responder: answers every connection with one fixed
/// response and counts hits.
async fn serve(status: &'static str, body: String) -> (String, Arc<AtomicUsize>, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_in_task = Arc::clone(&hits);

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { break };
            hits_in_task.fetch_add(1, Ordering::SeqCst);
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.as_bytes().len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), hits, handle)
}

fn weather_config(api_base: &str) -> Config {
    Config {
        location: Some(LocationConfig {
            latitude: Some(42.93),
            longitude: Some(-80.12),
            timezone: Some("America/Toronto".to_string()),
            label: Some("OHSWEKEN".to_string()),
        }),
        weather: Some(WeatherConfig {
            refresh_secs: Some(300),
            api_base: Some(api_base.to_string()),
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn weather_success_end_to_end() {
    let (url, _hits, server) = serve("200 OK", WEATHER_FIXTURE.to_string()).await;

    let mock = MockSurface::new();
    let mut weather = Weather::new(&weather_config(&url), Arc::new(mock.clone())).unwrap();
    weather.run_cycle().await;

    assert_eq!(mock.last_text(Region::ConditionTemp), Some("21°C".to_string()));
    assert_eq!(mock.last_text(Region::ConditionIcon), Some("⛅".to_string()));
    let meta = mock.last_text(Region::ConditionMeta).unwrap();
    assert!(meta.starts_with("PARTLY CLOUDY"), "meta was: {}", meta);

    assert!(
        weather
            .report
            .ticker_line
            .starts_with("WEATHER: SAT 06/01 ☀️ 25°/14°"),
        "ticker line was: {}",
        weather.report.ticker_line
    );

    server.abort();
}

#[tokio::test]
async fn weather_http_500_degrades_without_halting_the_clock() {
    let (url, _hits, server) = serve("500 Internal Server Error", String::new()).await;

    let mock = MockSurface::new();
    let surface: Arc<dyn SignSurface> = Arc::new(mock.clone());

    // independent component keeps running through the weather failure
    let clock = ClockTicker::new(Arc::clone(&surface), Duration::from_millis(30)).start();

    let mut weather = Weather::new(&weather_config(&url), surface).unwrap();
    weather.run_cycle().await;

    assert_eq!(
        mock.last_text(Region::ConditionMeta),
        Some(WEATHER_PLACEHOLDER.to_string())
    );
    assert_eq!(weather.report.ticker_line, WEATHER_PLACEHOLDER);
    // no stale icon/temp is invented before a first success
    assert_eq!(mock.last_text(Region::ConditionIcon), None);

    tokio::time::sleep(Duration::from_millis(100)).await;
    clock.stop().await;
    assert!(mock.write_count(Region::Clock) >= 2);

    server.abort();
}

#[tokio::test]
async fn weather_failure_after_success_keeps_current_conditions() {
    let (good_url, _g, good) = serve("200 OK", WEATHER_FIXTURE.to_string()).await;
    let (bad_url, _b, bad) = serve("500 Internal Server Error", String::new()).await;

    let mock = MockSurface::new();
    let mut weather = Weather::new(&weather_config(&good_url), Arc::new(mock.clone())).unwrap();
    weather.run_cycle().await;
    assert!(weather.report.current.is_some());

    // swap to the failing endpoint by rebuilding against it, carrying the
    // report over the way a transient outage would see it
    let mut failing = Weather::new(&weather_config(&bad_url), Arc::new(mock.clone())).unwrap();
    failing.report = weather.report.clone();
    failing.run_cycle().await;

    assert_eq!(failing.report.ticker_line, WEATHER_PLACEHOLDER);
    assert!(failing.report.current.is_some(), "last-good current conditions were dropped");
    assert_eq!(
        mock.last_text(Region::ConditionMeta),
        Some(WEATHER_PLACEHOLDER.to_string())
    );

    good.abort();
    bad.abort();
}

#[tokio::test]
async fn headline_fallback_uses_second_strategy_and_skips_third() {
    let (reader_url, reader_hits, reader) = serve("500 Internal Server Error", String::new()).await;
    let relay_body = serde_json::json!({ "contents": RSS_FIXTURE }).to_string();
    let (relay_url, relay_hits, relay) = serve("200 OK", relay_body).await;
    let (rss2json_url, rss2json_hits, rss2json) = serve("200 OK", "{}".to_string()).await;

    let endpoints = Endpoints {
        reader_base: format!("{}/", reader_url),
        relay_base: relay_url.clone(),
        rss2json_base: rss2json_url.clone(),
    };
    let feed = FeedSpec {
        url: "https://example.com/sports.rss".to_string(),
        category: "SPORTS".to_string(),
        kind: FeedKind::Sports,
    };

    let client = reqwest::Client::new();
    let titles = fetch_feed_titles(&client, &endpoints, &feed, 8).await.unwrap();

    assert_eq!(titles[0], "Hockey team clinches title");
    assert_eq!(reader_hits.load(Ordering::SeqCst), 1);
    assert_eq!(relay_hits.load(Ordering::SeqCst), 1);
    // first success wins: the converter is never contacted
    assert_eq!(rss2json_hits.load(Ordering::SeqCst), 0);

    reader.abort();
    relay.abort();
    rss2json.abort();
}

#[tokio::test]
async fn headline_all_strategies_down_is_an_isolated_failure() {
    let (url, _hits, server) = serve("500 Internal Server Error", String::new()).await;

    let endpoints = Endpoints {
        reader_base: format!("{}/", url),
        relay_base: url.clone(),
        rss2json_base: url.clone(),
    };
    let feed = FeedSpec {
        url: "https://example.com/sports.rss".to_string(),
        category: "SPORTS".to_string(),
        kind: FeedKind::Sports,
    };

    let client = reqwest::Client::new();
    let err = fetch_feed_titles(&client, &endpoints, &feed, 8).await.unwrap_err();
    assert!(matches!(err, FetchError::Status(_)));

    server.abort();
}

fn temp_image(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("vitrine_{}_{}", std::process::id(), name))
}

#[tokio::test]
async fn promo_single_reachable_candidate_shows_once_without_rotation() {
    // candidate list a/b where only b exists on disk
    let a = temp_image("only_a.jpg");
    let b = temp_image("only_b.jpg");
    tokio::fs::write(&b, b"jpg").await.unwrap();

    let cfg = Config {
        promo: Some(PromoConfig {
            interval_secs: Some(1),
            candidates: Some(vec![
                a.to_string_lossy().into_owned(),
                b.to_string_lossy().into_owned(),
            ]),
            day_candidates: None,
        }),
        ..Default::default()
    };

    let mock = MockSurface::new();
    let promo = Promo::new(&cfg, Arc::new(mock.clone())).unwrap();
    let handle = promo.start();

    // long enough for several would-be rotation intervals
    tokio::time::sleep(Duration::from_millis(2500)).await;
    handle.stop().await;

    let history = mock.image_history(ImageSlot::PromoA);
    assert_eq!(history.len(), 1, "single promo must not rotate: {:?}", history);
    assert!(history[0].ends_with("only_b.jpg") || history[0].contains("only_b.jpg"));
    assert!(mock.is_visible(ImageSlot::PromoA));
    assert!(!mock.is_visible(ImageSlot::PromoB));

    tokio::fs::remove_file(&b).await.unwrap();
}

#[tokio::test]
async fn promo_rotation_alternates_slots_and_covers_playlist() {
    let a = temp_image("rot_a.jpg");
    let b = temp_image("rot_b.jpg");
    tokio::fs::write(&a, b"jpg").await.unwrap();
    tokio::fs::write(&b, b"jpg").await.unwrap();

    let cfg = Config {
        promo: Some(PromoConfig {
            interval_secs: Some(1),
            candidates: Some(vec![
                a.to_string_lossy().into_owned(),
                b.to_string_lossy().into_owned(),
            ]),
            day_candidates: None,
        }),
        ..Default::default()
    };

    let mock = MockSurface::new();
    let promo = Promo::new(&cfg, Arc::new(mock.clone())).unwrap();
    let handle = promo.start();

    tokio::time::sleep(Duration::from_millis(3300)).await;
    handle.stop().await;

    let slot_a = mock.image_history(ImageSlot::PromoA);
    let slot_b = mock.image_history(ImageSlot::PromoB);

    // first frame lands in slot A, second playlist entry in slot B
    assert!(!slot_a.is_empty() && !slot_b.is_empty());
    assert!(slot_a[0].contains("rot_a.jpg"));
    assert!(slot_b[0].contains("rot_b.jpg"));
    // index advances 1 (mod 2) per tick: slot A only ever shows entry 0
    assert!(slot_a.iter().all(|s| s.contains("rot_a.jpg")));
    assert!(slot_b.iter().all(|s| s.contains("rot_b.jpg")));
    // and the rotation wrapped at least once
    assert!(slot_a.len() >= 2, "rotation never wrapped: {:?}", slot_a);

    tokio::fs::remove_file(&a).await.unwrap();
    tokio::fs::remove_file(&b).await.unwrap();
}

#[tokio::test]
async fn promo_no_reachable_candidates_stays_inactive() {
    let cfg = Config {
        promo: Some(PromoConfig {
            interval_secs: Some(1),
            candidates: Some(vec![temp_image("ghost.jpg").to_string_lossy().into_owned()]),
            day_candidates: None,
        }),
        ..Default::default()
    };

    let mock = MockSurface::new();
    let promo = Promo::new(&cfg, Arc::new(mock.clone())).unwrap();
    let handle = promo.start();

    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.stop().await;

    assert!(mock.image_history(ImageSlot::PromoA).is_empty());
    assert!(mock.image_history(ImageSlot::PromoB).is_empty());
    assert!(!mock.is_visible(ImageSlot::PromoA));
}

#[tokio::test]
async fn ticker_pads_combined_line_to_minimum() {
    let mock = MockSurface::new();
    let surface: Arc<dyn SignSurface> = Arc::new(mock.clone());

    let mut report = WeatherReport::default();
    report.ticker_line = "WEATHER: SAT 06/01 ☀️ 25°/14°".to_string();
    let (_weather_tx, weather_rx) = tokio::sync::watch::channel(report);
    let (_headline_tx, headlines_rx) =
        tokio::sync::watch::channel(HeadlineBundle::default());

    let cfg = Config {
        ticker: Some(vitrine::config::TickerConfig {
            min_chars: Some(400),
            refresh_secs: Some(1),
            style: None,
            scroll_secs: None,
        }),
        ..Default::default()
    };

    let handle = Ticker::new(&cfg, surface, weather_rx, headlines_rx).start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.stop().await;

    let text = mock.last_text(Region::Ticker).unwrap();
    assert!(text.chars().count() >= 400);
    assert!(text.starts_with("WEATHER: SAT 06/01"));
    // padded by whole repetitions only
    assert!(text.ends_with("25°/14°"));
}
