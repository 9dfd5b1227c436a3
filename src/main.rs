/*
 *  main.rs
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

use std::sync::Arc;
use std::time::Duration;

use env_logger::Env;
use log::{error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use vitrine::clock::ClockTicker;
use vitrine::config::{self, Config};
use vitrine::constants::CLOCK_TICK_SECS;
use vitrine::headlines::{HeadlineBundle, Headlines};
use vitrine::promo::Promo;
use vitrine::reloader;
use vitrine::surface::{ConsoleSurface, Region, SignSurface};
use vitrine::tasks::TaskHandle;
use vitrine::ticker::Ticker;
use vitrine::weather::{Weather, WeatherReport};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Everything one run of the sign owns. Torn down in full on the daily
/// reload or on shutdown.
struct Components {
    tasks: Vec<TaskHandle>,
    reload_timer: JoinHandle<()>,
}

impl Components {
    async fn stop(self) {
        self.reload_timer.abort();
        for task in self.tasks {
            task.stop().await;
        }
    }
}

/// Spawn every configured component against the surface. Components that
/// lack configuration simply stay off; nothing here is fatal except a
/// broken runtime.
fn start_components(
    cfg: &Config,
    surface: Arc<dyn SignSurface>,
    reload_tx: mpsc::Sender<()>,
) -> Components {
    let mut tasks = Vec::new();

    if let Some(label) = cfg.location.as_ref().and_then(|l| l.label.clone()) {
        surface.set_text(Region::Location, &label);
    }

    tasks.push(
        ClockTicker::new(Arc::clone(&surface), Duration::from_secs(CLOCK_TICK_SECS)).start(),
    );

    let weather_rx = match Weather::new(cfg, Arc::clone(&surface)) {
        Ok(weather) => {
            let (handle, rx) = weather.start_polling_with_watch();
            tasks.push(handle);
            rx
        }
        Err(e) => {
            warn!("Weather component disabled: {}", e);
            watch::channel(WeatherReport::default()).1
        }
    };

    let headlines_rx = if cfg.headline_feeds().is_empty() {
        info!("No headline feeds configured");
        watch::channel(HeadlineBundle::default()).1
    } else {
        match Headlines::new(cfg) {
            Ok(headlines) => {
                let (handle, rx) = headlines.start_polling_with_watch();
                tasks.push(handle);
                rx
            }
            Err(e) => {
                warn!("Headline component disabled: {}", e);
                watch::channel(HeadlineBundle::default()).1
            }
        }
    };

    tasks.push(Ticker::new(cfg, Arc::clone(&surface), weather_rx, headlines_rx).start());

    if cfg.promo_candidates().is_empty() && cfg.promo_day_candidates().is_empty() {
        info!("No promo candidates configured");
    } else {
        match Promo::new(cfg, Arc::clone(&surface)) {
            Ok(promo) => tasks.push(promo.start()),
            Err(e) => warn!("Promo component disabled: {}", e),
        }
    }

    let reload_timer = reloader::spawn(cfg.reload_hour(), reload_tx);

    Components { tasks, reload_timer }
}

#[cfg(unix)]
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> Result<(), std::io::Error> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

#[tokio::main] // Requires the `tokio` runtime with `macros` and `rt-multi-thread` features
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;

    env_logger::Builder::from_env(
        Env::default().default_filter_or(cfg.log_level.as_deref().unwrap_or("info")),
    )
    .format_timestamp_secs()
    .init();

    info!("{} dressing the window", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let surface: Arc<dyn SignSurface> = Arc::new(ConsoleSurface::new());

    loop {
        let (reload_tx, mut reload_rx) = mpsc::channel(1);
        let components = start_components(&cfg, Arc::clone(&surface), reload_tx);

        tokio::select! {
            _ = reload_rx.recv() => {
                // full restart re-reads nothing from disk but rebuilds every
                // component, which re-probes promos and re-arms the timer
                info!("Daily reload: restarting all components");
                components.stop().await;
            }
            result = signal_handler() => {
                if let Err(e) = result {
                    error!("Signal handler error: {}", e);
                }
                components.stop().await;
                break;
            }
        }
    }

    info!("Goodbye.");
    Ok(())
}
