/*
 *  reloader.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Once-a-day full restart: one-shot timer to the next occurrence of the
 *  configured local hour. The restart itself re-arms the next one.
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

use chrono::{Days, Local, NaiveDateTime, NaiveTime, Timelike};
use log::{error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delay from `now` to the next `hour:00:00`, today if still ahead,
/// otherwise tomorrow.
pub fn delay_until_hour(now: NaiveDateTime, hour: u32) -> Duration {
    let target_time =
        NaiveTime::from_hms_opt(hour.min(23), 0, 0).expect("clamped hour is a valid time");
    let mut target = now.date().and_time(target_time);
    if target <= now {
        target = target
            .checked_add_days(Days::new(1))
            .unwrap_or(target);
    }
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Delay from `now` to the next local midnight.
pub fn delay_until_midnight(now: NaiveDateTime) -> Duration {
    delay_until_hour(now, 0)
}

/// Arm the one-shot reload timer. When it fires, one `()` is sent on
/// `reload_tx`; the main loop restarts every component, which re-arms
/// the next occurrence.
pub fn spawn(hour: u32, reload_tx: mpsc::Sender<()>) -> JoinHandle<()> {
    let delay = delay_until_hour(Local::now().naive_local(), hour);
    info!(
        "Daily reload armed for {:02}:00 local ({}s from now)",
        hour.min(23),
        delay.as_secs()
    );
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        info!("Daily reload timer fired");
        if let Err(e) = reload_tx.send(()).await {
            error!("Failed to deliver reload signal: {}", e);
        }
    })
}

/// True if `now` is exactly the top of the reload hour (logging aid).
#[allow(dead_code)]
pub fn is_reload_instant(now: &chrono::DateTime<Local>, hour: u32) -> bool {
    now.hour() == hour && now.minute() == 0 && now.second() == 0
}
