/*
 *  clock.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Clock/date component. Reads the wall clock, writes formatted time and
 *  date strings on a fixed cadence.
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

use chrono::{DateTime, Local};
use log::info;
use tokio::sync::mpsc;

use crate::surface::{Region, SignSurface};
use crate::tasks::TaskHandle;

/// Zero-padded 24-hour time, e.g. "09:05".
pub fn format_time(now: &DateTime<Local>) -> String {
    now.format("%H:%M").to_string()
}

/// Upper-cased storefront date line, e.g. "FRIDAY, AUG 7".
pub fn format_date(now: &DateTime<Local>) -> String {
    now.format("%A, %b %-d").to_string().to_uppercase()
}

/// Clock/date ticker task.
pub struct ClockTicker {
    surface: Arc<dyn SignSurface>,
    tick: Duration,
}

impl ClockTicker {
    pub fn new(surface: Arc<dyn SignSurface>, tick: Duration) -> Self {
        Self { surface, tick }
    }

    fn render(surface: &Arc<dyn SignSurface>) {
        let now = Local::now();
        surface.set_text(Region::Clock, &format_time(&now));
        surface.set_text(Region::Date, &format_date(&now));
    }

    /// Spawn the tick loop. Renders once immediately, then on cadence.
    pub fn start(self) -> TaskHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        let surface = self.surface;
        let tick = self.tick;

        let join = tokio::spawn(async move {
            Self::render(&surface);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(tick) => Self::render(&surface),
                    _ = stop_rx.recv() => {
                        info!("clock: stop signal received");
                        break;
                    }
                }
            }
        });

        TaskHandle::new("clock", join, stop_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time_zero_padded() {
        let t = Local.with_ymd_and_hms(2024, 6, 1, 9, 5, 42).unwrap();
        assert_eq!(format_time(&t), "09:05");

        let t = Local.with_ymd_and_hms(2024, 6, 1, 23, 59, 0).unwrap();
        assert_eq!(format_time(&t), "23:59");
    }

    #[test]
    fn test_format_date_uppercased() {
        // 2024-06-01 is a Saturday
        let t = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(format_date(&t), "SATURDAY, JUN 1");
    }

    #[tokio::test]
    async fn test_clock_task_writes_regions() {
        use crate::surface::MockSurface;

        let mock = MockSurface::new();
        let surface: Arc<dyn SignSurface> = Arc::new(mock.clone());
        let handle = ClockTicker::new(surface, Duration::from_millis(20)).start();

        tokio::time::sleep(Duration::from_millis(70)).await;
        handle.stop().await;

        assert!(mock.write_count(Region::Clock) >= 2);
        let clock = mock.last_text(Region::Clock).unwrap();
        assert_eq!(clock.len(), 5);
        assert_eq!(&clock[2..3], ":");
        assert!(mock.last_text(Region::Date).is_some());
    }
}
