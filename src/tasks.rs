/*
 *  tasks.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  Recurring-task plumbing: a cancellation handle around a spawned
 *  polling loop, and the jitter applied to each polling sleep.
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
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a component's polling task.
///
/// Each component runs one `select!` loop (sleep vs. stop channel), so a
/// task never overlaps itself and stopping is always graceful. Dropping
/// the handle without calling [`TaskHandle::stop`] aborts the task.
pub struct TaskHandle {
    name: &'static str,
    join: Option<JoinHandle<()>>,
    stop: mpsc::Sender<()>,
}

impl TaskHandle {
    pub fn new(name: &'static str, join: JoinHandle<()>, stop: mpsc::Sender<()>) -> Self {
        Self {
            name,
            join: Some(join),
            stop,
        }
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(mut self) {
        if let Err(e) = self.stop.send(()).await {
            error!("{}: failed to send stop signal: {}", self.name, e);
        }
        if let Some(join) = self.join.take() {
            join.await
                .unwrap_or_else(|e| error!("{}: task failed to join: {}", self.name, e));
        }
        info!("{}: stopped", self.name);
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        // stop() is async and cannot run here; abort covers the case of a
        // handle dropped without an explicit shutdown.
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

/// A polling cadence with up to `jitter` of random slack added, so
/// co-located signs do not hit the upstream APIs in lockstep.
pub fn jittered(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let extra = rand::rng().random_range(0..=jitter.as_millis() as u64);
    base + Duration::from_millis(extra)
}
