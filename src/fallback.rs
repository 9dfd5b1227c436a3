/*
 *  fallback.rs
 *
 *  Vitrine - dress the window
 *  (c) 2024-26 Stuart Hunter
 *
 *  First-success-of-N combinator for ordered fetch strategies.
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

use std::future::Future;
use std::pin::Pin;

use log::{debug, warn};
use reqwest::StatusCode;
use thiserror::Error;

/// Error type shared by fetch strategies (headline proxies, promo probes).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no usable items")]
    Empty,
}

/// A not-yet-polled fetch attempt. Futures are inert until awaited, so
/// building the whole chain up front costs nothing.
pub type Attempt<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send>>;

/// Try each named attempt in order; the first `Ok` wins and later
/// attempts are never polled. Returns the last error if all fail.
pub async fn first_success<T>(
    label: &str,
    attempts: Vec<(&'static str, Attempt<T>)>,
) -> Result<T, FetchError> {
    let mut last_err = FetchError::Empty;
    for (name, attempt) in attempts {
        match attempt.await {
            Ok(value) => {
                debug!("{}: strategy '{}' succeeded", label, name);
                return Ok(value);
            }
            Err(e) => {
                warn!("{}: strategy '{}' failed: {}", label, name, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}
