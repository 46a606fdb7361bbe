// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! External API clients (C2). Three upstreams, same shape
//! (`fetch_window`/`fetch_current`), each wrapping retry-with-backoff, a
//! client-side rate limiter and structured request logging. The
//! weather-observation client additionally owns a bearer-token lifecycle.

mod price;
mod rate_limit;
mod retry;
mod token_cache;
mod weather_obs;
mod weather_realtime;

pub use price::{PriceClient, RawPricePoint};
pub use rate_limit::RateLimiter;
pub use retry::retry_request;
pub use token_cache::TokenCache;
pub use weather_obs::{RawWeatherObservation, WeatherObsClient};
pub use weather_realtime::{RawWeatherRealtime, WeatherRealtimeClient};

use chrono::{DateTime, Utc};

/// Emitted by a client when the freshest point in a `fetch_window` response
/// is older than the configured lag threshold (§4.2 "Lag detection"). This is
/// an observability signal, not an error — callers log it and carry on.
#[derive(Debug, Clone)]
pub struct LagWarning {
    pub newest_point: DateTime<Utc>,
    pub threshold: chrono::Duration,
    pub lag: chrono::Duration,
}

pub fn detect_lag(
    newest_point: Option<DateTime<Utc>>,
    threshold: chrono::Duration,
) -> Option<LagWarning> {
    let newest_point = newest_point?;
    let lag = Utc::now() - newest_point;
    if lag > threshold {
        Some(LagWarning {
            newest_point,
            threshold,
            lag,
        })
    } else {
        None
    }
}
