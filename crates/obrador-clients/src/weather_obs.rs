// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Weather-observation client (consolidated station measurements). Rate
//! limited to a 3-second minimum inter-request delay (≤20 req/min) and owns
//! the bearer-token lifecycle described in §4.2: the token is valid for
//! roughly 6 days, refreshed proactively on a daily schedule and cached on
//! disk with its last-refresh timestamp.
//!
//! Consolidated observations for this upstream publish with a ~24-72h
//! delay; that lag is inherent and is not hidden here (§4.2) — it is the
//! backfill strategy (C5) that works around it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use obrador_types::{ObradorError, Result};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::rate_limit::RateLimiter;
use crate::retry::retry_request;
use crate::token_cache::{CachedToken, TokenCache};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_INTERVAL: Duration = Duration::from_secs(3);
const TOKEN_MAX_AGE: chrono::Duration = chrono::Duration::hours(24);

#[derive(Debug, Clone, Default)]
pub struct RawWeatherObservation {
    pub datetime: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub humidity: Option<f64>,
    pub humidity_min: Option<f64>,
    pub humidity_max: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub solar_radiation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ObservationRecord {
    fecha: DateTime<Utc>,
    ta: Option<f64>,
    tamin: Option<f64>,
    tamax: Option<f64>,
    hr: Option<f64>,
    hrmin: Option<f64>,
    hrmax: Option<f64>,
    pres: Option<f64>,
    vv: Option<f64>,
    dv: Option<f64>,
    prec: Option<f64>,
    rad: Option<f64>,
}

impl From<ObservationRecord> for RawWeatherObservation {
    fn from(r: ObservationRecord) -> Self {
        Self {
            datetime: r.fecha,
            temperature: r.ta,
            temperature_min: r.tamin,
            temperature_max: r.tamax,
            humidity: r.hr,
            humidity_min: r.hrmin,
            humidity_max: r.hrmax,
            pressure: r.pres,
            wind_speed: r.vv,
            wind_direction: r.dv,
            precipitation: r.prec,
            solar_radiation: r.rad,
        }
    }
}

pub struct WeatherObsClient {
    base_url: String,
    api_key: String,
    station_id: String,
    http: reqwest::Client,
    rate_limiter: RateLimiter,
    token_cache: TokenCache,
    token: RwLock<Option<CachedToken>>,
}

impl WeatherObsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        station_id: impl Into<String>,
        token_cache_path: impl Into<std::path::PathBuf>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ObradorError::ConfigError(format!("building weather-obs HTTP client: {e}")))?;
        let token_cache = TokenCache::new(token_cache_path);
        let token = token_cache.load();

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            station_id: station_id.into(),
            http,
            rate_limiter: RateLimiter::new(MIN_INTERVAL),
            token_cache,
            token: RwLock::new(token),
        })
    }

    /// Proactive daily refresh, intended to be driven by the scheduler's
    /// `token_refresh` job rather than only on auth failure.
    pub async fn refresh_token(&self) -> Result<()> {
        info!("refreshing weather-observation bearer token");
        let url = format!("{}/auth/token?api_key={}", self.base_url, self.api_key);
        let response = retry_request("weather_obs.refresh_token", || self.http.get(&url).send()).await?;

        if !response.status().is_success() {
            return Err(ObradorError::UpstreamHttpError {
                code: response.status().as_u16(),
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ObradorError::UpstreamParseError(e.to_string()))?;

        let cached = CachedToken {
            token: parsed.token,
            refreshed_at: Utc::now(),
        };
        self.token_cache.save(&cached);
        *self.token.write().await = Some(cached);
        Ok(())
    }

    async fn ensure_token(&self) -> Result<String> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if !TokenCache::is_stale(cached, TOKEN_MAX_AGE) {
                    return Ok(cached.token.clone());
                }
            }
        }
        warn!("weather-observation token stale or missing, refreshing");
        self.refresh_token().await?;
        let guard = self.token.read().await;
        guard
            .as_ref()
            .map(|c| c.token.clone())
            .ok_or_else(|| ObradorError::UpstreamHttpError { code: 401 })
    }

    pub async fn fetch_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawWeatherObservation>> {
        self.rate_limiter.acquire().await;
        let token = self.ensure_token().await?;
        let url = format!(
            "{}/observacion/convencional/datos/estacion/{}?start={}&end={}",
            self.base_url,
            self.station_id,
            start.to_rfc3339(),
            end.to_rfc3339(),
        );

        info!(url = %url, attempt = 1, total = 3, "fetching weather observation window");
        let response = retry_request("weather_obs.fetch_window", || {
            self.http.get(&url).bearer_auth(&token).send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ObradorError::UpstreamHttpError { code: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ObradorError::UpstreamParseError(e.to_string()))?;
        debug!(status = %status, bytes = body.len(), "weather observation response received");

        let records: Vec<ObservationRecord> =
            serde_json::from_str(&body).map_err(|e| ObradorError::UpstreamParseError(e.to_string()))?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    pub async fn fetch_current(&self) -> Result<RawWeatherObservation> {
        let now = Utc::now();
        let records = self
            .fetch_window(now - chrono::Duration::hours(3), now)
            .await?;
        records
            .into_iter()
            .max_by_key(|r| r.datetime)
            .ok_or_else(|| ObradorError::UpstreamParseError("empty observation response".to_owned()))
    }

    pub async fn ping(&self) -> Result<()> {
        self.fetch_current().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn fetch_window_refreshes_token_when_absent() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("GET", mockito::Matcher::Regex("/auth/token.*".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"token": "abc123"}).to_string())
            .create_async()
            .await;
        let data_mock = server
            .mock("GET", mockito::Matcher::Regex("/observacion.*".into()))
            .match_header("authorization", "Bearer abc123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([{
                    "fecha": "2025-06-15T03:00:00Z",
                    "ta": 18.5,
                    "hr": 60.0,
                    "pres": 1013.0
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = WeatherObsClient::new(
            server.url(),
            "key",
            "3195",
            dir.path().join("token.json"),
        )
        .unwrap();

        let records = client
            .fetch_window(Utc::now() - chrono::Duration::hours(1), Utc::now())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].temperature, Some(18.5));
        token_mock.assert_async().await;
        data_mock.assert_async().await;
    }
}
