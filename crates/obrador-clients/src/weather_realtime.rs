// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Weather-realtime client (current-conditions upstream, e.g. OpenWeatherMap
//! style). Rate limited to a 1-second minimum inter-request delay (≤60
//! req/min). No token lifecycle: authentication is a static API key passed
//! as a query parameter.

use std::time::Duration;

use chrono::{DateTime, Utc};
use obrador_types::{ObradorError, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;
use crate::retry::retry_request;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct RawWeatherRealtime {
    pub datetime: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub precipitation: f64,
}

#[derive(Debug, Deserialize)]
struct RealtimeResponse {
    dt: i64,
    main: RealtimeMain,
    wind: RealtimeWind,
    #[serde(default)]
    rain: Option<RealtimeRain>,
}

#[derive(Debug, Deserialize)]
struct RealtimeMain {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct RealtimeWind {
    speed: f64,
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct RealtimeRain {
    #[serde(rename = "1h", default)]
    one_hour: f64,
}

impl From<RealtimeResponse> for RawWeatherRealtime {
    fn from(r: RealtimeResponse) -> Self {
        Self {
            datetime: DateTime::from_timestamp(r.dt, 0).unwrap_or_else(Utc::now),
            temperature: r.main.temp,
            humidity: r.main.humidity,
            pressure: r.main.pressure,
            wind_speed: r.wind.speed,
            wind_direction: r.wind.deg,
            precipitation: r.rain.map(|rain| rain.one_hour).unwrap_or(0.0),
        }
    }
}

pub struct WeatherRealtimeClient {
    base_url: String,
    api_key: String,
    municipality_code: String,
    http: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl WeatherRealtimeClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        municipality_code: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ObradorError::ConfigError(format!("building weather-realtime HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            municipality_code: municipality_code.into(),
            http,
            rate_limiter: RateLimiter::new(MIN_INTERVAL),
        })
    }

    pub async fn fetch_current(&self) -> Result<RawWeatherRealtime> {
        self.rate_limiter.acquire().await;
        let url = format!(
            "{}/data/current?q={}&appid={}&units=metric",
            self.base_url, self.municipality_code, self.api_key
        );

        info!(url = %url, attempt = 1, total = 3, "fetching realtime weather");
        let response = retry_request("weather_realtime.fetch_current", || self.http.get(&url).send()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ObradorError::UpstreamHttpError { code: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ObradorError::UpstreamParseError(e.to_string()))?;
        debug!(status = %status, bytes = body.len(), "realtime weather response received");

        let parsed: RealtimeResponse =
            serde_json::from_str(&body).map_err(|e| ObradorError::UpstreamParseError(e.to_string()))?;
        Ok(parsed.into())
    }

    /// The realtime upstream only exposes current conditions; a "window" is
    /// approximated as the single current reading, which is the caller's
    /// signal to prefer this client only for near-now gaps.
    pub async fn fetch_window(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<RawWeatherRealtime>> {
        self.fetch_current().await.map(|r| vec![r])
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
    async fn fetch_current_parses_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "dt": 1_750_000_000,
                    "main": {"temp": 25.0, "humidity": 45.0, "pressure": 1015.0},
                    "wind": {"speed": 3.5, "deg": 180.0}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = WeatherRealtimeClient::new(server.url(), "key", "28079").unwrap();
        let reading = client.fetch_current().await.unwrap();

        assert_eq!(reading.temperature, 25.0);
        mock.assert_async().await;
    }
}
