// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Spanish wholesale electricity price client (REE). Rate limited to a
//! 2-second minimum inter-request delay (≤30 req/min).

use std::time::Duration;

use chrono::{DateTime, Utc};
use obrador_types::{ObradorError, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;
use crate::retry::retry_request;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct RawPricePoint {
    pub datetime: DateTime<Utc>,
    pub price_eur_mwh: f64,
}

#[derive(Debug, Deserialize)]
struct PriceApiResponse {
    #[serde(rename = "included")]
    included: Vec<PriceApiSeries>,
}

#[derive(Debug, Deserialize)]
struct PriceApiSeries {
    attributes: PriceApiAttributes,
}

#[derive(Debug, Deserialize)]
struct PriceApiAttributes {
    values: Vec<PriceApiValue>,
}

#[derive(Debug, Deserialize)]
struct PriceApiValue {
    value: f64,
    datetime: DateTime<Utc>,
}

pub struct PriceClient {
    base_url: String,
    http: reqwest::Client,
    rate_limiter: RateLimiter,
}

impl PriceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ObradorError::ConfigError(format!("building price HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
            rate_limiter: RateLimiter::new(MIN_INTERVAL),
        })
    }

    pub async fn fetch_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawPricePoint>> {
        self.rate_limiter.acquire().await;
        let url = format!(
            "{}/es/datos/mercados/precios-mercados-tiempo-real?start_date={}&end_date={}&time_trunc=hour",
            self.base_url,
            start.to_rfc3339(),
            end.to_rfc3339(),
        );

        info!(url = %url, attempt = 1, total = 3, "fetching price window");
        let response = retry_request("price.fetch_window", || self.http.get(&url).send()).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ObradorError::UpstreamHttpError { code: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ObradorError::UpstreamParseError(e.to_string()))?;
        debug!(status = %status, bytes = body.len(), "price window response received");

        let parsed: PriceApiResponse =
            serde_json::from_str(&body).map_err(|e| ObradorError::UpstreamParseError(e.to_string()))?;

        let points = parsed
            .included
            .into_iter()
            .flat_map(|series| series.attributes.values)
            .map(|v| RawPricePoint {
                datetime: v.datetime,
                price_eur_mwh: v.value,
            })
            .collect();

        Ok(points)
    }

    pub async fn fetch_current(&self) -> Result<RawPricePoint> {
        let now = Utc::now();
        let points = self
            .fetch_window(now - chrono::Duration::hours(1), now)
            .await?;
        points
            .into_iter()
            .max_by_key(|p| p.datetime)
            .ok_or_else(|| ObradorError::UpstreamParseError("empty price response".to_owned()))
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
    async fn fetch_window_parses_values() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "included": [{
                        "attributes": {
                            "values": [
                                {"value": 80.0, "datetime": "2025-06-15T10:00:00Z"}
                            ]
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = PriceClient::new(server.url()).unwrap();
        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now();
        let points = client.fetch_window(start, end).await.unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price_eur_mwh, 80.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_is_not_retried_into_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = PriceClient::new(server.url()).unwrap();
        let result = client
            .fetch_window(Utc::now() - chrono::Duration::hours(1), Utc::now())
            .await;

        assert!(matches!(result, Err(ObradorError::UpstreamHttpError { code: 404 })));
        mock.assert_async().await;
    }
}
