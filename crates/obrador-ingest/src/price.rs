// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `IngestPriceWindow` (§4.3): fetches a price window from C2 and writes
//! tagged `energy_prices` points through C1.

use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use obrador_clients::PriceClient;
use obrador_store::Store;
use obrador_types::{Result, measurement, tariff};
use tracing::{info, warn};

use crate::IngestionStats;
use crate::derive::{local_hour, price_eur_kwh};

/// §4.2 "Lag detection": the price feed is expected to stay within six hours
/// of real time (the day-ahead market publishes well before it takes effect).
const PRICE_LAG_THRESHOLD: ChronoDuration = ChronoDuration::hours(6);

pub async fn ingest_price_window(
    client: &PriceClient,
    store: &Store,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timezone: &str,
) -> Result<IngestionStats> {
    let started = Instant::now();
    let raw = client.fetch_window(start, end).await?;

    let newest = raw.iter().map(|r| r.datetime).max();
    if let Some(lag) = obrador_clients::detect_lag(newest, PRICE_LAG_THRESHOLD) {
        warn!(lag_hours = lag.lag.num_minutes() as f64 / 60.0, newest_point = %lag.newest_point, "price feed lagging behind real time");
    }

    let mut stats = IngestionStats {
        requested: raw.len(),
        obtained: raw.len(),
        ..IngestionStats::default()
    };

    let mut points = Vec::with_capacity(raw.len());
    for record in &raw {
        let Ok(hour) = local_hour(record.datetime, timezone) else {
            stats.validation_errors += 1;
            continue;
        };

        let tariff_period = tariff::tariff_period(record.datetime, hour);
        let day_type = tariff::day_type(record.datetime);
        let season = tariff::season(record.datetime);

        let point = obrador_types::Point::new(measurement::ENERGY_PRICES, record.datetime)
            .with_tag("provider", "ree")
            .with_tag("market_type", "pvpc")
            .with_tag("tariff_period", tariff_period.as_str())
            .with_tag("day_type", day_type.as_str())
            .with_tag("season", season.as_str())
            .with_tag("data_source", "realtime")
            .with_field("price_eur_mwh", record.price_eur_mwh)
            .with_field("price_eur_kwh", price_eur_kwh(record.price_eur_mwh));

        points.push(point);
    }

    let write_stats = store.write_points(&points)?;
    stats.written = write_stats.written;
    stats.duration = started.elapsed();

    if stats.success_rate() < 0.5 {
        warn!(success_rate = stats.success_rate(), "price ingestion success rate below 50%");
    } else {
        info!(
            obtained = stats.obtained,
            written = stats.written,
            success_rate = stats.success_rate(),
            "price window ingested"
        );
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn ingests_a_price_window_into_the_store() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "included": [{
                        "attributes": {
                            "values": [
                                {"value": 120.0, "datetime": "2025-06-15T10:00:00Z"}
                            ]
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = PriceClient::new(server.url()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("ingest-test.db").to_str().unwrap()).unwrap();

        let start = Utc::now() - chrono::Duration::hours(1);
        let end = Utc::now();
        let stats = ingest_price_window(&client, &store, start, end, "Europe/Madrid")
            .await
            .unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.obtained, 1);
    }
}
