// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `IngestWeatherWindow`, `IngestWeatherCurrent` and the hybrid source
//! selector `IngestHybridWeather` (§4.3).

use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use obrador_clients::{RawWeatherObservation, RawWeatherRealtime, WeatherObsClient, WeatherRealtimeClient};
use obrador_store::Store;
use obrador_types::{Point, Result, measurement};
use tracing::{info, warn};

use crate::IngestionStats;
use crate::derive::{heat_index, local_hour, production_comfort_index};
use crate::validate::{humidity_in_range, pressure_in_range, temperature_in_range};

/// §4.2 "Lag detection": weather observations are expected to stay within two
/// hours of real time, tighter than the price feed since stale weather
/// directly skews the same-hour scoring pass (C9).
const WEATHER_LAG_THRESHOLD: ChronoDuration = ChronoDuration::hours(2);

/// Common shape both upstream payloads are normalized to before point
/// construction, so the validation/derivation/tagging path is written once.
struct WeatherFields {
    temperature: Option<f64>,
    temperature_min: Option<f64>,
    temperature_max: Option<f64>,
    humidity: Option<f64>,
    humidity_min: Option<f64>,
    humidity_max: Option<f64>,
    pressure: Option<f64>,
    wind_speed: Option<f64>,
    wind_direction: Option<f64>,
    precipitation: Option<f64>,
    solar_radiation: Option<f64>,
}

impl From<&RawWeatherObservation> for WeatherFields {
    fn from(r: &RawWeatherObservation) -> Self {
        Self {
            temperature: r.temperature,
            temperature_min: r.temperature_min,
            temperature_max: r.temperature_max,
            humidity: r.humidity,
            humidity_min: r.humidity_min,
            humidity_max: r.humidity_max,
            pressure: r.pressure,
            wind_speed: r.wind_speed,
            wind_direction: r.wind_direction,
            precipitation: r.precipitation,
            solar_radiation: r.solar_radiation,
        }
    }
}

impl From<&RawWeatherRealtime> for WeatherFields {
    fn from(r: &RawWeatherRealtime) -> Self {
        Self {
            temperature: Some(r.temperature),
            temperature_min: None,
            temperature_max: None,
            humidity: Some(r.humidity),
            humidity_min: None,
            humidity_max: None,
            pressure: Some(r.pressure),
            wind_speed: Some(r.wind_speed),
            wind_direction: Some(r.wind_direction),
            precipitation: Some(r.precipitation),
            solar_radiation: None,
        }
    }
}

/// Validates and builds a `weather_data` point, or `None` if any present
/// field is out of range (§3 invariant 4).
fn build_point(
    datetime: DateTime<Utc>,
    fields: &WeatherFields,
    station_id: &str,
    data_source: &str,
    data_type: &str,
) -> Option<Point> {
    if let Some(h) = fields.humidity {
        if !humidity_in_range(h) {
            return None;
        }
    }
    if let Some(t) = fields.temperature {
        if !temperature_in_range(t) {
            return None;
        }
    }
    if let Some(p) = fields.pressure {
        if !pressure_in_range(p) {
            return None;
        }
    }

    let mut point = Point::new(measurement::WEATHER_DATA, datetime)
        .with_tag("station_id", station_id)
        .with_tag("data_source", data_source)
        .with_tag("data_type", data_type);

    if let Some(v) = fields.temperature {
        point = point.with_field("temperature", v);
    }
    if let Some(v) = fields.temperature_min {
        point = point.with_field("temperature_min", v);
    }
    if let Some(v) = fields.temperature_max {
        point = point.with_field("temperature_max", v);
    }
    if let Some(v) = fields.humidity {
        point = point.with_field("humidity", v);
    }
    if let Some(v) = fields.humidity_min {
        point = point.with_field("humidity_min", v);
    }
    if let Some(v) = fields.humidity_max {
        point = point.with_field("humidity_max", v);
    }
    if let Some(v) = fields.pressure {
        point = point.with_field("pressure", v);
    }
    if let Some(v) = fields.wind_speed {
        point = point.with_field("wind_speed", v);
    }
    if let Some(v) = fields.wind_direction {
        point = point.with_field("wind_direction", v);
    }
    if let Some(v) = fields.precipitation {
        point = point.with_field("precipitation", v);
    }
    if let Some(v) = fields.solar_radiation {
        point = point.with_field("solar_radiation", v);
    }

    if let (Some(t), Some(h)) = (fields.temperature, fields.humidity) {
        point = point
            .with_field("heat_index", heat_index(t, h))
            .with_field("production_comfort_index", production_comfort_index(t, h));
    }

    Some(point)
}

pub async fn ingest_weather_window(
    client: &WeatherObsClient,
    store: &Store,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    station_id: &str,
) -> Result<IngestionStats> {
    let started = Instant::now();
    let raw = client.fetch_window(start, end).await?;
    let stats = write_observations(store, &raw, station_id, "official", started).await?;
    Ok(stats)
}

pub async fn ingest_weather_current(
    client: &WeatherObsClient,
    store: &Store,
    station_id: &str,
) -> Result<IngestionStats> {
    let started = Instant::now();
    let record = client.fetch_current().await?;
    let stats = write_observations(store, std::slice::from_ref(&record), station_id, "official", started).await?;
    Ok(stats)
}

/// Writes a batch of already-fetched observation records under an explicit
/// `data_source` tag, reused by the backfill service (C5) for its
/// temperature-strategy selector, which needs to tag recovered points
/// `forecast` or `official` depending on the gap's age (§4.5).
pub async fn ingest_weather_observations(
    store: &Store,
    records: &[RawWeatherObservation],
    station_id: &str,
    data_source: &str,
) -> Result<IngestionStats> {
    write_observations(store, records, station_id, data_source, Instant::now()).await
}

async fn write_observations(
    store: &Store,
    records: &[RawWeatherObservation],
    station_id: &str,
    data_source: &str,
    started: Instant,
) -> Result<IngestionStats> {
    let newest = records.iter().map(|r| r.datetime).max();
    if let Some(lag) = obrador_clients::detect_lag(newest, WEATHER_LAG_THRESHOLD) {
        warn!(
            lag_hours = lag.lag.num_minutes() as f64 / 60.0,
            newest_point = %lag.newest_point,
            data_source,
            "weather feed lagging behind real time"
        );
    }

    let mut stats = IngestionStats {
        requested: records.len(),
        obtained: records.len(),
        ..IngestionStats::default()
    };

    let mut points = Vec::with_capacity(records.len());
    for record in records {
        let fields = WeatherFields::from(record);
        match build_point(record.datetime, &fields, station_id, data_source, "observation") {
            Some(point) => points.push(point),
            None => stats.validation_errors += 1,
        }
    }

    let write_stats = store.write_points(&points)?;
    stats.written = write_stats.written;
    stats.duration = started.elapsed();
    Ok(stats)
}

/// `IngestHybridWeather` (§4.3): hours `[0,7]` local try the observation
/// client first, hours `[8,23]` try the realtime client first. On failure of
/// the primary, falls back to the other source and records the substitution.
pub async fn ingest_hybrid_weather(
    obs_client: &WeatherObsClient,
    realtime_client: &WeatherRealtimeClient,
    store: &Store,
    station_id: &str,
    timezone: &str,
) -> Result<IngestionStats> {
    let hour = local_hour(Utc::now(), timezone)?;
    let observation_first = (0..=7).contains(&hour);

    let started = Instant::now();
    let (primary_name, primary_result) = if observation_first {
        ("observation", fetch_current_observation(obs_client).await)
    } else {
        ("realtime", fetch_current_realtime(realtime_client).await)
    };

    match primary_result {
        Ok(fields) => finalize_hybrid(store, fields, station_id, primary_name, None, started),
        Err(primary_err) => {
            warn!(source = primary_name, error = %primary_err, "hybrid weather primary source failed, trying fallback");
            let (fallback_name, fallback_result) = if observation_first {
                ("realtime", fetch_current_realtime(realtime_client).await)
            } else {
                ("observation", fetch_current_observation(obs_client).await)
            };
            let fields = fallback_result?;
            finalize_hybrid(store, fields, station_id, fallback_name, Some(primary_name), started)
        }
    }
}

async fn fetch_current_observation(client: &WeatherObsClient) -> Result<WeatherFields> {
    let record = client.fetch_current().await?;
    Ok(WeatherFields::from(&record))
}

async fn fetch_current_realtime(client: &WeatherRealtimeClient) -> Result<WeatherFields> {
    let record = client.fetch_current().await?;
    Ok(WeatherFields::from(&record))
}

fn finalize_hybrid(
    store: &Store,
    fields: WeatherFields,
    station_id: &str,
    source_used: &'static str,
    substituted_for: Option<&'static str>,
    started: Instant,
) -> Result<IngestionStats> {
    let mut stats = IngestionStats {
        requested: 1,
        obtained: 1,
        ..IngestionStats::default()
    };

    let data_source = if source_used == "observation" { "official" } else { "realtime" };
    let now = Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now);

    match build_point(now, &fields, station_id, data_source, "current") {
        Some(point) => {
            let write_stats = store.write_points(std::slice::from_ref(&point))?;
            stats.written = write_stats.written;
        }
        None => stats.validation_errors += 1,
    }

    if let Some(primary) = substituted_for {
        stats.fallback_used = Some(source_used);
        info!(primary, fallback = source_used, "hybrid weather fell back to secondary source");
    }

    stats.duration = started.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_fields() {
        let fields = WeatherFields {
            temperature: Some(500.0),
            temperature_min: None,
            temperature_max: None,
            humidity: Some(50.0),
            humidity_min: None,
            humidity_max: None,
            pressure: Some(1013.0),
            wind_speed: None,
            wind_direction: None,
            precipitation: None,
            solar_radiation: None,
        };
        let point = build_point(Utc::now(), &fields, "3195", "official", "observation");
        assert!(point.is_none());
    }

    #[test]
    fn derives_heat_index_and_comfort_when_both_present() {
        let fields = WeatherFields {
            temperature: Some(30.0),
            temperature_min: None,
            temperature_max: None,
            humidity: Some(70.0),
            humidity_min: None,
            humidity_max: None,
            pressure: Some(1010.0),
            wind_speed: None,
            wind_direction: None,
            precipitation: None,
            solar_radiation: None,
        };
        let point = build_point(Utc::now(), &fields, "3195", "official", "observation").unwrap();
        assert!(point.field("heat_index").is_some());
        assert!(point.field("production_comfort_index").is_some());
    }
}
