// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Hourly optimization plan (§4.9 "Hourly optimization plan"). Weather is
//! held at its most recent observed reading for the full day (the "current
//! + drift" option named in §4.9, since there is no dedicated weather
//! forecaster in this system — only C2's realtime/observation clients).

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use obrador_forecast::forecast as forecast_prices;
use obrador_registry::Registry;
use obrador_store::Store;
use obrador_types::machinery::MachineryCatalog;
use obrador_types::{ObradorError, Result, TagSet, measurement};
use serde::Serialize;

use crate::predict::{score_energy_optimization, score_production_recommendation};

#[derive(Debug, Clone, Serialize)]
pub struct HourPlan {
    pub hour: u32,
    pub timestamp: DateTime<Utc>,
    pub process: Option<String>,
    pub price_eur_kwh: f64,
    pub energy_score: Option<f64>,
    pub production_class: Option<String>,
    pub estimated_cost_eur: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub timeline: Vec<HourPlan>,
    pub aggregate_savings_eur: f64,
}

pub fn plan_day(
    store: &Store,
    registry: &Registry,
    machinery: &MachineryCatalog,
    timezone: &str,
    base: DateTime<Utc>,
) -> Result<DayPlan> {
    let prices = forecast_prices(registry, base, 24, timezone)?;

    let (temperature, humidity) = latest_weather(store)?;

    let tz: Tz = timezone
        .parse()
        .map_err(|_| ObradorError::ConfigError(format!("unknown time zone '{timezone}'")))?;

    let flat_price = prices.iter().map(|p| p.yhat).sum::<f64>() / prices.len() as f64;

    let mut timeline = Vec::with_capacity(prices.len());
    let mut aggregate_savings_eur = 0.0;

    for point in &prices {
        let local_hour = point.timestamp.with_timezone(&tz).hour();
        let spec = machinery.active_at(local_hour);

        let (process, energy_score, production_class, estimated_cost_eur) = match spec {
            Some(spec) => {
                let scored = score_energy_optimization(
                    registry,
                    point.timestamp,
                    local_hour,
                    point.yhat,
                    temperature,
                    humidity,
                    spec,
                )?;
                let classified = score_production_recommendation(
                    registry,
                    point.timestamp,
                    local_hour,
                    point.yhat,
                    temperature,
                    humidity,
                    spec,
                )?;
                let cost = spec.power_kw * point.yhat;
                aggregate_savings_eur += spec.power_kw * (flat_price - point.yhat);
                (
                    Some(spec.name.clone()),
                    Some(scored.energy_optimization_score),
                    Some(classified.recommendation.to_owned()),
                    cost,
                )
            }
            None => (None, None, None, 0.0),
        };

        timeline.push(HourPlan {
            hour: local_hour,
            timestamp: point.timestamp,
            process,
            price_eur_kwh: point.yhat,
            energy_score,
            production_class,
            estimated_cost_eur,
        });
    }

    Ok(DayPlan {
        timeline,
        aggregate_savings_eur,
    })
}

fn latest_weather(store: &Store) -> Result<(f64, f64)> {
    let lookback_start = Utc::now() - Duration::hours(6);
    let points = store.range(measurement::WEATHER_DATA, &TagSet::new(), lookback_start, Utc::now())?;
    let latest = points.iter().max_by_key(|p| p.timestamp);
    match latest {
        Some(p) => Ok((p.field("temperature").unwrap_or(20.0), p.field("humidity").unwrap_or(50.0))),
        None => Ok((20.0, 50.0)),
    }
}
