// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `GET /dashboard/complete` (§6): the single aggregate blob the UI polls
//! instead of calling every other endpoint itself.

use axum::Json;
use axum::extract::State;
use chrono::{Duration, Utc};
use obrador_types::{TagSet, measurement};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct CurrentSnapshot {
    price_eur_kwh: Option<f64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
}

pub async fn complete(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let now = Utc::now();

    let price_points = state.store.range(measurement::ENERGY_PRICES, &TagSet::new(), now - Duration::hours(6), now)?;
    let weather_points = state.store.range(measurement::WEATHER_DATA, &TagSet::new(), now - Duration::hours(6), now)?;

    let current = CurrentSnapshot {
        price_eur_kwh: price_points.iter().max_by_key(|p| p.timestamp).and_then(|p| p.field("price_eur_kwh")),
        temperature: weather_points.iter().max_by_key(|p| p.timestamp).and_then(|p| p.field("temperature")),
        humidity: weather_points.iter().max_by_key(|p| p.timestamp).and_then(|p| p.field("humidity")),
    };

    let forecast = obrador_forecast::forecast(&state.registry, now, obrador_forecast::MAX_HORIZON_HOURS, &state.timezone)
        .unwrap_or_default();

    let plan = obrador_scoring::plan_day(&state.store, &state.registry, &state.machinery, &state.timezone, now).ok();

    let siar_points = state
        .store
        .range(measurement::SIAR_WEATHER, &TagSet::new(), now - Duration::days(30), now)
        .unwrap_or_default();
    let siar_context = json!({
        "historical_days_available": siar_points.len(),
        "latest_archived_day": siar_points.iter().map(|p| p.timestamp).max(),
    });

    let latest = obrador_gaps::latest_timestamps(&state.store)?;
    let insights = json!({
        "price_gap_hours": latest.price.map(|ts| (now - ts).num_seconds() as f64 / 3600.0),
        "weather_gap_hours": latest.weather.map(|ts| (now - ts).num_seconds() as f64 / 3600.0),
    });

    let scheduler_status = state.scheduler.status().await;
    let system = json!({
        "scheduler": scheduler_status,
        "version": env!("CARGO_PKG_VERSION"),
    });

    Ok(Json(json!({
        "current": current,
        "forecast": forecast,
        "plan": plan,
        "siar_context": siar_context,
        "insights": insights,
        "system": system,
    })))
}
