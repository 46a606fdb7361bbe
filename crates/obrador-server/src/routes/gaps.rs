// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `/gaps/*` (§6): freshness snapshot, gap enumeration and the three
//! backfill entry points (background, conditional, explicit-range).

use axum::Json;
use axum::extract::{Query, State};
use chrono::{Duration, Utc};
use obrador_gaps::{BackfillResult, Gap, Severity, backfill_price_gap, backfill_weather_gap};
use obrador_types::{TagSet, measurement};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_DAYS_BACK: i64 = 7;
const SAMPLING_DELTA: Duration = Duration::hours(1);

#[derive(Debug, Serialize)]
struct FreshnessEntry {
    last_timestamp: Option<chrono::DateTime<Utc>>,
    gap_hours: Option<f64>,
}

pub async fn summary(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let latest = obrador_gaps::latest_timestamps(&state.store)?;
    let now = Utc::now();

    let price_gap_hours = latest.price.map(|ts| (now - ts).num_seconds() as f64 / 3600.0);
    let weather_gap_hours = latest.weather.map(|ts| (now - ts).num_seconds() as f64 / 3600.0);

    let threshold = state.auto_backfill_max_gap_hours;
    let action_needed = price_gap_hours.unwrap_or(f64::MAX) > threshold || weather_gap_hours.unwrap_or(f64::MAX) > threshold;

    Ok(Json(json!({
        "price": FreshnessEntry { last_timestamp: latest.price, gap_hours: price_gap_hours },
        "weather": FreshnessEntry { last_timestamp: latest.weather, gap_hours: weather_gap_hours },
        "recommendations": {
            "action_needed": action_needed,
            "suggested": if action_needed { "POST /gaps/backfill/auto" } else { "none" },
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct DetectQuery {
    #[serde(default = "default_days_back")]
    days_back: i64,
}

fn default_days_back() -> i64 {
    DEFAULT_DAYS_BACK
}

pub async fn detect(
    State(state): State<AppState>,
    Query(query): Query<DetectQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let lookback = Duration::days(query.days_back);
    let price_gaps = obrador_gaps::detect_gaps(&state.store, measurement::ENERGY_PRICES, &TagSet::new(), SAMPLING_DELTA, lookback)?;
    let weather_gaps = obrador_gaps::detect_gaps(&state.store, measurement::WEATHER_DATA, &TagSet::new(), SAMPLING_DELTA, lookback)?;

    let recommended_strategy = weather_gaps
        .iter()
        .max_by(|a, b| a.duration_hours().total_cmp(&b.duration_hours()))
        .map(|gap| obrador_gaps::select_weather_strategy(gap, Utc::now()).as_str());

    Ok(Json(json!({
        "summary": {
            "price_gap_count": price_gaps.len(),
            "weather_gap_count": weather_gaps.len(),
        },
        "price_gaps": price_gaps.iter().map(gap_json).collect::<Vec<_>>(),
        "weather_gaps": weather_gaps.iter().map(gap_json).collect::<Vec<_>>(),
        "recommended_strategy": recommended_strategy,
    })))
}

fn gap_json(gap: &Gap) -> serde_json::Value {
    json!({
        "start": gap.start,
        "end": gap.end,
        "missing_count": gap.missing_count,
        "severity": gap.severity.as_str(),
    })
}

#[derive(Debug, Deserialize)]
pub struct BackfillQuery {
    #[serde(default = "default_days_back")]
    days_back: i64,
}

/// Kicks off recovery in the background and returns immediately; the caller
/// polls `/gaps/summary` to watch progress rather than blocking on it.
pub async fn backfill(State(state): State<AppState>, Query(query): Query<BackfillQuery>) -> Json<serde_json::Value> {
    let days_processing = query.days_back;
    let lookback = Duration::days(days_processing);

    tokio::spawn(async move {
        let price_gaps =
            match obrador_gaps::detect_gaps(&state.store, measurement::ENERGY_PRICES, &TagSet::new(), SAMPLING_DELTA, lookback) {
                Ok(gaps) => gaps,
                Err(e) => {
                    warn!(error = %e, "background backfill failed to enumerate price gaps");
                    return;
                }
            };
        for gap in &price_gaps {
            backfill_price_gap(&state.price_client, &state.store, gap, &state.timezone).await;
        }

        let weather_gaps =
            match obrador_gaps::detect_gaps(&state.store, measurement::WEATHER_DATA, &TagSet::new(), SAMPLING_DELTA, lookback) {
                Ok(gaps) => gaps,
                Err(e) => {
                    warn!(error = %e, "background backfill failed to enumerate weather gaps");
                    return;
                }
            };
        for gap in &weather_gaps {
            backfill_weather_gap(&state.weather_obs_client, &state.store, gap, &state.station_id, &state.historical_csv_dir)
                .await;
        }
        info!(days_processing, "background backfill completed");
    });

    Json(json!({ "status": "executing_in_background", "days_processing": days_processing }))
}

#[derive(Debug, Deserialize)]
pub struct AutoBackfillQuery {
    max_gap_hours: f64,
}

pub async fn backfill_auto(
    State(state): State<AppState>,
    Query(query): Query<AutoBackfillQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = obrador_gaps::auto_backfill_check(
        &state.store,
        &state.price_client,
        &state.weather_obs_client,
        query.max_gap_hours,
        &state.station_id,
        &state.timezone,
        &state.historical_csv_dir,
        state.auto_backfill_days_back,
    )
    .await?;

    let body = match outcome {
        obrador_gaps::AutoBackfillOutcome::NoActionNeeded { .. } => json!({ "status": "no_action_needed" }),
        obrador_gaps::AutoBackfillOutcome::Executed(results) => json!({
            "status": "executed",
            "results": results.iter().map(backfill_result_json).collect::<Vec<_>>(),
        }),
    };

    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeDataSource {
    Price,
    Weather,
}

#[derive(Debug, Deserialize)]
pub struct BackfillRangeRequest {
    pub start: chrono::DateTime<Utc>,
    pub end: chrono::DateTime<Utc>,
    pub data_source: RangeDataSource,
}

pub async fn backfill_range(
    State(state): State<AppState>,
    Json(request): Json<BackfillRangeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let duration_hours = (request.end - request.start).num_seconds() as f64 / 3600.0;
    let gap = Gap {
        measurement: match request.data_source {
            RangeDataSource::Price => measurement::ENERGY_PRICES.to_owned(),
            RangeDataSource::Weather => measurement::WEATHER_DATA.to_owned(),
        },
        tagset_filter: TagSet::new(),
        start: request.start,
        end: request.end,
        expected_count: 0,
        missing_count: 0,
        severity: classify_by_duration(duration_hours),
    };

    let result = match request.data_source {
        RangeDataSource::Price => backfill_price_gap(&state.price_client, &state.store, &gap, &state.timezone).await,
        RangeDataSource::Weather => {
            backfill_weather_gap(&state.weather_obs_client, &state.store, &gap, &state.station_id, &state.historical_csv_dir)
                .await
        }
    };

    Ok(Json(backfill_result_json(&result)))
}

fn classify_by_duration(duration_hours: f64) -> Severity {
    if duration_hours <= 2.0 {
        Severity::Minor
    } else if duration_hours <= 12.0 {
        Severity::Moderate
    } else {
        Severity::Critical
    }
}

fn backfill_result_json(result: &BackfillResult) -> serde_json::Value {
    json!({
        "records_requested": result.records_requested,
        "records_obtained": result.records_obtained,
        "records_written": result.records_written,
        "source_used": result.source_used,
        "success_rate": result.overall_success_rate(),
        "errors": result.errors,
    })
}
