// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `/predict/*` (§6): price forecaster training/serving and the two
//! single-hour scoring endpoints over the persisted regressor/classifier.

use axum::Json;
use axum::extract::{Query, State};
use chrono::{Timelike, Utc};
use chrono_tz::Tz;
use obrador_types::ObradorError;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn train_prices(State(state): State<AppState>) -> Result<Json<obrador_forecast::TrainingReport>, ApiError> {
    let report = obrador_forecast::train_forecaster(&state.store, &state.registry, &state.timezone)?;
    Ok(Json(report))
}

pub async fn weekly(State(state): State<AppState>) -> Result<Json<Vec<obrador_forecast::ForecastPoint>>, ApiError> {
    let points = obrador_forecast::forecast(&state.registry, Utc::now(), obrador_forecast::MAX_HORIZON_HOURS, &state.timezone)?;
    Ok(Json(points))
}

#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    #[serde(default = "default_hourly_window")]
    hours: u32,
}

fn default_hourly_window() -> u32 {
    24
}

pub async fn hourly(
    State(state): State<AppState>,
    Query(query): Query<HourlyQuery>,
) -> Result<Json<Vec<obrador_forecast::ForecastPoint>>, ApiError> {
    let points = obrador_forecast::forecast(&state.registry, Utc::now(), query.hours, &state.timezone)?;
    Ok(Json(points))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let forecaster = state.registry.latest(obrador_forecast::ARTIFACT_KIND)?;
    let scoring_regressor = state.registry.latest(obrador_scoring::REGRESSOR_ARTIFACT_KIND)?;
    let scoring_classifier = state.registry.latest(obrador_scoring::CLASSIFIER_ARTIFACT_KIND)?;

    Ok(Json(serde_json::json!({
        "price_forecaster": forecaster,
        "energy_score_regressor": scoring_regressor,
        "production_classifier": scoring_classifier,
    })))
}

pub async fn train_scoring(State(state): State<AppState>) -> Result<Json<obrador_scoring::ScoringTrainingReport>, ApiError> {
    let report = obrador_scoring::train_scoring(&state.store, &state.registry, &state.machinery, &state.timezone)?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ScoringRequest {
    pub price_eur_kwh: f64,
    pub temperature: f64,
    pub humidity: f64,
}

fn local_hour(timezone: &str) -> Result<(chrono::DateTime<Utc>, u32), ApiError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ApiError(ObradorError::ConfigError(format!("unknown time zone '{timezone}'"))))?;
    let now = Utc::now();
    let hour = now.with_timezone(&tz).hour();
    Ok((now, hour))
}

pub async fn energy_optimization(
    State(state): State<AppState>,
    Json(request): Json<ScoringRequest>,
) -> Result<Json<obrador_scoring::EnergyOptimizationResult>, ApiError> {
    let (now, hour) = local_hour(&state.timezone)?;
    let spec = state
        .machinery
        .active_at(hour)
        .ok_or_else(|| ApiError(ObradorError::ValidationError(format!("no machinery process active at hour {hour}"))))?;

    let result = obrador_scoring::score_energy_optimization(
        &state.registry,
        now,
        hour,
        request.price_eur_kwh,
        request.temperature,
        request.humidity,
        spec,
    )?;
    Ok(Json(result))
}

pub async fn production_recommendation(
    State(state): State<AppState>,
    Json(request): Json<ScoringRequest>,
) -> Result<Json<obrador_scoring::ProductionRecommendationResult>, ApiError> {
    let (now, hour) = local_hour(&state.timezone)?;
    let spec = state
        .machinery
        .active_at(hour)
        .ok_or_else(|| ApiError(ObradorError::ValidationError(format!("no machinery process active at hour {hour}"))))?;

    let result = obrador_scoring::score_production_recommendation(
        &state.registry,
        now,
        hour,
        request.price_eur_kwh,
        request.temperature,
        request.humidity,
        spec,
    )?;
    Ok(Json(result))
}
