// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `/insights/*` (§6): derived views over today's plan, no state of their
//! own beyond what `obrador-scoring` already computes per request.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OptimalWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub mean_price: f64,
    pub score: f64,
}

const OPTIMAL_WINDOW_COUNT: usize = 6;

pub async fn optimal_windows(State(state): State<AppState>) -> Result<Json<Vec<OptimalWindow>>, ApiError> {
    let plan = obrador_scoring::plan_day(&state.store, &state.registry, &state.machinery, &state.timezone, Utc::now())?;

    let mut hours: Vec<_> = plan.timeline.into_iter().filter(|h| h.energy_score.is_some()).collect();
    hours.sort_by(|a, b| b.energy_score.unwrap_or(0.0).total_cmp(&a.energy_score.unwrap_or(0.0)));
    hours.truncate(OPTIMAL_WINDOW_COUNT);
    hours.sort_by_key(|h| h.timestamp);

    let windows = hours
        .into_iter()
        .map(|h| OptimalWindow {
            start: h.timestamp,
            end: h.timestamp + Duration::hours(1),
            mean_price: h.price_eur_kwh,
            score: h.energy_score.unwrap_or(0.0),
        })
        .collect();

    Ok(Json(windows))
}

#[derive(Debug, Serialize)]
pub struct SavingsTracking {
    pub daily_eur: f64,
    pub monthly_eur: f64,
    pub annual_eur: f64,
    pub breakdown: BTreeMap<String, f64>,
}

const DAYS_PER_MONTH: f64 = 30.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Projects today's plan ([`obrador_scoring::plan_day`]'s flat-baseline
/// savings) over a month and a year; the breakdown is actual estimated
/// cost per active process, not a savings split, since the plan doesn't
/// carry a per-process flat-baseline figure to subtract against.
pub async fn savings_tracking(State(state): State<AppState>) -> Result<Json<SavingsTracking>, ApiError> {
    let plan = obrador_scoring::plan_day(&state.store, &state.registry, &state.machinery, &state.timezone, Utc::now())?;

    let mut breakdown: BTreeMap<String, f64> = BTreeMap::new();
    for hour in &plan.timeline {
        if let Some(process) = &hour.process {
            *breakdown.entry(process.clone()).or_insert(0.0) += hour.estimated_cost_eur;
        }
    }

    Ok(Json(SavingsTracking {
        daily_eur: plan.aggregate_savings_eur,
        monthly_eur: plan.aggregate_savings_eur * DAYS_PER_MONTH,
        annual_eur: plan.aggregate_savings_eur * DAYS_PER_YEAR,
        breakdown,
    }))
}
