// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `POST /optimize/production/daily` (§6): the full-day machinery plan,
//! recomputed live from the latest forecaster artifact on every call (P6).

use axum::Json;
use axum::extract::State;
use chrono::Utc;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn daily(State(state): State<AppState>) -> Result<Json<obrador_scoring::DayPlan>, ApiError> {
    let plan = obrador_scoring::plan_day(&state.store, &state.registry, &state.machinery, &state.timezone, Utc::now())?;
    Ok(Json(plan))
}
