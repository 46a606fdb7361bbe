// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `GET /scheduler/status` (§6): per-job run counts and next-run times.

use axum::Json;
use axum::extract::State;
use obrador_scheduler::SchedulerStatus;

use crate::state::AppState;

pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}
