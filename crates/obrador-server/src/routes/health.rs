// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `GET /health`, `GET /ready`, `GET /version` (§6).

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Readiness requires the store to answer and the scheduler's own
/// `health_check` job (which itself pings the store and the price API) to
/// not be reporting its most recent run as a failure.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.store.ping().is_ok();

    let scheduler_status = state.scheduler.status().await;
    let upstream_ok = scheduler_status
        .jobs
        .iter()
        .find(|j| j.id == "health_check")
        .is_none_or(|j| j.stats.last_error.is_none());

    let ready = store_ok && upstream_ok;
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(json!({
            "ready": ready,
            "components": {
                "store": store_ok,
                "upstream": upstream_ok,
            }
        })),
    )
}

pub async fn version() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("OBRADOR_GIT_COMMIT").unwrap_or("unknown"),
        "built_at": option_env!("OBRADOR_BUILT_AT").unwrap_or("unknown"),
    }))
}
