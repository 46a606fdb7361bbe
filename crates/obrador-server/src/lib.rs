// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! HTTP surface (C10): thin axum handlers over ingestion, gaps, forecasting,
//! scoring and the scheduler. [`build_router`] is exposed separately from
//! `main` so integration tests can mount the same router in-process.

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/ready", get(routes::health::ready))
        .route("/version", get(routes::health::version))
        .route("/ingest/now", post(routes::ingest::ingest_now))
        .route("/gaps/summary", get(routes::gaps::summary))
        .route("/gaps/detect", get(routes::gaps::detect))
        .route("/gaps/backfill", post(routes::gaps::backfill))
        .route("/gaps/backfill/auto", post(routes::gaps::backfill_auto))
        .route("/gaps/backfill/range", post(routes::gaps::backfill_range))
        .route("/predict/prices/train", post(routes::predict::train_prices))
        .route("/predict/prices/weekly", get(routes::predict::weekly))
        .route("/predict/prices/hourly", get(routes::predict::hourly))
        .route("/predict/prices/status", get(routes::predict::status))
        .route("/predict/train", post(routes::predict::train_scoring))
        .route("/predict/energy-optimization", post(routes::predict::energy_optimization))
        .route("/predict/production-recommendation", post(routes::predict::production_recommendation))
        .route("/optimize/production/daily", post(routes::optimize::daily))
        .route("/insights/optimal-windows", get(routes::insights::optimal_windows))
        .route("/insights/savings-tracking", get(routes::insights::savings_tracking))
        .route("/dashboard/complete", get(routes::dashboard::complete))
        .route("/scheduler/status", get(routes::scheduler::status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
