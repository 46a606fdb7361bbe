// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `POST /ingest/now` (§6): manual ingestion trigger outside the scheduler's
//! own cadence, useful for operators kicking off a fresh pull on demand.

use axum::Json;
use axum::extract::State;
use chrono::{Duration, Utc};
use obrador_ingest::IngestionStats;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestSource {
    Price,
    Weather,
    Hybrid,
}

#[derive(Debug, Deserialize)]
pub struct IngestNowRequest {
    pub source: IngestSource,
}

#[derive(Debug, Serialize)]
pub struct IngestNowResponse {
    pub requested: usize,
    pub obtained: usize,
    pub written: usize,
    pub validation_errors: usize,
    pub fallback_used: Option<&'static str>,
}

impl From<IngestionStats> for IngestNowResponse {
    fn from(stats: IngestionStats) -> Self {
        Self {
            requested: stats.requested,
            obtained: stats.obtained,
            written: stats.written,
            validation_errors: stats.validation_errors,
            fallback_used: stats.fallback_used,
        }
    }
}

pub async fn ingest_now(
    State(state): State<AppState>,
    Json(request): Json<IngestNowRequest>,
) -> Result<Json<IngestNowResponse>, ApiError> {
    let now = Utc::now();

    let stats = match request.source {
        IngestSource::Price => {
            obrador_ingest::ingest_price_window(
                &state.price_client,
                &state.store,
                now - Duration::hours(2),
                now + Duration::hours(26),
                &state.timezone,
            )
            .await?
        }
        IngestSource::Weather => {
            obrador_ingest::ingest_weather_current(&state.weather_obs_client, &state.store, &state.station_id).await?
        }
        IngestSource::Hybrid => {
            obrador_ingest::ingest_hybrid_weather(
                &state.weather_obs_client,
                &state.weather_realtime_client,
                &state.store,
                &state.station_id,
                &state.timezone,
            )
            .await?
        }
    };

    Ok(Json(stats.into()))
}
