// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Shared state handed to every handler via axum's `State` extractor.
//! Thin and `Clone` (every field is an `Arc`), the same shape `with_state`
//! expects in the rest of this workspace.

use std::path::PathBuf;
use std::sync::Arc;

use obrador_clients::{PriceClient, WeatherObsClient, WeatherRealtimeClient};
use obrador_registry::Registry;
use obrador_scheduler::Scheduler;
use obrador_store::Store;
use obrador_types::machinery::MachineryCatalog;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub registry: Arc<Registry>,
    pub price_client: Arc<PriceClient>,
    pub weather_obs_client: Arc<WeatherObsClient>,
    pub weather_realtime_client: Arc<WeatherRealtimeClient>,
    pub machinery: Arc<MachineryCatalog>,
    pub scheduler: Arc<Scheduler>,
    pub timezone: String,
    pub station_id: String,
    pub historical_csv_dir: PathBuf,
    pub auto_backfill_max_gap_hours: f64,
    pub auto_backfill_days_back: i64,
}
