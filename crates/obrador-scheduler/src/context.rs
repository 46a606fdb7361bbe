// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Shared handles every job body reads from. One [`SchedulerContext`] is
//! built at startup and held behind an `Arc` by the running jobs.

use std::path::PathBuf;

use obrador_clients::{PriceClient, WeatherObsClient, WeatherRealtimeClient};
use obrador_registry::Registry;
use obrador_store::Store;
use obrador_types::machinery::MachineryCatalog;

pub struct SchedulerContext {
    pub store: Store,
    pub registry: Registry,
    pub price_client: PriceClient,
    pub weather_obs_client: WeatherObsClient,
    pub weather_realtime_client: WeatherRealtimeClient,
    pub machinery: MachineryCatalog,
    pub timezone: String,
    pub station_id: String,
    pub historical_csv_dir: PathBuf,
    pub auto_backfill_max_gap_hours: f64,
    pub auto_backfill_days_back: i64,
    pub telemetry_retention_days: i64,
}
