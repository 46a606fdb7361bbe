// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Shared harness for the end-to-end scenarios under `tests/`. Spins up the
//! real axum router against a temp-file store and mocked upstreams, the
//! same shape `obrador-server`'s own `main` wires together.

use std::path::PathBuf;
use std::sync::Arc;

use obrador_clients::{PriceClient, WeatherObsClient, WeatherRealtimeClient};
use obrador_registry::Registry;
use obrador_scheduler::{Scheduler, SchedulerContext};
use obrador_server::AppState;
use obrador_store::Store;
use obrador_types::machinery::MachineryCatalog;

pub const DEFAULT_TIMEZONE: &str = "Europe/Madrid";
pub const DEFAULT_STATION_ID: &str = "3195";
pub const DEFAULT_MUNICIPALITY_CODE: &str = "28079";
pub const DEFAULT_AUTO_BACKFILL_MAX_GAP_HOURS: f64 = 6.0;
pub const DEFAULT_AUTO_BACKFILL_DAYS_BACK: i64 = 30;

#[derive(Debug, Clone)]
pub struct UpstreamStubs {
    pub price_base: String,
    pub weather_obs_base: String,
    pub weather_realtime_base: String,
}

pub struct TestHarness {
    pub base_url: String,
    pub client: reqwest::Client,
    store_path: PathBuf,
    _store_dir: tempfile::TempDir,
    _registry_dir: tempfile::TempDir,
    _token_dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn start(stubs: UpstreamStubs) -> Self {
        Self::start_with_machinery(stubs, MachineryCatalog::default()).await
    }

    pub async fn start_with_machinery(stubs: UpstreamStubs, machinery: MachineryCatalog) -> Self {
        let store_dir = tempfile::tempdir().expect("temp store dir");
        let registry_dir = tempfile::tempdir().expect("temp registry dir");
        let token_dir = tempfile::tempdir().expect("temp token-cache dir");
        let store_path = store_dir.path().join("obrador.db");

        let scheduler_ctx = SchedulerContext {
            store: Store::open(store_path.to_str().expect("utf8 path")).expect("open store for scheduler"),
            registry: Registry::open(registry_dir.path()).expect("open registry for scheduler"),
            price_client: PriceClient::new(stubs.price_base.clone()).expect("price client"),
            weather_obs_client: WeatherObsClient::new(
                stubs.weather_obs_base.clone(),
                "test-key",
                DEFAULT_STATION_ID,
                token_dir.path().join("token.json"),
            )
            .expect("weather obs client"),
            weather_realtime_client: WeatherRealtimeClient::new(
                stubs.weather_realtime_base.clone(),
                "test-key",
                DEFAULT_MUNICIPALITY_CODE,
            )
            .expect("weather realtime client"),
            machinery: machinery.clone(),
            timezone: DEFAULT_TIMEZONE.to_owned(),
            station_id: DEFAULT_STATION_ID.to_owned(),
            historical_csv_dir: PathBuf::from("data/csv"),
            auto_backfill_max_gap_hours: DEFAULT_AUTO_BACKFILL_MAX_GAP_HOURS,
            auto_backfill_days_back: DEFAULT_AUTO_BACKFILL_DAYS_BACK,
            telemetry_retention_days: 90,
        };

        // Only the catalogue itself is needed for `/ready` and
        // `/scheduler/status` to have job entries; the background loops
        // aren't started so tests control ingestion timing explicitly.
        let scheduler = Arc::new(Scheduler::new(scheduler_ctx));

        let state = AppState {
            store: Arc::new(Store::open(store_path.to_str().expect("utf8 path")).expect("open store for state")),
            registry: Arc::new(Registry::open(registry_dir.path()).expect("open registry for state")),
            price_client: Arc::new(PriceClient::new(stubs.price_base).expect("price client")),
            weather_obs_client: Arc::new(
                WeatherObsClient::new(stubs.weather_obs_base, "test-key", DEFAULT_STATION_ID, token_dir.path().join("token.json"))
                    .expect("weather obs client"),
            ),
            weather_realtime_client: Arc::new(
                WeatherRealtimeClient::new(stubs.weather_realtime_base, "test-key", DEFAULT_MUNICIPALITY_CODE)
                    .expect("weather realtime client"),
            ),
            machinery: Arc::new(machinery),
            scheduler,
            timezone: DEFAULT_TIMEZONE.to_owned(),
            station_id: DEFAULT_STATION_ID.to_owned(),
            historical_csv_dir: PathBuf::from("data/csv"),
            auto_backfill_max_gap_hours: DEFAULT_AUTO_BACKFILL_MAX_GAP_HOURS,
            auto_backfill_days_back: DEFAULT_AUTO_BACKFILL_DAYS_BACK,
        };

        let app = obrador_server::build_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            store_path,
            _store_dir: store_dir,
            _registry_dir: registry_dir,
            _token_dir: token_dir,
        }
    }

    /// A second, independent connection onto the same database file, for
    /// tests that want to seed or assert on store contents directly rather
    /// than through the HTTP surface.
    pub fn store(&self) -> Store {
        Store::open(self.store_path.to_str().expect("utf8 path")).expect("open store for assertions")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
