// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Binary entry point: loads configuration, wires the store/clients/registry,
//! starts the scheduler, and serves the HTTP surface until signalled to stop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use obrador_clients::{PriceClient, WeatherObsClient, WeatherRealtimeClient};
use obrador_registry::Registry;
use obrador_scheduler::{Scheduler, SchedulerContext};
use obrador_server::AppState;
use obrador_store::Store;
use obrador_types::ObradorConfig;
use tracing_subscriber::EnvFilter;

const STORE_OPEN_ATTEMPTS: u32 = 5;
const STORE_OPEN_RETRY_DELAY: StdDuration = StdDuration::from_secs(2);

/// Everything outside the historical CSV archive and the config file itself
/// is rooted here; the layout matches the on-disk state contract (§6).
const HISTORICAL_CSV_DIR: &str = "data/csv";
const AUTO_BACKFILL_DAYS_BACK: i64 = 30;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_owned());

    let config = match ObradorConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, path = %config_path, "failed to load configuration");
            std::process::exit(2);
        }
    };

    match run(config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            tracing::error!(error = %e, "unrecoverable startup failure");
            std::process::exit(1);
        }
    }
}

/// Builds one independent set of store/registry/client handles. Called once
/// for the scheduler's own context and once for the HTTP state: none of
/// these types are `Clone` (each owns a connection or an HTTP client), and
/// the scheduler context holds them directly rather than behind an `Arc`, so
/// the two call sites open separate connections onto the same SQLite file
/// and the same on-disk registry/token-cache paths.
fn open_handles(
    config: &ObradorConfig,
    store: Store,
) -> anyhow::Result<(Store, Registry, PriceClient, WeatherObsClient, WeatherRealtimeClient)> {
    let registry = Registry::open("models")?;
    let price_client = PriceClient::new(config.upstreams.price_api_base.clone())?;
    let weather_obs_client = WeatherObsClient::new(
        config.upstreams.weather_obs_api_base.clone(),
        config.upstreams.weather_obs_api_key.clone(),
        config.location.station_id.clone(),
        "data/weather_obs_token.json",
    )?;
    let weather_realtime_client = WeatherRealtimeClient::new(
        config.upstreams.weather_realtime_api_base.clone(),
        config.upstreams.weather_realtime_api_key.clone(),
        config.location.municipality_code.clone(),
    )?;
    Ok((store, registry, price_client, weather_obs_client, weather_realtime_client))
}

async fn run(config: ObradorConfig) -> anyhow::Result<i32> {
    let auto_backfill_max_gap_hours = f64::from(config.runtime.auto_backfill_max_gap_hours);

    let scheduler_store = open_store_with_retries(&config.store.url).await?;
    let (store, registry, price_client, weather_obs_client, weather_realtime_client) =
        open_handles(&config, scheduler_store)?;

    let scheduler_ctx = SchedulerContext {
        store,
        registry,
        price_client,
        weather_obs_client,
        weather_realtime_client,
        machinery: config.machinery.clone(),
        timezone: config.location.timezone.clone(),
        station_id: config.location.station_id.clone(),
        historical_csv_dir: PathBuf::from(HISTORICAL_CSV_DIR),
        auto_backfill_max_gap_hours,
        auto_backfill_days_back: AUTO_BACKFILL_DAYS_BACK,
        telemetry_retention_days: i64::from(config.runtime.telemetry_retention_days),
    };

    let scheduler = Arc::new(Scheduler::new(scheduler_ctx));
    scheduler.start();

    let http_store = open_store_with_retries(&config.store.url).await?;
    let (store, registry, price_client, weather_obs_client, weather_realtime_client) =
        open_handles(&config, http_store)?;

    let state = AppState {
        store: Arc::new(store),
        registry: Arc::new(registry),
        price_client: Arc::new(price_client),
        weather_obs_client: Arc::new(weather_obs_client),
        weather_realtime_client: Arc::new(weather_realtime_client),
        machinery: Arc::new(config.machinery.clone()),
        scheduler: scheduler.clone(),
        timezone: config.location.timezone.clone(),
        station_id: config.location.station_id.clone(),
        historical_csv_dir: PathBuf::from(HISTORICAL_CSV_DIR),
        auto_backfill_max_gap_hours,
        auto_backfill_days_back: AUTO_BACKFILL_DAYS_BACK,
    };

    let app = obrador_server::build_router(state);

    let addr = format!("0.0.0.0:{}", config.runtime.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "obrador-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // `shutdown_signal` only resolves once SIGINT or SIGTERM arrives — there
    // is no other path out of `with_graceful_shutdown` — so reaching this
    // point always means a signal-triggered shutdown (§6 exit codes).
    tracing::info!("shutdown signal received, draining scheduler");
    scheduler.shutdown().await;

    Ok(130)
}

async fn open_store_with_retries(url: &str) -> anyhow::Result<Store> {
    let mut last_error = None;
    for attempt in 1..=STORE_OPEN_ATTEMPTS {
        match Store::open(url) {
            Ok(store) => return Ok(store),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "store unreachable, retrying");
                last_error = Some(e);
                tokio::time::sleep(STORE_OPEN_RETRY_DELAY).await;
            }
        }
    }
    Err(anyhow::anyhow!(
        "store unreachable after {STORE_OPEN_ATTEMPTS} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
