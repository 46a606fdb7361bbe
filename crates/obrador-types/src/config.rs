// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

use std::path::Path;

use serde::Deserialize;

use crate::machinery::MachineryCatalog;
use crate::{ObradorError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ObradorConfig {
    pub store: StoreSettings,
    pub upstreams: UpstreamSettings,
    pub location: LocationSettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub machinery: MachineryCatalog,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Path to the embedded SQLite database file. Named `url` (rather than
    /// `path`) to keep the `STORE_URL` environment variable's meaning
    /// consistent across deployments that might back this with a networked
    /// store in the future.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Accepted for interface compatibility with a networked store; unused by
    /// the embedded SQLite adapter.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default = "default_bucket_operational")]
    pub bucket_operational: String,
    #[serde(default = "default_bucket_historical")]
    pub bucket_historical: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
    pub price_api_base: String,
    pub weather_obs_api_base: String,
    pub weather_obs_api_key: String,
    pub weather_realtime_api_base: String,
    pub weather_realtime_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationSettings {
    pub station_id: String,
    pub municipality_code: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_clock_skew_tolerance")]
    pub clock_skew_tolerance_seconds: i64,
    #[serde(default = "default_auto_backfill_max_gap_hours")]
    pub auto_backfill_max_gap_hours: u32,
    #[serde(default = "default_telemetry_retention_days")]
    pub telemetry_retention_days: u32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            http_port: default_http_port(),
            clock_skew_tolerance_seconds: default_clock_skew_tolerance(),
            auto_backfill_max_gap_hours: default_auto_backfill_max_gap_hours(),
            telemetry_retention_days: default_telemetry_retention_days(),
        }
    }
}

fn default_store_url() -> String {
    "./data/obrador.db".to_owned()
}

fn default_bucket_operational() -> String {
    "operational".to_owned()
}

fn default_bucket_historical() -> String {
    "historical".to_owned()
}

fn default_timezone() -> String {
    "Europe/Madrid".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_http_port() -> u16 {
    8000
}

fn default_clock_skew_tolerance() -> i64 {
    5
}

fn default_auto_backfill_max_gap_hours() -> u32 {
    6
}

fn default_telemetry_retention_days() -> u32 {
    90
}

impl ObradorConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(Path::new(path))
            .map_err(|e| ObradorError::ConfigError(format!("reading config file {path}: {e}")))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ObradorError::ConfigError(format!("parsing config TOML: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables enumerated in the external-interfaces contract
    /// take precedence over the file, matching every other runtime knob
    /// named there (`STORE_URL`, `PRICE_API_BASE`, ...).
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("STORE_URL") {
            self.store.url = v;
        }
        if let Ok(v) = std::env::var("STORE_TOKEN") {
            self.store.token = Some(v);
        }
        if let Ok(v) = std::env::var("STORE_ORG") {
            self.store.org = Some(v);
        }
        if let Ok(v) = std::env::var("STORE_BUCKET_OPERATIONAL") {
            self.store.bucket_operational = v;
        }
        if let Ok(v) = std::env::var("STORE_BUCKET_HISTORICAL") {
            self.store.bucket_historical = v;
        }
        if let Ok(v) = std::env::var("PRICE_API_BASE") {
            self.upstreams.price_api_base = v;
        }
        if let Ok(v) = std::env::var("WEATHER_OBS_API_BASE") {
            self.upstreams.weather_obs_api_base = v;
        }
        if let Ok(v) = std::env::var("WEATHER_OBS_API_KEY") {
            self.upstreams.weather_obs_api_key = v;
        }
        if let Ok(v) = std::env::var("WEATHER_REALTIME_API_BASE") {
            self.upstreams.weather_realtime_api_base = v;
        }
        if let Ok(v) = std::env::var("WEATHER_REALTIME_API_KEY") {
            self.upstreams.weather_realtime_api_key = v;
        }
        if let Ok(v) = std::env::var("STATION_ID") {
            self.location.station_id = v;
        }
        if let Ok(v) = std::env::var("MUNICIPALITY_CODE") {
            self.location.municipality_code = v;
        }
        if let Ok(v) = std::env::var("TIMEZONE") {
            self.location.timezone = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.runtime.log_level = v;
        }
        if let Ok(v) = std::env::var("HTTP_PORT") {
            if let Ok(port) = v.parse() {
                self.runtime.http_port = port;
            }
        }
        if let Ok(v) = std::env::var("CLOCK_SKEW_TOLERANCE_SECONDS") {
            if let Ok(secs) = v.parse() {
                self.runtime.clock_skew_tolerance_seconds = secs;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.store.url.is_empty() {
            return Err(ObradorError::ConfigError(
                "store.url must be set".to_owned(),
            ));
        }
        if self.upstreams.price_api_base.is_empty() {
            return Err(ObradorError::ConfigError(
                "upstreams.price_api_base must be set".to_owned(),
            ));
        }
        if self.location.station_id.is_empty() {
            return Err(ObradorError::ConfigError(
                "location.station_id must be set".to_owned(),
            ));
        }
        if !(2..=24).contains(&self.runtime.auto_backfill_max_gap_hours) {
            return Err(ObradorError::ConfigError(format!(
                "runtime.auto_backfill_max_gap_hours must be within [2, 24], got {}",
                self.runtime.auto_backfill_max_gap_hours
            )));
        }
        Ok(())
    }
}
