// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Ingestion service (C3): turns upstream payloads into validated,
//! tagged store points and reports what happened as an [`IngestionStats`].

mod derive;
mod historical;
mod price;
mod validate;
mod weather;

pub use derive::{heat_index, local_hour, price_eur_kwh, production_comfort_index};
pub use historical::ingest_historical_csv;
pub use price::ingest_price_window;
pub use weather::{
    ingest_hybrid_weather, ingest_weather_current, ingest_weather_observations, ingest_weather_window,
};

use std::time::Duration;

/// Outcome of one ingestion call (§4.3 point 6). `fallback_used` is only set
/// by [`ingest_hybrid_weather`] when the primary source failed and a
/// secondary source was substituted.
#[derive(Debug, Clone, Default)]
pub struct IngestionStats {
    pub requested: usize,
    pub obtained: usize,
    pub written: usize,
    pub validation_errors: usize,
    pub duration: Duration,
    pub fallback_used: Option<&'static str>,
}

impl IngestionStats {
    pub fn success_rate(&self) -> f64 {
        if self.requested == 0 {
            return 1.0;
        }
        self.written as f64 / self.requested as f64
    }
}
