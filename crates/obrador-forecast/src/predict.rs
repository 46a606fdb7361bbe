// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Prediction (§4.8 "Prediction"). Pure function of `(artifact, now)` — two
//! calls against the same `latest` artifact at the same clock value return
//! identical output (P6).

use chrono::{DateTime, Duration, Timelike, Utc};
use obrador_registry::Registry;
use obrador_types::{ObradorError, Result};
use serde::Serialize;

use crate::features::build_row;
use crate::model::{ARTIFACT_EXT, ARTIFACT_KIND, ForecasterModel};

pub const MIN_HORIZON_HOURS: u32 = 1;
pub const MAX_HORIZON_HOURS: u32 = 168;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

pub fn forecast(registry: &Registry, now: DateTime<Utc>, horizon_hours: u32, timezone: &str) -> Result<Vec<ForecastPoint>> {
    if !(MIN_HORIZON_HOURS..=MAX_HORIZON_HOURS).contains(&horizon_hours) {
        return Err(ObradorError::ForecastHorizonOutOfRange(format!(
            "horizon_hours must be in [{MIN_HORIZON_HOURS}, {MAX_HORIZON_HOURS}], got {horizon_hours}"
        )));
    }

    let bytes = registry.load_latest_bytes(ARTIFACT_KIND, ARTIFACT_EXT)?;
    let model = ForecasterModel::from_bytes(&bytes)?;
    let margin = 1.96 * model.residual_std;

    let base = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);

    let mut points = Vec::with_capacity(horizon_hours as usize);
    for h in 1..=horizon_hours {
        let ts = base + Duration::hours(i64::from(h));
        let features = build_row(ts, timezone)?;
        let yhat = model.predict_one(&features);
        points.push(ForecastPoint {
            timestamp: ts,
            yhat,
            yhat_lower: yhat - margin,
            yhat_upper: yhat + margin,
        });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> ForecasterModel {
        ForecasterModel {
            intercept: 0.1,
            coefficients: vec![0.0; crate::features::FEATURE_COUNT],
            feature_names: crate::features::feature_names(),
            residual_std: 0.01,
        }
    }

    #[test]
    fn horizon_zero_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let err = forecast(&registry, Utc::now(), 0, "Europe/Madrid").unwrap_err();
        assert!(matches!(err, ObradorError::ForecastHorizonOutOfRange(_)));
    }

    #[test]
    fn horizon_169_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let err = forecast(&registry, Utc::now(), 169, "Europe/Madrid").unwrap_err();
        assert!(matches!(err, ObradorError::ForecastHorizonOutOfRange(_)));
    }

    #[test]
    fn missing_artifact_reports_model_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let err = forecast(&registry, Utc::now(), 24, "Europe/Madrid").unwrap_err();
        assert!(matches!(err, ObradorError::ModelNotTrained(_)));
    }

    #[test]
    fn same_clock_and_artifact_yields_identical_forecasts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let model = sample_model();
        registry
            .publish("price_forecaster", "json", &model.to_bytes().unwrap(), serde_json::json!({}), None)
            .unwrap();

        let now = Utc::now();
        let first = forecast(&registry, now, 24, "Europe/Madrid").unwrap();
        let second = forecast(&registry, now, 24, "Europe/Madrid").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 24);
    }

    #[test]
    fn horizon_1_returns_one_point_horizon_168_returns_168() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let model = sample_model();
        registry
            .publish("price_forecaster", "json", &model.to_bytes().unwrap(), serde_json::json!({}), None)
            .unwrap();

        assert_eq!(forecast(&registry, Utc::now(), 1, "Europe/Madrid").unwrap().len(), 1);
        assert_eq!(forecast(&registry, Utc::now(), 168, "Europe/Madrid").unwrap().len(), 168);
    }
}
