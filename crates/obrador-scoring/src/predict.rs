// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Single-hour scoring (the bodies behind `/predict/energy-optimization` and
//! `/predict/production-recommendation`).

use chrono::{DateTime, Utc};
use obrador_registry::Registry;
use obrador_types::tariff::tariff_period;
use obrador_types::{MachinerySpec, Result};
use serde::Serialize;

use crate::classifier::{ARTIFACT_EXT as CLASSIFIER_EXT, ARTIFACT_KIND as CLASSIFIER_KIND, ProductionClassifier};
use crate::features::{HourlyFeatures, ProductionClass};
use crate::regressor::{ARTIFACT_EXT as REGRESSOR_EXT, ARTIFACT_KIND as REGRESSOR_KIND, EnergyScoreRegressor};

#[derive(Debug, Clone, Serialize)]
pub struct EnergyOptimizationResult {
    pub energy_optimization_score: f64,
    pub features_used: Vec<String>,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionRecommendationResult {
    pub recommendation: &'static str,
    pub confidence: f64,
    pub reasoning: String,
}

fn build_features(
    ts: DateTime<Utc>,
    local_hour: u32,
    price_eur_kwh: f64,
    temperature: f64,
    humidity: f64,
    spec: &MachinerySpec,
) -> HourlyFeatures {
    let period = tariff_period(ts, local_hour);
    HourlyFeatures::build(ts, local_hour, price_eur_kwh, temperature, humidity, spec, period)
}

pub fn score_energy_optimization(
    registry: &Registry,
    ts: DateTime<Utc>,
    local_hour: u32,
    price_eur_kwh: f64,
    temperature: f64,
    humidity: f64,
    spec: &MachinerySpec,
) -> Result<EnergyOptimizationResult> {
    let bytes = registry.load_latest_bytes(REGRESSOR_KIND, REGRESSOR_EXT)?;
    let model = EnergyScoreRegressor::from_bytes(&bytes)?;
    let features = build_features(ts, local_hour, price_eur_kwh, temperature, humidity, spec);
    let score = model.predict_one(&features.to_vec());

    let recommendation = if score >= 75.0 {
        "run at full capacity"
    } else if score >= 55.0 {
        "run at reduced capacity"
    } else if score >= 35.0 {
        "defer non-critical load"
    } else {
        "halt production"
    };

    Ok(EnergyOptimizationResult {
        energy_optimization_score: score,
        features_used: model.feature_names.clone(),
        recommendation,
    })
}

pub fn score_production_recommendation(
    registry: &Registry,
    ts: DateTime<Utc>,
    local_hour: u32,
    price_eur_kwh: f64,
    temperature: f64,
    humidity: f64,
    spec: &MachinerySpec,
) -> Result<ProductionRecommendationResult> {
    let bytes = registry.load_latest_bytes(CLASSIFIER_KIND, CLASSIFIER_EXT)?;
    let model = ProductionClassifier::from_bytes(&bytes)?;
    let features = build_features(ts, local_hour, price_eur_kwh, temperature, humidity, spec);
    let (class, confidence) = model.predict_one(&features.to_vec());

    Ok(ProductionRecommendationResult {
        recommendation: class.as_str(),
        confidence,
        reasoning: reasoning_for(class, price_eur_kwh, temperature, humidity, spec),
    })
}

fn reasoning_for(class: ProductionClass, price: f64, temperature: f64, humidity: f64, spec: &MachinerySpec) -> String {
    format!(
        "{} at {price:.3} €/kWh, T={temperature:.1}°C (opt {:.1}), H={humidity:.1}% (opt {:.1})",
        class.as_str(),
        spec.optimal_temp_c,
        spec.optimal_humidity_pct,
    )
}
