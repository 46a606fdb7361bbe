// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Training pipeline (§4.9): joins recent price and weather ingestion by
//! hour, engineers the 10-column feature set for whichever process is
//! active that hour, and fits both artifacts with an 80/20 split plus
//! 5-fold cross-validation.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use ndarray::{Array1, Array2};
use obrador_registry::Registry;
use obrador_store::Store;
use obrador_types::machinery::MachineryCatalog;
use obrador_types::tariff::tariff_period;
use obrador_types::{ObradorError, Result, TagSet, measurement};
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::{self, ARTIFACT_EXT as CLASSIFIER_EXT, ARTIFACT_KIND as CLASSIFIER_KIND};
use crate::features::HourlyFeatures;
use crate::regressor::{self, ARTIFACT_EXT as REGRESSOR_EXT, ARTIFACT_KIND as REGRESSOR_KIND};

const REGRESSOR_OVERFIT_THRESHOLD: f64 = 0.10;
const CLASSIFIER_OVERFIT_THRESHOLD: f64 = 0.15;
const CV_FOLDS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ScoringTrainingReport {
    pub r2_test: f64,
    pub r2_train: f64,
    pub accuracy_test: f64,
    pub accuracy_train: f64,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub regressor_overfit: bool,
    pub classifier_overfit: bool,
    pub samples: usize,
}

pub fn train_scoring(store: &Store, registry: &Registry, machinery: &MachineryCatalog, timezone: &str) -> Result<ScoringTrainingReport> {
    let rows = build_training_rows(store, machinery, timezone)?;
    if rows.len() < 20 {
        return Err(ObradorError::ValidationError(
            "need at least 20 joined price/weather/machinery samples to train scoring models".to_owned(),
        ));
    }

    let split = (rows.len() as f64 * 0.8) as usize;
    let (train_rows, test_rows) = rows.split_at(split);

    let x_train_vecs: Vec<Vec<f64>> = train_rows.iter().map(|r| r.features.to_vec()).collect();
    let x_test_vecs: Vec<Vec<f64>> = test_rows.iter().map(|r| r.features.to_vec()).collect();
    let y_train_energy: Vec<f64> = train_rows.iter().map(|r| r.energy_score_label).collect();
    let y_test_energy: Vec<f64> = test_rows.iter().map(|r| r.energy_score_label).collect();
    let y_train_class: Vec<u32> = train_rows.iter().map(|r| r.class_label.to_index()).collect();
    let y_test_class: Vec<u32> = test_rows.iter().map(|r| r.class_label.to_index()).collect();

    let x_train = to_array2(&x_train_vecs);
    let x_test = to_array2(&x_test_vecs);
    let y_train = Array1::from_vec(y_train_energy.clone());
    let y_test = Array1::from_vec(y_test_energy.clone());

    let regressor_fit = regressor::fit_regressor(&x_train, &y_train, &x_test, &y_test)?;
    let classifier_fit = classifier::fit_classifier(&x_train_vecs, &y_train_class, &x_test_vecs, &y_test_class)?;

    let regressor_overfit = (regressor_fit.r2_train - regressor_fit.r2_test).abs() > REGRESSOR_OVERFIT_THRESHOLD;
    let classifier_overfit =
        (classifier_fit.accuracy_train - classifier_fit.accuracy_test).abs() > CLASSIFIER_OVERFIT_THRESHOLD;

    let (cv_mean, cv_std) = cross_validate_regressor(&x_train_vecs, &y_train_energy);

    if regressor_overfit {
        warn!(r2_train = regressor_fit.r2_train, r2_test = regressor_fit.r2_test, "energy score regressor overfitting");
    }
    if classifier_overfit {
        warn!(
            accuracy_train = classifier_fit.accuracy_train,
            accuracy_test = classifier_fit.accuracy_test,
            "production classifier overfitting"
        );
    }
    info!(r2_test = regressor_fit.r2_test, accuracy_test = classifier_fit.accuracy_test, "scoring models trained");

    let regressor_metrics = serde_json::json!({
        "r2_test": regressor_fit.r2_test,
        "r2_train": regressor_fit.r2_train,
        "cv_mean": cv_mean,
        "cv_std": cv_std,
        "feature_columns": regressor_fit.model.feature_names,
    });
    registry.publish(REGRESSOR_KIND, REGRESSOR_EXT, &regressor_fit.model.to_bytes()?, regressor_metrics, None)?;

    let classifier_metrics = serde_json::json!({
        "accuracy_test": classifier_fit.accuracy_test,
        "accuracy_train": classifier_fit.accuracy_train,
        "feature_columns": classifier_fit.model.feature_names,
    });
    registry.publish(CLASSIFIER_KIND, CLASSIFIER_EXT, &classifier_fit.model.to_bytes()?, classifier_metrics, None)?;

    Ok(ScoringTrainingReport {
        r2_test: regressor_fit.r2_test,
        r2_train: regressor_fit.r2_train,
        accuracy_test: classifier_fit.accuracy_test,
        accuracy_train: classifier_fit.accuracy_train,
        cv_mean,
        cv_std,
        regressor_overfit,
        classifier_overfit,
        samples: rows.len(),
    })
}

struct TrainingRow {
    features: HourlyFeatures,
    energy_score_label: f64,
    class_label: crate::features::ProductionClass,
}

fn build_training_rows(store: &Store, machinery: &MachineryCatalog, timezone: &str) -> Result<Vec<TrainingRow>> {
    let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now);
    let now = Utc::now();

    let prices = store.range(measurement::ENERGY_PRICES, &TagSet::new(), epoch, now)?;
    let weather = store.range(measurement::WEATHER_DATA, &TagSet::new(), epoch, now)?;

    let tz: Tz = timezone
        .parse()
        .map_err(|_| ObradorError::ConfigError(format!("unknown time zone '{timezone}'")))?;

    let mut price_by_hour: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    for p in &prices {
        if let Some(price) = p.field("price_eur_kwh") {
            price_by_hour.insert(floor_to_hour(p.timestamp), price);
        }
    }

    let mut weather_by_hour: BTreeMap<DateTime<Utc>, (f64, f64)> = BTreeMap::new();
    for w in &weather {
        if let (Some(temp), Some(humidity)) = (w.field("temperature"), w.field("humidity")) {
            weather_by_hour.insert(floor_to_hour(w.timestamp), (temp, humidity));
        }
    }

    let mut rows = Vec::new();
    for (&ts, &price) in &price_by_hour {
        let Some(&(temperature, humidity)) = weather_by_hour.get(&ts) else {
            continue;
        };
        let local_hour = ts.with_timezone(&tz).hour();
        let Some(spec) = machinery.active_at(local_hour) else {
            continue;
        };
        let period = tariff_period(ts, local_hour);
        let features = HourlyFeatures::build(ts, local_hour, price, temperature, humidity, spec, period);
        let energy_score_label = features.energy_score_label();
        let class_label = features.production_class_label(period);
        rows.push(TrainingRow {
            features,
            energy_score_label,
            class_label,
        });
    }

    Ok(rows)
}

fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts - Duration::seconds(i64::from(ts.minute()) * 60 + i64::from(ts.second()))
}

fn to_array2(rows: &[Vec<f64>]) -> Array2<f64> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat).unwrap_or_else(|_| Array2::zeros((0, n_cols)))
}

/// Manual 5-fold cross-validation over the training split (§4.9 "5-fold
/// cross-validation"), reporting mean and standard deviation of per-fold R².
fn cross_validate_regressor(x: &[Vec<f64>], y: &[f64]) -> (f64, f64) {
    if x.len() < CV_FOLDS {
        return (0.0, 0.0);
    }
    let fold_size = x.len() / CV_FOLDS;
    let mut scores = Vec::with_capacity(CV_FOLDS);

    for fold in 0..CV_FOLDS {
        let test_start = fold * fold_size;
        let test_end = if fold == CV_FOLDS - 1 { x.len() } else { test_start + fold_size };

        let mut train_x = Vec::new();
        let mut train_y = Vec::new();
        let mut test_x = Vec::new();
        let mut test_y = Vec::new();
        for i in 0..x.len() {
            if i >= test_start && i < test_end {
                test_x.push(x[i].clone());
                test_y.push(y[i]);
            } else {
                train_x.push(x[i].clone());
                train_y.push(y[i]);
            }
        }

        let x_train_arr = to_array2(&train_x);
        let y_train_arr = Array1::from_vec(train_y);
        let x_test_arr = to_array2(&test_x);
        let y_test_arr = Array1::from_vec(test_y);

        if let Ok(fit) = regressor::fit_regressor(&x_train_arr, &y_train_arr, &x_test_arr, &y_test_arr) {
            scores.push(fit.r2_test);
        }
    }

    if scores.is_empty() {
        return (0.0, 0.0);
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use obrador_types::{MachinerySpec, Point};

    fn catalog() -> MachineryCatalog {
        let mut catalog = MachineryCatalog::default();
        catalog.processes.insert(
            "cacao_tempering".to_owned(),
            MachinerySpec {
                name: "cacao_tempering".to_owned(),
                power_kw: 12.5,
                duration_hours: 3.0,
                optimal_temp_c: 22.0,
                optimal_humidity_pct: 55.0,
                active_hours: (0..24).collect(),
            },
        );
        catalog
    }

    fn seeded_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("scoring-test.db").to_str().unwrap()).unwrap();
        let start = Utc::now() - Duration::days(3);
        let mut points = Vec::new();
        for h in 0..72 {
            let ts = start + Duration::hours(h);
            points.push(
                Point::new(measurement::ENERGY_PRICES, ts)
                    .with_tag("provider", "ree")
                    .with_field("price_eur_kwh", 0.10 + 0.01 * (h % 5) as f64),
            );
            points.push(
                Point::new(measurement::WEATHER_DATA, ts)
                    .with_tag("station_id", "9434")
                    .with_field("temperature", 20.0 + (h % 10) as f64)
                    .with_field("humidity", 50.0),
            );
        }
        store.write_points(&points).unwrap();
        (store, dir)
    }

    #[test]
    fn training_on_too_few_samples_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("empty.db").to_str().unwrap()).unwrap();
        let registry_dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(registry_dir.path()).unwrap();
        let err = train_scoring(&store, &registry, &catalog(), "Europe/Madrid").unwrap_err();
        assert!(matches!(err, ObradorError::ValidationError(_)));
    }

    #[test]
    fn training_on_joined_price_and_weather_publishes_both_artifacts() {
        let (store, _dir) = seeded_store();
        let registry_dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(registry_dir.path()).unwrap();

        let report = train_scoring(&store, &registry, &catalog(), "Europe/Madrid").unwrap();
        assert!(report.samples > 0);
        assert!(registry.latest(REGRESSOR_KIND).unwrap().is_some());
        assert!(registry.latest(CLASSIFIER_KIND).unwrap().is_some());
    }
}
