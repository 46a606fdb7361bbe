// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Energy-score regressor: a linear model over the 10 engineered features
//! (§4.9), trained to approximate the deterministic weighted-combination
//! label so scoring at request time is a single dot product.

use linfa::dataset::Dataset;
use linfa::traits::{Fit, Predict};
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use obrador_types::{ObradorError, Result};
use serde::{Deserialize, Serialize};

use crate::features::FEATURE_NAMES;

pub const ARTIFACT_KIND: &str = "scoring_regressor";
pub const ARTIFACT_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyScoreRegressor {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub feature_names: Vec<String>,
}

impl EnergyScoreRegressor {
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        (self.intercept + self.coefficients.iter().zip(features).map(|(c, x)| c * x).sum::<f64>()).clamp(0.0, 100.0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ObradorError::Other(anyhow::anyhow!("serializing regressor: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ObradorError::ModelNotTrained(format!("corrupt scoring regressor artifact: {e}")))
    }
}

pub struct RegressorFit {
    pub model: EnergyScoreRegressor,
    pub r2_train: f64,
    pub r2_test: f64,
}

pub fn fit_regressor(x_train: &Array2<f64>, y_train: &Array1<f64>, x_test: &Array2<f64>, y_test: &Array1<f64>) -> Result<RegressorFit> {
    let dataset = Dataset::new(x_train.clone(), y_train.clone());
    let fitted = LinearRegression::default()
        .fit(&dataset)
        .map_err(|e| ObradorError::Other(anyhow::anyhow!("fitting energy score regressor: {e}")))?;

    let model = EnergyScoreRegressor {
        intercept: fitted.intercept(),
        coefficients: fitted.params().to_vec(),
        feature_names: FEATURE_NAMES.iter().map(|s| (*s).to_owned()).collect(),
    };

    let train_predictions = fitted.predict(x_train);
    let test_predictions = fitted.predict(x_test);

    Ok(RegressorFit {
        r2_train: r_squared(y_train, &train_predictions),
        r2_test: r_squared(y_test, &test_predictions),
        model,
    })
}

pub fn r_squared(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual.iter().zip(predicted.iter()).map(|(a, p)| (a - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    1.0 - ss_res / ss_tot
}
