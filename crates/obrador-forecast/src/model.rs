// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! The persisted shape of a trained forecaster. Kept as plain JSON-able
//! fields rather than the `linfa_linear::FittedLinearRegression` value
//! itself, so the registry (C11) never needs to know about `linfa`'s types.

use obrador_types::{ObradorError, Result};
use serde::{Deserialize, Serialize};

pub const ARTIFACT_KIND: &str = "price_forecaster";
pub const ARTIFACT_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecasterModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub feature_names: Vec<String>,
    /// Residual standard deviation on the holdout set, used to build the
    /// 95% prediction interval (§4.8 "intervals are always 95%").
    pub residual_std: f64,
}

impl ForecasterModel {
    pub fn predict_one(&self, features: &[f64]) -> f64 {
        self.intercept + self.coefficients.iter().zip(features).map(|(c, x)| c * x).sum::<f64>()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ObradorError::Other(anyhow::anyhow!("serializing forecaster model: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ObradorError::ModelNotTrained(format!("corrupt forecaster artifact: {e}")))
    }
}
