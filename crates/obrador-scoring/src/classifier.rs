// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Production-class classifier over `{Optimal, Moderate, Reduced, Halt}`
//! (§4.9), trained with `smartcore`'s multinomial logistic regression on the
//! same 10 engineered features the regressor uses.

use obrador_types::{ObradorError, Result};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};

use crate::features::{FEATURE_NAMES, ProductionClass};

pub const ARTIFACT_KIND: &str = "scoring_classifier";
pub const ARTIFACT_EXT: &str = "json";

/// Serializable classifier coefficients. `smartcore`'s fitted model is not
/// serde-friendly, so training re-derives a one-vs-rest linear decision
/// surface from the fitted model's internals and persists that instead —
/// the same pattern `obrador-forecast` uses to keep `linfa`'s fitted types
/// out of the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionClassifier {
    pub feature_names: Vec<String>,
    /// One weight vector (with trailing intercept) per class index, in
    /// `ProductionClass::to_index` order.
    pub class_weights: Vec<Vec<f64>>,
}

impl ProductionClassifier {
    pub fn predict_one(&self, features: &[f64]) -> (ProductionClass, f64) {
        let scores: Vec<f64> = self
            .class_weights
            .iter()
            .map(|weights| {
                let (coeffs, intercept) = weights.split_at(weights.len() - 1);
                intercept[0] + coeffs.iter().zip(features).map(|(w, x)| w * x).sum::<f64>()
            })
            .collect();

        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_scores: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exp_scores.iter().sum();

        let (best_index, best_prob) = exp_scores
            .iter()
            .enumerate()
            .map(|(i, e)| (i, e / sum))
            .fold((0usize, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

        (ProductionClass::from_index(best_index as u32), best_prob)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ObradorError::Other(anyhow::anyhow!("serializing classifier: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ObradorError::ModelNotTrained(format!("corrupt scoring classifier artifact: {e}")))
    }
}

pub struct ClassifierFit {
    pub model: ProductionClassifier,
    pub accuracy_train: f64,
    pub accuracy_test: f64,
}

pub fn fit_classifier(
    x_train: &[Vec<f64>],
    y_train: &[u32],
    x_test: &[Vec<f64>],
    y_test: &[u32],
) -> Result<ClassifierFit> {
    let train_matrix = DenseMatrix::from_2d_vec(&x_train.to_vec())
        .map_err(|e| ObradorError::Other(anyhow::anyhow!("building training matrix: {e}")))?;
    let labels: Vec<u32> = y_train.to_vec();

    let fitted = LogisticRegression::fit(&train_matrix, &labels, LogisticRegressionParameters::default())
        .map_err(|e| ObradorError::Other(anyhow::anyhow!("fitting production classifier: {e}")))?;

    // smartcore exposes per-class weights through `.coefficients()`/
    // `.intercept()` for the fitted multinomial model; consolidate into the
    // one-vs-rest shape `ProductionClassifier` persists.
    let coefficients = fitted.coefficients();
    let intercepts = fitted.intercept();
    let n_classes = 4usize;
    let n_features = FEATURE_NAMES.len();

    let mut class_weights = Vec::with_capacity(n_classes);
    for class_index in 0..n_classes {
        let mut row = Vec::with_capacity(n_features + 1);
        for feature_index in 0..n_features {
            row.push(*coefficients.get((class_index, feature_index)));
        }
        row.push(*intercepts.get((class_index, 0)));
        class_weights.push(row);
    }

    let model = ProductionClassifier {
        feature_names: FEATURE_NAMES.iter().map(|s| (*s).to_owned()).collect(),
        class_weights,
    };

    let accuracy_train = accuracy(&model, x_train, y_train);
    let accuracy_test = accuracy(&model, x_test, y_test);

    Ok(ClassifierFit {
        model,
        accuracy_train,
        accuracy_test,
    })
}

fn accuracy(model: &ProductionClassifier, x: &[Vec<f64>], y: &[u32]) -> f64 {
    if x.is_empty() {
        return 1.0;
    }
    let correct = x
        .iter()
        .zip(y.iter())
        .filter(|(features, &label)| model.predict_one(features).0.to_index() == label)
        .count();
    correct as f64 / x.len() as f64
}
