// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Price forecaster (C8): an additive seasonal model over Fourier terms plus
//! the three frozen exogenous regressors (§9), trained on historical
//! `energy_prices` points and persisted through the registry (C11).

mod features;
mod model;
mod predict;
mod train;

pub use model::{ARTIFACT_EXT, ARTIFACT_KIND, ForecasterModel};
pub use predict::{ForecastPoint, MAX_HORIZON_HOURS, MIN_HORIZON_HOURS, forecast};
pub use train::{TrainingReport, train_forecaster};
