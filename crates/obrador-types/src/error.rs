// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! The error taxonomy every adapter crate maps its failures onto. Kept as one
//! enum (rather than one per crate) because the HTTP error middleware in
//! `obrador-server` needs a single type to match on to pick a status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObradorError {
    #[error("upstream rate limited")]
    UpstreamRateLimited,

    #[error("upstream returned HTTP {code}")]
    UpstreamHttpError { code: u16 },

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("failed to parse upstream payload: {0}")]
    UpstreamParseError(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("write conflict: {0}")]
    WriteConflict(String),

    #[error("model not trained: {0}")]
    ModelNotTrained(String),

    #[error("forecast horizon out of range: {0}")]
    ForecastHorizonOutOfRange(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ObradorError {
    /// Short machine-readable kind, used as `error.kind` in the JSON error
    /// body the HTTP middleware returns.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamRateLimited => "UpstreamRateLimited",
            Self::UpstreamHttpError { .. } => "UpstreamHTTPError",
            Self::UpstreamTimeout => "UpstreamTimeout",
            Self::UpstreamParseError(_) => "UpstreamParseError",
            Self::ValidationError(_) => "ValidationError",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::WriteConflict(_) => "WriteConflict",
            Self::ModelNotTrained(_) => "ModelNotTrained",
            Self::ForecastHorizonOutOfRange(_) => "ForecastHorizonOutOfRange",
            Self::Cancelled => "Cancelled",
            Self::ConfigError(_) => "ConfigError",
            Self::Other(_) => "Internal",
        }
    }
}
