// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Maps [`ObradorError`] kinds to HTTP status codes (§7). Every handler
//! returns `Result<T, ApiError>` so this conversion happens in one place
//! rather than being repeated per handler.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use obrador_types::ObradorError;
use serde_json::json;

pub struct ApiError(pub ObradorError);

impl From<ObradorError> for ApiError {
    fn from(e: ObradorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ObradorError::UpstreamRateLimited | ObradorError::StoreUnavailable(_) | ObradorError::ModelNotTrained(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ObradorError::UpstreamHttpError { code } if (500..600).contains(code) => StatusCode::BAD_GATEWAY,
            ObradorError::UpstreamHttpError { .. } => StatusCode::BAD_GATEWAY,
            ObradorError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ObradorError::ValidationError(_) | ObradorError::ForecastHorizonOutOfRange(_) => StatusCode::BAD_REQUEST,
            ObradorError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ObradorError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ObradorError::UpstreamParseError(_) | ObradorError::WriteConflict(_) | ObradorError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
