// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Generic retry-with-exponential-backoff wrapper shared by all three
//! upstream clients, on network errors and 5xx responses (§4.2). 4xx
//! responses are a caller decision, not retried here.

use std::future::Future;
use std::time::Duration;

use obrador_types::ObradorError;
use tracing::warn;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Runs `request_fn` up to `MAX_ATTEMPTS` times, doubling the delay between
/// attempts, retrying only on `reqwest` errors that are connect/timeout/5xx
/// in nature (`reqwest::Error::is_connect`/`is_timeout`, or a transport
/// error with no status at all — a decoded 5xx status is handled by the
/// caller via `should_retry_status` since `reqwest` does not treat a 5xx
/// body as an `Err`).
pub async fn retry_request<F, Fut>(label: &str, mut request_fn: F) -> Result<reqwest::Response, ObradorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    let mut delay = INITIAL_DELAY;

    loop {
        attempt += 1;
        match request_fn().await {
            Ok(response) if response.status().is_server_error() && attempt < MAX_ATTEMPTS => {
                warn!(%label, attempt, status = %response.status(), "upstream 5xx, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Ok(response) => return Ok(response),
            Err(e) if e.is_timeout() && attempt >= MAX_ATTEMPTS => {
                return Err(ObradorError::UpstreamTimeout);
            }
            Err(e) if attempt >= MAX_ATTEMPTS => {
                return Err(ObradorError::UpstreamHttpError {
                    code: e.status().map(|s| s.as_u16()).unwrap_or(0),
                });
            }
            Err(e) => {
                warn!(%label, attempt, error = %e, ?delay, "request failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}
