// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! On-disk cache for the weather-observation bearer token (§4.2: "the
//! weather-observation client holds a bearer token with a ~6-day validity;
//! it MUST refresh proactively on a daily schedule and cache the token on
//! disk with last-refresh timestamp").

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub token: String,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Option<CachedToken> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "ignoring corrupt token cache");
                None
            }
        }
    }

    pub fn save(&self, cached: &CachedToken) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(error = %e, "failed to create token cache directory");
                    return;
                }
            }
        }
        match serde_json::to_string_pretty(cached) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!(error = %e, path = %self.path.display(), "failed to persist token cache");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize token cache"),
        }
    }

    /// `true` once the cached token is older than `max_age` and should be
    /// proactively refreshed rather than waiting for an auth failure.
    pub fn is_stale(cached: &CachedToken, max_age: chrono::Duration) -> bool {
        Utc::now() - cached.refreshed_at > max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        assert!(cache.load().is_none());

        let cached = CachedToken {
            token: "abc123".to_owned(),
            refreshed_at: Utc::now(),
        };
        cache.save(&cached);

        let loaded = cache.load().unwrap();
        assert_eq!(loaded.token, "abc123");
        assert!(!TokenCache::is_stale(&loaded, chrono::Duration::days(1)));
    }
}
