// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Per-job statistics (§4.7) tracked independently of the job body itself.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
    pub skipped_overlap: u64,
}

impl JobStats {
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.run_count += 1;
        self.success_count += 1;
        self.last_run = Some(at);
        self.last_error = None;
    }

    pub fn record_error(&mut self, at: DateTime<Utc>, error: String) {
        self.run_count += 1;
        self.error_count += 1;
        self.last_run = Some(at);
        self.last_error = Some(error);
    }

    pub fn record_overlap_skip(&mut self) {
        self.skipped_overlap += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn success_clears_any_previous_error() {
        let mut stats = JobStats::default();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        stats.record_error(t1, "boom".into());
        assert_eq!(stats.error_count, 1);
        let t2 = Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap();
        stats.record_success(t2);
        assert_eq!(stats.run_count, 2);
        assert_eq!(stats.success_count, 1);
        assert!(stats.last_error.is_none());
        assert_eq!(stats.last_run, Some(t2));
    }

    #[test]
    fn overlap_skip_does_not_count_as_a_run() {
        let mut stats = JobStats::default();
        stats.record_overlap_skip();
        assert_eq!(stats.skipped_overlap, 1);
        assert_eq!(stats.run_count, 0);
    }
}
