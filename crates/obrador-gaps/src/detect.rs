// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Gap enumeration (C4, §4.4). `latest_timestamps` reuses the store's
//! `last_timestamp`, which already flattens across tagsets before sorting —
//! see `obrador_store::Store::last_timestamp` for the "last per series"
//! pitfall this avoids (§9).

use chrono::{DateTime, Duration, Utc};
use obrador_store::Store;
use obrador_types::{Result, TagSet, measurement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Minor,
    Moderate,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Critical => "critical",
        }
    }

    fn classify(duration_hours: f64) -> Self {
        if duration_hours <= 2.0 {
            Self::Minor
        } else if duration_hours <= 12.0 {
            Self::Moderate
        } else {
            Self::Critical
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gap {
    pub measurement: String,
    pub tagset_filter: TagSet,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub expected_count: usize,
    pub missing_count: usize,
    pub severity: Severity,
}

impl Gap {
    pub fn duration_hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }
}

/// Enumerates gaps for `measurement` over `[now-lookback, now]` at sampling
/// interval `delta` (§4.4 points 1-5). Two misses belong to the same gap iff
/// their distance is `<= 1.5*delta`.
pub fn detect_gaps(
    store: &Store,
    measurement: &str,
    tag_filter: &TagSet,
    delta: Duration,
    lookback: Duration,
) -> Result<Vec<Gap>> {
    let now = Utc::now();
    let window_start = now - lookback;

    let actual_points = store.range(measurement, tag_filter, window_start, now)?;
    let actual: std::collections::BTreeSet<i64> =
        actual_points.iter().map(|p| p.timestamp.timestamp()).collect();

    let delta_secs = delta.num_seconds().max(1);
    let mut expected = Vec::new();
    let mut ts = window_start.timestamp();
    let end_ts = now.timestamp();
    while ts <= end_ts {
        expected.push(ts);
        ts += delta_secs;
    }

    let missing: Vec<i64> = expected.into_iter().filter(|ts| !actual.contains(ts)).collect();
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let group_threshold = (delta_secs as f64 * 1.5) as i64;
    let mut gaps = Vec::new();
    let mut group_start = missing[0];
    let mut group_prev = missing[0];
    let mut group_count = 1usize;

    for &m in &missing[1..] {
        if m - group_prev <= group_threshold {
            group_prev = m;
            group_count += 1;
        } else {
            gaps.push(make_gap(measurement, tag_filter, group_start, group_prev, group_count));
            group_start = m;
            group_prev = m;
            group_count = 1;
        }
    }
    gaps.push(make_gap(measurement, tag_filter, group_start, group_prev, group_count));

    Ok(gaps)
}

fn make_gap(measurement: &str, tag_filter: &TagSet, start_ts: i64, end_ts: i64, missing_count: usize) -> Gap {
    use chrono::TimeZone;
    let start = Utc.timestamp_opt(start_ts, 0).single().unwrap_or_else(Utc::now);
    let end = Utc.timestamp_opt(end_ts, 0).single().unwrap_or_else(Utc::now);
    let duration_hours = (end - start).num_seconds() as f64 / 3600.0;

    Gap {
        measurement: measurement.to_owned(),
        tagset_filter: tag_filter.clone(),
        start,
        end,
        expected_count: missing_count,
        missing_count,
        severity: Severity::classify(duration_hours),
    }
}

#[derive(Debug, Clone, Default)]
pub struct LatestTimestamps {
    pub price: Option<DateTime<Utc>>,
    pub weather: Option<DateTime<Utc>>,
}

pub fn latest_timestamps(store: &Store) -> Result<LatestTimestamps> {
    Ok(LatestTimestamps {
        price: store.last_timestamp(measurement::ENERGY_PRICES, &TagSet::new())?,
        weather: store.last_timestamp(measurement::WEATHER_DATA, &TagSet::new())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use obrador_types::Point;

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("gaps-test.db").to_str().unwrap()).unwrap();
        (store, dir)
    }

    #[test]
    fn empty_window_produces_no_gaps() {
        let (store, _dir) = temp_store();
        let gaps = detect_gaps(
            &store,
            measurement::ENERGY_PRICES,
            &TagSet::new(),
            Duration::hours(1),
            Duration::hours(1),
        )
        .unwrap();
        assert!(gaps.is_empty());
    }

    #[test]
    fn consecutive_misses_group_into_one_gap() {
        let (store, _dir) = temp_store();
        // Write everything except a 3-hour window in the middle of the lookback.
        let lookback_hours = 24;
        let now = Utc::now();
        let mut points = Vec::new();
        for h in 0..=lookback_hours {
            let ts = now - Duration::hours(lookback_hours - h);
            if (10..13).contains(&h) {
                continue;
            }
            points.push(
                Point::new(measurement::ENERGY_PRICES, ts)
                    .with_tag("provider", "ree")
                    .with_field("price_eur_kwh", 0.1),
            );
        }
        store.write_points(&points).unwrap();

        let gaps = detect_gaps(
            &store,
            measurement::ENERGY_PRICES,
            &TagSet::new(),
            Duration::hours(1),
            Duration::hours(lookback_hours),
        )
        .unwrap();

        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].missing_count, 3);
        assert_eq!(gaps[0].severity, Severity::Moderate);
    }

    #[test]
    fn severity_escalates_with_duration() {
        assert_eq!(Severity::classify(1.0), Severity::Minor);
        assert_eq!(Severity::classify(6.0), Severity::Moderate);
        assert_eq!(Severity::classify(20.0), Severity::Critical);
    }

    #[test]
    fn latest_timestamps_reads_both_series() {
        let (store, _dir) = temp_store();
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        store
            .write_points(&[Point::new(measurement::ENERGY_PRICES, ts).with_field("price_eur_kwh", 0.1)])
            .unwrap();

        let latest = latest_timestamps(&store).unwrap();
        assert_eq!(latest.price, Some(ts));
        assert_eq!(latest.weather, None);
    }
}
