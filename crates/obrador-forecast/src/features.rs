// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Design-matrix construction for the price forecaster. The seasonal
//! components are Fourier pairs rather than one-hot calendar buckets — a
//! fixed low-order harmonic basis approximates the additive yearly/weekly/
//! daily seasonality §4.8 asks for without the parameter count a full
//! one-hot encoding would need.

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use obrador_types::{ObradorError, Result, calendar, tariff};

const YEARLY_HARMONICS: usize = 2;
const WEEKLY_HARMONICS: usize = 2;
const DAILY_HARMONICS: usize = 3;

/// Column order, fixed so a persisted coefficient vector always lines up
/// with freshly-built feature rows.
pub const FEATURE_COUNT: usize =
    2 * YEARLY_HARMONICS + 2 * WEEKLY_HARMONICS + 2 * DAILY_HARMONICS + 3;

pub fn feature_names() -> Vec<String> {
    let mut names = Vec::with_capacity(FEATURE_COUNT);
    for h in 1..=YEARLY_HARMONICS {
        names.push(format!("yearly_sin_{h}"));
        names.push(format!("yearly_cos_{h}"));
    }
    for h in 1..=WEEKLY_HARMONICS {
        names.push(format!("weekly_sin_{h}"));
        names.push(format!("weekly_cos_{h}"));
    }
    for h in 1..=DAILY_HARMONICS {
        names.push(format!("daily_sin_{h}"));
        names.push(format!("daily_cos_{h}"));
    }
    names.push("is_peak_hour".to_owned());
    names.push("is_weekend".to_owned());
    names.push("is_holiday".to_owned());
    names
}

/// Local wall-clock hour `0..=23` for `ts` in `timezone` — the same
/// resolution rule the ingestion service uses for tariff tagging.
fn local_hour(ts: DateTime<Utc>, timezone: &str) -> Result<u32> {
    use chrono::Timelike;
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ObradorError::ConfigError(format!("unknown time zone '{timezone}'")))?;
    Ok(ts.with_timezone(&tz).hour())
}

/// Builds the fixed-order feature row `{is_peak_hour, is_weekend,
/// is_holiday}` plus Fourier seasonality terms for one timestamp (§4.8,
/// §9 "forecaster regressor choice is frozen").
pub fn build_row(ts: DateTime<Utc>, timezone: &str) -> Result<Vec<f64>> {
    let mut row = Vec::with_capacity(FEATURE_COUNT);

    let day_of_year = f64::from(ts.ordinal0());
    let year_phase = 2.0 * std::f64::consts::PI * day_of_year / 365.25;
    for h in 1..=YEARLY_HARMONICS {
        let k = h as f64;
        row.push((k * year_phase).sin());
        row.push((k * year_phase).cos());
    }

    let week_phase = 2.0 * std::f64::consts::PI * f64::from(ts.weekday().num_days_from_monday()) / 7.0;
    for h in 1..=WEEKLY_HARMONICS {
        let k = h as f64;
        row.push((k * week_phase).sin());
        row.push((k * week_phase).cos());
    }

    let hour = local_hour(ts, timezone)?;
    let day_phase = 2.0 * std::f64::consts::PI * f64::from(hour) / 24.0;
    for h in 1..=DAILY_HARMONICS {
        let k = h as f64;
        row.push((k * day_phase).sin());
        row.push((k * day_phase).cos());
    }

    let period = tariff::tariff_period(ts, hour);
    let day_type = tariff::day_type(ts);
    row.push(if period.is_peak() { 1.0 } else { 0.0 });
    row.push(if day_type == tariff::DayType::Weekend { 1.0 } else { 0.0 });
    row.push(if calendar::is_spanish_holiday(ts.date_naive()) { 1.0 } else { 0.0 });

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn row_has_fixed_column_count() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap();
        let row = build_row(ts, "Europe/Madrid").unwrap();
        assert_eq!(row.len(), FEATURE_COUNT);
        assert_eq!(feature_names().len(), FEATURE_COUNT);
    }

    #[test]
    fn peak_hour_flag_matches_tariff_period() {
        let punta_peak = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let row = build_row(punta_peak, "Europe/Madrid").unwrap();
        assert_eq!(row[row.len() - 3], 1.0);
    }

    #[test]
    fn unknown_timezone_is_a_config_error() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(build_row(ts, "Nowhere/Imaginary"), Err(ObradorError::ConfigError(_))));
    }
}
