// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Derived-field computation (§4.3 point 4) and local-hour resolution used
//! for tag derivation (§4.3 point 3).

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use obrador_types::{ObradorError, Result};

/// Optimal tempering-room conditions used as the reference point for
/// [`production_comfort_index`]. Process-specific thresholds (per-machinery
/// optimal temperature/humidity) refine this further in the scoring layer;
/// this is the general-purpose figure carried on the weather point itself.
const REFERENCE_TEMP_C: f64 = 18.0;
const REFERENCE_HUMIDITY_PCT: f64 = 50.0;

pub fn price_eur_kwh(price_eur_mwh: f64) -> f64 {
    price_eur_mwh / 1000.0
}

/// Local wall-clock hour `0..=23` for `ts` in the plant's configured time
/// zone, used to derive the tariff period (§4.3 point 3) and to pick the
/// hybrid weather source (§4.3 "Hybrid realtime weather selection").
pub fn local_hour(ts: DateTime<Utc>, timezone: &str) -> Result<u32> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ObradorError::ConfigError(format!("unknown time zone '{timezone}'")))?;
    Ok(ts.with_timezone(&tz).hour())
}

/// Simplified Rothfusz regression heat index, valid above ~27°C; below that
/// threshold the index degenerates to the ambient temperature since the
/// regression is not calibrated for cooler, drier conditions.
pub fn heat_index(temperature_c: f64, humidity_pct: f64) -> f64 {
    if temperature_c < 27.0 {
        return temperature_c;
    }
    let t = temperature_c * 9.0 / 5.0 + 32.0;
    let r = humidity_pct;

    let hi_f = -42.379 + 2.049_015_23 * t + 10.143_33 * r - 0.224_755_41 * t * r
        - 6.837_83e-3 * t * t
        - 5.481_717e-2 * r * r
        + 1.228_74e-3 * t * t * r
        + 8.528_5e-4 * t * r * r
        - 1.99e-6 * t * t * r * r;

    (hi_f - 32.0) * 5.0 / 9.0
}

/// Heuristic closeness-to-ideal score in `[0,100]` for chocolate production:
/// 100 at the reference temperature/humidity, decreasing linearly with
/// distance from either.
pub fn production_comfort_index(temperature_c: f64, humidity_pct: f64) -> f64 {
    let temp_penalty = (temperature_c - REFERENCE_TEMP_C).abs() * 3.0;
    let humidity_penalty = (humidity_pct - REFERENCE_HUMIDITY_PCT).abs() * 0.5;
    (100.0 - temp_penalty - humidity_penalty).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn price_conversion_divides_by_a_thousand() {
        assert_eq!(price_eur_kwh(120.0), 0.12);
    }

    #[test]
    fn local_hour_handles_dst_offset() {
        // Noon UTC in June is 14:00 in Europe/Madrid (CEST, UTC+2).
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(local_hour(ts, "Europe/Madrid").unwrap(), 14);
    }

    #[test]
    fn heat_index_matches_ambient_below_threshold() {
        assert_eq!(heat_index(15.0, 40.0), 15.0);
    }

    #[test]
    fn comfort_index_peaks_at_reference_conditions() {
        let peak = production_comfort_index(REFERENCE_TEMP_C, REFERENCE_HUMIDITY_PCT);
        assert_eq!(peak, 100.0);
        let worse = production_comfort_index(35.0, 90.0);
        assert!(worse < peak);
    }
}
