// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Tag-derivation helpers: tariff period, day type, season and data-source
//! enumerations shared by the ingestion and scoring layers.

use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::is_spanish_holiday;

/// Spanish `3.0TD` six-period commercial tariff. `P1` is the most expensive,
/// `P6` the cheapest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TariffPeriod {
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
}

impl TariffPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
            Self::P5 => "P5",
            Self::P6 => "P6",
        }
    }

    /// `true` for the peak-rate periods used as the `is_peak_hour` forecaster
    /// regressor.
    pub fn is_peak(self) -> bool {
        matches!(self, Self::P1)
    }

    /// Cost multiplier applied in the scoring engine (`tariff_multiplier`).
    pub fn multiplier(self) -> f64 {
        match self {
            Self::P1 => 1.3,
            Self::P2 | Self::P4 => 1.0,
            Self::P3 | Self::P5 | Self::P6 => 0.8,
        }
    }

    /// `true` for the cheapest ("valley") periods.
    pub fn is_valley(self) -> bool {
        matches!(self, Self::P3 | Self::P5 | Self::P6)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
    Holiday,
}

impl DayType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekday => "weekday",
            Self::Weekend => "weekend",
            Self::Holiday => "holiday",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
        }
    }
}

/// Data provenance tag shared by both operational measurements. Not every
/// variant is valid for every measurement (`energy_prices` never carries
/// `Official`, `weather_data` never carries `Historical`) — callers pick the
/// subset that applies, the type itself is a superset for convenience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Official,
    Realtime,
    Historical,
    Forecast,
    HistoricalCsv,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Realtime => "realtime",
            Self::Historical => "historical",
            Self::Forecast => "forecast",
            Self::HistoricalCsv => "historical_csv",
        }
    }
}

/// Day type for a UTC timestamp observed in the plant's local calendar.
pub fn day_type(ts: DateTime<Utc>) -> DayType {
    if is_spanish_holiday(ts.date_naive()) {
        return DayType::Holiday;
    }
    match ts.weekday() {
        Weekday::Sat | Weekday::Sun => DayType::Weekend,
        _ => DayType::Weekday,
    }
}

/// Meteorological season for a UTC timestamp (northern hemisphere).
pub fn season(ts: DateTime<Utc>) -> Season {
    match ts.month() {
        12 | 1 | 2 => Season::Winter,
        3 | 4 | 5 => Season::Spring,
        6 | 7 | 8 => Season::Summer,
        _ => Season::Autumn,
    }
}

/// `true` for the months the Spanish `3.0TD` calendar treats as high-demand
/// ("punta") months, which is when the P1-P2-P3 peak/flat/valley split
/// applies; the rest of the year uses the flatter P4/P5 split. This is a
/// simplified approximation of the regulated calendar, adequate for tagging
/// and feature derivation, not a billing-grade implementation.
fn is_punta_month(month: u32) -> bool {
    matches!(month, 1 | 2 | 7 | 11 | 12)
}

/// Tariff period for a UTC timestamp, using the plant's local hour.
///
/// Weekends and holidays always fall in `P6`. On workdays, punta months use
/// the three-tier `P1` (peak) / `P2` (flat) / `P3` (valley) split; other
/// months use the flatter `P4` (day) / `P5` (night) split.
pub fn tariff_period(ts: DateTime<Utc>, local_hour: u32) -> TariffPeriod {
    if day_type(ts) != DayType::Weekday {
        return TariffPeriod::P6;
    }
    if is_punta_month(ts.month()) {
        match local_hour {
            10..=13 | 18..=21 => TariffPeriod::P1,
            8..=9 | 14..=17 | 22..=23 => TariffPeriod::P2,
            _ => TariffPeriod::P3,
        }
    } else {
        match local_hour {
            8..=23 => TariffPeriod::P4,
            _ => TariffPeriod::P5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekend_is_always_p6() {
        let sat = Utc.with_ymd_and_hms(2025, 6, 14, 11, 0, 0).unwrap();
        assert_eq!(tariff_period(sat, 11), TariffPeriod::P6);
    }

    #[test]
    fn punta_month_peak_hour_is_p1() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        assert_eq!(tariff_period(ts, 10), TariffPeriod::P1);
        assert!(TariffPeriod::P1.is_peak());
    }

    #[test]
    fn non_punta_month_uses_flat_split() {
        let ts = Utc.with_ymd_and_hms(2025, 4, 15, 10, 0, 0).unwrap();
        assert_eq!(tariff_period(ts, 10), TariffPeriod::P4);
    }

    #[test]
    fn season_boundaries() {
        let winter = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(season(winter), Season::Winter);
        let summer = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        assert_eq!(season(summer), Season::Summer);
    }
}
