// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Engineered hourly features (§4.9, 10 columns) and the deterministic label
//! formulas the two artifacts are trained to approximate.

use chrono::{DateTime, Datelike, Utc};
use obrador_types::MachinerySpec;
use obrador_types::tariff::TariffPeriod;

/// Highest PVPC price observed in practice for this plant's tariff; used to
/// normalize `price_norm ∈ [0,1]` (§9 open question: the spec does not fix a
/// normalization reference, this value is a conservative ceiling above
/// historical peak-hour prices).
pub const REFERENCE_MAX_PRICE_EUR_KWH: f64 = 0.35;

pub const FEATURE_NAMES: [&str; 10] = [
    "price_eur_kwh",
    "hour",
    "day_of_week",
    "temperature",
    "humidity",
    "machine_power_kw",
    "machine_thermal_efficiency",
    "machine_humidity_efficiency",
    "estimated_cost_eur",
    "tariff_multiplier",
];

#[derive(Debug, Clone, Copy)]
pub struct HourlyFeatures {
    pub price_eur_kwh: f64,
    pub hour: u32,
    pub day_of_week: u32,
    pub temperature: f64,
    pub humidity: f64,
    pub machine_power_kw: f64,
    pub machine_thermal_efficiency: f64,
    pub machine_humidity_efficiency: f64,
    pub estimated_cost_eur: f64,
    pub tariff_multiplier: f64,
}

impl HourlyFeatures {
    pub fn build(
        ts: DateTime<Utc>,
        local_hour: u32,
        price_eur_kwh: f64,
        temperature: f64,
        humidity: f64,
        spec: &MachinerySpec,
        tariff_period: TariffPeriod,
    ) -> Self {
        let thermal_eff = spec.thermal_efficiency(temperature);
        let humidity_eff = spec.humidity_efficiency(humidity);
        Self {
            price_eur_kwh,
            hour: local_hour,
            day_of_week: ts.weekday().num_days_from_monday(),
            temperature,
            humidity,
            machine_power_kw: spec.power_kw,
            machine_thermal_efficiency: thermal_eff,
            machine_humidity_efficiency: humidity_eff,
            estimated_cost_eur: spec.power_kw * price_eur_kwh,
            tariff_multiplier: tariff_period.multiplier(),
        }
    }

    pub fn price_norm(&self) -> f64 {
        (self.price_eur_kwh / REFERENCE_MAX_PRICE_EUR_KWH).clamp(0.0, 1.0)
    }

    /// `(1.3 - multiplier) / (1.3 - 0.8)`: 1.0 at the cheapest (valley)
    /// multiplier, 0.0 at the peak multiplier.
    pub fn tariff_bonus(&self) -> f64 {
        ((1.3 - self.tariff_multiplier) / 0.5).clamp(0.0, 1.0)
    }

    pub fn to_vec(self) -> Vec<f64> {
        vec![
            self.price_eur_kwh,
            f64::from(self.hour),
            f64::from(self.day_of_week),
            self.temperature,
            self.humidity,
            self.machine_power_kw,
            self.machine_thermal_efficiency,
            self.machine_humidity_efficiency,
            self.estimated_cost_eur,
            self.tariff_multiplier,
        ]
    }

    /// The deterministic energy-score label (§4.9): every term pre-scaled to
    /// `[0,100]` before the weights (which sum to 1.0) are applied.
    pub fn energy_score_label(&self) -> f64 {
        0.40 * (1.0 - self.price_norm()) * 100.0
            + 0.35 * self.machine_thermal_efficiency
            + 0.15 * self.machine_humidity_efficiency
            + 0.10 * self.tariff_bonus() * 100.0
    }

    fn suitability_score(&self, is_valley: bool) -> f64 {
        let raw = 0.45 * self.machine_thermal_efficiency
            + 0.25 * self.machine_humidity_efficiency
            + 0.30 * (1.0 - self.price_norm()) * 100.0;
        let boosted = if is_valley { raw * 1.10 } else { raw };
        boosted.clamp(0.0, 100.0)
    }

    pub fn production_class_label(&self, tariff_period: TariffPeriod) -> ProductionClass {
        ProductionClass::from_suitability(self.suitability_score(tariff_period.is_valley()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionClass {
    Optimal,
    Moderate,
    Reduced,
    Halt,
}

impl ProductionClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optimal => "Optimal",
            Self::Moderate => "Moderate",
            Self::Reduced => "Reduced",
            Self::Halt => "Halt",
        }
    }

    fn from_suitability(score: f64) -> Self {
        if score >= 75.0 {
            Self::Optimal
        } else if score >= 55.0 {
            Self::Moderate
        } else if score >= 35.0 {
            Self::Reduced
        } else {
            Self::Halt
        }
    }

    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Self::Optimal,
            1 => Self::Moderate,
            2 => Self::Reduced,
            _ => Self::Halt,
        }
    }

    pub fn to_index(self) -> u32 {
        match self {
            Self::Optimal => 0,
            Self::Moderate => 1,
            Self::Reduced => 2,
            Self::Halt => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec() -> MachinerySpec {
        MachinerySpec {
            name: "cacao_tempering".to_owned(),
            power_kw: 12.5,
            duration_hours: 3.0,
            optimal_temp_c: 22.0,
            optimal_humidity_pct: 55.0,
            active_hours: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn cheap_comfortable_hour_scores_high_and_optimal() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, 3, 0, 0).unwrap();
        let features = HourlyFeatures::build(ts, 3, 0.05, 22.0, 55.0, &spec(), TariffPeriod::P6);
        assert!(features.energy_score_label() > 80.0);
        assert_eq!(features.production_class_label(TariffPeriod::P6), ProductionClass::Optimal);
    }

    #[test]
    fn expensive_uncomfortable_hour_scores_low() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, 19, 0, 0).unwrap();
        let features = HourlyFeatures::build(ts, 19, 0.35, 32.0, 80.0, &spec(), TariffPeriod::P1);
        assert!(features.energy_score_label() < 40.0);
        assert!(matches!(
            features.production_class_label(TariffPeriod::P1),
            ProductionClass::Reduced | ProductionClass::Halt
        ));
    }
}
