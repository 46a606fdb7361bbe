// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Per-process machinery specification: configuration, not runtime state. The
//! optimal temperature/humidity and power draw for a production process are
//! the source of truth the scoring engine targets against, fixed for the
//! lifetime of the process (§9: "treating them as learned is wrong").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachinerySpec {
    pub name: String,
    pub power_kw: f64,
    pub duration_hours: f64,
    pub optimal_temp_c: f64,
    pub optimal_humidity_pct: f64,
    /// Hours of day (0-23) during which this process may run.
    pub active_hours: Vec<u32>,
}

impl MachinerySpec {
    pub fn is_active_at(&self, hour: u32) -> bool {
        self.active_hours.contains(&hour)
    }

    pub fn thermal_efficiency(&self, temperature_c: f64) -> f64 {
        (100.0 - 5.0 * (temperature_c - self.optimal_temp_c).abs()).max(0.0)
    }

    pub fn humidity_efficiency(&self, humidity_pct: f64) -> f64 {
        (100.0 - 2.0 * (humidity_pct - self.optimal_humidity_pct).abs()).max(0.0)
    }
}

/// The full set of named processes configured for the plant, keyed by
/// `MachinerySpec::name`. Loaded once at startup as part of `ObradorConfig`
/// and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineryCatalog {
    pub processes: BTreeMap<String, MachinerySpec>,
}

impl MachineryCatalog {
    /// The process active at a given local hour, if more than one process is
    /// active the first by name is returned (processes are expected not to
    /// overlap in practice; the catalog does not enforce it).
    pub fn active_at(&self, hour: u32) -> Option<&MachinerySpec> {
        self.processes.values().find(|p| p.is_active_at(hour))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cacao_tempering() -> MachinerySpec {
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
    fn thermal_efficiency_at_optimum_is_100() {
        let spec = cacao_tempering();
        assert_eq!(spec.thermal_efficiency(22.0), 100.0);
        assert_eq!(spec.humidity_efficiency(55.0), 100.0);
    }

    #[test]
    fn thermal_efficiency_never_goes_negative() {
        let spec = cacao_tempering();
        assert_eq!(spec.thermal_efficiency(60.0), 0.0);
    }

    #[test]
    fn active_at_respects_active_hours() {
        let mut catalog = MachineryCatalog::default();
        catalog
            .processes
            .insert("cacao_tempering".to_owned(), cacao_tempering());
        assert!(catalog.active_at(3).is_some());
        assert!(catalog.active_at(12).is_none());
    }
}
