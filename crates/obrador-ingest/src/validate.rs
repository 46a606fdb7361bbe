// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Range checks backing §3 invariant 4: out-of-range weather readings are
//! rejected and counted rather than written.

pub fn humidity_in_range(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}

pub fn temperature_in_range(value: f64) -> bool {
    (-40.0..=60.0).contains(&value)
}

pub fn pressure_in_range(value: f64) -> bool {
    (800.0..=1100.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_humidity() {
        assert!(!humidity_in_range(150.0));
        assert!(humidity_in_range(55.0));
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        assert!(!temperature_in_range(-60.0));
        assert!(temperature_in_range(20.0));
    }

    #[test]
    fn rejects_out_of_range_pressure() {
        assert!(!pressure_in_range(500.0));
        assert!(pressure_in_range(1013.0));
    }
}
