// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Bundled Spanish national-holiday calendar, used to derive `day_type` and
//! the forecaster's `is_holiday` regressor. Regional/local holidays are out
//! of scope; only the fixed national set plus Good Friday are modeled.

use chrono::{Datelike, NaiveDate};

/// National fixed-date holidays (month, day), observed every year.
const FIXED_HOLIDAYS: &[(u32, u32)] = &[
    (1, 1),   // Año Nuevo
    (1, 6),   // Epifanía del Señor
    (5, 1),   // Fiesta del Trabajo
    (8, 15),  // Asunción de la Virgen
    (10, 12), // Fiesta Nacional de España
    (11, 1),  // Todos los Santos
    (12, 6),  // Día de la Constitución
    (12, 8),  // Inmaculada Concepción
    (12, 25), // Natividad del Señor
];

/// `true` if `date` is a Spanish national holiday (fixed-date set plus Good
/// Friday, computed from the date of Easter).
pub fn is_spanish_holiday(date: NaiveDate) -> bool {
    if FIXED_HOLIDAYS.contains(&(date.month(), date.day())) {
        return true;
    }
    good_friday(date.year()) == date
}

/// Good Friday (two days before Easter Sunday) for a given year, via the
/// anonymous Gregorian (Meeus/Jones/Butcher) algorithm for Easter Sunday.
fn good_friday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    let easter_sunday = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .expect("Meeus/Jones/Butcher algorithm always yields a valid calendar date");
    easter_sunday - chrono::Duration::days(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_year_is_holiday() {
        assert!(is_spanish_holiday(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn ordinary_day_is_not_holiday() {
        assert!(!is_spanish_holiday(
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
        ));
    }

    #[test]
    fn good_friday_2025_is_april_18() {
        // Published date for reference.
        assert_eq!(good_friday(2025), NaiveDate::from_ymd_opt(2025, 4, 18).unwrap());
        assert!(is_spanish_holiday(NaiveDate::from_ymd_opt(2025, 4, 18).unwrap()));
    }
}
