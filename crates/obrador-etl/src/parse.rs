// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Line cleaning and locale-specific field parsing for SIAR daily CSVs:
//! `;`-separated fields, `,` as decimal separator, `DD/MM/YYYY` dates.

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct SiarRecord {
    pub date: NaiveDate,
    pub temperature_mean: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub humidity_mean: f64,
    pub wind_mean: f64,
    pub radiation: f64,
    pub precipitation: f64,
    pub evapotranspiration: f64,
}

/// The two station-code prefixes this archive is known to contain. Any
/// other prefix is an unrecognized file and is counted as a per-file
/// failure rather than aborting the whole import (§4.6 point 5).
const KNOWN_STATION_PREFIXES: &[(&str, &str)] = &[("3195", "3195"), ("3194", "3194")];

/// Derives the station tag from a filename, e.g. `3195_2024.csv` -> `3195`.
pub fn station_id_from_filename(filename: &str) -> Option<&'static str> {
    KNOWN_STATION_PREFIXES
        .iter()
        .find(|(prefix, _)| filename.starts_with(prefix))
        .map(|(_, tag)| *tag)
}

/// Drops non-printable characters, keeping only alphanumerics plus
/// `;,/:.-`. Removes invisible Unicode whitespace (BOM, NBSP, zero-width
/// characters) that otherwise breaks the field parser.
pub fn clean_line(line: &str) -> String {
    line.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ';' | ',' | '/' | ':' | '.' | '-'))
        .collect()
}

fn parse_decimal(field: &str) -> Result<f64, String> {
    field
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| format!("invalid decimal '{field}': {e}"))
}

fn parse_date(field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(field, "%d/%m/%Y")
        .map_err(|e| format!("invalid date '{field}': {e}"))
}

/// Parses one already-cleaned CSV line into a `SiarRecord`.
pub fn parse_record(line: &str) -> Result<SiarRecord, String> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() < 9 {
        return Err(format!("expected 9 fields, got {}", fields.len()));
    }

    Ok(SiarRecord {
        date: parse_date(fields[0])?,
        temperature_mean: parse_decimal(fields[1])?,
        temperature_min: parse_decimal(fields[2])?,
        temperature_max: parse_decimal(fields[3])?,
        humidity_mean: parse_decimal(fields[4])?,
        wind_mean: parse_decimal(fields[5])?,
        radiation: parse_decimal(fields[6])?,
        precipitation: parse_decimal(fields[7])?,
        evapotranspiration: parse_decimal(fields[8])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_invisible_whitespace() {
        let dirty = "15/06/2024;24\u{feff},5;18,2;31,0;55,3;2,1;210,4;0,0;3,2";
        let cleaned = clean_line(dirty);
        assert!(!cleaned.contains('\u{feff}'));
    }

    #[test]
    fn parses_locale_specific_record() {
        let record = parse_record("15/06/2024;24,5;18,2;31,0;55,3;2,1;210,4;0,0;3,2").unwrap();
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(record.temperature_mean, 24.5);
        assert_eq!(record.precipitation, 0.0);
    }

    #[test]
    fn station_prefix_is_recognized() {
        assert_eq!(station_id_from_filename("3195_2024.csv"), Some("3195"));
        assert_eq!(station_id_from_filename("unknown_2024.csv"), None);
    }
}
