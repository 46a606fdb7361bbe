// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Historical ETL (C6): parses locale-specific SIAR daily CSV archives into
//! `siar_weather` store points. Synchronous and CPU/IO-bound by nature; the
//! long-running server offloads calls into this crate onto a blocking
//! worker thread (§5) rather than running them on the async I/O loop.

mod encoding;
mod parse;

use std::path::Path;

use chrono::{TimeZone, Utc};
use obrador_store::Store;
use obrador_types::Point;
use tracing::{info, warn};

pub use parse::{SiarRecord, station_id_from_filename};

const BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct EtlStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub records_written: usize,
}

/// Imports every `*.csv` file directly under `dir` into `store`, continuing
/// past per-file errors (§4.6 point 5).
pub fn import_directory(store: &Store, dir: &Path) -> EtlStats {
    let mut stats = EtlStats::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, dir = %dir.display(), "failed to list historical CSV directory");
            return stats;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        match import_file(store, &path) {
            Ok(written) => {
                stats.files_processed += 1;
                stats.records_written += written;
            }
            Err(e) => {
                warn!(error = %e, file = %path.display(), "historical CSV import failed");
                stats.files_failed += 1;
            }
        }
    }

    info!(
        files_processed = stats.files_processed,
        files_failed = stats.files_failed,
        records_written = stats.records_written,
        "historical ETL run complete"
    );
    stats
}

/// Imports a single CSV file, returning the number of points written.
pub fn import_file(store: &Store, path: &Path) -> Result<usize, String> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| "non-UTF-8 filename".to_owned())?;
    let station_id = station_id_from_filename(filename)
        .ok_or_else(|| format!("unrecognized station prefix in '{filename}'"))?;

    let bytes = std::fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    let text = encoding::decode_with_fallback(&bytes);

    let mut written = 0usize;
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    for (line_no, raw_line) in text.lines().enumerate() {
        // First line is a header in the SIAR export format.
        if line_no == 0 {
            continue;
        }
        if raw_line.trim().is_empty() {
            continue;
        }

        let cleaned = parse::clean_line(raw_line);
        let record = match parse::parse_record(&cleaned) {
            Ok(record) => record,
            Err(e) => {
                warn!(file = %filename, line = line_no, error = %e, "skipping malformed SIAR row");
                continue;
            }
        };

        batch.push(record_to_point(station_id, &record));

        if batch.len() >= BATCH_SIZE {
            written += flush_batch(store, &mut batch)?;
        }
    }
    if !batch.is_empty() {
        written += flush_batch(store, &mut batch)?;
    }

    Ok(written)
}

fn flush_batch(store: &Store, batch: &mut Vec<Point>) -> Result<usize, String> {
    let stats = store
        .write_points(batch)
        .map_err(|e| format!("writing batch: {e}"))?;
    batch.clear();
    Ok(stats.written)
}

fn record_to_point(station_id: &str, record: &SiarRecord) -> Point {
    let timestamp = Utc
        .from_utc_datetime(&record.date.and_hms_opt(0, 0, 0).expect("midnight is always valid"));

    Point::new("siar_weather", timestamp)
        .with_tag("station_id", station_id)
        .with_tag("data_source", "historical_csv")
        .with_field("temperature_mean", record.temperature_mean)
        .with_field("temperature_min", record.temperature_min)
        .with_field("temperature_max", record.temperature_max)
        .with_field("humidity_mean", record.humidity_mean)
        .with_field("wind_mean", record.wind_mean)
        .with_field("radiation", record.radiation)
        .with_field("precipitation", record.precipitation)
        .with_field("evapotranspiration", record.evapotranspiration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obrador_types::TagSet;

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("etl-test.db").to_str().unwrap()).unwrap();
        (store, dir)
    }

    #[test]
    fn imports_a_well_formed_file() {
        let (store, dir) = temp_store();
        let csv_path = dir.path().join("3195_2024.csv");
        std::fs::write(
            &csv_path,
            "FECHA;TMEDIA;TMIN;TMAX;HRMEDIA;VVMEDIA;RADIACION;PRECIP;ETO\n\
             15/06/2024;24,5;18,2;31,0;55,3;2,1;210,4;0,0;3,2\n\
             16/06/2024;25,1;19,0;32,0;50,0;1,9;215,0;0,0;3,4\n",
        )
        .unwrap();

        let written = import_file(&store, &csv_path).unwrap();
        assert_eq!(written, 2);

        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let points = store
            .range("siar_weather", &TagSet::new(), start, end)
            .unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn unrecognized_station_prefix_fails_cleanly() {
        let (store, dir) = temp_store();
        let csv_path = dir.path().join("unknown_2024.csv");
        std::fs::write(&csv_path, "header\n15/06/2024;1,0;1,0;1,0;1,0;1,0;1,0;1,0;1,0\n").unwrap();

        assert!(import_file(&store, &csv_path).is_err());
    }

    #[test]
    fn import_directory_tolerates_one_bad_file() {
        let (store, dir) = temp_store();
        std::fs::write(
            dir.path().join("3195_2024.csv"),
            "header\n15/06/2024;24,5;18,2;31,0;55,3;2,1;210,4;0,0;3,2\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("bad_2024.csv"), "header\nnot,a,valid,row\n").unwrap();

        let stats = import_directory(&store, dir.path());
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.records_written, 1);
    }
}
