// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! `IngestHistoricalCSV` (§4.3): adapts C6's `{files_processed, files_failed,
//! records_written}` shape onto the common `IngestionStats` C3 reports for
//! every ingestion path.

use std::path::Path;
use std::time::Instant;

use obrador_store::Store;

use crate::IngestionStats;

pub fn ingest_historical_csv(store: &Store, csv_dir: &Path) -> IngestionStats {
    let started = Instant::now();
    let etl_stats = obrador_etl::import_directory(store, csv_dir);

    IngestionStats {
        requested: etl_stats.files_processed + etl_stats.files_failed,
        obtained: etl_stats.files_processed,
        written: etl_stats.records_written,
        validation_errors: etl_stats.files_failed,
        duration: started.elapsed(),
        fallback_used: None,
    }
}
