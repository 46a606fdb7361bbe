// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "obrador-csv-importer")]
#[command(about = "Import historical SIAR weather CSV archives into the Obrador store", long_about = None)]
struct Cli {
    /// Directory containing the `*.csv` SIAR export files to import
    #[arg(short, long)]
    csv_dir: PathBuf,

    /// Path to the SQLite store database (will be created if it doesn't exist)
    #[arg(short, long, default_value = "obrador.db")]
    database: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("Opening store: {}", cli.database.display());
    let database_path = cli
        .database
        .to_str()
        .context("database path must be valid UTF-8")?;
    let store = obrador_store::Store::open(database_path).context("failed to open store")?;

    println!("Importing historical CSVs from: {}", cli.csv_dir.display());
    let stats = obrador_etl::import_directory(&store, &cli.csv_dir);

    println!(
        "Import complete: {} files processed, {} files failed, {} records written",
        stats.files_processed, stats.files_failed, stats.records_written
    );

    if stats.files_failed > 0 {
        println!("warning: some files failed to import; check logs above for details");
    }

    Ok(())
}
