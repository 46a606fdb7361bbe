// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Time-series store adapter (C1): typed reads/writes against an embedded
//! SQLite database, keyed on the natural key `(measurement, tagset,
//! timestamp)`. See `Store::write_points` for the idempotence and
//! forecast-write contract (§3 invariants 2 and 5).

mod retry;

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use obrador_types::{Bucket, FieldSet, ObradorError, Point, Result, TagSet};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

pub use retry::retry_on_busy;

#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ObradorError::StoreUnavailable(format!(
                        "creating store directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| ObradorError::StoreUnavailable(format!("opening store {path}: {e}")))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS points (
                bucket        TEXT NOT NULL,
                measurement   TEXT NOT NULL,
                tagset        TEXT NOT NULL,
                ts            INTEGER NOT NULL,
                tags_json     TEXT NOT NULL,
                fields_json   TEXT NOT NULL,
                data_source   TEXT,
                PRIMARY KEY (measurement, tagset, ts)
            );

            CREATE INDEX IF NOT EXISTS idx_points_measurement_ts
                ON points(measurement, ts);",
        )
        .map_err(|e| ObradorError::StoreUnavailable(format!("initializing schema: {e}")))?;

        // Columns added after the initial release; ignore "duplicate column" errors.
        for col_def in ["data_source TEXT"] {
            let sql = format!("ALTER TABLE points ADD COLUMN {col_def}");
            let _ = conn.execute_batch(&sql);
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Batched, per-batch-atomic write (§4.1). A point whose `data_source` tag
    /// is `forecast` is silently skipped (not counted as written, not counted
    /// as rejected) when a non-forecast point already occupies the same
    /// natural key — invariant 5: forecast points must never overwrite
    /// observed ones.
    pub fn write_points(&self, points: &[Point]) -> Result<WriteStats> {
        let mut stats = WriteStats {
            requested: points.len(),
            ..WriteStats::default()
        };

        retry_on_busy(|| {
            let mut conn = self.conn.lock().expect("store mutex poisoned");
            let tx = conn
                .transaction()
                .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;

            for point in points {
                let tagset = point.tagset_key();
                let ts = point.timestamp.timestamp();
                let incoming_source = point.tag("data_source").unwrap_or_default();

                if incoming_source == "forecast" {
                    let existing_source: Option<Option<String>> = tx
                        .query_row(
                            "SELECT data_source FROM points
                             WHERE measurement = ?1 AND tagset = ?2 AND ts = ?3",
                            params![point.measurement, tagset, ts],
                            |row| row.get(0),
                        )
                        .optional()
                        .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;

                    if let Some(existing) = existing_source {
                        let observed = existing.as_deref() != Some("forecast");
                        if observed {
                            debug!(
                                measurement = %point.measurement,
                                %tagset,
                                "skipping forecast write over observed point"
                            );
                            continue;
                        }
                    }
                }

                let tags_json = serde_json::to_string(&point.tags)
                    .map_err(|e| ObradorError::ValidationError(e.to_string()))?;
                let fields_json = serde_json::to_string(&point.fields)
                    .map_err(|e| ObradorError::ValidationError(e.to_string()))?;
                let bucket = Bucket::for_measurement(&point.measurement).as_str();

                let result = tx.execute(
                    "INSERT INTO points (bucket, measurement, tagset, ts, tags_json, fields_json, data_source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(measurement, tagset, ts) DO UPDATE SET
                        tags_json = excluded.tags_json,
                        fields_json = excluded.fields_json,
                        data_source = excluded.data_source,
                        bucket = excluded.bucket",
                    params![bucket, point.measurement, tagset, ts, tags_json, fields_json, incoming_source],
                );

                match result {
                    Ok(_) => stats.written += 1,
                    Err(e) => {
                        warn!(error = %e, measurement = %point.measurement, "rejected point write");
                        if stats.rejected_sample.len() < 10 {
                            stats.rejected_sample.push(format!("{}: {e}", point.measurement));
                        }
                    }
                }
            }

            tx.commit()
                .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;
            Ok(())
        })?;

        Ok(stats)
    }

    /// Newest timestamp across *all* series matching the tag filter. Queries
    /// the flattened row set and sorts/limits in SQL rather than using a
    /// per-series "last" primitive, which is the pitfall named in §9: a
    /// naive "last per group" primitive returns one row per distinct
    /// tagset, not the single newest point overall.
    pub fn last_timestamp(
        &self,
        measurement: &str,
        tag_filter: &TagSet,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT tags_json, ts FROM points WHERE measurement = ?1 ORDER BY ts DESC",
            )
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;

        let mut rows = stmt
            .query(params![measurement])
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;

        while let Some(row) = rows
            .next()
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?
        {
            let tags_json: String = row.get(0).map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;
            let ts: i64 = row.get(1).map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;
            let tags: TagSet = serde_json::from_str(&tags_json).unwrap_or_default();
            if tags_match(&tags, tag_filter) {
                return Ok(Some(
                    Utc.timestamp_opt(ts, 0)
                        .single()
                        .ok_or_else(|| ObradorError::StoreUnavailable("invalid timestamp".to_owned()))?,
                ));
            }
        }

        Ok(None)
    }

    /// Absolute-bound range query (§4.1: range queries require absolute
    /// start/end, never relative offsets).
    pub fn range(
        &self,
        measurement: &str,
        tag_filter: &TagSet,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Point>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT tags_json, fields_json, ts FROM points
                 WHERE measurement = ?1 AND ts >= ?2 AND ts <= ?3
                 ORDER BY ts ASC",
            )
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![measurement, start.timestamp(), end.timestamp()],
                |row| {
                    let tags_json: String = row.get(0)?;
                    let fields_json: String = row.get(1)?;
                    let ts: i64 = row.get(2)?;
                    Ok((tags_json, fields_json, ts))
                },
            )
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;

        let mut points = Vec::new();
        for row in rows {
            let (tags_json, fields_json, ts) =
                row.map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;
            let tags: TagSet = serde_json::from_str(&tags_json).unwrap_or_default();
            if !tags_match(&tags, tag_filter) {
                continue;
            }
            let fields: FieldSet = serde_json::from_str(&fields_json).unwrap_or_default();
            let timestamp = Utc
                .timestamp_opt(ts, 0)
                .single()
                .ok_or_else(|| ObradorError::StoreUnavailable("invalid timestamp".to_owned()))?;
            points.push(Point {
                measurement: measurement.to_owned(),
                timestamp,
                tags,
                fields,
            });
        }

        Ok(points)
    }

    /// Average of `field` over fixed-size windows covering `[start, end]`.
    pub fn aggregate_window(
        &self,
        measurement: &str,
        tag_filter: &TagSet,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        window: chrono::Duration,
        field: &str,
    ) -> Result<Vec<(DateTime<Utc>, f64)>> {
        let points = self.range(measurement, tag_filter, start, end)?;
        let window_secs = window.num_seconds().max(1);

        let mut buckets: std::collections::BTreeMap<i64, (f64, usize)> =
            std::collections::BTreeMap::new();
        for point in &points {
            let Some(value) = point.field(field) else {
                continue;
            };
            let bucket_start = (point.timestamp.timestamp() / window_secs) * window_secs;
            let entry = buckets.entry(bucket_start).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|(bucket_start, (sum, count))| {
                let ts = Utc.timestamp_opt(bucket_start, 0).single().unwrap_or(start);
                (ts, sum / count as f64)
            })
            .collect())
    }

    /// Typed escape hatch for aggregated rollups that don't fit the
    /// range/aggregate-window shape, executed as a read-only query against
    /// the underlying SQLite connection. Adapts the abstract "typed
    /// `Query(flux)`" requirement to the SQL the embedded store actually
    /// speaks.
    pub fn query_sql(&self, sql: &str) -> Result<Vec<Vec<String>>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                (0..column_count)
                    .map(|i| {
                        row.get::<_, Option<String>>(i)
                            .map(|v| v.unwrap_or_default())
                    })
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))
    }

    /// Deletes points older than `retention` for a measurement, used by the
    /// scheduler's `weekly_cleanup` job. Returns the number of rows removed.
    pub fn cleanup_older_than(
        &self,
        measurement: &str,
        retention: chrono::Duration,
    ) -> Result<usize> {
        let cutoff = (Utc::now() - retention).timestamp();
        let conn = self.conn.lock().expect("store mutex poisoned");
        let removed = conn
            .execute(
                "DELETE FROM points WHERE measurement = ?1 AND ts < ?2",
                params![measurement, cutoff],
            )
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;
        Ok(removed)
    }

    /// Liveness ping used by the `health_check` scheduler job and `/ready`.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| ObradorError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}

fn tags_match(tags: &TagSet, filter: &TagSet) -> bool {
    filter.iter().all(|(k, v)| tags.get(k) == Some(v))
}

#[derive(Debug, Clone, Default)]
pub struct WriteStats {
    pub requested: usize,
    pub written: usize,
    pub rejected_sample: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obrador-test.db");
        let store = Store::open(path.to_str().unwrap()).unwrap();
        (store, dir)
    }

    fn point_at(hour: u32, source: &str) -> Point {
        let ts = Utc.with_ymd_and_hms(2025, 6, 15, hour, 0, 0).unwrap();
        Point::new("energy_prices", ts)
            .with_tag("provider", "ree")
            .with_tag("data_source", source)
            .with_field("price_eur_kwh", 0.1)
    }

    #[test]
    fn write_then_range_roundtrips() {
        let (store, _dir) = temp_store();
        let stats = store.write_points(&[point_at(10, "realtime")]).unwrap();
        assert_eq!(stats.written, 1);

        let start = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 15, 23, 0, 0).unwrap();
        let points = store
            .range("energy_prices", &TagSet::new(), start, end)
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].field("price_eur_kwh"), Some(0.1));
    }

    #[test]
    fn reingest_same_timestamp_overwrites_not_duplicates() {
        let (store, _dir) = temp_store();
        store.write_points(&[point_at(10, "realtime")]).unwrap();
        let mut updated = point_at(10, "realtime");
        updated.fields.insert("price_eur_kwh".to_owned(), 0.2);
        store.write_points(&[updated]).unwrap();

        let start = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 15, 23, 0, 0).unwrap();
        let points = store
            .range("energy_prices", &TagSet::new(), start, end)
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].field("price_eur_kwh"), Some(0.2));
    }

    #[test]
    fn forecast_write_does_not_overwrite_observed_point() {
        let (store, _dir) = temp_store();
        store.write_points(&[point_at(10, "realtime")]).unwrap();
        let mut forecast = point_at(10, "forecast");
        forecast.fields.insert("price_eur_kwh".to_owned(), 0.99);
        store.write_points(&[forecast]).unwrap();

        let start = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 15, 23, 0, 0).unwrap();
        let points = store
            .range("energy_prices", &TagSet::new(), start, end)
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].field("price_eur_kwh"), Some(0.1));
    }

    #[test]
    fn last_timestamp_flattens_across_tagsets() {
        let (store, _dir) = temp_store();
        // Two different tagsets (different data_source), the older one has
        // the lexicographically "last per group" trap: if a naive per-series
        // "last" primitive were used, a stale tagset could shadow a fresher
        // one it happens to be grouped separately from.
        let old = point_at(5, "historical");
        let fresh = point_at(20, "realtime");
        store.write_points(&[old, fresh]).unwrap();

        let last = store
            .last_timestamp("energy_prices", &TagSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(last.timestamp(), Utc.with_ymd_and_hms(2025, 6, 15, 20, 0, 0).unwrap().timestamp());
    }
}
