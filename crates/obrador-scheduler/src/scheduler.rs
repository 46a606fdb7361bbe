// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! Cooperative scheduler core (§4.7, §5). Each job in the catalogue runs on
//! its own `tokio::spawn`ed loop sleeping until its `next_run`, mirroring
//! the interval-loop idiom the rest of this workspace uses for background
//! polling. A per-job atomic flag prevents overlapping runs; shutdown asks
//! every loop to stop and waits up to a fixed deadline for in-flight jobs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use obrador_types::{ObradorError, Result};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::catalogue::{JobBody, JobDef, catalogue};
use crate::context::SchedulerContext;
use crate::job::JobStats;

const SHUTDOWN_DEADLINE: StdDuration = StdDuration::from_secs(30);

struct JobState {
    id: &'static str,
    name: &'static str,
    trigger: crate::trigger::Trigger,
    body: Arc<dyn JobBody>,
    running: AtomicBool,
    stats: Mutex<JobStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub next_run: Option<DateTime<Utc>>,
    pub stats: JobStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub status: &'static str,
    pub jobs: Vec<JobStatus>,
}

pub struct Scheduler {
    ctx: Arc<SchedulerContext>,
    jobs: Vec<Arc<JobState>>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(ctx: SchedulerContext) -> Self {
        let ctx = Arc::new(ctx);
        let (shutdown_tx, _) = watch::channel(false);
        let jobs = catalogue()
            .into_iter()
            .map(|def: JobDef| {
                Arc::new(JobState {
                    id: def.id,
                    name: def.name,
                    trigger: def.trigger,
                    body: def.body,
                    running: AtomicBool::new(false),
                    stats: Mutex::new(JobStats::default()),
                })
            })
            .collect();

        Self {
            ctx,
            jobs,
            handles: std::sync::Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Spawns one loop per job in the catalogue. Idempotent calls would
    /// double-spawn, so this is only meant to be called once at startup.
    pub fn start(&self) {
        let mut handles = self.handles.lock().expect("scheduler handle lock poisoned");
        for job in &self.jobs {
            let job = Arc::clone(job);
            let ctx = Arc::clone(&self.ctx);
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(run_loop(ctx, job, shutdown_rx)));
        }
    }

    /// Runs `id` immediately, independent of its trigger. Returns an error
    /// if the job is unknown or currently in flight.
    pub async fn trigger_now(&self, id: &str) -> Result<()> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| ObradorError::ValidationError(format!("unknown job id '{id}'")))?;

        if job.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            let mut stats = job.stats.lock().await;
            stats.record_overlap_skip();
            return Err(ObradorError::ValidationError(format!("job '{id}' is already running")));
        }

        execute(&self.ctx, job).await;
        Ok(())
    }

    pub async fn status(&self) -> SchedulerStatus {
        let mut jobs = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let stats = job.stats.lock().await.clone();
            jobs.push(JobStatus {
                id: job.id,
                name: job.name,
                next_run: stats.next_run,
                stats,
            });
        }
        SchedulerStatus { status: "running", jobs }
    }

    /// Signals every loop to stop and waits up to [`SHUTDOWN_DEADLINE`] for
    /// in-flight jobs to finish. Jobs still running past the deadline are
    /// aborted and reported as not finished.
    pub async fn shutdown(&self) -> HashMap<&'static str, bool> {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.handles.lock().expect("scheduler handle lock poisoned").drain(..).collect();
        let abort_handles: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        if tokio::time::timeout(SHUTDOWN_DEADLINE, join_all(handles)).await.is_err() {
            warn!("scheduler shutdown deadline elapsed, aborting remaining jobs");
            for handle in abort_handles {
                handle.abort();
            }
        }

        self.jobs.iter().map(|job| (job.id, !job.running.load(Ordering::SeqCst))).collect()
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "scheduler job task panicked during shutdown");
        }
    }
}

async fn run_loop(ctx: Arc<SchedulerContext>, job: Arc<JobState>, mut shutdown_rx: watch::Receiver<bool>) {
    {
        let mut stats = job.stats.lock().await;
        stats.next_run = Some(job.trigger.next_run(Utc::now()));
    }

    loop {
        let next_run = job.stats.lock().await.next_run.unwrap_or_else(Utc::now);
        let sleep_for = (next_run - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(job = job.id, "scheduler loop stopping for shutdown");
                    return;
                }
            }
        }

        if *shutdown_rx.borrow() {
            return;
        }

        if job.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            let mut stats = job.stats.lock().await;
            stats.record_overlap_skip();
            stats.next_run = Some(job.trigger.next_run(Utc::now()));
            continue;
        }

        execute(&ctx, &job).await;

        let mut stats = job.stats.lock().await;
        stats.next_run = Some(job.trigger.next_run(Utc::now()));
    }
}

async fn execute(ctx: &Arc<SchedulerContext>, job: &Arc<JobState>) {
    let started = Utc::now();
    let result = job.body.run(ctx).await;
    job.running.store(false, Ordering::SeqCst);

    let mut stats = job.stats.lock().await;
    match result {
        Ok(()) => stats.record_success(started),
        Err(e) => {
            error!(job = job.id, error = %e, "scheduler job failed");
            stats.record_error(started, e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use obrador_clients::{PriceClient, WeatherObsClient, WeatherRealtimeClient};
    use obrador_registry::Registry;
    use obrador_store::Store;
    use obrador_types::machinery::MachineryCatalog;

    use super::*;

    fn test_context() -> (SchedulerContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("scheduler-test.db").to_str().unwrap()).unwrap();
        let registry = Registry::open(dir.path().join("models")).unwrap();
        let price_client = PriceClient::new("http://localhost:0").unwrap();
        let weather_obs_client =
            WeatherObsClient::new("http://localhost:0", "key", "station", dir.path().join("token.json")).unwrap();
        let weather_realtime_client = WeatherRealtimeClient::new("http://localhost:0", "key", "28079").unwrap();

        let ctx = SchedulerContext {
            store,
            registry,
            price_client,
            weather_obs_client,
            weather_realtime_client,
            machinery: MachineryCatalog::default(),
            timezone: "Europe/Madrid".to_owned(),
            station_id: "station".to_owned(),
            historical_csv_dir: dir.path().join("historical"),
            auto_backfill_max_gap_hours: 6.0,
            auto_backfill_days_back: 30,
            telemetry_retention_days: 90,
        };
        (ctx, dir)
    }

    #[tokio::test]
    async fn status_reports_one_entry_per_catalogue_job() {
        let (ctx, _dir) = test_context();
        let scheduler = Scheduler::new(ctx);
        let status = scheduler.status().await;
        assert_eq!(status.jobs.len(), catalogue().len());
        assert!(status.jobs.iter().all(|j| j.stats.run_count == 0));
    }

    #[tokio::test]
    async fn trigger_now_rejects_unknown_job_id() {
        let (ctx, _dir) = test_context();
        let scheduler = Scheduler::new(ctx);
        let err = scheduler.trigger_now("does_not_exist").await.unwrap_err();
        assert!(matches!(err, ObradorError::ValidationError(_)));
    }

    #[tokio::test]
    async fn trigger_now_rejects_a_job_already_in_flight() {
        let (ctx, _dir) = test_context();
        let scheduler = Scheduler::new(ctx);
        let job = scheduler.jobs.iter().find(|j| j.id == "health_check").unwrap();
        job.running.store(true, Ordering::SeqCst);

        let err = scheduler.trigger_now("health_check").await.unwrap_err();
        assert!(matches!(err, ObradorError::ValidationError(_)));

        let status = scheduler.status().await;
        let health = status.jobs.iter().find(|j| j.id == "health_check").unwrap();
        assert_eq!(health.stats.skipped_overlap, 1);
    }
}
