// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! The fixed job catalogue (§4.7). Each body is a thin adapter onto one of
//! the other crates; the scheduler only owns timing, overlap prevention and
//! stats.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use obrador_gaps::{Severity, auto_backfill_check, detect_gaps};
use obrador_scoring::{plan_day, train_scoring};
use obrador_types::{Result, TagSet, measurement};
use tracing::{info, warn};

use crate::context::SchedulerContext;
use crate::trigger::Trigger;

#[async_trait]
pub trait JobBody: Send + Sync {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()>;
}

pub struct JobDef {
    pub id: &'static str,
    pub name: &'static str,
    pub trigger: Trigger,
    pub body: Arc<dyn JobBody>,
}

pub fn catalogue() -> Vec<JobDef> {
    vec![
        JobDef {
            id: "price_ingest",
            name: "ingest energy price window",
            trigger: Trigger::IntervalMinutes(5),
            body: Arc::new(PriceIngestJob),
        },
        JobDef {
            id: "weather_ingest_hybrid",
            name: "ingest current weather via hybrid source selection",
            trigger: Trigger::IntervalMinutes(5),
            body: Arc::new(WeatherIngestHybridJob),
        },
        JobDef {
            id: "auto_backfill_check",
            name: "check gap age and backfill if stale",
            trigger: Trigger::IntervalMinutes(120),
            body: Arc::new(AutoBackfillCheckJob),
        },
        JobDef {
            id: "train_scoring",
            name: "retrain scoring regressor and classifier",
            trigger: Trigger::IntervalMinutes(30),
            body: Arc::new(TrainScoringJob),
        },
        JobDef {
            id: "train_forecaster",
            name: "retrain price forecaster",
            trigger: Trigger::CronDaily { hour: 2, minute: 30 },
            body: Arc::new(TrainForecasterJob),
        },
        JobDef {
            id: "health_check",
            name: "ping store and upstream price API",
            trigger: Trigger::IntervalMinutes(15),
            body: Arc::new(HealthCheckJob),
        },
        JobDef {
            id: "token_refresh",
            name: "proactively refresh weather-observation bearer token",
            trigger: Trigger::CronDaily { hour: 3, minute: 0 },
            body: Arc::new(TokenRefreshJob),
        },
        JobDef {
            id: "daily_backfill_validation",
            name: "report gap severity without backfilling",
            trigger: Trigger::CronDaily { hour: 1, minute: 0 },
            body: Arc::new(DailyBackfillValidationJob),
        },
        JobDef {
            id: "weekly_cleanup",
            name: "prune points past the retention window",
            trigger: Trigger::CronWeekly {
                weekday: chrono::Weekday::Sun,
                hour: 2,
                minute: 0,
            },
            body: Arc::new(WeeklyCleanupJob),
        },
        JobDef {
            id: "hourly_optimization",
            name: "recompute the day's optimization plan",
            trigger: Trigger::IntervalMinutes(30),
            body: Arc::new(HourlyOptimizationJob),
        },
    ]
}

struct PriceIngestJob;

#[async_trait]
impl JobBody for PriceIngestJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let now = Utc::now();
        let start = now - Duration::hours(2);
        let end = now + Duration::hours(26);
        let stats = obrador_ingest::ingest_price_window(&ctx.price_client, &ctx.store, start, end, &ctx.timezone).await?;
        info!(written = stats.written, obtained = stats.obtained, "price_ingest completed");
        Ok(())
    }
}

struct WeatherIngestHybridJob;

#[async_trait]
impl JobBody for WeatherIngestHybridJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let stats = obrador_ingest::ingest_hybrid_weather(
            &ctx.weather_obs_client,
            &ctx.weather_realtime_client,
            &ctx.store,
            &ctx.station_id,
            &ctx.timezone,
        )
        .await?;
        info!(written = stats.written, fallback_used = ?stats.fallback_used, "weather_ingest_hybrid completed");
        Ok(())
    }
}

struct AutoBackfillCheckJob;

#[async_trait]
impl JobBody for AutoBackfillCheckJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let outcome = auto_backfill_check(
            &ctx.store,
            &ctx.price_client,
            &ctx.weather_obs_client,
            ctx.auto_backfill_max_gap_hours,
            &ctx.station_id,
            &ctx.timezone,
            &ctx.historical_csv_dir,
            ctx.auto_backfill_days_back,
        )
        .await?;
        info!(?outcome, "auto_backfill_check completed");
        Ok(())
    }
}

struct TrainScoringJob;

#[async_trait]
impl JobBody for TrainScoringJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let report = train_scoring(&ctx.store, &ctx.registry, &ctx.machinery, &ctx.timezone)?;
        info!(
            r2_test = report.r2_test,
            accuracy_test = report.accuracy_test,
            regressor_overfit = report.regressor_overfit,
            classifier_overfit = report.classifier_overfit,
            "train_scoring completed"
        );
        Ok(())
    }
}

struct TrainForecasterJob;

#[async_trait]
impl JobBody for TrainForecasterJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let report = obrador_forecast::train_forecaster(&ctx.store, &ctx.registry, &ctx.timezone)?;
        info!(
            mae = report.mae,
            r2 = report.r2,
            coverage_95 = report.coverage_95,
            meets_thresholds = report.meets_acceptance_thresholds,
            "train_forecaster completed"
        );
        Ok(())
    }
}

struct HealthCheckJob;

#[async_trait]
impl JobBody for HealthCheckJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        ctx.store.ping()?;
        ctx.price_client.ping().await?;
        Ok(())
    }
}

struct TokenRefreshJob;

#[async_trait]
impl JobBody for TokenRefreshJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        ctx.weather_obs_client.refresh_token().await
    }
}

struct DailyBackfillValidationJob;

#[async_trait]
impl JobBody for DailyBackfillValidationJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let lookback = Duration::days(ctx.auto_backfill_days_back);
        let price_gaps = detect_gaps(&ctx.store, measurement::ENERGY_PRICES, &TagSet::new(), Duration::hours(1), lookback)?;
        let weather_gaps = detect_gaps(&ctx.store, measurement::WEATHER_DATA, &TagSet::new(), Duration::hours(1), lookback)?;

        let critical = price_gaps
            .iter()
            .chain(weather_gaps.iter())
            .filter(|g| matches!(g.severity, Severity::Critical))
            .count();
        if critical > 0 {
            warn!(critical, "daily_backfill_validation found critical-severity gaps");
        } else {
            info!(
                price_gaps = price_gaps.len(),
                weather_gaps = weather_gaps.len(),
                "daily_backfill_validation found no critical gaps"
            );
        }
        Ok(())
    }
}

struct WeeklyCleanupJob;

#[async_trait]
impl JobBody for WeeklyCleanupJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let retention = Duration::days(ctx.telemetry_retention_days);
        let removed_prices = ctx.store.cleanup_older_than(measurement::ENERGY_PRICES, retention)?;
        let removed_weather = ctx.store.cleanup_older_than(measurement::WEATHER_DATA, retention)?;
        info!(removed_prices, removed_weather, "weekly_cleanup completed");
        Ok(())
    }
}

struct HourlyOptimizationJob;

#[async_trait]
impl JobBody for HourlyOptimizationJob {
    async fn run(&self, ctx: &SchedulerContext) -> Result<()> {
        let plan = plan_day(&ctx.store, &ctx.registry, &ctx.machinery, &ctx.timezone, Utc::now())?;
        info!(
            aggregate_savings_eur = plan.aggregate_savings_eur,
            hours = plan.timeline.len(),
            "hourly_optimization completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_ten_jobs_with_unique_ids() {
        let jobs = catalogue();
        assert_eq!(jobs.len(), 10);
        let mut ids: Vec<&str> = jobs.iter().map(|j| j.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn catalogue_matches_the_canonical_job_table() {
        let jobs = catalogue();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id).collect();
        for expected in [
            "price_ingest",
            "weather_ingest_hybrid",
            "auto_backfill_check",
            "train_scoring",
            "train_forecaster",
            "health_check",
            "token_refresh",
            "daily_backfill_validation",
            "weekly_cleanup",
            "hourly_optimization",
        ] {
            assert!(ids.contains(&expected), "missing job id {expected}");
        }
    }
}
