// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! End-to-end scenarios driven against a real in-process server, a temp-file
//! store and mocked upstreams. Timestamps are relative to `Utc::now()` rather
//! than pinned to a fixed instant: nothing in this workspace takes an
//! injectable clock, so the scenarios assert the same invariants (gap
//! formulas, severity thresholds, idempotence, forecast purity, plan
//! classification) without needing to freeze wall-clock time.

use chrono::{Duration, Utc};
use obrador_integration_tests::{TestHarness, UpstreamStubs};
use obrador_types::machinery::MachineryCatalog;
use obrador_types::{MachinerySpec, Point, measurement};
use serde_json::json;

fn price_body(value: f64, datetime: chrono::DateTime<Utc>) -> String {
    json!({
        "included": [{
            "attributes": {
                "values": [{"value": value, "datetime": datetime.to_rfc3339()}]
            }
        }]
    })
    .to_string()
}

fn no_op_stubs(server: &mockito::ServerGuard) -> UpstreamStubs {
    UpstreamStubs {
        price_base: server.url(),
        weather_obs_base: server.url(),
        weather_realtime_base: server.url(),
    }
}

/// Scenario 1: cold start, a single hour of price ingestion.
#[tokio::test]
async fn cold_start_ingests_one_hour_of_price_data() {
    let mut price_server = mockito::Server::new_async().await;
    price_server
        .mock("GET", mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(price_body(80.0, Utc::now() - Duration::minutes(30)))
        .create_async()
        .await;

    let stubs = UpstreamStubs {
        price_base: price_server.url(),
        weather_obs_base: "http://127.0.0.1:1".to_owned(),
        weather_realtime_base: "http://127.0.0.1:1".to_owned(),
    };
    let harness = TestHarness::start(stubs).await;

    let response = harness
        .client
        .post(harness.url("/ingest/now"))
        .json(&json!({ "source": "price" }))
        .send()
        .await
        .expect("ingest/now request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body["written"], 1);
    assert_eq!(body["obtained"], 1);

    let points = harness
        .store()
        .range(
            measurement::ENERGY_PRICES,
            &obrador_types::TagSet::new(),
            Utc::now() - Duration::hours(2),
            Utc::now(),
        )
        .expect("range query");
    assert_eq!(points.len(), 1);
    assert!((points[0].field("price_eur_kwh").unwrap() - 0.08).abs() < 1e-9);

    let summary = harness
        .client
        .get(harness.url("/gaps/summary"))
        .send()
        .await
        .expect("gaps/summary request");
    assert_eq!(summary.status(), 200);
    let summary_body: serde_json::Value = summary.json().await.expect("json body");
    assert!(summary_body["price"]["last_timestamp"].is_string());
    assert!(summary_body["price"]["gap_hours"].as_f64().unwrap() < 2.0);
}

/// Scenario 2: a multi-day gap in an otherwise dense hourly series is
/// detected as a single critical-severity gap (duration > 12h, §4.4).
#[tokio::test]
async fn downtime_produces_a_single_critical_gap() {
    let mut server = mockito::Server::new_async().await;
    let stubs = no_op_stubs(&server);
    let harness = TestHarness::start(stubs).await;
    let store = harness.store();

    let lookback_hours: i64 = 240;
    let now = Utc::now();
    let skip_start = 50;
    let skip_end = 150; // 100-hour outage, well past the 12h critical threshold.

    let mut points = Vec::new();
    for h in 0..=lookback_hours {
        if (skip_start..skip_end).contains(&h) {
            continue;
        }
        let ts = now - Duration::hours(lookback_hours - h);
        points.push(
            Point::new(measurement::ENERGY_PRICES, ts)
                .with_tag("provider", "ree")
                .with_field("price_eur_kwh", 0.1),
        );
    }
    store.write_points(&points).expect("seed price series");

    let response = harness
        .client
        .get(harness.url("/gaps/detect?days_back=10"))
        .send()
        .await
        .expect("gaps/detect request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("json body");

    assert_eq!(body["summary"]["price_gap_count"], 1);
    let gap = &body["price_gaps"][0];
    assert_eq!(gap["severity"], "critical");
    assert_eq!(gap["missing_count"], skip_end - skip_start);
}

/// Scenario 3: with a gap present and the mocked price source always serving
/// a point, auto-backfill runs to completion with full per-chunk success.
#[tokio::test]
async fn auto_backfill_executes_and_succeeds_on_every_chunk() {
    let mut price_server = mockito::Server::new_async().await;
    price_server
        .mock("GET", mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(price_body(90.0, Utc::now() - Duration::hours(40)))
        .create_async()
        .await;

    let stubs = UpstreamStubs {
        price_base: price_server.url(),
        weather_obs_base: "http://127.0.0.1:1".to_owned(),
        weather_realtime_base: "http://127.0.0.1:1".to_owned(),
    };
    let harness = TestHarness::start(stubs).await;
    // No price data at all: every lookback hour is missing, well past
    // `max_gap_hours`, so the controller must act.

    let response = harness
        .client
        .post(harness.url("/gaps/backfill/auto?max_gap_hours=1"))
        .send()
        .await
        .expect("backfill/auto request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body["status"], "executed");

    let results = body["results"].as_array().expect("results array");
    assert!(!results.is_empty(), "weather gaps alone should still produce at least one result");
    for result in results {
        if result["records_requested"].as_u64().unwrap_or(0) > 0 {
            // The mock always returns exactly one record per window request,
            // so every chunk that asked for data got all of it back.
            assert_eq!(result["success_rate"], 1.0, "chunk did not fully succeed: {result}");
        }
    }
}

/// Scenario 4: hybrid weather ingestion falls back to whichever source is
/// actually reachable. The real wall-clock hour decides which client is tried
/// first, so both orderings are exercised depending on when the test runs;
/// either way exactly one point should land in the store.
#[tokio::test]
async fn hybrid_weather_ingestion_falls_back_to_the_reachable_source() {
    let mut obs_server = mockito::Server::new_async().await;
    obs_server
        .mock("GET", mockito::Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let mut realtime_server = mockito::Server::new_async().await;
    realtime_server
        .mock("GET", mockito::Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "dt": Utc::now().timestamp(),
                "main": {"temp": 21.5, "humidity": 58.0, "pressure": 1012.0},
                "wind": {"speed": 2.0, "deg": 90.0}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let stubs = UpstreamStubs {
        price_base: "http://127.0.0.1:1".to_owned(),
        weather_obs_base: obs_server.url(),
        weather_realtime_base: realtime_server.url(),
    };
    let harness = TestHarness::start(stubs).await;

    let response = harness
        .client
        .post(harness.url("/ingest/now"))
        .json(&json!({ "source": "hybrid" }))
        .send()
        .await
        .expect("ingest/now request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body["written"], 1);
    // Realtime is the only source that can ever succeed in this scenario, so
    // the fallback field is populated whenever the hour-of-day put the
    // observation client first.
    if let Some(fallback) = body["fallback_used"].as_str() {
        assert_eq!(fallback, "realtime");
    }
}

/// Scenario 5: prediction is a pure function of `(latest artifact, now)` —
/// back-to-back calls against an unchanged artifact return identical curves.
#[tokio::test]
async fn forecast_is_pure_given_a_fixed_artifact_and_clock() {
    let mut server = mockito::Server::new_async().await;
    let stubs = no_op_stubs(&server);
    let harness = TestHarness::start(stubs).await;
    let store = harness.store();

    let start = Utc::now() - Duration::days(30);
    let mut points = Vec::new();
    for h in 0..(24 * 30) {
        let ts = start + Duration::hours(h);
        let hour_of_day = (h % 24) as f64;
        let price = 0.10 + 0.05 * (hour_of_day / 24.0 * std::f64::consts::TAU).sin();
        points.push(
            Point::new(measurement::ENERGY_PRICES, ts)
                .with_tag("provider", "ree")
                .with_field("price_eur_kwh", price),
        );
    }
    store.write_points(&points).expect("seed price history");

    let train_response = harness
        .client
        .post(harness.url("/predict/prices/train"))
        .send()
        .await
        .expect("train request");
    assert_eq!(train_response.status(), 200);

    let first: serde_json::Value = harness
        .client
        .get(harness.url("/predict/prices/hourly?hours=24"))
        .send()
        .await
        .expect("hourly request 1")
        .json()
        .await
        .expect("json body 1");
    let second: serde_json::Value = harness
        .client
        .get(harness.url("/predict/prices/hourly?hours=24"))
        .send()
        .await
        .expect("hourly request 2")
        .json()
        .await
        .expect("json body 2");

    assert_eq!(first, second);
    assert_eq!(first.as_array().unwrap().len(), 24);
}

/// Scenario 6: the day plan steers an always-on process toward the cheap
/// hours its energy-score regressor learned to prefer.
#[tokio::test]
async fn day_plan_favours_cheap_hours_for_an_always_on_process() {
    let mut server = mockito::Server::new_async().await;
    let stubs = no_op_stubs(&server);

    let mut machinery = MachineryCatalog::default();
    machinery.processes.insert(
        "cacao_tempering".to_owned(),
        MachinerySpec {
            name: "cacao_tempering".to_owned(),
            power_kw: 10.0,
            duration_hours: 1.0,
            optimal_temp_c: 21.0,
            optimal_humidity_pct: 55.0,
            active_hours: (0..24).collect(),
        },
    );

    let harness = TestHarness::start_with_machinery(stubs, machinery).await;
    let store = harness.store();

    // Three weeks of a strong daily price cycle: small hours cheap, evening
    // hours expensive, constant weather at the process's own optimum so the
    // regressor learns price as the dominant driver of the energy score.
    let start = Utc::now() - Duration::days(21);
    let mut points = Vec::new();
    for h in 0..(24 * 21) {
        let ts = start + Duration::hours(h);
        let hour_of_day = (h % 24) as u32;
        let price = if (1..=5).contains(&hour_of_day) {
            0.05
        } else if (18..=21).contains(&hour_of_day) {
            0.35
        } else {
            0.15
        };
        points.push(
            Point::new(measurement::ENERGY_PRICES, ts)
                .with_tag("provider", "ree")
                .with_field("price_eur_kwh", price),
        );
        points.push(
            Point::new(measurement::WEATHER_DATA, ts)
                .with_tag("station_id", "3195")
                .with_field("temperature", 21.0)
                .with_field("humidity", 55.0),
        );
    }
    store.write_points(&points).expect("seed price and weather history");

    let train_forecast = harness.client.post(harness.url("/predict/prices/train")).send().await.expect("train forecaster");
    assert_eq!(train_forecast.status(), 200);
    let train_scoring = harness.client.post(harness.url("/predict/train")).send().await.expect("train scoring");
    assert_eq!(train_scoring.status(), 200);

    let plan_response = harness
        .client
        .post(harness.url("/optimize/production/daily"))
        .send()
        .await
        .expect("optimize/production/daily request");
    assert_eq!(plan_response.status(), 200);
    let plan: serde_json::Value = plan_response.json().await.expect("json body");

    let timeline = plan["timeline"].as_array().expect("timeline array");
    assert_eq!(timeline.len(), 24);

    let cheap_hour = timeline.iter().find(|h| h["hour"] == 3).expect("hour 3 present with a score");
    let expensive_hour = timeline.iter().find(|h| h["hour"] == 19).expect("hour 19 present with a score");

    let cheap_hour_score = cheap_hour["energy_score"].as_f64().expect("hour 3 energy_score");
    let expensive_hour_score = expensive_hour["energy_score"].as_f64().expect("hour 19 energy_score");

    assert!(
        cheap_hour_score > expensive_hour_score,
        "expected the cheap hour to score higher: cheap={cheap_hour_score} expensive={expensive_hour_score}"
    );

    assert_eq!(cheap_hour["production_class"], "Optimal");
    assert!(
        matches!(expensive_hour["production_class"].as_str(), Some("Reduced") | Some("Halt")),
        "expected the expensive hour to recommend cutting back: {}",
        expensive_hour["production_class"]
    );
}
