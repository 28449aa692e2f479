//! End-to-end cycle tests over in-memory SQLite and scripted collaborators.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use common::{
    cheap_falling_price, expensive_price, falling_weather, hourly_samples, rising_weather,
    setup_test_db, FailingDevice,
};
use curveshift::adapters::advisors::MockAdvisor;
use curveshift::adapters::device::DryRunDeviceControl;
use curveshift::adapters::sqlite::{
    SqliteChangeRepository, SqliteDecisionLogRepository, SqlitePlannedTestRepository,
    SqliteResultRepository,
};
use curveshift::adapters::telemetry::{BundleForecastSource, BundleMetricSource};
use curveshift::domain::models::{
    ChangeOrigin, Config, ParameterChange, ParameterId, PlannedTest, TestStatus,
};
use curveshift::domain::ports::{AdvisorProposal, ProposalAction};
use curveshift::services::AdvisorChain;
use curveshift::{
    ChangeRepository, Decision, DecisionLogRepository, DeviceControl, DeviceState,
    PlannedTestRepository, Recommendation, ResultRepository, TuningEngine,
};

struct Harness {
    engine: TuningEngine,
    changes: Arc<SqliteChangeRepository>,
    results: Arc<SqliteResultRepository>,
    tests: Arc<SqlitePlannedTestRepository>,
    decisions: Arc<SqliteDecisionLogRepository>,
    device: Arc<DryRunDeviceControl>,
}

async fn harness(
    metrics: BundleMetricSource,
    forecasts: BundleForecastSource,
    advisor: MockAdvisor,
    device_state: Option<DeviceState>,
) -> Harness {
    let pool = setup_test_db().await;
    let config = Config::default();
    let device = Arc::new(match device_state {
        Some(state) => DryRunDeviceControl::new(state),
        None => DryRunDeviceControl::from_parameters(&config.parameter_set()),
    });
    let changes = Arc::new(SqliteChangeRepository::new(pool.clone()));
    let results = Arc::new(SqliteResultRepository::new(pool.clone()));
    let tests = Arc::new(SqlitePlannedTestRepository::new(pool.clone()));
    let decisions = Arc::new(SqliteDecisionLogRepository::new(pool.clone()));

    let engine = TuningEngine::new(
        config,
        Arc::new(metrics),
        device.clone(),
        Arc::new(forecasts),
        AdvisorChain::new(vec![Arc::new(advisor)]),
        changes.clone(),
        results.clone(),
        tests.clone(),
        decisions.clone(),
    );

    Harness {
        engine,
        changes,
        results,
        tests,
        decisions,
        device,
    }
}

fn recent_samples() -> BundleMetricSource {
    let now = Utc::now();
    BundleMetricSource::new(hourly_samples(now - Duration::hours(12), 13, now, 3.0, 3.0))
}

fn default_state(indoor: f64) -> DeviceState {
    let mut state = DeviceState {
        values: std::collections::HashMap::new(),
        indoor_temp: indoor,
        read_at: Utc::now(),
    };
    state.values.insert(ParameterId::CurveOffset, 0.0);
    state.values.insert(ParameterId::CurveSlope, 0.4);
    state.values.insert(ParameterId::StartThreshold, -300.0);
    state.values.insert(ParameterId::VentilationLevel, 2.0);
    state
}

#[tokio::test]
async fn test_scheduler_applies_and_logs_change() {
    let h = harness(
        recent_samples(),
        BundleForecastSource::new(Some(cheap_falling_price(5)), Some(falling_weather(5))),
        MockAdvisor::holding(),
        Some(default_state(22.0)),
    )
    .await;

    let report = h.engine.run_cycle().await.expect("cycle");
    assert!(report.scheduler_applied);

    // The device carries the new value.
    let state = h.device.read_state().await.unwrap();
    assert!((state.value_of(ParameterId::CurveOffset).unwrap() - 2.0).abs() < 1e-9);

    // Exactly one change recorded, linked from an applied log entry.
    let changes = h.changes.list_since(Utc::now() - Duration::hours(1)).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].origin, ChangeOrigin::Rule);

    let log = h.decisions.list_recent(10).await.unwrap();
    let applied: Vec<_> = log.iter().filter(|e| e.applied).collect();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].change_id, Some(changes[0].id));
}

#[tokio::test]
async fn test_missing_forecast_holds_and_logs() {
    let h = harness(
        recent_samples(),
        BundleForecastSource::new(None, None),
        MockAdvisor::holding(),
        Some(default_state(22.0)),
    )
    .await;

    let report = h.engine.run_cycle().await.expect("cycle");
    assert!(!report.scheduler_applied);
    match report.scheduler_decision {
        Some(Decision::Hold { ref reasoning }) => assert!(reasoning.contains("unavailable")),
        other => panic!("expected hold, got {other:?}"),
    }

    // No change was written, but the hold is on the record.
    assert!(h.changes.list_unevaluated().await.unwrap().is_empty());
    let log = h.decisions.list_recent(10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action, "hold");
    assert!(!log[0].applied);
}

#[tokio::test]
async fn test_comfort_floor_rejection_is_logged_not_dropped() {
    // Expensive + rising wants -2 offset steps; indoor at 20.6 predicts
    // 20.0, below the 20.5 floor.
    let h = harness(
        recent_samples(),
        BundleForecastSource::new(Some(expensive_price(5)), Some(rising_weather(5))),
        MockAdvisor::holding(),
        Some(default_state(20.6)),
    )
    .await;

    let report = h.engine.run_cycle().await.expect("cycle");
    assert!(!report.scheduler_applied);

    let log = h.decisions.list_recent(10).await.unwrap();
    let rejected: Vec<_> = log.iter().filter(|e| !e.applied).collect();
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0]
        .rejection_reason
        .as_deref()
        .unwrap()
        .contains("comfort floor"));

    // The device was never touched.
    let state = h.device.read_state().await.unwrap();
    assert!((state.value_of(ParameterId::CurveOffset).unwrap()).abs() < 1e-9);
}

#[tokio::test]
async fn test_device_failure_leaves_no_partial_state() {
    let pool = setup_test_db().await;
    let config = Config::default();
    let changes = Arc::new(SqliteChangeRepository::new(pool.clone()));
    let results = Arc::new(SqliteResultRepository::new(pool.clone()));
    let tests = Arc::new(SqlitePlannedTestRepository::new(pool.clone()));
    let decisions = Arc::new(SqliteDecisionLogRepository::new(pool.clone()));

    let engine = TuningEngine::new(
        config,
        Arc::new(recent_samples()),
        Arc::new(FailingDevice {
            state: default_state(22.0),
        }),
        Arc::new(BundleForecastSource::new(
            Some(cheap_falling_price(5)),
            Some(falling_weather(5)),
        )),
        AdvisorChain::new(vec![Arc::new(MockAdvisor::holding())]),
        changes.clone(),
        results,
        tests,
        decisions.clone(),
    );

    let report = engine.run_cycle().await.expect("cycle");
    assert!(!report.scheduler_applied);

    // The write never confirmed, so no change exists; the failure shows up
    // as an unapplied log entry.
    assert!(changes.list_unevaluated().await.unwrap().is_empty());
    let log = decisions.list_recent(10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(!log[0].applied);
    assert!(log[0]
        .rejection_reason
        .as_deref()
        .unwrap()
        .contains("device write failed"));
}

#[tokio::test]
async fn test_elapsed_change_is_evaluated_and_test_completed() {
    let now = Utc::now();
    let changed_at = now - Duration::hours(50);
    // 101 hourly samples spanning both windows; COP steps 3.0 -> 3.3 at
    // the change.
    let metrics = BundleMetricSource::new(hourly_samples(
        now - Duration::hours(100),
        101,
        changed_at,
        3.0,
        3.3,
    ));

    let h = harness(
        metrics,
        BundleForecastSource::new(None, None),
        MockAdvisor::holding(),
        Some(default_state(22.0)),
    )
    .await;

    // Seed an applied change with its active planned test.
    let mut change = ParameterChange::new(
        ParameterId::CurveSlope,
        0.4,
        0.5,
        "steeper curve experiment",
        ChangeOrigin::Advisor,
    );
    change.changed_at = changed_at;
    h.changes.create(&change).await.unwrap();

    let mut test = PlannedTest::new(
        ParameterId::CurveSlope,
        0.4,
        0.5,
        "steeper curve experiment",
        0.3,
        0.8,
    );
    test.transition_to(TestStatus::Pending).unwrap();
    test.transition_to(TestStatus::Active).unwrap();
    test.change_id = Some(change.id);
    h.tests.create(&test).await.unwrap();

    let report = h.engine.run_cycle().await.expect("cycle");
    assert_eq!(report.evaluated.len(), 1);

    let result = h
        .results
        .get_by_change(change.id)
        .await
        .unwrap()
        .expect("scored");
    assert!((result.total_score - 58.0).abs() < 0.5, "score {}", result.total_score);
    assert_eq!(result.recommendation, Recommendation::KeepModerate);

    let completed = h.tests.get(test.id).await.unwrap().expect("present");
    assert_eq!(completed.status, TestStatus::Completed);
    assert_eq!(completed.result_id, Some(result.id));

    // Nothing left to evaluate.
    assert!(h.changes.list_unevaluated().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sparse_window_yields_inconclusive_not_score() {
    let now = Utc::now();
    let changed_at = now - Duration::hours(50);
    // Only 5 samples in total: both windows are under the floor.
    let metrics = BundleMetricSource::new(hourly_samples(
        now - Duration::hours(60),
        5,
        changed_at,
        3.0,
        3.3,
    ));

    let h = harness(
        metrics,
        BundleForecastSource::new(None, None),
        MockAdvisor::holding(),
        Some(default_state(22.0)),
    )
    .await;

    let mut change = ParameterChange::new(
        ParameterId::CurveSlope,
        0.4,
        0.5,
        "sparse telemetry",
        ChangeOrigin::Rule,
    );
    change.changed_at = changed_at;
    h.changes.create(&change).await.unwrap();

    let report = h.engine.run_cycle().await.expect("cycle");
    assert_eq!(report.evaluated.len(), 1);
    assert!(!report.evaluated[0].is_conclusive());

    // No score exists, and the change is not retried next cycle.
    assert!(h.results.get_by_change(change.id).await.unwrap().is_none());
    assert!(h.changes.list_unevaluated().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_advisor_candidate_joins_backlog_and_promotes() {
    let advisor = MockAdvisor::new();
    advisor.push_proposal(AdvisorProposal {
        action: ProposalAction::Adjust,
        parameter: Some("curve_slope".to_string()),
        current_value: Some(0.4),
        suggested_value: Some(0.5),
        reasoning: "low delta T suggests a steeper curve".to_string(),
        confidence: 0.85,
        expected_impact: 0.3,
    });

    // Forecasts absent: the scheduler holds, leaving the cycle's single
    // device write to the promoted experiment.
    let h = harness(
        recent_samples(),
        BundleForecastSource::new(None, None),
        advisor,
        Some(default_state(22.0)),
    )
    .await;

    let report = h.engine.run_cycle().await.expect("cycle");
    let promoted = report.promoted_test.expect("promoted");

    let test = h.tests.get(promoted).await.unwrap().expect("present");
    assert_eq!(test.status, TestStatus::Active);
    assert_eq!(test.parameter, ParameterId::CurveSlope);
    let change_id = test.change_id.expect("linked change");

    let change = h.changes.get(change_id).await.unwrap().expect("present");
    assert!((change.new_value - 0.5).abs() < 1e-9);
    assert_eq!(change.origin, ChangeOrigin::Advisor);

    // Device reflects the experiment.
    let state = h.device.read_state().await.unwrap();
    assert!((state.value_of(ParameterId::CurveSlope).unwrap() - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_promotion_refused_while_parameter_in_flight() {
    let advisor = MockAdvisor::new();
    advisor.push_proposal(AdvisorProposal {
        action: ProposalAction::Adjust,
        parameter: Some("curve_slope".to_string()),
        current_value: Some(0.4),
        suggested_value: Some(0.5),
        reasoning: "second slope experiment".to_string(),
        confidence: 0.8,
        expected_impact: 0.3,
    });

    let h = harness(
        recent_samples(),
        BundleForecastSource::new(None, None),
        advisor,
        Some(default_state(22.0)),
    )
    .await;

    // An active slope test with its change still in flight.
    let change = ParameterChange::new(
        ParameterId::CurveSlope,
        0.35,
        0.4,
        "first slope experiment",
        ChangeOrigin::Advisor,
    );
    h.changes.create(&change).await.unwrap();
    let mut active = PlannedTest::new(
        ParameterId::CurveSlope,
        0.35,
        0.4,
        "first slope experiment",
        0.3,
        0.9,
    );
    active.transition_to(TestStatus::Pending).unwrap();
    active.transition_to(TestStatus::Active).unwrap();
    active.change_id = Some(change.id);
    h.tests.create(&active).await.unwrap();

    let report = h.engine.run_cycle().await.expect("cycle");

    // The new candidate is queued but not promoted.
    assert!(report.promoted_test.is_none());
    let proposed = h.tests.list_by_status(TestStatus::Proposed).await.unwrap();
    assert_eq!(proposed.len(), 1);
    assert_eq!(proposed[0].hypothesis, "second slope experiment");

    // The first test is untouched.
    let still_active = h.tests.get(active.id).await.unwrap().unwrap();
    assert_eq!(still_active.status, TestStatus::Active);
}
