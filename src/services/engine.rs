//! One full invocation of the tuning engine.
//!
//! The engine is triggered externally, runs every step sequentially, and
//! completes before the next trigger: evaluate what is due, decide, gate,
//! apply, log, refresh the backlog. There is no internal parallelism and
//! no state carried across invocations beyond what persistence holds.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AbTestResult, ChangeOrigin, Config, Decision, DecisionLogEntry, DeviceState,
    EvaluationOutcome, MetricSnapshot, ParameterChange, ParameterId, ParameterSet, PlannedTest,
    TestStatus,
};
use crate::domain::ports::{
    AdvisorContext, ChangeRepository, DecisionLogRepository, DeviceControl, ForecastSource,
    MetricSource, PlannedTestRepository, ResultRepository,
};
use crate::services::ab_evaluator::AbEvaluator;
use crate::services::advisor_chain::AdvisorChain;
use crate::services::prioritizer::TestPrioritizer;
use crate::services::safety_validator::{SafetyValidator, Verdict};
use crate::services::scheduler::{PredictiveScheduler, ShortHorizonFeedback};

/// What one invocation did, for operator output.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Evaluations finished this cycle.
    pub evaluated: Vec<EvaluationOutcome>,
    /// The scheduler's decision, if one was produced.
    pub scheduler_decision: Option<Decision>,
    /// Whether the scheduler's decision was applied to the device.
    pub scheduler_applied: bool,
    /// Planned test promoted and applied this cycle, if any.
    pub promoted_test: Option<Uuid>,
    /// Backlog after reprioritization, in execution order.
    pub backlog: Vec<PlannedTest>,
}

/// Wires the core services to their collaborators and runs cycles.
pub struct TuningEngine {
    config: Config,
    parameters: ParameterSet,
    metrics: Arc<dyn MetricSource>,
    device: Arc<dyn DeviceControl>,
    forecasts: Arc<dyn ForecastSource>,
    advisors: AdvisorChain,
    changes: Arc<dyn ChangeRepository>,
    results: Arc<dyn ResultRepository>,
    tests: Arc<dyn PlannedTestRepository>,
    decisions: Arc<dyn DecisionLogRepository>,
    validator: SafetyValidator,
    evaluator: AbEvaluator,
    scheduler: PredictiveScheduler,
    prioritizer: TestPrioritizer,
}

impl TuningEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        metrics: Arc<dyn MetricSource>,
        device: Arc<dyn DeviceControl>,
        forecasts: Arc<dyn ForecastSource>,
        advisors: AdvisorChain,
        changes: Arc<dyn ChangeRepository>,
        results: Arc<dyn ResultRepository>,
        tests: Arc<dyn PlannedTestRepository>,
        decisions: Arc<dyn DecisionLogRepository>,
    ) -> Self {
        let parameters = config.parameter_set();
        let validator = SafetyValidator::new(config.safety.clone());
        let evaluator = AbEvaluator::new(config.evaluation.clone());
        let scheduler = PredictiveScheduler::new(config.scheduler.clone());
        let prioritizer = TestPrioritizer::new(config.prioritizer.clone());
        Self {
            config,
            parameters,
            metrics,
            device,
            forecasts,
            advisors,
            changes,
            results,
            tests,
            decisions,
            validator,
            evaluator,
            scheduler,
            prioritizer,
        }
    }

    /// Run one full invocation cycle.
    pub async fn run_cycle(&self) -> DomainResult<CycleReport> {
        let mut report = CycleReport::default();

        // Device state is read fresh every cycle, never cached across
        // invocations.
        let state = self.device.read_state().await?;
        info!(indoor = state.indoor_temp, "cycle started");

        report.evaluated = self.evaluate_due_changes().await?;

        let feedback = self.short_horizon_feedback().await;
        self.scheduler_step(&state, feedback, &mut report).await?;

        // A metric-source hiccup costs this cycle's backlog refresh, not
        // the cycle.
        match self.recent_metrics().await {
            Ok(recent_metrics) => {
                self.refresh_backlog(&state, &recent_metrics, &mut report)
                    .await?;
            }
            Err(err) => {
                warn!(error = %err, "metric aggregation failed; backlog refresh skipped");
            }
        }
        self.promote_next_test(&state, &mut report).await?;

        info!(
            evaluated = report.evaluated.len(),
            scheduler_applied = report.scheduler_applied,
            backlog = report.backlog.len(),
            "cycle finished"
        );
        Ok(report)
    }

    /// Evaluate every change whose after-window has elapsed.
    async fn evaluate_due_changes(&self) -> DomainResult<Vec<EvaluationOutcome>> {
        let mut outcomes = Vec::new();
        for change in self.changes.list_unevaluated().await? {
            if Utc::now() < self.evaluator.ready_at(&change) {
                continue;
            }
            let outcome = match self.evaluator.evaluate(self.metrics.as_ref(), &change).await {
                Ok(outcome) => outcome,
                Err(DomainError::EvaluationWindowOpen { .. }) => continue,
                Err(err) => {
                    // A metric source hiccup is not fatal to the cycle;
                    // the change stays queued for the next attempt.
                    warn!(change_id = %change.id, error = %err, "evaluation failed");
                    continue;
                }
            };

            match &outcome {
                EvaluationOutcome::Completed(result) => {
                    self.results.create(result).await?;
                    self.complete_linked_test(&change, result).await?;
                }
                EvaluationOutcome::Inconclusive { reason, .. } => {
                    self.results.mark_inconclusive(change.id, reason).await?;
                    self.cancel_linked_test(&change, reason).await?;
                }
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn complete_linked_test(
        &self,
        change: &ParameterChange,
        result: &AbTestResult,
    ) -> DomainResult<()> {
        if let Some(mut test) = self.tests.get_by_change(change.id).await? {
            test.transition_to(TestStatus::Completed).map_err(|reason| {
                DomainError::InvalidStateTransition {
                    from: test.status.as_str().to_string(),
                    to: TestStatus::Completed.as_str().to_string(),
                    reason,
                }
            })?;
            test.result_id = Some(result.id);
            self.tests.update(&test).await?;
        }
        Ok(())
    }

    async fn cancel_linked_test(
        &self,
        change: &ParameterChange,
        reason: &str,
    ) -> DomainResult<()> {
        if let Some(mut test) = self.tests.get_by_change(change.id).await? {
            if test.transition_to(TestStatus::Cancelled).is_ok() {
                self.tests.update(&test).await?;
                warn!(test_id = %test.id, %reason, "test cancelled after inconclusive evaluation");
            }
        }
        Ok(())
    }

    /// Aggregate the short context window used by the prioritizer and the
    /// advisor context.
    async fn recent_metrics(&self) -> DomainResult<MetricSnapshot> {
        let end = Utc::now();
        let start = end - Duration::hours(i64::from(self.config.evaluation.short_window_hours));
        self.metrics.aggregate(start, end).await
    }

    /// Short-horizon feedback around the most recent applied change: a
    /// fast, low-confidence signal that biases the next proposal and never
    /// triggers a revert.
    async fn short_horizon_feedback(&self) -> ShortHorizonFeedback {
        let short = i64::from(self.config.evaluation.short_window_hours);
        let latest = match self
            .changes
            .latest_for_parameter(ParameterId::CurveOffset)
            .await
        {
            Ok(Some(change)) => change,
            Ok(None) => return ShortHorizonFeedback::default(),
            Err(err) => {
                debug!(error = %err, "no feedback context available");
                return ShortHorizonFeedback::default();
            }
        };

        if Utc::now() < latest.changed_at + Duration::hours(short) {
            return ShortHorizonFeedback::default();
        }

        let before = self
            .metrics
            .aggregate(latest.changed_at - Duration::hours(short), latest.changed_at)
            .await;
        let after = self
            .metrics
            .aggregate(latest.changed_at, latest.changed_at + Duration::hours(short))
            .await;
        match (before, after) {
            (Ok(before), Ok(after)) => ShortHorizonFeedback {
                cop_change_pct: after.cop_change_pct(&before),
            },
            _ => ShortHorizonFeedback::default(),
        }
    }

    /// Run the predictive scheduler and gate its decision.
    async fn scheduler_step(
        &self,
        state: &DeviceState,
        feedback: ShortHorizonFeedback,
        report: &mut CycleReport,
    ) -> DomainResult<()> {
        let decision = self
            .scheduler
            .decide(self.forecasts.as_ref(), state, feedback)
            .await?;

        if decision.is_hold() {
            self.decisions
                .append(&DecisionLogEntry::not_applied(&decision, ChangeOrigin::Rule))
                .await?;
            report.scheduler_decision = Some(decision);
            return Ok(());
        }

        let applied = self
            .gate_and_apply(&decision, ChangeOrigin::Rule, state)
            .await?;
        report.scheduler_applied = applied.is_some();
        report.scheduler_decision = Some(decision);
        Ok(())
    }

    /// Validate a decision, log it whatever the verdict, and apply it to
    /// the device only on acceptance. Returns the recorded change when the
    /// write confirmed.
    async fn gate_and_apply(
        &self,
        decision: &Decision,
        origin: ChangeOrigin,
        state: &DeviceState,
    ) -> DomainResult<Option<ParameterChange>> {
        let Decision::Adjust {
            parameter,
            suggested_value,
            reasoning,
            ..
        } = decision
        else {
            return Ok(None);
        };

        let last_change = self.changes.latest_for_parameter(*parameter).await?;
        let verdict =
            self.validator
                .validate(decision, &self.parameters, state, last_change.as_ref());

        match verdict {
            Verdict::Rejected(reason) => {
                // Rejections are data: exactly one log entry, applied=false.
                info!(%parameter, %reason, "decision rejected by safety validator");
                self.decisions
                    .append(&DecisionLogEntry::rejected(decision, origin, reason))
                    .await?;
                Ok(None)
            }
            Verdict::Accepted => {
                let current = state.value_of(*parameter).unwrap_or_default();
                match self.device.apply(*parameter, *suggested_value).await {
                    Ok(()) => {
                        let change = ParameterChange::new(
                            *parameter,
                            current,
                            *suggested_value,
                            reasoning.clone(),
                            origin,
                        );
                        self.changes.create(&change).await?;
                        self.decisions
                            .append(&DecisionLogEntry::applied(decision, origin, change.id))
                            .await?;
                        info!(%parameter, value = *suggested_value, "change applied");
                        Ok(Some(change))
                    }
                    Err(err) => {
                        // No partial state: an unconfirmed write is never
                        // recorded as an applied change.
                        warn!(%parameter, error = %err, "device write failed");
                        self.decisions
                            .append(&DecisionLogEntry::rejected(
                                decision,
                                origin,
                                format!("device write failed: {err}"),
                            ))
                            .await?;
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Ask the advisor chain for a candidate and reconcile the backlog.
    async fn refresh_backlog(
        &self,
        state: &DeviceState,
        recent_metrics: &MetricSnapshot,
        report: &mut CycleReport,
    ) -> DomainResult<()> {
        let lookback = Duration::hours(i64::from(self.config.prioritizer.history_lookback_hours));
        let since = Utc::now() - lookback;
        let history = self.decisions.list_since(since).await?;
        let evaluated = self.evaluated_since(since).await?;

        let context = AdvisorContext {
            metrics: recent_metrics,
            state,
            parameters: &self.parameters,
            history: &history,
            evaluated: &evaluated,
        };

        let mut backlog = self.tests.list_by_status(TestStatus::Proposed).await?;

        match self.advisors.propose(&context, &self.parameters).await {
            Ok((provider, proposal)) => {
                let origin = if provider == "heuristic" {
                    ChangeOrigin::Rule
                } else {
                    ChangeOrigin::Advisor
                };
                if let Some(test) =
                    self.prioritizer
                        .admit(&proposal, origin, &self.parameters, &evaluated)
                {
                    let duplicate = backlog.iter().any(|existing| {
                        existing.parameter == test.parameter
                            && (existing.proposed_value - test.proposed_value).abs() < f64::EPSILON
                    });
                    if duplicate {
                        debug!(parameter = %test.parameter, "duplicate candidate ignored");
                    } else {
                        self.tests.create(&test).await?;
                        backlog.push(test);
                    }
                }
            }
            Err(DomainError::AdvisorsExhausted { attempts }) => {
                warn!(attempts, "no advisor produced a usable proposal this cycle");
            }
            Err(err) => return Err(err),
        }

        let ordered = self.prioritizer.reprioritize(backlog, &self.parameters);
        for test in &ordered {
            self.tests.update(test).await?;
        }
        report.backlog = ordered;
        Ok(())
    }

    /// Recently evaluated changes joined with their results, for the
    /// repeat-penalty check and advisor context.
    async fn evaluated_since(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> DomainResult<Vec<(ParameterChange, AbTestResult)>> {
        let mut evaluated = Vec::new();
        for result in self.results.list_since(since).await? {
            if let Some(change) = self.changes.get(result.change_id).await? {
                evaluated.push((change, result));
            }
        }
        Ok(evaluated)
    }

    /// Promote the highest-priority backlog entry whose parameter is free.
    ///
    /// At most one change may be in flight per parameter: an active test
    /// or an unevaluated change both block promotion for that parameter.
    async fn promote_next_test(
        &self,
        state: &DeviceState,
        report: &mut CycleReport,
    ) -> DomainResult<()> {
        // A change this cycle already consumed the device budget; keep
        // experiment application to its own quiet cycles.
        if report.scheduler_applied {
            return Ok(());
        }

        let unevaluated = self.changes.list_unevaluated().await?;

        // Pending tests (promoted earlier but not yet applied) come before
        // fresh backlog entries.
        let mut candidates = self.tests.list_by_status(TestStatus::Pending).await?;
        candidates.extend(report.backlog.clone());

        for candidate in candidates {
            let in_flight = self
                .tests
                .in_flight_for_parameter(candidate.parameter)
                .await?;
            if in_flight.is_some_and(|other| other.id != candidate.id) {
                debug!(
                    parameter = %candidate.parameter,
                    "promotion refused: a test is already in flight for this parameter"
                );
                continue;
            }
            if unevaluated.iter().any(|c| c.parameter == candidate.parameter) {
                debug!(
                    parameter = %candidate.parameter,
                    "promotion refused: an unevaluated change is in flight"
                );
                continue;
            }

            return self.promote(candidate, state, report).await;
        }
        Ok(())
    }

    async fn promote(
        &self,
        mut test: PlannedTest,
        state: &DeviceState,
        report: &mut CycleReport,
    ) -> DomainResult<()> {
        if test.status == TestStatus::Proposed {
            test.transition_to(TestStatus::Pending).map_err(|reason| {
                DomainError::InvalidStateTransition {
                    from: test.status.as_str().to_string(),
                    to: TestStatus::Pending.as_str().to_string(),
                    reason,
                }
            })?;
            self.tests.update(&test).await?;
        }

        // Baseline capture at promotion verifies the metric source can
        // cover the before-window; the evaluator re-aggregates the same
        // window at scoring time.
        let probe_change = ParameterChange::new(
            test.parameter,
            test.current_value,
            test.proposed_value,
            test.hypothesis.clone(),
            test.origin,
        );
        let baseline = match self
            .evaluator
            .capture_baseline(self.metrics.as_ref(), &probe_change)
            .await
        {
            Ok(baseline) => baseline,
            Err(err) => {
                // Leave the test pending; the next cycle retries capture.
                warn!(test_id = %test.id, error = %err, "baseline capture failed");
                return Ok(());
            }
        };
        debug!(
            test_id = %test.id,
            samples = baseline.sample_count,
            "baseline captured"
        );

        let current = state
            .value_of(test.parameter)
            .unwrap_or(test.current_value);
        let decision = Decision::Adjust {
            parameter: test.parameter,
            current_value: current,
            suggested_value: test.proposed_value,
            confidence: test.confidence,
            reasoning: test.hypothesis.clone(),
        };

        match self.gate_and_apply(&decision, test.origin, state).await? {
            Some(change) => {
                test.transition_to(TestStatus::Active).map_err(|reason| {
                    DomainError::InvalidStateTransition {
                        from: test.status.as_str().to_string(),
                        to: TestStatus::Active.as_str().to_string(),
                        reason,
                    }
                })?;
                test.change_id = Some(change.id);
                self.tests.update(&test).await?;
                report.promoted_test = Some(test.id);
                info!(test_id = %test.id, "planned test active");
            }
            None => {
                // The hard check wins over the soft check: a candidate the
                // validator or device refused is withdrawn, not retried
                // forever. The decision log already carries the reason.
                if test.transition_to(TestStatus::Cancelled).is_ok() {
                    self.tests.update(&test).await?;
                }
                info!(test_id = %test.id, "planned test withdrawn without application");
            }
        }
        Ok(())
    }
}
