use super::events::{EventKind, ExecutionEvent};
use super::types::{Plan, PlanStatus, StepStatus};
use crate::error::PlanError;
use crate::feedback::FailureFeedbackAnalyzer;
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use crate::security::{
    AutonomousDecisionMaker, AutonomyContext, CheckContext, ConfirmationKind, GuardrailEngine,
    RiskLevel, confirmation_prompt,
};
use crate::tools::ToolOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Plan metadata key that overrides the context confidence fed to autonomy.
pub const CONTEXT_CONFIDENCE_KEY: &str = "context_confidence";

/// What a suspended step is waiting on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub plan_id: String,
    pub step_id: String,
    pub action: String,
    pub prompt: String,
    pub confirmation_type: ConfirmationKind,
    pub risk_level: RiskLevel,
}

/// Who allowed a step to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    NotRequired,
    Automatic,
    User,
}

/// Result of getting a step ready to run.
#[derive(Debug)]
pub enum Prepared {
    /// The step reached a terminal state without running its tool.
    Settled,
    Confirm(ConfirmationRequest),
    Run(Approval),
}

/// Step semantics shared by both executors.
///
/// Everything here mutates the plan in place and appends to `events`; the
/// executors decide when the tool runs and how events leave the process.
#[derive(Clone)]
pub struct StepRunner {
    guardrails: Arc<GuardrailEngine>,
    feedback: Option<Arc<FailureFeedbackAnalyzer>>,
    autonomy: Option<Arc<AutonomousDecisionMaker>>,
    observer: Arc<dyn Observer>,
    context_confidence: f64,
}

impl StepRunner {
    pub fn new(guardrails: Arc<GuardrailEngine>) -> Self {
        Self {
            guardrails,
            feedback: None,
            autonomy: None,
            observer: Arc::new(NoopObserver),
            context_confidence: 0.5,
        }
    }

    pub fn set_feedback(&mut self, feedback: Arc<FailureFeedbackAnalyzer>) {
        self.feedback = Some(feedback);
    }

    pub fn set_autonomy(&mut self, autonomy: Arc<AutonomousDecisionMaker>, context_confidence: f64) {
        self.autonomy = Some(autonomy);
        self.context_confidence = context_confidence;
    }

    pub fn set_observer(&mut self, observer: Arc<dyn Observer>) {
        self.observer = observer;
    }

    /// Validate a draft or ready plan and move it to `Executing`.
    pub fn begin(
        &self,
        plan: &mut Plan,
        registry: &crate::tools::ToolRegistry,
        events: &mut Vec<ExecutionEvent>,
    ) -> Result<(), PlanError> {
        if matches!(plan.status, PlanStatus::Draft | PlanStatus::Ready) {
            plan.validate(registry)?;
        }
        if plan.status != PlanStatus::Ready {
            return Err(PlanError::NotStartable {
                plan_id: plan.id.clone(),
                status: plan.status.to_string(),
            });
        }
        plan.transition(PlanStatus::Executing)?;
        plan.current_step = 0;
        info!(plan_id = %plan.id, steps = plan.steps.len(), "plan started");
        events.push(
            ExecutionEvent::plan(EventKind::PlanStarted, &plan.id, format!("Executing: {}", plan.goal))
                .with_data("total_steps", plan.steps.len()),
        );
        Ok(())
    }

    /// Dependency check, guardrail, and the confirmation decision for step `index`.
    pub fn prepare(
        &self,
        plan: &mut Plan,
        index: usize,
        events: &mut Vec<ExecutionEvent>,
    ) -> Result<Prepared, PlanError> {
        let plan_id = plan.id.clone();
        let context_confidence = plan
            .metadata
            .get(CONTEXT_CONFIDENCE_KEY)
            .and_then(Value::as_f64)
            .unwrap_or(self.context_confidence);

        if let Some(dep) = plan.unmet_dependency(index).map(str::to_string) {
            let step = &mut plan.steps[index];
            step.skip(format!("dependency '{dep}' did not complete"))?;
            debug!(plan_id = %plan_id, step_id = %step.id, dependency = %dep, "step skipped");
            events.push(
                ExecutionEvent::step(
                    EventKind::StepSkipped,
                    &plan_id,
                    &step.id,
                    format!("Skipped '{}': dependency '{dep}' did not complete", step.description),
                )
                .with_data("dependency", dep),
            );
            return Ok(Prepared::Settled);
        }

        let step = &mut plan.steps[index];
        step.start()?;
        events.push(
            ExecutionEvent::step(EventKind::StepStarted, &plan_id, &step.id, &step.description)
                .with_data("action", step.action.as_str()),
        );

        let check = self
            .guardrails
            .check_action(&step.action, &step.parameters, &CheckContext::default());

        if !check.is_safe {
            let reason = check
                .blocked_reason
                .clone()
                .unwrap_or_else(|| format!("action '{}' was blocked", step.action));
            warn!(plan_id = %plan_id, step_id = %step.id, action = %step.action, %reason, "step blocked");
            step.fail(&reason, None)?;
            self.observer.record_event(&ObserverEvent::GuardrailBlocked {
                action: step.action.clone(),
                risk: check.risk_level,
                reason: reason.clone(),
            });
            self.observe_step(&plan_id, index, plan);
            let step = &plan.steps[index];
            events.push(
                ExecutionEvent::step(EventKind::StepFailed, &plan_id, &step.id, format!("Blocked: {reason}"))
                    .with_data("error", reason)
                    .with_data("blocked", true)
                    .with_data("risk_level", check.risk_level.to_string()),
            );
            return Ok(Prepared::Settled);
        }

        if !check.requires_confirmation && !step.requires_confirmation {
            return Ok(Prepared::Run(Approval::NotRequired));
        }

        // Autonomy may waive a guardrail demand, never the step's own flag.
        if !step.requires_confirmation
            && let Some(autonomy) = &self.autonomy
        {
            let decision = autonomy.decide_autonomy(
                &step.action,
                &step.parameters,
                check.risk_level,
                &AutonomyContext::new(context_confidence),
            );
            debug!(
                plan_id = %plan_id,
                step_id = %step.id,
                auto = decision.should_auto_execute,
                reasoning = %decision.reasoning,
                "autonomy consulted"
            );
            if decision.should_auto_execute {
                self.observer.record_event(&ObserverEvent::ConfirmationDecision {
                    plan_id: plan_id.clone(),
                    step_id: step.id.clone(),
                    action: step.action.clone(),
                    approved: true,
                    automatic: true,
                });
                return Ok(Prepared::Run(Approval::Automatic));
            }
        }

        let kind = check.confirmation_type.unwrap_or(ConfirmationKind::Simple);
        let prompt = confirmation_prompt(&step.action, &step.description, &step.parameters, kind);
        step.transition(StepStatus::WaitingConfirmation)?;
        events.push(
            ExecutionEvent::step(EventKind::ConfirmationNeeded, &plan_id, &step.id, prompt.as_str())
                .with_data("confirmation_type", kind.to_string())
                .with_data("risk_level", check.risk_level.to_string())
                .with_data("action", step.action.as_str()),
        );
        Ok(Prepared::Confirm(ConfirmationRequest {
            plan_id,
            step_id: step.id.clone(),
            action: step.action.clone(),
            prompt,
            confirmation_type: kind,
            risk_level: check.risk_level,
        }))
    }

    /// Rebuild the request for the step the plan is suspended on, for a plan
    /// that was restored from a snapshot.
    pub fn pending_request(&self, plan: &Plan) -> Option<ConfirmationRequest> {
        let step = plan
            .steps
            .get(plan.current_step)
            .filter(|s| s.status == StepStatus::WaitingConfirmation)?;
        let kind = self
            .guardrails
            .required_confirmation(&step.action)
            .unwrap_or(ConfirmationKind::Simple);
        Some(ConfirmationRequest {
            plan_id: plan.id.clone(),
            step_id: step.id.clone(),
            action: step.action.clone(),
            prompt: confirmation_prompt(&step.action, &step.description, &step.parameters, kind),
            confirmation_type: kind,
            risk_level: self.guardrails.classify_risk(&step.action),
        })
    }

    /// Apply a confirmation decision to a waiting step. `None` when rejected.
    pub fn resolve_confirmation(
        &self,
        plan: &mut Plan,
        index: usize,
        approved: bool,
        events: &mut Vec<ExecutionEvent>,
    ) -> Result<Option<Approval>, PlanError> {
        let plan_id = plan.id.clone();
        let step = &mut plan.steps[index];
        self.observer.record_event(&ObserverEvent::ConfirmationDecision {
            plan_id: plan_id.clone(),
            step_id: step.id.clone(),
            action: step.action.clone(),
            approved,
            automatic: false,
        });

        if approved {
            step.transition(StepStatus::Running)?;
            info!(plan_id = %plan_id, step_id = %step.id, "confirmation approved");
            return Ok(Some(Approval::User));
        }

        step.cancel("confirmation rejected by user")?;
        info!(plan_id = %plan_id, step_id = %step.id, "confirmation rejected");
        if let Some(autonomy) = &self.autonomy {
            autonomy.record_execution(&step.action, false, false, true, None);
        }
        events.push(ExecutionEvent::step(
            EventKind::StepCancelled,
            &plan_id,
            &step.id,
            format!("Cancelled '{}': confirmation rejected", step.description),
        ));
        self.observe_step(&plan_id, index, plan);
        Ok(None)
    }

    /// Record a tool result on the step. Failures reach the feedback analyzer
    /// before their event is queued.
    pub fn settle(
        &self,
        plan: &mut Plan,
        index: usize,
        result: anyhow::Result<ToolOutcome>,
        approval: Approval,
        events: &mut Vec<ExecutionEvent>,
    ) -> Result<(), PlanError> {
        let plan_id = plan.id.clone();
        let goal = plan.goal.clone();
        let outcome = result.unwrap_or_else(|e| ToolOutcome::failure(format!("{e:#}")));
        let step = &mut plan.steps[index];

        let failure = if outcome.success {
            let data = outcome.data.clone();
            step.complete(outcome)?;
            events.push(
                ExecutionEvent::step(EventKind::StepCompleted, &plan_id, &step.id, format!("Completed: {}", step.description))
                    .with_data("result", data),
            );
            None
        } else {
            let error = outcome.error_text();
            if let Some(feedback) = &self.feedback {
                let context = BTreeMap::from([
                    ("plan_id".to_string(), json!(plan_id)),
                    ("step_id".to_string(), json!(step.id)),
                    ("goal".to_string(), json!(goal)),
                ]);
                feedback.record_failure(step, &outcome, context);
            }
            warn!(plan_id = %plan_id, step_id = %step.id, action = %step.action, %error, "step failed");
            step.fail(&error, Some(outcome))?;
            events.push(
                ExecutionEvent::step(EventKind::StepFailed, &plan_id, &step.id, format!("Failed: {error}"))
                    .with_data("error", error.as_str()),
            );
            Some(error)
        };

        if let Some(autonomy) = &self.autonomy {
            autonomy.record_execution(
                &step.action,
                failure.is_none(),
                approval == Approval::User,
                false,
                failure.as_deref(),
            );
        }
        self.observe_step(&plan_id, index, plan);
        Ok(())
    }

    /// Drop the step at `index` because the run was cancelled under it.
    pub fn discard(
        &self,
        plan: &mut Plan,
        index: usize,
        reason: &str,
        events: &mut Vec<ExecutionEvent>,
    ) -> Result<(), PlanError> {
        let plan_id = plan.id.clone();
        let step = &mut plan.steps[index];
        step.cancel(reason)?;
        events.push(ExecutionEvent::step(EventKind::StepCancelled, &plan_id, &step.id, reason));
        self.observe_step(&plan_id, index, plan);
        Ok(())
    }

    /// Settle the plan once every step has been visited.
    pub fn finish(&self, plan: &mut Plan, events: &mut Vec<ExecutionEvent>) -> Result<PlanStatus, PlanError> {
        let status = plan.settled_status();
        plan.transition(status)?;
        let completed = plan.count_with_status(StepStatus::Completed);
        info!(plan_id = %plan.id, %status, completed, total = plan.steps.len(), "plan finished");
        events.push(
            ExecutionEvent::plan(
                EventKind::PlanCompleted,
                &plan.id,
                format!("Plan {status}: {completed}/{} steps completed", plan.steps.len()),
            )
            .with_data("status", status.to_string())
            .with_data("completed", completed)
            .with_data("failed", plan.count_with_status(StepStatus::Failed))
            .with_data("skipped", plan.count_with_status(StepStatus::Skipped))
            .with_data("cancelled", plan.count_with_status(StepStatus::Cancelled)),
        );
        self.observe_plan(plan);
        Ok(status)
    }

    /// Abort the plan. Steps that never started stay `Pending`.
    pub fn abort(&self, plan: &mut Plan, events: &mut Vec<ExecutionEvent>) -> Result<PlanStatus, PlanError> {
        plan.transition(PlanStatus::Cancelled)?;
        info!(plan_id = %plan.id, at_step = plan.current_step, "plan cancelled");
        events.push(ExecutionEvent::plan(
            EventKind::PlanCancelled,
            &plan.id,
            "Plan cancelled",
        ));
        self.observe_plan(plan);
        Ok(PlanStatus::Cancelled)
    }

    fn observe_step(&self, plan_id: &str, index: usize, plan: &Plan) {
        let step = &plan.steps[index];
        let duration = elapsed(step.started_at, step.completed_at);
        self.observer.record_event(&ObserverEvent::StepOutcome {
            plan_id: plan_id.to_string(),
            step_id: step.id.clone(),
            action: step.action.clone(),
            status: step.status,
            duration,
        });
        self.observer.record_metric(&ObserverMetric::StepLatency(duration));
    }

    fn observe_plan(&self, plan: &Plan) {
        let duration = elapsed(plan.started_at, plan.completed_at);
        self.observer.record_event(&ObserverEvent::PlanFinished {
            plan_id: plan.id.clone(),
            status: plan.status,
            duration,
        });
        self.observer.record_metric(&ObserverMetric::PlanLatency(duration));
    }
}

fn elapsed(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Duration {
    match (start, end) {
        (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
        _ => Duration::ZERO,
    }
}
