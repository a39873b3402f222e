use super::events::ExecutionEvent;
use super::runner::{Approval, ConfirmationRequest, Prepared, StepRunner};
use super::types::{Plan, PlanStatus, StepStatus};
use crate::error::PlanError;
use crate::feedback::FailureFeedbackAnalyzer;
use crate::observability::Observer;
use crate::security::{AutonomousDecisionMaker, GuardrailEngine};
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Where a cooperative run stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionState {
    /// A step needs a decision; call [`PlanExecutor::resume`].
    WaitingConfirmation(ConfirmationRequest),
    Finished(PlanStatus),
}

/// Events emitted by one `start`/`resume` call and where the run stopped.
#[derive(Debug, Clone)]
pub struct Advance {
    pub events: Vec<ExecutionEvent>,
    pub state: ExecutionState,
}

impl Advance {
    pub fn is_finished(&self) -> bool {
        matches!(self.state, ExecutionState::Finished(_))
    }

    pub fn pending_confirmation(&self) -> Option<&ConfirmationRequest> {
        match &self.state {
            ExecutionState::WaitingConfirmation(request) => Some(request),
            ExecutionState::Finished(_) => None,
        }
    }
}

/// Synchronous executor that suspends at confirmation points.
///
/// No state is kept between calls: the plan's cursor and step statuses are
/// the whole story, so a plan restored from a snapshot resumes the same way.
pub struct PlanExecutor {
    registry: Arc<ToolRegistry>,
    runner: StepRunner,
}

impl PlanExecutor {
    pub fn new(registry: Arc<ToolRegistry>, guardrails: Arc<GuardrailEngine>) -> Self {
        Self {
            registry,
            runner: StepRunner::new(guardrails),
        }
    }

    #[must_use]
    pub fn with_feedback(mut self, feedback: Arc<FailureFeedbackAnalyzer>) -> Self {
        self.runner.set_feedback(feedback);
        self
    }

    #[must_use]
    pub fn with_autonomy(
        mut self,
        autonomy: Arc<AutonomousDecisionMaker>,
        context_confidence: f64,
    ) -> Self {
        self.runner.set_autonomy(autonomy, context_confidence);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.runner.set_observer(observer);
        self
    }

    /// Validate and run until the first confirmation point or the end of the
    /// plan.
    pub fn start(&self, plan: &mut Plan) -> Result<Advance, PlanError> {
        let mut events = Vec::new();
        self.runner.begin(plan, &self.registry, &mut events)?;
        self.drive(plan, events)
    }

    /// Continue a plan suspended at a confirmation point. `None` counts as a
    /// rejection.
    pub fn resume(&self, plan: &mut Plan, decision: Option<bool>) -> Result<Advance, PlanError> {
        let index = plan.current_step;
        let waiting = plan.status == PlanStatus::Executing
            && plan
                .steps
                .get(index)
                .is_some_and(|s| s.status == StepStatus::WaitingConfirmation);
        if !waiting {
            return Err(PlanError::NotWaiting {
                plan_id: plan.id.clone(),
            });
        }

        let mut events = Vec::new();
        if let Some(approval) =
            self.runner
                .resolve_confirmation(plan, index, decision.unwrap_or(false), &mut events)?
        {
            self.run_tool(plan, index, approval, &mut events)?;
        }
        plan.current_step += 1;
        self.drive(plan, events)
    }

    /// The confirmation a suspended plan is waiting on, if any.
    pub fn pending_confirmation(&self, plan: &Plan) -> Option<ConfirmationRequest> {
        if plan.status != PlanStatus::Executing {
            return None;
        }
        self.runner.pending_request(plan)
    }

    fn drive(&self, plan: &mut Plan, mut events: Vec<ExecutionEvent>) -> Result<Advance, PlanError> {
        while plan.current_step < plan.steps.len() {
            let index = plan.current_step;
            match self.runner.prepare(plan, index, &mut events)? {
                Prepared::Settled => {}
                Prepared::Confirm(request) => {
                    return Ok(Advance {
                        events,
                        state: ExecutionState::WaitingConfirmation(request),
                    });
                }
                Prepared::Run(approval) => self.run_tool(plan, index, approval, &mut events)?,
            }
            plan.current_step += 1;
        }

        let status = self.runner.finish(plan, &mut events)?;
        Ok(Advance {
            events,
            state: ExecutionState::Finished(status),
        })
    }

    fn run_tool(
        &self,
        plan: &mut Plan,
        index: usize,
        approval: Approval,
        events: &mut Vec<ExecutionEvent>,
    ) -> Result<(), PlanError> {
        let step = &plan.steps[index];
        let result = self.registry.invoke(&step.action, &step.parameters);
        self.runner.settle(plan, index, result, approval, events)
    }
}
