use crate::planner::{PlanStatus, StepStatus};
use crate::security::RiskLevel;
use std::time::Duration;

/// Events the observer can record
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    StepOutcome {
        plan_id: String,
        step_id: String,
        action: String,
        status: StepStatus,
        duration: Duration,
    },
    ConfirmationDecision {
        plan_id: String,
        step_id: String,
        action: String,
        approved: bool,
        /// Decided by the autonomy model rather than a person.
        automatic: bool,
    },
    PlanFinished {
        plan_id: String,
        status: PlanStatus,
        duration: Duration,
    },
    GuardrailBlocked {
        action: String,
        risk: RiskLevel,
        reason: String,
    },
}

/// Numeric metrics
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    StepLatency(Duration),
    PlanLatency(Duration),
}

/// Sink for executor telemetry.
pub trait Observer: Send + Sync {
    /// Record a discrete event
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush buffered data. Most backends have nothing to do.
    fn flush(&self) {}

    fn name(&self) -> &str;
}
