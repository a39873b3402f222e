use super::traits::{Observer, ObserverEvent, ObserverMetric};
use std::time::Duration;
use tracing::info;

/// Log-based observer, reports through `tracing`
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(d: &Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::StepOutcome {
                plan_id,
                step_id,
                action,
                status,
                duration,
            } => {
                info!(
                    plan_id = %plan_id,
                    step_id = %step_id,
                    action = %action,
                    status = %status,
                    duration_ms = millis(duration),
                    "step.outcome"
                );
            }
            ObserverEvent::ConfirmationDecision {
                plan_id,
                step_id,
                action,
                approved,
                automatic,
            } => {
                info!(
                    plan_id = %plan_id,
                    step_id = %step_id,
                    action = %action,
                    approved = approved,
                    automatic = automatic,
                    "step.confirmation"
                );
            }
            ObserverEvent::PlanFinished {
                plan_id,
                status,
                duration,
            } => {
                info!(plan_id = %plan_id, status = %status, duration_ms = millis(duration), "plan.finished");
            }
            ObserverEvent::GuardrailBlocked {
                action,
                risk,
                reason,
            } => {
                info!(action = %action, risk = %risk, reason = %reason, "guardrail.blocked");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::StepLatency(d) => {
                info!(latency_ms = millis(d), "metric.step_latency");
            }
            ObserverMetric::PlanLatency(d) => {
                info!(latency_ms = millis(d), "metric.plan_latency");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
