use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    StepStarted,
    StepCompleted,
    StepFailed,
    StepSkipped,
    StepCancelled,
    ConfirmationNeeded,
    PlanStarted,
    PlanCompleted,
    PlanError,
    PlanPaused,
    PlanResumed,
    PlanCancelled,
}

/// Milestone emitted by an executor. Never mutated after it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub kind: EventKind,
    pub plan_id: String,
    pub step_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn plan(kind: EventKind, plan_id: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            plan_id: plan_id.to_string(),
            step_id: None,
            message: message.into(),
            data: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn step(kind: EventKind, plan_id: &str, step_id: &str, message: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.to_string()),
            ..Self::plan(kind, plan_id, message)
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}
