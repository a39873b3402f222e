use crate::error::PlanError;
use crate::tools::{ToolOutcome, ToolParams, ToolRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    WaitingConfirmation,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Legal edges of the step state machine.
    ///
    /// `Running -> Cancelled` exists for results discarded after a
    /// cancellation arrived while the tool call was in flight.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (
                    Self::Running,
                    Self::Completed | Self::Failed | Self::WaitingConfirmation | Self::Cancelled
                )
                | (Self::WaitingConfirmation, Self::Running | Self::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Ready,
    Executing,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Ready)
                | (Self::Ready, Self::Executing | Self::Cancelled)
                | (
                    Self::Executing,
                    Self::Paused | Self::Completed | Self::Failed | Self::Cancelled
                )
                | (Self::Paused, Self::Executing | Self::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub action: String,
    pub description: String,
    #[serde(default)]
    pub parameters: ToolParams,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub requires_confirmation: bool,
    pub status: StepStatus,
    #[serde(default)]
    pub outcome: Option<ToolOutcome>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlanStep {
    pub fn new(
        id: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            description: description.into(),
            parameters: ToolParams::new(),
            depends_on: Vec::new(),
            requires_confirmation: false,
            status: StepStatus::Pending,
            outcome: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: ToolParams) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on = ids.iter().map(ToString::to_string).collect();
        self
    }

    pub fn confirm_first(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    /// Move along one edge of the state machine, stamping timestamps.
    pub fn transition(&mut self, next: StepStatus) -> Result<(), PlanError> {
        if !self.status.can_transition_to(next) {
            return Err(PlanError::InvalidTransition {
                step_id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == StepStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), PlanError> {
        self.transition(StepStatus::Running)
    }

    pub fn complete(&mut self, outcome: ToolOutcome) -> Result<(), PlanError> {
        self.transition(StepStatus::Completed)?;
        self.outcome = Some(outcome);
        self.error = None;
        Ok(())
    }

    pub fn fail(
        &mut self,
        error: impl Into<String>,
        outcome: Option<ToolOutcome>,
    ) -> Result<(), PlanError> {
        self.transition(StepStatus::Failed)?;
        self.error = Some(error.into());
        self.outcome = outcome;
        Ok(())
    }

    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), PlanError> {
        self.transition(StepStatus::Skipped)?;
        self.error = Some(reason.into());
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), PlanError> {
        self.transition(StepStatus::Cancelled)?;
        self.error = Some(reason.into());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    /// Index of the step the executor is on.
    #[serde(default)]
    pub current_step: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Plan {
    /// Build a draft plan with a fresh id.
    pub fn new(goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), goal, steps)
    }

    pub fn with_id(id: impl Into<String>, goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            steps,
            status: PlanStatus::Draft,
            current_step: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Structural problems: empty or duplicate ids, dependencies that name no
    /// step of this plan, self-dependencies.
    pub fn structural_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                errors.push(format!("step with action '{}' has an empty id", step.action));
            } else if !seen.insert(step.id.as_str()) {
                errors.push(format!("duplicate step id '{}'", step.id));
            }
        }

        let ids: BTreeSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();
        for step in &self.steps {
            for dep in &step.depends_on {
                if dep == &step.id {
                    errors.push(format!("step '{}' depends on itself", step.id));
                } else if !ids.contains(dep.as_str()) {
                    errors.push(format!("step '{}': unknown dependency '{dep}'", step.id));
                }
            }
        }
        errors
    }

    /// Structural checks plus tool existence and required parameters.
    /// All problems are collected before anything is reported.
    pub fn validation_errors(&self, registry: &ToolRegistry) -> Vec<String> {
        let mut errors = self.structural_errors();
        for step in &self.steps {
            if let Some(problem) = registry.validate_params(&step.action, &step.parameters) {
                errors.push(format!("step '{}': {problem}", step.id));
            }
        }
        errors
    }

    /// Validate and move `Draft -> Ready`. A plan that is already `Ready` is
    /// re-validated and left as is.
    pub fn validate(&mut self, registry: &ToolRegistry) -> Result<(), PlanError> {
        let errors = self.validation_errors(registry);
        if !errors.is_empty() {
            return Err(PlanError::Validation(errors));
        }
        if self.status == PlanStatus::Draft {
            self.transition(PlanStatus::Ready)?;
        }
        Ok(())
    }

    pub fn transition(&mut self, next: PlanStatus) -> Result<(), PlanError> {
        if !self.status.can_transition_to(next) {
            return Err(PlanError::InvalidPlanTransition {
                plan_id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == PlanStatus::Executing && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.status = next;
        Ok(())
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// First dependency of step `index` that has not completed.
    pub fn unmet_dependency(&self, index: usize) -> Option<&str> {
        let step = self.steps.get(index)?;
        step.depends_on
            .iter()
            .find(|dep| {
                self.step(dep)
                    .is_none_or(|d| d.status != StepStatus::Completed)
            })
            .map(String::as_str)
    }

    /// Completed when every step ended Completed or Skipped, Failed otherwise.
    pub fn settled_status(&self) -> PlanStatus {
        if self
            .steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Completed | StepStatus::Skipped))
        {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        }
    }

    pub fn count_with_status(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}
