//! Learns from failed tool calls.
//!
//! Every failed outcome is classified and kept in a short per-action history.
//! The history feeds three signals: refinement suggestions for a step about to
//! run, a coarse reliability grade, and a hint that a different tool should be
//! tried instead of retrying the same one.

mod classify;

pub use classify::{ErrorCategory, classify_error};

use crate::config::FeedbackConfig;
use crate::planner::PlanStep;
use crate::tools::{ToolOutcome, ToolParams};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Failures inspected by [`FailureFeedbackAnalyzer::should_use_alternative_tool`].
const ALTERNATIVE_TOOL_WINDOW: usize = 5;

/// One recorded tool failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePattern {
    pub action: String,
    pub parameters: ToolParams,
    pub error: String,
    pub category: ErrorCategory,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

/// Suggested correction derived from an action's failure history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRefinement {
    pub step_id: Option<String>,
    pub action: String,
    pub category: ErrorCategory,
    pub suggestion: String,
    pub rationale: String,
    /// Share of recorded failures in this category, in `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Reliability {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReliability {
    pub action: String,
    pub total_failures: usize,
    pub reliability: Reliability,
    /// Up to three most frequent categories, most frequent first.
    pub top_errors: Vec<(ErrorCategory, usize)>,
}

#[derive(Debug, Default)]
struct FeedbackState {
    patterns: HashMap<String, VecDeque<FailurePattern>>,
    last_prune: Option<DateTime<Utc>>,
}

pub struct FailureFeedbackAnalyzer {
    config: FeedbackConfig,
    state: Mutex<FeedbackState>,
}

impl Default for FailureFeedbackAnalyzer {
    fn default() -> Self {
        Self::new(FeedbackConfig::default())
    }
}

impl FailureFeedbackAnalyzer {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            state: Mutex::new(FeedbackState::default()),
        }
    }

    /// Record the outcome of `step`. Successful outcomes are ignored.
    pub fn record_failure(
        &self,
        step: &PlanStep,
        outcome: &ToolOutcome,
        context: BTreeMap<String, Value>,
    ) {
        self.record_failure_at(step, outcome, context, Utc::now());
    }

    pub(crate) fn record_failure_at(
        &self,
        step: &PlanStep,
        outcome: &ToolOutcome,
        context: BTreeMap<String, Value>,
        now: DateTime<Utc>,
    ) {
        if outcome.success {
            return;
        }
        let error = outcome.error_text();
        let category = classify_error(&error);
        debug!(action = %step.action, step_id = %step.id, %category, "recording failure");

        let mut state = self.lock();
        let history = state.patterns.entry(step.action.clone()).or_default();
        history.push_back(FailurePattern {
            action: step.action.clone(),
            parameters: step.parameters.clone(),
            error,
            category,
            timestamp: now,
            context,
        });
        while history.len() > self.config.max_patterns_per_action {
            history.pop_front();
        }

        self.prune_if_due(&mut state, now);
    }

    /// One refinement per error category seen for `action`, most frequent first.
    pub fn get_step_refinements(&self, action: &str, params: &ToolParams) -> Vec<StepRefinement> {
        let state = self.lock();
        let Some(history) = state.patterns.get(action).filter(|h| !h.is_empty()) else {
            return Vec::new();
        };
        let total = history.len();

        #[allow(clippy::cast_precision_loss)]
        tally(history)
            .into_iter()
            .map(|(category, count)| StepRefinement {
                step_id: None,
                action: action.to_string(),
                category,
                suggestion: suggestion_for(category, action, params),
                rationale: format!(
                    "{count} of {total} recorded failures of '{action}' were {category}"
                ),
                confidence: count as f64 / total as f64,
            })
            .collect()
    }

    /// Refinements for a concrete step, tagged with its id.
    pub fn refine_step(&self, step: &PlanStep) -> Vec<StepRefinement> {
        self.get_step_refinements(&step.action, &step.parameters)
            .into_iter()
            .map(|refinement| StepRefinement {
                step_id: Some(step.id.clone()),
                ..refinement
            })
            .collect()
    }

    pub fn get_action_reliability(&self, action: &str) -> ActionReliability {
        let state = self.lock();
        let (total, top_errors) = state.patterns.get(action).map_or((0, Vec::new()), |h| {
            let mut counts = tally(h);
            counts.truncate(3);
            (h.len(), counts)
        });
        let reliability = match total {
            0..=2 => Reliability::High,
            3..=9 => Reliability::Medium,
            _ => Reliability::Low,
        };
        ActionReliability {
            action: action.to_string(),
            total_failures: total,
            reliability,
            top_errors,
        }
    }

    /// True when the action keeps failing because its target is missing, so a
    /// different tool is a better bet than a retry.
    pub fn should_use_alternative_tool(&self, action: &str) -> bool {
        let state = self.lock();
        let Some(history) = state.patterns.get(action) else {
            return false;
        };
        if history.len() <= 3 {
            return false;
        }
        let recent_not_available = history
            .iter()
            .rev()
            .take(ALTERNATIVE_TOOL_WINDOW)
            .filter(|p| p.category == ErrorCategory::NotAvailable)
            .count();
        recent_not_available > 2
    }

    pub fn failure_patterns(&self, action: &str) -> Vec<FailurePattern> {
        self.lock()
            .patterns
            .get(action)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn prune_if_due(&self, state: &mut FeedbackState, now: DateTime<Utc>) {
        let interval = Duration::seconds(i64::try_from(self.config.prune_interval_secs).unwrap_or(i64::MAX));
        if state.last_prune.is_some_and(|last| now - last < interval) {
            return;
        }
        let cutoff = now - Duration::days(i64::from(self.config.retention_days));
        let mut removed = 0usize;
        state.patterns.retain(|_, history| {
            let before = history.len();
            history.retain(|p| p.timestamp >= cutoff);
            removed += before - history.len();
            !history.is_empty()
        });
        state.last_prune = Some(now);
        if removed > 0 {
            debug!(removed, "pruned expired failure patterns");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedbackState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Category counts, most frequent first; ties keep category order.
fn tally(history: &VecDeque<FailurePattern>) -> Vec<(ErrorCategory, usize)> {
    let mut counts: BTreeMap<ErrorCategory, usize> = BTreeMap::new();
    for pattern in history {
        *counts.entry(pattern.category).or_insert(0) += 1;
    }
    let mut counts: Vec<(ErrorCategory, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn suggestion_for(category: ErrorCategory, action: &str, params: &ToolParams) -> String {
    match category {
        ErrorCategory::NotAvailable => {
            format!("Add a step that checks the target of '{action}' is available before running it")
        }
        ErrorCategory::PermissionError => {
            format!("Verify authentication and permissions before executing '{action}'")
        }
        ErrorCategory::Timeout => {
            format!("Allow a longer timeout for '{action}' or split it into smaller steps")
        }
        ErrorCategory::Connectivity => {
            format!("Check network connectivity before '{action}' and retry with backoff")
        }
        ErrorCategory::InvalidInput => {
            let keys: Vec<&str> = params.keys().map(String::as_str).collect();
            if keys.is_empty() {
                format!("Validate the parameters of '{action}' before calling it")
            } else {
                format!(
                    "Validate parameters ({}) before calling '{action}'",
                    keys.join(", ")
                )
            }
        }
        ErrorCategory::StateConflict => {
            format!("Refresh the current state before '{action}' to avoid conflicting changes")
        }
        ErrorCategory::Unknown => {
            format!("Review recent '{action}' failures; no common cause was identified")
        }
    }
}
