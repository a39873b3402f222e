//! Trust-based decisions on whether a gated action may skip confirmation.
//!
//! Each user gets their own [`AutonomousDecisionMaker`]. Trust is built only by
//! [`AutonomousDecisionMaker::record_execution`]; there is no decay.

mod quota;
mod service;
mod types;

pub use quota::DailyQuota;
pub use service::AutonomyService;
pub use types::{
    ActionHistory, AutonomyContext, AutonomyDecision, RECENT_FAILURE_LIMIT, TrustLevel,
};

use crate::config::AutonomyConfig;
use crate::security::RiskLevel;
use crate::tools::ToolParams;
use chrono::{Local, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

const SUCCESS_WEIGHT: f64 = 0.4;
const APPROVAL_WEIGHT: f64 = 0.4;
const CONTEXT_WEIGHT: f64 = 0.2;

/// Minimum trust score and minimum success rate for auto-execution.
fn thresholds(risk: RiskLevel) -> (f64, f64) {
    match risk {
        RiskLevel::Low => (0.5, 0.6),
        RiskLevel::Medium => (0.65, 0.75),
        RiskLevel::High => (0.8, 0.9),
        RiskLevel::Critical => (0.9, 0.95),
    }
}

#[derive(Debug)]
struct AutonomyState {
    histories: HashMap<String, ActionHistory>,
    quota: DailyQuota,
}

pub struct AutonomousDecisionMaker {
    user_id: String,
    enabled: bool,
    state: Mutex<AutonomyState>,
}

impl AutonomousDecisionMaker {
    pub fn new(user_id: impl Into<String>, config: &AutonomyConfig) -> Self {
        Self {
            user_id: user_id.into(),
            enabled: config.enabled,
            state: Mutex::new(AutonomyState {
                histories: HashMap::new(),
                quota: DailyQuota::new(config.daily_quotas, Local::now().date_naive()),
            }),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn decide_autonomy(
        &self,
        action: &str,
        params: &ToolParams,
        risk: RiskLevel,
        ctx: &AutonomyContext,
    ) -> AutonomyDecision {
        self.decide_autonomy_on(action, params, risk, ctx, Local::now().date_naive())
    }

    pub(crate) fn decide_autonomy_on(
        &self,
        action: &str,
        params: &ToolParams,
        risk: RiskLevel,
        ctx: &AutonomyContext,
        today: NaiveDate,
    ) -> AutonomyDecision {
        let mut state = self.lock();
        let history = state.histories.get(action).cloned().unwrap_or_default();

        let trust_level = history.trust_level();
        let success = history.success_rate();
        let approval = history.approval_rate();
        let trust_score = (SUCCESS_WEIGHT * success
            + APPROVAL_WEIGHT * approval
            + CONTEXT_WEIGHT * ctx.context_confidence.clamp(0.0, 1.0))
        .clamp(0.0, 1.0);
        let (min_trust, min_success) = thresholds(risk);

        let mut approved = false;
        let reasoning = if !self.enabled {
            "autonomous execution is disabled".to_string()
        } else if history.total_attempts == 0 {
            format!("no prior attempts of '{action}'; confirmation required")
        } else if trust_score < min_trust {
            format!(
                "trust score {trust_score:.2} is below the {min_trust:.2} required for {risk} risk"
            )
        } else if success < min_success {
            format!(
                "success rate {:.0}% is below the {:.0}% required for {risk} risk",
                success * 100.0,
                min_success * 100.0
            )
        } else if !state.quota.try_consume(action, risk, today) {
            let limit = state.quota.limit(risk).unwrap_or(0);
            format!(
                "daily quota exceeded: '{action}' already auto-executed {limit} times today ({risk} risk)"
            )
        } else {
            approved = true;
            format!(
                "{trust_level} trust: score {trust_score:.2}, success {:.0}%, approval {:.0}% over {} attempts",
                success * 100.0,
                approval * 100.0,
                history.total_attempts
            )
        };

        let fallback_suggestion = (!approved).then(|| {
            if history.recent_failures.is_empty() {
                "ask the user to confirm this action".to_string()
            } else {
                format!(
                    "ask the user to confirm; {} recent failure(s) recorded",
                    history.recent_failures.len()
                )
            }
        });

        debug!(
            user_id = %self.user_id,
            action,
            %risk,
            params = params.len(),
            trust_score,
            approved,
            "autonomy decision"
        );

        AutonomyDecision {
            should_auto_execute: approved,
            trust_score,
            trust_level,
            reasoning,
            confidence: if approved {
                trust_score.min(success)
            } else {
                1.0 - trust_score
            },
            fallback_suggestion,
        }
    }

    /// Record one attempt of `action`. The only way trust changes.
    pub fn record_execution(
        &self,
        action: &str,
        success: bool,
        user_approved: bool,
        user_rejected: bool,
        failure_reason: Option<&str>,
    ) {
        let mut state = self.lock();
        let history = state.histories.entry(action.to_string()).or_default();
        history.total_attempts = history.total_attempts.saturating_add(1);
        if success {
            history.successful_attempts = history.successful_attempts.saturating_add(1);
        }
        if user_approved {
            history.user_approved = history.user_approved.saturating_add(1);
        }
        if user_rejected {
            history.user_rejected = history.user_rejected.saturating_add(1);
        }
        history.last_executed = Some(Utc::now());
        if let Some(reason) = failure_reason {
            history.push_failure(reason.to_string());
        }
    }

    pub fn history(&self, action: &str) -> Option<ActionHistory> {
        self.lock().histories.get(action).cloned()
    }

    /// Trust score the next decision would compute, without touching quotas.
    pub fn trust_score(&self, action: &str, ctx: &AutonomyContext) -> f64 {
        let history = self.history(action).unwrap_or_default();
        (SUCCESS_WEIGHT * history.success_rate()
            + APPROVAL_WEIGHT * history.approval_rate()
            + CONTEXT_WEIGHT * ctx.context_confidence.clamp(0.0, 1.0))
        .clamp(0.0, 1.0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AutonomyState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
