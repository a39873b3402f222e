use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Failure reasons kept per action.
pub const RECENT_FAILURE_LIMIT: usize = 10;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrustLevel {
    Unknown,
    Low,
    Medium,
    High,
    Expert,
}

/// Minimum attempts, approval rate and success rate for each tier, highest first.
const TRUST_TIERS: &[(TrustLevel, u32, f64, f64)] = &[
    (TrustLevel::Expert, 50, 0.95, 0.95),
    (TrustLevel::High, 20, 0.9, 0.9),
    (TrustLevel::Medium, 10, 0.8, 0.8),
    (TrustLevel::Low, 3, 0.6, 0.6),
];

/// What a user has done with one action so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionHistory {
    pub total_attempts: u32,
    pub successful_attempts: u32,
    pub user_approved: u32,
    pub user_rejected: u32,
    pub last_executed: Option<DateTime<Utc>>,
    pub recent_failures: VecDeque<String>,
}

impl ActionHistory {
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        f64::from(self.successful_attempts) / f64::from(self.total_attempts)
    }

    /// Share of confirmation decisions that approved; 0 before any decision.
    pub fn approval_rate(&self) -> f64 {
        let decisions = self.user_approved + self.user_rejected;
        if decisions == 0 {
            return 0.0;
        }
        f64::from(self.user_approved) / f64::from(decisions)
    }

    pub fn trust_level(&self) -> TrustLevel {
        let approval = self.approval_rate();
        let success = self.success_rate();
        TRUST_TIERS
            .iter()
            .find(|(_, attempts, min_approval, min_success)| {
                self.total_attempts >= *attempts
                    && approval >= *min_approval
                    && success >= *min_success
            })
            .map_or(TrustLevel::Unknown, |(level, ..)| *level)
    }

    pub(crate) fn push_failure(&mut self, reason: String) {
        self.recent_failures.push_back(reason);
        while self.recent_failures.len() > RECENT_FAILURE_LIMIT {
            self.recent_failures.pop_front();
        }
    }
}

/// Caller-supplied signals for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutonomyContext {
    /// How well the current conversational context is understood, in `[0, 1]`.
    pub context_confidence: f64,
}

impl AutonomyContext {
    pub fn new(context_confidence: f64) -> Self {
        Self { context_confidence }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutonomyDecision {
    pub should_auto_execute: bool,
    pub trust_score: f64,
    pub trust_level: TrustLevel,
    pub reasoning: String,
    pub confidence: f64,
    pub fallback_suggestion: Option<String>,
}
