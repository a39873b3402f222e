use serde::{Deserialize, Serialize};

/// Potential impact of an action.
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
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// How strictly a user's reply must match before a gated action runs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConfirmationKind {
    /// A plain yes/no.
    Simple,
    /// A yes/no after the parameters have been shown.
    Detailed,
    /// The user must type `confirm <action>`.
    Explicit,
}

/// Verdict for one action + parameters pair. Built fresh on every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub is_safe: bool,
    pub risk_level: RiskLevel,
    pub requires_confirmation: bool,
    pub confirmation_type: Option<ConfirmationKind>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub blocked_reason: Option<String>,
}

impl SafetyCheck {
    pub fn allow(risk_level: RiskLevel) -> Self {
        Self {
            is_safe: true,
            risk_level,
            requires_confirmation: false,
            confirmation_type: None,
            warnings: Vec::new(),
            blocked_reason: None,
        }
    }

    pub fn block(risk_level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            risk_level,
            requires_confirmation: false,
            confirmation_type: None,
            warnings: Vec::new(),
            blocked_reason: Some(reason.into()),
        }
    }

    pub fn require(&mut self, kind: ConfirmationKind) {
        self.requires_confirmation = true;
        self.confirmation_type = Some(kind);
    }

    pub fn clear_confirmation(&mut self) {
        self.requires_confirmation = false;
        self.confirmation_type = None;
    }
}

/// Caller-side facts the guardrail takes into account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckContext {
    /// The user already approved this exact action out of band.
    #[serde(default)]
    pub user_confirmed: bool,
}

impl CheckContext {
    pub fn confirmed() -> Self {
        Self {
            user_confirmed: true,
        }
    }
}
