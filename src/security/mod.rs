pub mod autonomy;
pub mod defaults;
pub mod guardrails;

pub use autonomy::{
    ActionHistory, AutonomousDecisionMaker, AutonomyContext, AutonomyDecision, AutonomyService,
    TrustLevel,
};
pub use guardrails::{
    CheckContext, ConfirmationKind, GuardrailEngine, RiskLevel, SafetyCheck,
    confirmation_prompt, validate_confirmation,
};
