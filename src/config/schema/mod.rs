mod autonomy;
mod core;
mod executor;
mod feedback;
mod guardrails;
mod observability;

pub use autonomy::{AutonomyConfig, DailyQuotaConfig};
pub use core::Config;
pub use executor::ExecutorConfig;
pub use feedback::FeedbackConfig;
pub use guardrails::{GuardrailConfig, default_dangerous_patterns};
pub use observability::ObservabilityConfig;
