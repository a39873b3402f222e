pub mod schema;

pub use schema::{
    AutonomyConfig, Config, DailyQuotaConfig, ExecutorConfig, FeedbackConfig, GuardrailConfig,
    ObservabilityConfig,
};
