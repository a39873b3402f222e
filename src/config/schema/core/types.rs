use super::super::{
    AutonomyConfig, ExecutorConfig, FeedbackConfig, GuardrailConfig, ObservabilityConfig,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory plan snapshots are written to - computed at load time
    #[serde(skip)]
    pub state_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub guardrails: GuardrailConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub autonomy: AutonomyConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.toml"),
            state_dir: PathBuf::from("plans"),
            log_level: default_log_level(),
            guardrails: GuardrailConfig::default(),
            feedback: FeedbackConfig::default(),
            autonomy: AutonomyConfig::default(),
            executor: ExecutorConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.guardrails.validate()?;
        self.feedback.validate()?;
        self.autonomy.validate()?;
        self.executor.validate()?;
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("log_level must be one of trace/debug/info/warn/error, got {other:?}"),
        }
        match self.observability.backend.as_str() {
            "none" | "noop" | "log" => Ok(()),
            other => anyhow::bail!("observability.backend must be \"none\" or \"log\", got {other:?}"),
        }
    }
}
