use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_max_patterns_per_action")]
    pub max_patterns_per_action: usize,
    /// Minimum spacing between retention prunes.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    30
}

fn default_max_patterns_per_action() -> usize {
    20
}

fn default_prune_interval_secs() -> u64 {
    3600
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            max_patterns_per_action: default_max_patterns_per_action(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

impl FeedbackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_patterns_per_action == 0 {
            anyhow::bail!("feedback.max_patterns_per_action must be >= 1");
        }
        if self.retention_days == 0 {
            anyhow::bail!("feedback.retention_days must be >= 1");
        }
        Ok(())
    }
}
