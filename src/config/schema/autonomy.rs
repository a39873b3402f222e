use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Per-risk-tier daily auto-execution quotas. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuotaConfig {
    #[serde(default = "default_critical_quota")]
    pub critical: Option<u32>,
    #[serde(default = "default_high_quota")]
    pub high: Option<u32>,
    #[serde(default = "default_medium_quota")]
    pub medium: Option<u32>,
    #[serde(default)]
    pub low: Option<u32>,
}

#[allow(clippy::unnecessary_wraps)]
fn default_critical_quota() -> Option<u32> {
    Some(3)
}

#[allow(clippy::unnecessary_wraps)]
fn default_high_quota() -> Option<u32> {
    Some(10)
}

#[allow(clippy::unnecessary_wraps)]
fn default_medium_quota() -> Option<u32> {
    Some(50)
}

impl Default for DailyQuotaConfig {
    fn default() -> Self {
        Self {
            critical: default_critical_quota(),
            high: default_high_quota(),
            medium: default_medium_quota(),
            low: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyConfig {
    /// Master switch: when false the executors never consult the trust model
    /// and every gated action waits for a human.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub daily_quotas: DailyQuotaConfig,
    /// Context confidence assumed when the caller does not supply one.
    #[serde(default = "default_context_confidence")]
    pub default_context_confidence: f64,
}

fn default_true() -> bool {
    true
}

fn default_context_confidence() -> f64 {
    0.5
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_quotas: DailyQuotaConfig::default(),
            default_context_confidence: default_context_confidence(),
        }
    }
}

impl AutonomyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_context_confidence.is_nan()
            || !(0.0..=1.0).contains(&self.default_context_confidence)
        {
            anyhow::bail!("autonomy.default_context_confidence must be in [0.0, 1.0]");
        }
        Ok(())
    }
}
