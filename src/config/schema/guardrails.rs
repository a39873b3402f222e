use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Safe checks allowed per action inside one rate-limit window.
    #[serde(default = "default_max_actions_per_minute")]
    pub max_actions_per_minute: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_true")]
    pub require_confirmation_for_high_risk: bool,
    /// Regular expressions matched case-insensitively against every string
    /// parameter value.
    #[serde(default = "default_dangerous_patterns")]
    pub dangerous_patterns: Vec<String>,
    /// Added on top of the built-in always-blocked set.
    #[serde(default)]
    pub extra_blocked_actions: Vec<String>,
    /// Added on top of the built-in sensitive set.
    #[serde(default)]
    pub extra_sensitive_actions: Vec<String>,
}

fn default_max_actions_per_minute() -> u32 {
    30
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

pub fn default_dangerous_patterns() -> Vec<String> {
    vec![
        r"\brm\s+-[a-z]*(rf|fr)[a-z]*\b".into(),
        r"\brm\s+-r\s+-f\b".into(),
        r"\bmkfs(\.[a-z0-9]+)?\b".into(),
        r"\bformat\s+[a-z]:".into(),
        r"\bdd\s+if=\S+\s+of=/dev/".into(),
        r">\s*/dev/sd[a-z]".into(),
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:".into(),
        r"\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z|k|da)?sh\b".into(),
        r"\b(shutdown|reboot|poweroff)\b".into(),
        r"\binit\s+[06]\b".into(),
        r"\bchmod\s+-r\s+777\s+/".into(),
    ]
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_actions_per_minute: default_max_actions_per_minute(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            require_confirmation_for_high_risk: true,
            dangerous_patterns: default_dangerous_patterns(),
            extra_blocked_actions: Vec::new(),
            extra_sensitive_actions: Vec::new(),
        }
    }
}

impl GuardrailConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_actions_per_minute == 0 {
            anyhow::bail!("guardrails.max_actions_per_minute must be >= 1");
        }
        if self.rate_limit_window_secs == 0 {
            anyhow::bail!("guardrails.rate_limit_window_secs must be >= 1");
        }
        for pattern in &self.dangerous_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                anyhow::bail!("guardrails.dangerous_patterns: invalid pattern {pattern:?}: {e}");
            }
        }
        Ok(())
    }
}
