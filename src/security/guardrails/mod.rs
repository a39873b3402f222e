mod confirmation;
mod rate_limit;
mod types;

pub use confirmation::{confirmation_prompt, validate_confirmation};
pub use rate_limit::RateLimitState;
pub use types::{CheckContext, ConfirmationKind, RiskLevel, SafetyCheck};

use crate::config::GuardrailConfig;
use crate::security::defaults::{
    RISK_KEYWORDS, default_blocked_actions, default_critical_actions, default_high_risk_actions,
    default_medium_risk_actions, default_sensitive_actions,
};
use crate::tools::ToolParams;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
struct DangerousPattern {
    source: String,
    regex: Regex,
}

/// Risk engine every plan step passes through before its tool runs.
///
/// One engine is shared by every plan executed in the process; the
/// rate-limit counters sit behind a single lock so concurrent checks for the
/// same action cannot both slip under the ceiling.
#[derive(Debug)]
pub struct GuardrailEngine {
    require_confirmation_for_high_risk: bool,
    patterns: Vec<DangerousPattern>,
    blocked: HashSet<String>,
    critical: HashSet<String>,
    high: HashSet<String>,
    medium: HashSet<String>,
    sensitive: HashSet<String>,
    rate: Mutex<RateLimitState>,
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self::new(&GuardrailConfig::default())
    }
}

impl GuardrailEngine {
    /// Patterns that fail to compile are logged and skipped;
    /// `GuardrailConfig::validate` rejects them before this point in normal use.
    pub fn new(config: &GuardrailConfig) -> Self {
        let patterns = config
            .dangerous_patterns
            .iter()
            .filter_map(|source| {
                match RegexBuilder::new(source).case_insensitive(true).build() {
                    Ok(regex) => Some(DangerousPattern {
                        source: source.clone(),
                        regex,
                    }),
                    Err(e) => {
                        warn!(pattern = %source, error = %e, "skipping invalid dangerous pattern");
                        None
                    }
                }
            })
            .collect();

        let mut blocked: HashSet<String> = default_blocked_actions().into_iter().collect();
        blocked.extend(config.extra_blocked_actions.iter().cloned());
        let mut sensitive: HashSet<String> = default_sensitive_actions().into_iter().collect();
        sensitive.extend(config.extra_sensitive_actions.iter().cloned());

        Self {
            require_confirmation_for_high_risk: config.require_confirmation_for_high_risk,
            patterns,
            blocked,
            critical: default_critical_actions().into_iter().collect(),
            high: default_high_risk_actions().into_iter().collect(),
            medium: default_medium_risk_actions().into_iter().collect(),
            sensitive,
            rate: Mutex::new(RateLimitState::new(
                config.max_actions_per_minute,
                Duration::from_secs(config.rate_limit_window_secs),
                Instant::now(),
            )),
        }
    }

    /// Gate one action. See [`SafetyCheck`] for the verdict shape.
    pub fn check_action(&self, action: &str, params: &ToolParams, ctx: &CheckContext) -> SafetyCheck {
        self.check_action_at(action, params, ctx, Instant::now())
    }

    pub(crate) fn check_action_at(
        &self,
        action: &str,
        params: &ToolParams,
        ctx: &CheckContext,
        now: Instant,
    ) -> SafetyCheck {
        if self.blocked.contains(action) {
            debug!(action, "action is on the blocklist");
            return SafetyCheck::block(
                RiskLevel::Critical,
                format!("action '{action}' is permanently blocked"),
            );
        }

        let mut rate = self
            .rate
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        rate.roll_window(now);
        if rate.is_exhausted(action) {
            debug!(action, count = rate.count(action), "rate limit reached");
            return SafetyCheck::block(
                RiskLevel::High,
                format!(
                    "rate limit exceeded for '{action}': at most {} per {}s",
                    rate.max_per_window(),
                    rate.window().as_secs()
                ),
            );
        }

        if let Some((key, pattern)) = self.find_dangerous_parameter(params) {
            warn!(action, parameter = %key, pattern = %pattern, "dangerous parameter blocked");
            return SafetyCheck::block(
                RiskLevel::Critical,
                format!("dangerous command pattern `{pattern}` matched in parameter '{key}'"),
            );
        }

        let risk_level = self.classify_risk(action);
        let mut check = SafetyCheck::allow(risk_level);

        if self.sensitive.contains(action) {
            check.require(ConfirmationKind::Detailed);
            check
                .warnings
                .push(format!("'{action}' is a sensitive action"));
        }
        if risk_level == RiskLevel::High && self.require_confirmation_for_high_risk {
            check.require(ConfirmationKind::Detailed);
            check.warnings.push(format!("'{action}' is high risk"));
        }
        if risk_level == RiskLevel::Critical {
            check.require(ConfirmationKind::Explicit);
            check.warnings.push(format!("'{action}' is critical"));
        }
        if ctx.user_confirmed && check.requires_confirmation {
            check.clear_confirmation();
            check
                .warnings
                .push("confirmation already granted by caller".to_string());
        }

        rate.record(action);
        check
    }

    /// Risk tier of an action name, ignoring parameters.
    pub fn classify_risk(&self, action: &str) -> RiskLevel {
        if self.critical.contains(action) {
            return RiskLevel::Critical;
        }
        let lowered = action.to_lowercase();
        if self.high.contains(action) || RISK_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            return RiskLevel::High;
        }
        if self.medium.contains(action) {
            return RiskLevel::Medium;
        }
        RiskLevel::Low
    }

    /// Confirmation the action's tier and sensitivity demand, leaving out
    /// rate limits, parameters and caller context.
    pub fn required_confirmation(&self, action: &str) -> Option<ConfirmationKind> {
        let risk = self.classify_risk(action);
        if risk == RiskLevel::Critical {
            return Some(ConfirmationKind::Explicit);
        }
        let high = risk == RiskLevel::High && self.require_confirmation_for_high_risk;
        (high || self.sensitive.contains(action)).then_some(ConfirmationKind::Detailed)
    }

    pub fn validate_confirmation(&self, response: &str, action: &str, check: &SafetyCheck) -> bool {
        validate_confirmation(response, action, check)
    }

    pub fn is_blocked(&self, action: &str) -> bool {
        self.blocked.contains(action)
    }

    /// Safe checks recorded for `action` in the current window.
    pub fn recorded_in_window(&self, action: &str) -> u32 {
        self.rate
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .count(action)
    }

    fn find_dangerous_parameter(&self, params: &ToolParams) -> Option<(String, &str)> {
        for (key, value) in params {
            let mut strings = Vec::new();
            collect_strings(value, &mut strings);
            for text in strings {
                if let Some(pattern) = self.patterns.iter().find(|p| p.regex.is_match(text)) {
                    return Some((key.clone(), pattern.source.as_str()));
                }
            }
        }
        None
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}
