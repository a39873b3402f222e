use crate::config::DailyQuotaConfig;
use crate::security::RiskLevel;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Per-action auto-execution counters for one calendar day.
///
/// Each action is held to the quota of its own risk tier. All counters reset
/// together when the date moves on.
#[derive(Debug, Clone)]
pub struct DailyQuota {
    limits: DailyQuotaConfig,
    day: NaiveDate,
    used: HashMap<String, u32>,
}

impl DailyQuota {
    pub fn new(limits: DailyQuotaConfig, today: NaiveDate) -> Self {
        Self {
            limits,
            day: today,
            used: HashMap::new(),
        }
    }

    pub fn limit(&self, risk: RiskLevel) -> Option<u32> {
        match risk {
            RiskLevel::Critical => self.limits.critical,
            RiskLevel::High => self.limits.high,
            RiskLevel::Medium => self.limits.medium,
            RiskLevel::Low => self.limits.low,
        }
    }

    fn rollover_day_if_needed(&mut self, today: NaiveDate) {
        if today != self.day {
            self.day = today;
            self.used.clear();
        }
    }

    pub fn used(&mut self, action: &str, today: NaiveDate) -> u32 {
        self.rollover_day_if_needed(today);
        self.used.get(action).copied().unwrap_or(0)
    }

    /// Count one execution of `action` if its tier still has room. Returns
    /// whether it did.
    pub fn try_consume(&mut self, action: &str, risk: RiskLevel, today: NaiveDate) -> bool {
        self.rollover_day_if_needed(today);
        let limit = self.limit(risk);
        let used = self.used.entry(action.to_string()).or_insert(0);
        if limit.is_some_and(|limit| *used >= limit) {
            return false;
        }
        *used = used.saturating_add(1);
        true
    }
}
