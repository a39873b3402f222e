use super::AutonomousDecisionMaker;
use crate::config::AutonomyConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Owns one decision maker per user.
///
/// Built once by the composition root and shared by reference.
pub struct AutonomyService {
    config: AutonomyConfig,
    users: Mutex<HashMap<String, Arc<AutonomousDecisionMaker>>>,
}

impl AutonomyService {
    pub fn new(config: AutonomyConfig) -> Self {
        Self {
            config,
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Decision maker for `user_id`, created on first use.
    pub fn for_user(&self, user_id: &str) -> Arc<AutonomousDecisionMaker> {
        let mut users = self
            .users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            users
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(AutonomousDecisionMaker::new(user_id, &self.config))),
        )
    }

    /// Drop a user's history. Returns whether the user was known.
    pub fn remove_user(&self, user_id: &str) -> bool {
        self.users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(user_id)
            .is_some()
    }

    pub fn user_count(&self) -> usize {
        self.users
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
