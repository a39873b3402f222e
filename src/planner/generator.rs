use super::fallback::{FallbackPlanner, PLANNER_KEY};
use super::parser::PlanParser;
use super::types::Plan;
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};

/// Drafts plan text for a goal, usually by asking a language model.
pub trait PlanDrafter: Send + Sync {
    fn draft<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

/// Builds plans from goals. Never fails: drafter errors, unparsable output,
/// and plans naming unknown tools all degrade to the keyword planner.
pub struct PlanGenerator {
    registry: Arc<ToolRegistry>,
    drafter: Option<Arc<dyn PlanDrafter>>,
    fallback: FallbackPlanner,
}

impl PlanGenerator {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            drafter: None,
            fallback: FallbackPlanner::new(),
        }
    }

    #[must_use]
    pub fn with_drafter(mut self, drafter: Arc<dyn PlanDrafter>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    /// Prompt handed to the drafter.
    pub fn build_prompt(&self, goal: &str, context: Option<&str>) -> String {
        let mut prompt = format!("Goal: {goal}\n\n");
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str("Context:\n");
            prompt.push_str(context.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str(&self.registry.format_for_prompt());
        prompt.push('\n');
        prompt.push_str(PlanParser::schema_prompt());
        prompt
    }

    pub async fn create_plan(&self, goal: &str, context: Option<&str>) -> Plan {
        let Some(drafter) = &self.drafter else {
            return self.fallback(goal, "no drafter configured");
        };

        let prompt = self.build_prompt(goal, context);
        let text = match drafter.draft(&prompt).await {
            Ok(text) => text,
            Err(e) => return self.fallback(goal, &format!("drafter failed: {e:#}")),
        };

        let mut plan = match PlanParser::parse(&text, goal) {
            Ok(plan) => plan,
            Err(e) => return self.fallback(goal, &e.to_string()),
        };
        let problems = plan.validation_errors(&self.registry);
        if !problems.is_empty() {
            return self.fallback(goal, &problems.join("; "));
        }

        plan.metadata
            .insert(PLANNER_KEY.to_string(), Value::from("drafter"));
        info!(plan_id = %plan.id, steps = plan.steps.len(), "drafted plan");
        plan
    }

    fn fallback(&self, goal: &str, reason: &str) -> Plan {
        warn!(%reason, "using fallback planner");
        let mut plan = self.fallback.plan(goal);
        plan.metadata
            .insert("fallback_reason".to_string(), Value::from(reason));
        plan
    }
}
