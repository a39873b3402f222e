use super::types::{Plan, PlanStep};
use crate::error::PlanError;
use crate::tools::ToolParams;
use serde::Deserialize;

/// Turns drafter output into a [`Plan`].
pub struct PlanParser;

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    goal: Option<String>,
    steps: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    id: Option<String>,
    action: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: ToolParams,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    requires_confirmation: bool,
}

impl PlanParser {
    pub fn schema_prompt() -> &'static str {
        concat!(
            "Respond with a JSON object in this exact format:\n",
            "{\n",
            "  \"goal\": \"<the goal>\",\n",
            "  \"steps\": [\n",
            "    {\n",
            "      \"id\": \"<step-id>\",\n",
            "      \"action\": \"<tool name>\",\n",
            "      \"description\": \"<what this step does>\",\n",
            "      \"parameters\": { ... },\n",
            "      \"depends_on\": [\"<step-ids this depends on>\"],\n",
            "      \"requires_confirmation\": false\n",
            "    }\n",
            "  ]\n",
            "}\n\n",
            "Only use tools from the list above. ",
            "Steps with no dependencies use \"depends_on\": [].\n",
            "Wrap the JSON in a ```json code fence.",
        )
    }

    /// Parse drafter text, fenced or bare. Steps without an id are numbered
    /// `step_1`, `step_2`, ... by position.
    pub fn parse(text: &str, goal: &str) -> Result<Plan, PlanError> {
        let json = Self::extract_json(text)
            .ok_or_else(|| PlanError::Parse("no JSON object in drafter output".into()))?;
        let raw: RawPlan = serde_json::from_str(json)
            .map_err(|e| PlanError::Parse(format!("invalid plan JSON: {e}")))?;

        if raw.steps.is_empty() {
            return Err(PlanError::Parse("plan must have at least one step".into()));
        }

        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, rs)| {
                let id = rs
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| format!("step_{}", i + 1));
                let description = rs.description.unwrap_or_else(|| rs.action.clone());
                let mut step = PlanStep::new(id, rs.action, description)
                    .with_parameters(rs.parameters);
                step.depends_on = rs.depends_on;
                step.requires_confirmation = rs.requires_confirmation;
                step
            })
            .collect();

        let goal = raw
            .goal
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| goal.to_string());
        let plan = Plan::new(goal, steps);

        let problems = plan.structural_errors();
        if !problems.is_empty() {
            return Err(PlanError::Validation(problems));
        }
        Ok(plan)
    }

    pub fn extract_json(text: &str) -> Option<&str> {
        if let Some(start) = text.find("```json") {
            let rest = &text[start + "```json".len()..];
            if let Some(end) = rest.find("```") {
                let candidate = rest[..end].trim();
                if !candidate.is_empty() {
                    return Some(candidate);
                }
            }
        }

        if let Some(start) = text.find("```\n{") {
            let rest = &text[start + "```\n".len()..];
            if let Some(end) = rest.find("```") {
                let candidate = rest[..end].trim();
                if !candidate.is_empty() {
                    return Some(candidate);
                }
            }
        }

        let open = text.find('{')?;
        let close = text.rfind('}')?;
        (close > open).then(|| &text[open..=close])
    }
}
