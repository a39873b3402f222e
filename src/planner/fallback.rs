use super::types::{Plan, PlanStep};
use crate::tools::ToolParams;
use regex::{Captures, Regex, RegexBuilder};
use serde_json::{Value, json};

/// Metadata key recording which planner produced a plan.
pub const PLANNER_KEY: &str = "planner";

struct Rule {
    pattern: Regex,
    action: &'static str,
    build: BuildStep,
}

/// Keyword planner used when no drafter is available or its output is unusable.
///
/// Each clause of the goal ("... then ...") becomes one step that depends on
/// the step before it. A clause that matches no rule becomes a web search.
pub struct FallbackPlanner {
    rules: Vec<Rule>,
    clause_split: Option<Regex>,
}

type BuildStep = fn(&Captures<'_>) -> (String, ToolParams);

fn rule(source: &str, action: &'static str, build: BuildStep) -> Option<Rule> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| tracing::warn!(pattern = source, error = %e, "skipping fallback rule"))
        .ok()
        .map(|pattern| Rule {
            pattern,
            action,
            build,
        })
}

impl Default for FallbackPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn params(value: Value) -> ToolParams {
    match value {
        Value::Object(map) => map,
        _ => ToolParams::new(),
    }
}

fn capture(caps: &Captures<'_>, i: usize) -> String {
    caps.get(i)
        .map(|m| m.as_str().trim().trim_end_matches(['.', '!', '?']).to_string())
        .unwrap_or_default()
}

impl FallbackPlanner {
    pub fn new() -> Self {
        let rules = [
            rule(
                r"^(?:open|visit|go to)\s+(https?://\S+)",
                "open_url",
                |c| {
                    let url = capture(c, 1);
                    (format!("Open {url}"), params(json!({ "url": url })))
                },
            ),
            rule(
                r"^(?:send|write)\s+(?:an?\s+)?(?:email|e-mail|mail)\s+to\s+(\S+@\S+?)(?:\s+(?:about|saying|regarding)\s+(.+))?$",
                "send_email",
                |c| {
                    let to = capture(c, 1);
                    let subject = capture(c, 2);
                    (
                        format!("Send an email to {to}"),
                        params(json!({ "to": to, "subject": subject, "body": subject })),
                    )
                },
            ),
            rule(
                r"^(?:send|text)\s+(?:a\s+)?message\s+to\s+(\S+)(?:\s+(?:saying|that)\s+(.+))?$",
                "send_message",
                |c| {
                    let to = capture(c, 1);
                    (
                        format!("Message {to}"),
                        params(json!({ "to": to, "text": capture(c, 2) })),
                    )
                },
            ),
            rule(
                r"^remind\s+me\s+to\s+(.+?)(?:\s+at\s+(.+))?$",
                "create_reminder",
                |c| {
                    let text = capture(c, 1);
                    (
                        format!("Remind about: {text}"),
                        params(json!({ "text": text, "time": capture(c, 2) })),
                    )
                },
            ),
            rule(
                r"^(?:schedule|create|add)\s+(?:a\s+|an\s+)?(?:meeting|event|appointment)\s+(.+)$",
                "create_calendar_event",
                |c| {
                    let title = capture(c, 1);
                    (
                        format!("Create calendar event {title}"),
                        params(json!({ "title": title })),
                    )
                },
            ),
            rule(
                r"^(?:take|capture|grab)\s+(?:a\s+)?screenshot",
                "take_screenshot",
                |_| ("Take a screenshot".to_string(), ToolParams::new()),
            ),
            rule(
                r"^(?:create|make|write)\s+(?:a\s+)?(?:file|note)\s+(?:called\s+|named\s+)?(\S+)",
                "create_file",
                |c| {
                    let path = capture(c, 1);
                    (format!("Create file {path}"), params(json!({ "path": path })))
                },
            ),
            rule(
                r"^(?:search|look\s+up|google|find\s+information)\s+(?:for\s+|about\s+|on\s+)?(.+)$",
                "search_web",
                |c| {
                    let query = capture(c, 1);
                    (format!("Search the web for {query}"), params(json!({ "query": query })))
                },
            ),
            rule(
                r"^(?:open|launch|start)\s+(?:the\s+)?(.+?)(?:\s+app(?:lication)?)?$",
                "open_application",
                |c| {
                    let name = capture(c, 1);
                    (format!("Open {name}"), params(json!({ "name": name })))
                },
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        let clause_split = RegexBuilder::new(r"\s*(?:,\s*)?(?:\band\s+then\b|\bthen\b|;)\s*")
            .case_insensitive(true)
            .build()
            .ok();

        Self {
            rules,
            clause_split,
        }
    }

    /// Build a draft plan for `goal`. Never fails and never returns an empty plan.
    pub fn plan(&self, goal: &str) -> Plan {
        let mut steps: Vec<PlanStep> = Vec::new();
        let clauses: Vec<&str> = match &self.clause_split {
            Some(split) => split.split(goal.trim()).collect(),
            None => vec![goal.trim()],
        };
        for clause in clauses.into_iter().map(str::trim).filter(|c| !c.is_empty()) {
            let id = format!("step_{}", steps.len() + 1);
            let mut step = self.step_for(&id, clause);
            if let Some(previous) = steps.last() {
                step.depends_on = vec![previous.id.clone()];
            }
            steps.push(step);
        }
        if steps.is_empty() {
            steps.push(self.step_for("step_1", goal));
        }

        let mut plan = Plan::new(goal.trim(), steps);
        plan.metadata
            .insert(PLANNER_KEY.to_string(), Value::from("fallback"));
        plan
    }

    fn step_for(&self, id: &str, clause: &str) -> PlanStep {
        let clause = clause.trim().trim_start_matches("please ").trim();
        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(clause) {
                let (description, parameters) = (rule.build)(&caps);
                return PlanStep::new(id, rule.action, description).with_parameters(parameters);
            }
        }
        PlanStep::new(id, "search_web", format!("Search the web for {clause}"))
            .with_param("query", clause)
    }
}
