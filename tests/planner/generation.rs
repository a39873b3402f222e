use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use stepgate::config::GuardrailConfig;
use stepgate::planner::{
    ExecutionState, PLANNER_KEY, PlanDrafter, PlanExecutor, PlanGenerator, PlanStatus,
};
use stepgate::security::GuardrailEngine;
use stepgate::tools::{DryRunTool, ToolParameter, ToolRegistry};

/// Replies with canned text and keeps the prompt it was given.
struct RecordingDrafter {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl PlanDrafter for RecordingDrafter {
    fn draft<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        })
    }
}

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(
        DryRunTool::new("search_web", "search the web")
            .with_parameters(vec![ToolParameter::required("query", "what to look for")]),
    ));
    registry.register(Box::new(DryRunTool::new("take_screenshot", "capture the screen")));
    Arc::new(registry)
}

fn executor(registry: Arc<ToolRegistry>) -> PlanExecutor {
    PlanExecutor::new(
        registry,
        Arc::new(GuardrailEngine::new(&GuardrailConfig::default())),
    )
}

#[tokio::test]
async fn fallback_plan_runs_end_to_end() {
    let registry = registry();
    let mut plan = PlanGenerator::new(Arc::clone(&registry))
        .create_plan("search for rust async book then take a screenshot", None)
        .await;

    assert_eq!(plan.metadata[PLANNER_KEY], "fallback");
    assert_eq!(plan.steps.len(), 2);

    let advance = executor(registry).start(&mut plan).unwrap();
    assert_eq!(advance.state, ExecutionState::Finished(PlanStatus::Completed));
    assert_eq!(
        plan.steps[0].outcome.as_ref().unwrap().data["parameters"]["query"],
        "rust async book"
    );
}

#[tokio::test]
async fn drafted_plan_sees_tools_and_context() {
    let drafter = Arc::new(RecordingDrafter {
        reply: r#"```json
{"goal": "look things up", "steps": [
  {"id": "find", "action": "search_web", "parameters": {"query": "tokio"}},
  {"id": "snap", "action": "take_screenshot", "depends_on": ["find"]}
]}
```"#
            .to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let registry = registry();
    let generator = PlanGenerator::new(Arc::clone(&registry)).with_drafter(drafter.clone());

    let mut plan = generator
        .create_plan("look things up", Some("the user prefers short answers"))
        .await;

    let prompts = drafter.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("- search_web: search the web"));
    assert!(prompts[0].contains("query (required)"));
    assert!(prompts[0].contains("the user prefers short answers"));

    assert_eq!(plan.metadata[PLANNER_KEY], "drafter");
    assert_eq!(plan.steps[1].depends_on, vec!["find"]);
    let advance = executor(registry).start(&mut plan).unwrap();
    assert!(advance.is_finished());
    assert_eq!(plan.status, PlanStatus::Completed);
}

#[tokio::test]
async fn draft_missing_required_parameter_falls_back() {
    let drafter = Arc::new(RecordingDrafter {
        reply: r#"{"steps": [{"action": "search_web"}]}"#.to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let plan = PlanGenerator::new(registry())
        .with_drafter(drafter)
        .create_plan("take a screenshot", None)
        .await;

    assert_eq!(plan.metadata[PLANNER_KEY], "fallback");
    assert!(
        plan.metadata["fallback_reason"]
            .as_str()
            .unwrap()
            .contains("query")
    );
    assert_eq!(plan.steps[0].action, "take_screenshot");
}
