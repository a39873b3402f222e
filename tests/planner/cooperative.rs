use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;
use stepgate::config::{AutonomyConfig, GuardrailConfig};
use stepgate::error::PlanError;
use stepgate::feedback::{ErrorCategory, FailureFeedbackAnalyzer};
use stepgate::planner::{EventKind, ExecutionState, Plan, PlanExecutor, PlanStatus, PlanStep, StepStatus};
use stepgate::security::{AutonomousDecisionMaker, ConfirmationKind, GuardrailEngine, RiskLevel};
use stepgate::tools::ToolRegistry;

use crate::support::{Script, ScriptedTool, succeeding};

fn executor(registry: ToolRegistry) -> PlanExecutor {
    PlanExecutor::new(
        Arc::new(registry),
        Arc::new(GuardrailEngine::new(&GuardrailConfig::default())),
    )
}

fn kinds(events: &[stepgate::planner::ExecutionEvent]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

#[test]
fn failed_step_skips_dependents_and_independents_continue() {
    let mut registry = succeeding(&["summarize", "take_screenshot"]);
    let (fetch, fetch_calls) = ScriptedTool::new("fetch", Script::Fail("connection timed out"));
    registry.register(Box::new(fetch));
    let (summarize, summarize_calls) = ScriptedTool::new("summarize", Script::Succeed);
    registry.register(Box::new(summarize));

    let mut plan = Plan::with_id(
        "p-skip",
        "summarize the page",
        vec![
            PlanStep::new("a", "fetch", "fetch the page"),
            PlanStep::new("b", "summarize", "summarize it").depends_on(&["a"]),
            PlanStep::new("c", "take_screenshot", "screenshot"),
        ],
    );

    let advance = executor(registry).start(&mut plan).unwrap();

    assert_eq!(advance.state, ExecutionState::Finished(PlanStatus::Failed));
    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(plan.steps[0].status, StepStatus::Failed);
    assert_eq!(plan.steps[0].error.as_deref(), Some("connection timed out"));
    assert_eq!(plan.steps[1].status, StepStatus::Skipped);
    assert!(plan.steps[1].error.as_deref().unwrap().contains("'a'"));
    assert_eq!(plan.steps[2].status, StepStatus::Completed);
    assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(summarize_calls.load(Ordering::SeqCst), 0);

    let skipped = advance
        .events
        .iter()
        .find(|e| e.kind == EventKind::StepSkipped)
        .unwrap();
    assert_eq!(skipped.step_id.as_deref(), Some("b"));
    assert_eq!(skipped.data["dependency"], "a");

    let finished = advance.events.last().unwrap();
    assert_eq!(finished.kind, EventKind::PlanCompleted);
    assert_eq!(finished.data["status"], "failed");
    assert_eq!(finished.data["completed"], 1);
    assert_eq!(finished.data["skipped"], 1);
}

#[test]
fn successful_plan_emits_events_in_order() {
    let mut plan = Plan::new(
        "two lookups",
        vec![
            PlanStep::new("one", "search_web", "first").with_param("query", "rust"),
            PlanStep::new("two", "search_web", "second").depends_on(&["one"]),
        ],
    );

    let advance = executor(succeeding(&["search_web"])).start(&mut plan).unwrap();

    assert!(advance.is_finished());
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(
        kinds(&advance.events),
        vec![
            EventKind::PlanStarted,
            EventKind::StepStarted,
            EventKind::StepCompleted,
            EventKind::StepStarted,
            EventKind::StepCompleted,
            EventKind::PlanCompleted,
        ]
    );
    assert_eq!(plan.steps[0].outcome.as_ref().unwrap().data["echo"]["query"], "rust");
    assert!(plan.started_at.is_some());
    assert!(plan.completed_at.is_some());
}

#[test]
fn sensitive_step_suspends_until_approved() {
    let mut registry = ToolRegistry::new();
    let (email, calls) = ScriptedTool::new("send_email", Script::Succeed);
    registry.register(Box::new(email));
    let executor = executor(registry);

    let mut plan = Plan::new(
        "tell bob",
        vec![PlanStep::new("mail", "send_email", "email bob").with_param("to", "bob@example.com")],
    );

    let advance = executor.start(&mut plan).unwrap();
    let request = advance.pending_confirmation().unwrap().clone();
    assert_eq!(request.step_id, "mail");
    assert_eq!(request.confirmation_type, ConfirmationKind::Detailed);
    assert_eq!(request.risk_level, RiskLevel::High);
    assert!(request.prompt.contains("bob@example.com"));
    assert_eq!(plan.status, PlanStatus::Executing);
    assert_eq!(plan.steps[0].status, StepStatus::WaitingConfirmation);
    assert_eq!(advance.events.last().unwrap().kind, EventKind::ConfirmationNeeded);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let advance = executor.resume(&mut plan, Some(true)).unwrap();

    assert_eq!(advance.state, ExecutionState::Finished(PlanStatus::Completed));
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn rejected_confirmation_cancels_step_and_skips_dependents() {
    let executor = executor(succeeding(&["send_email", "take_screenshot"]));
    let mut plan = Plan::new(
        "mail then capture",
        vec![
            PlanStep::new("mail", "send_email", "email"),
            PlanStep::new("shot", "take_screenshot", "capture").depends_on(&["mail"]),
        ],
    );

    executor.start(&mut plan).unwrap();
    let advance = executor.resume(&mut plan, Some(false)).unwrap();

    assert_eq!(plan.steps[0].status, StepStatus::Cancelled);
    assert_eq!(plan.steps[1].status, StepStatus::Skipped);
    assert_eq!(advance.state, ExecutionState::Finished(PlanStatus::Failed));
    assert_eq!(advance.events[0].kind, EventKind::StepCancelled);
}

#[test]
fn missing_decision_counts_as_rejection() {
    let executor = executor(succeeding(&["send_email"]));
    let mut plan = Plan::new("mail", vec![PlanStep::new("mail", "send_email", "email")]);

    executor.start(&mut plan).unwrap();
    executor.resume(&mut plan, None).unwrap();

    assert_eq!(plan.steps[0].status, StepStatus::Cancelled);
}

#[test]
fn resume_without_pending_confirmation_is_an_error() {
    let executor = executor(succeeding(&["take_screenshot"]));
    let mut plan = Plan::new("shot", vec![PlanStep::new("s", "take_screenshot", "capture")]);
    executor.start(&mut plan).unwrap();

    assert!(matches!(
        executor.resume(&mut plan, Some(true)),
        Err(PlanError::NotWaiting { .. })
    ));
}

#[test]
fn invalid_plan_is_rejected_before_any_step_runs() {
    let (search, calls) = ScriptedTool::new("search_web", Script::Succeed);
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(search));

    let mut plan = Plan::new(
        "broken",
        vec![
            PlanStep::new("a", "search_web", "search"),
            PlanStep::new("b", "teleport", "nope").depends_on(&["ghost"]),
        ],
    );

    let err = executor(registry).start(&mut plan).unwrap_err();

    let PlanError::Validation(problems) = err else {
        panic!("expected validation error, got {err}");
    };
    assert_eq!(problems.len(), 2);
    assert!(problems.iter().any(|p| p.contains("ghost")));
    assert!(problems.iter().any(|p| p.contains("teleport")));
    assert_eq!(plan.status, PlanStatus::Draft);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn finished_plan_cannot_be_started_again() {
    let executor = executor(succeeding(&["take_screenshot"]));
    let mut plan = Plan::new("shot", vec![PlanStep::new("s", "take_screenshot", "capture")]);
    executor.start(&mut plan).unwrap();

    assert!(matches!(
        executor.start(&mut plan),
        Err(PlanError::NotStartable { .. })
    ));
}

#[test]
fn blocked_action_fails_without_running() {
    let mut registry = ToolRegistry::new();
    let (wipe, calls) = ScriptedTool::new("format_disk", Script::Succeed);
    registry.register(Box::new(wipe));

    let mut plan = Plan::new("wipe", vec![PlanStep::new("w", "format_disk", "wipe it")]);
    let advance = executor(registry).start(&mut plan).unwrap();

    assert_eq!(plan.steps[0].status, StepStatus::Failed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let failed = advance
        .events
        .iter()
        .find(|e| e.kind == EventKind::StepFailed)
        .unwrap();
    assert_eq!(failed.data["blocked"], true);
    assert_eq!(failed.data["risk_level"], "critical");
}

#[test]
fn dangerous_parameter_blocks_step() {
    let mut registry = ToolRegistry::new();
    let (shell, calls) = ScriptedTool::new("open_terminal", Script::Succeed);
    registry.register(Box::new(shell));

    let mut plan = Plan::new(
        "clean up",
        vec![PlanStep::new("t", "open_terminal", "clean").with_param("command", "rm -rf /")],
    );
    executor(registry).start(&mut plan).unwrap();

    assert_eq!(plan.steps[0].status, StepStatus::Failed);
    assert!(plan.steps[0].error.as_deref().unwrap().contains("dangerous"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn tool_errors_become_step_failures_and_reach_feedback() {
    let mut registry = ToolRegistry::new();
    let (fetch, _) = ScriptedTool::new("fetch", Script::Error("request timed out after 30s"));
    registry.register(Box::new(fetch));
    let feedback = Arc::new(FailureFeedbackAnalyzer::default());

    let mut plan = Plan::with_id("p-fb", "fetch", vec![PlanStep::new("f", "fetch", "fetch it")]);
    executor(registry)
        .with_feedback(Arc::clone(&feedback))
        .start(&mut plan)
        .unwrap();

    let error = plan.steps[0].error.as_deref().unwrap();
    assert!(error.contains("tool fetch execution failed"));
    assert!(error.contains("timed out"));

    let patterns = feedback.failure_patterns("fetch");
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].category, ErrorCategory::Timeout);
    assert_eq!(patterns[0].context["plan_id"], json!("p-fb"));
    assert_eq!(patterns[0].context["step_id"], json!("f"));
}

fn trusted(action: &str) -> Arc<AutonomousDecisionMaker> {
    let autonomy = Arc::new(AutonomousDecisionMaker::new("ana", &AutonomyConfig::default()));
    for _ in 0..20 {
        autonomy.record_execution(action, true, true, false, None);
    }
    autonomy
}

#[test]
fn trusted_action_runs_without_waiting() {
    let autonomy = trusted("send_message");
    let executor = executor(succeeding(&["send_message"])).with_autonomy(Arc::clone(&autonomy), 0.5);

    let mut plan = Plan::new("ping", vec![PlanStep::new("m", "send_message", "ping")]);
    let advance = executor.start(&mut plan).unwrap();

    assert_eq!(advance.state, ExecutionState::Finished(PlanStatus::Completed));
    assert!(!kinds(&advance.events).contains(&EventKind::ConfirmationNeeded));
    let history = autonomy.history("send_message").unwrap();
    assert_eq!(history.total_attempts, 21);
    assert_eq!(history.user_approved, 20);
}

#[test]
fn explicit_step_flag_is_never_waived_by_autonomy() {
    let autonomy = trusted("send_message");
    let executor = executor(succeeding(&["send_message"])).with_autonomy(autonomy, 1.0);

    let mut plan = Plan::new(
        "ping",
        vec![PlanStep::new("m", "send_message", "ping").confirm_first()],
    );
    let advance = executor.start(&mut plan).unwrap();

    assert!(advance.pending_confirmation().is_some());
}

#[test]
fn rejection_is_recorded_against_trust() {
    let autonomy = Arc::new(AutonomousDecisionMaker::new("ana", &AutonomyConfig::default()));
    let executor = executor(succeeding(&["send_email"])).with_autonomy(Arc::clone(&autonomy), 0.5);

    let mut plan = Plan::new("mail", vec![PlanStep::new("mail", "send_email", "email")]);
    executor.start(&mut plan).unwrap();
    executor.resume(&mut plan, Some(false)).unwrap();

    let history = autonomy.history("send_email").unwrap();
    assert_eq!(history.total_attempts, 1);
    assert_eq!(history.successful_attempts, 0);
    assert_eq!(history.user_rejected, 1);
}

#[test]
fn ready_plan_is_validated_before_it_runs() {
    let (search, calls) = ScriptedTool::new("search_web", Script::Succeed);
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(search));

    let mut plan = Plan::new(
        "look then vanish",
        vec![
            PlanStep::new("a", "search_web", "search"),
            PlanStep::new("b", "teleport", "nope"),
        ],
    );
    plan.status = PlanStatus::Ready;

    let err = executor(registry).start(&mut plan).unwrap_err();

    let PlanError::Validation(problems) = err else {
        panic!("expected validation error, got {err}");
    };
    assert!(problems.iter().any(|p| p.contains("teleport")));
    assert_eq!(plan.status, PlanStatus::Ready);
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_tool_fails_its_step_and_the_plan_settles() {
    let mut registry = succeeding(&["take_screenshot"]);
    let (boom, calls) = ScriptedTool::new("render_chart", Script::Panic("tool blew up"));
    registry.register(Box::new(boom));
    let feedback = Arc::new(FailureFeedbackAnalyzer::default());

    let mut plan = Plan::new(
        "chart then capture",
        vec![
            PlanStep::new("chart", "render_chart", "draw"),
            PlanStep::new("after", "take_screenshot", "capture").depends_on(&["chart"]),
            PlanStep::new("other", "take_screenshot", "capture anyway"),
        ],
    );
    let advance = executor(registry)
        .with_feedback(Arc::clone(&feedback))
        .start(&mut plan)
        .unwrap();

    assert_eq!(advance.state, ExecutionState::Finished(PlanStatus::Failed));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(plan.steps[0].status, StepStatus::Failed);
    assert!(plan.steps[0].error.as_deref().unwrap().contains("tool blew up"));
    assert_eq!(plan.steps[1].status, StepStatus::Skipped);
    assert_eq!(plan.steps[2].status, StepStatus::Completed);
    assert_eq!(feedback.failure_patterns("render_chart").len(), 1);
}

#[test]
fn daily_quota_of_one_critical_action_leaves_others_untouched() {
    let autonomy = Arc::new(AutonomousDecisionMaker::new("ana", &AutonomyConfig::default()));
    for action in ["make_payment", "system_restart"] {
        for _ in 0..5 {
            autonomy.record_execution(action, true, true, false, None);
        }
    }
    let executor = executor(succeeding(&["make_payment", "system_restart"]))
        .with_autonomy(Arc::clone(&autonomy), 1.0);

    let mut plan = Plan::new(
        "pay four times then restart",
        vec![
            PlanStep::new("pay1", "make_payment", "pay"),
            PlanStep::new("pay2", "make_payment", "pay"),
            PlanStep::new("pay3", "make_payment", "pay"),
            PlanStep::new("pay4", "make_payment", "pay"),
            PlanStep::new("restart", "system_restart", "restart"),
        ],
    );

    let advance = executor.start(&mut plan).unwrap();
    let request = advance.pending_confirmation().unwrap();
    assert_eq!(request.step_id, "pay4");
    assert_eq!(request.risk_level, RiskLevel::Critical);
    assert!(plan.steps[..3].iter().all(|s| s.status == StepStatus::Completed));

    let advance = executor.resume(&mut plan, Some(true)).unwrap();

    assert_eq!(advance.state, ExecutionState::Finished(PlanStatus::Completed));
    assert!(!kinds(&advance.events).contains(&EventKind::ConfirmationNeeded));
    assert_eq!(plan.steps[4].status, StepStatus::Completed);
}
