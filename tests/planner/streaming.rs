use std::sync::Arc;
use std::sync::atomic::Ordering;

use stepgate::config::{ExecutorConfig, GuardrailConfig};
use stepgate::planner::{
    AutoDenyBroker, ChannelConfirmationBroker, ConfirmationBroker, EventKind, ExecutionEvent,
    Plan, PlanStatus, PlanStep, StepStatus, StreamingExecutor,
};
use stepgate::security::{ConfirmationKind, GuardrailEngine};
use stepgate::tools::ToolRegistry;
use tokio::sync::mpsc;

use crate::support::{LatchTool, Script, ScriptedTool, succeeding};

fn streaming(registry: ToolRegistry, broker: Arc<dyn ConfirmationBroker>) -> StreamingExecutor {
    StreamingExecutor::new(
        Arc::new(registry),
        Arc::new(GuardrailEngine::new(&GuardrailConfig::default())),
        broker,
        &ExecutorConfig::default(),
    )
}

async fn next_kind(events: &mut mpsc::Receiver<ExecutionEvent>, kind: EventKind) -> ExecutionEvent {
    loop {
        let event = events.recv().await.expect("event stream ended early");
        if event.kind == kind {
            return event;
        }
    }
}

async fn drain(events: &mut mpsc::Receiver<ExecutionEvent>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Some(event) = events.recv().await {
        kinds.push(event.kind);
    }
    kinds
}

fn three_steps(first_action: &str) -> Plan {
    Plan::new(
        "three in a row",
        vec![
            PlanStep::new("s1", first_action, "first"),
            PlanStep::new("s2", "take_screenshot", "second"),
            PlanStep::new("s3", "take_screenshot", "third"),
        ],
    )
}

#[tokio::test]
async fn runs_plan_to_completion_and_streams_events() {
    let executor = streaming(succeeding(&["take_screenshot"]), Arc::new(AutoDenyBroker));
    let mut run = executor.spawn(three_steps("take_screenshot"));

    let kinds = drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();

    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(kinds.first(), Some(&EventKind::PlanStarted));
    assert_eq!(kinds.last(), Some(&EventKind::PlanCompleted));
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::StepCompleted).count(), 3);
}

#[tokio::test]
async fn cancel_after_first_step_leaves_the_rest_pending() {
    let mut registry = succeeding(&["take_screenshot"]);
    let (latch, release) = LatchTool::new("slow_fetch");
    registry.register(Box::new(latch));
    let executor = streaming(registry, Arc::new(AutoDenyBroker));

    let mut run = executor.spawn(three_steps("slow_fetch"));
    next_kind(&mut run.events, EventKind::StepStarted).await;
    run.handle.pause();
    release.send(()).unwrap();
    next_kind(&mut run.events, EventKind::StepCompleted).await;
    next_kind(&mut run.events, EventKind::PlanPaused).await;
    run.handle.cancel();

    let rest = drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();

    assert_eq!(rest, vec![EventKind::PlanCancelled]);
    assert_eq!(plan.status, PlanStatus::Cancelled);
    assert_eq!(plan.steps[0].status, StepStatus::Completed);
    assert_eq!(plan.steps[1].status, StepStatus::Pending);
    assert_eq!(plan.steps[2].status, StepStatus::Pending);
    assert!(run.handle.is_cancelled());
}

#[tokio::test]
async fn cancel_while_tool_runs_discards_its_result() {
    let mut registry = succeeding(&["take_screenshot"]);
    let (latch, release) = LatchTool::new("slow_fetch");
    registry.register(Box::new(latch));
    let executor = streaming(registry, Arc::new(AutoDenyBroker));

    let mut run = executor.spawn(three_steps("slow_fetch"));
    next_kind(&mut run.events, EventKind::StepStarted).await;
    run.handle.cancel();

    let rest = drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();
    let _ = release.send(());

    assert_eq!(rest, vec![EventKind::StepCancelled, EventKind::PlanCancelled]);
    assert_eq!(plan.steps[0].status, StepStatus::Cancelled);
    assert_eq!(plan.steps[1].status, StepStatus::Pending);
    assert_eq!(plan.status, PlanStatus::Cancelled);
}

#[tokio::test]
async fn pause_holds_the_next_step_until_resumed() {
    let (shot, calls) = ScriptedTool::new("take_screenshot", Script::Succeed);
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(shot));
    let executor = streaming(registry, Arc::new(AutoDenyBroker));

    // The current-thread runtime does not poll the task before the first await.
    let mut run = executor.spawn(three_steps("take_screenshot"));
    run.handle.pause();

    assert_eq!(run.events.recv().await.unwrap().kind, EventKind::PlanStarted);
    let paused = run.events.recv().await.unwrap();
    assert_eq!(paused.kind, EventKind::PlanPaused);
    assert_eq!(paused.data["next_step"], 0);
    assert!(run.handle.is_paused());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    run.handle.resume();
    let rest = drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();

    assert_eq!(rest[0], EventKind::PlanResumed);
    assert_eq!(rest.last(), Some(&EventKind::PlanCompleted));
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn channel_broker_approval_lets_the_step_run() {
    let (broker, mut requests) = ChannelConfirmationBroker::new(4);
    let (email, calls) = ScriptedTool::new("send_email", Script::Succeed);
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(email));
    let executor = streaming(registry, Arc::new(broker));

    let plan = Plan::new(
        "mail bob",
        vec![PlanStep::new("mail", "send_email", "email bob").with_param("to", "bob@example.com")],
    );
    let mut run = executor.spawn(plan);

    let pending = requests.recv().await.unwrap();
    assert_eq!(pending.request.action, "send_email");
    assert_eq!(pending.request.confirmation_type, ConfirmationKind::Detailed);
    assert!(pending.approve());

    let kinds = drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();

    assert!(kinds.contains(&EventKind::ConfirmationNeeded));
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropped_confirmation_counts_as_denial() {
    let (broker, mut requests) = ChannelConfirmationBroker::new(4);
    let executor = streaming(succeeding(&["send_email"]), Arc::new(broker));

    let mut run = executor.spawn(Plan::new("mail", vec![PlanStep::new("m", "send_email", "email")]));
    drop(requests.recv().await.unwrap());

    drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();

    assert_eq!(plan.steps[0].status, StepStatus::Cancelled);
    assert_eq!(plan.status, PlanStatus::Failed);
}

#[tokio::test]
async fn cancel_while_awaiting_confirmation() {
    let (broker, mut requests) = ChannelConfirmationBroker::new(4);
    let executor = streaming(succeeding(&["send_email", "take_screenshot"]), Arc::new(broker));

    let plan = Plan::new(
        "mail then shot",
        vec![
            PlanStep::new("m", "send_email", "email"),
            PlanStep::new("s", "take_screenshot", "capture"),
        ],
    );
    let mut run = executor.spawn(plan);
    let pending = requests.recv().await.unwrap();
    run.handle.cancel();

    drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();

    assert!(!pending.approve());
    assert_eq!(plan.steps[0].status, StepStatus::Cancelled);
    assert_eq!(plan.steps[1].status, StepStatus::Pending);
    assert_eq!(plan.status, PlanStatus::Cancelled);
}

#[tokio::test]
async fn invalid_plan_reports_plan_error_event() {
    let executor = streaming(ToolRegistry::new(), Arc::new(AutoDenyBroker));
    let mut run = executor.spawn(Plan::new("nothing", vec![PlanStep::new("x", "teleport", "go")]));

    let kinds = drain(&mut run.events).await;

    assert_eq!(kinds, vec![EventKind::PlanError]);
    assert!(run.join.await.unwrap().is_err());
}

#[tokio::test]
async fn dropped_event_receiver_does_not_stop_the_run() {
    let executor = streaming(succeeding(&["take_screenshot"]), Arc::new(AutoDenyBroker));
    let run = executor.spawn(three_steps("take_screenshot"));
    drop(run.events);

    let plan = run.join.await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
}

#[tokio::test]
async fn ready_plan_with_unknown_tool_reports_plan_error_event() {
    let executor = streaming(succeeding(&["take_screenshot"]), Arc::new(AutoDenyBroker));
    let mut plan = three_steps("teleport");
    plan.status = PlanStatus::Ready;
    let mut run = executor.spawn(plan);

    let kinds = drain(&mut run.events).await;

    assert_eq!(kinds, vec![EventKind::PlanError]);
    assert!(run.join.await.unwrap().is_err());
}

#[tokio::test]
async fn panicking_tool_fails_its_step_like_an_error() {
    let mut registry = succeeding(&["take_screenshot"]);
    let (boom, calls) = ScriptedTool::new("render_chart", Script::Panic("tool blew up"));
    registry.register(Box::new(boom));
    let executor = streaming(registry, Arc::new(AutoDenyBroker));

    let mut run = executor.spawn(three_steps("render_chart"));
    let failed = next_kind(&mut run.events, EventKind::StepFailed).await;
    drain(&mut run.events).await;
    let plan = run.join.await.unwrap().unwrap();

    assert_eq!(failed.step_id.as_deref(), Some("s1"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(plan.steps[0].error.as_deref().unwrap().contains("tool blew up"));
    assert_eq!(plan.steps[1].status, StepStatus::Completed);
    assert_eq!(plan.status, PlanStatus::Failed);
}
