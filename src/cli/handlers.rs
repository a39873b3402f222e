use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use stepgate::Config;
use stepgate::feedback::FailureFeedbackAnalyzer;
use stepgate::observability::create_observer;
use stepgate::planner::{
    Advance, ConfirmationRequest, EventKind, ExecutionEvent, ExecutionState, JsonFilePlanStore, Plan,
    PlanExecutor, PlanGenerator, PlanParser, PlanStore,
};
use stepgate::security::{
    AutonomyService, CheckContext, GuardrailEngine, SafetyCheck, validate_confirmation,
};
use stepgate::tools::{DryRunTool, ToolParams, ToolRegistry};

/// Parse `key=value` pairs. Values that are valid JSON keep their type,
/// anything else is taken as a string.
pub fn parse_params(raw: &[String]) -> Result<ToolParams> {
    let mut params = ToolParams::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("parameter '{pair}' is not in key=value form");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("parameter '{pair}' has an empty key");
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

pub fn check(config: &Config, action: &str, raw_params: &[String], confirmed: bool) -> Result<()> {
    let params = parse_params(raw_params)?;
    let engine = GuardrailEngine::new(&config.guardrails);
    let ctx = CheckContext {
        user_confirmed: confirmed,
    };
    let verdict = engine.check_action(action, &params, &ctx);
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

pub async fn plan(goal: &str, output: Option<&Path>) -> Result<()> {
    let generator = PlanGenerator::new(Arc::new(ToolRegistry::new()));
    let plan = generator.create_plan(goal, None).await;
    let json = serde_json::to_string_pretty(&plan)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed writing {}", path.display()))?;
            println!("Wrote plan {} to {}", plan.id, path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Read a plan file: a serialized [`Plan`], or drafter-style JSON.
pub fn load_plan_file(path: &Path) -> Result<Plan> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading plan file {}", path.display()))?;
    if let Ok(plan) = serde_json::from_str::<Plan>(&raw) {
        return Ok(plan);
    }
    let goal = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PlanParser::parse(&raw, &goal)?)
}

pub fn validate(path: &Path) -> Result<()> {
    let plan = load_plan_file(path)?;
    let problems = plan.structural_errors();
    if problems.is_empty() {
        println!(
            "{} plan {} ({} steps)",
            style("valid").green().bold(),
            plan.id,
            plan.steps.len()
        );
        return Ok(());
    }
    for problem in &problems {
        println!("{} {problem}", style("error:").red().bold());
    }
    bail!("{} problem(s) found", problems.len());
}

/// A dry-run tool for every action the plan uses.
fn dry_run_registry(plan: &Plan) -> ToolRegistry {
    let actions: BTreeSet<&str> = plan.steps.iter().map(|s| s.action.as_str()).collect();
    let mut registry = ToolRegistry::new();
    for action in actions {
        registry.register(Box::new(DryRunTool::new(action, format!("dry run of {action}"))));
    }
    registry
}

fn ask(request: &ConfirmationRequest) -> Result<bool> {
    let mut check = SafetyCheck::allow(request.risk_level);
    check.require(request.confirmation_type);
    let response: String = Input::new()
        .with_prompt(format!("  {}", request.prompt))
        .allow_empty(true)
        .interact_text()?;
    Ok(validate_confirmation(&response, &request.action, &check))
}

fn print_events(events: &[ExecutionEvent]) {
    for event in events {
        let tag = match event.kind {
            EventKind::StepCompleted | EventKind::PlanCompleted => style("ok").green(),
            EventKind::StepFailed | EventKind::PlanError => style("fail").red(),
            EventKind::StepSkipped | EventKind::StepCancelled | EventKind::PlanCancelled => {
                style("skip").yellow()
            }
            EventKind::ConfirmationNeeded => style("ask").cyan(),
            _ => style("..").dim(),
        };
        match &event.step_id {
            Some(step_id) => println!("[{tag}] {step_id}: {}", event.message),
            None => println!("[{tag}] {}", event.message),
        }
    }
}

fn executor_for(config: &Config, plan: &Plan) -> PlanExecutor {
    let registry = Arc::new(dry_run_registry(plan));
    let guardrails = Arc::new(GuardrailEngine::new(&config.guardrails));
    let autonomy = AutonomyService::new(config.autonomy.clone());
    PlanExecutor::new(registry, guardrails)
        .with_feedback(Arc::new(FailureFeedbackAnalyzer::new(config.feedback.clone())))
        .with_autonomy(
            autonomy.for_user(&config.executor.default_user_id),
            config.autonomy.default_context_confidence,
        )
        .with_observer(create_observer(&config.observability))
}

pub fn run(config: &Config, path: &Path, yes: bool) -> Result<()> {
    let mut plan = load_plan_file(path)?;
    let executor = executor_for(config, &plan);
    let advance = executor.start(&mut plan)?;
    drive(&executor, &JsonFilePlanStore::new(&config.state_dir), &mut plan, advance, yes)
}

/// Pick up a snapshot saved while `run` was waiting for a confirmation.
pub fn resume(config: &Config, plan_id: &str, yes: bool) -> Result<()> {
    let store = JsonFilePlanStore::new(&config.state_dir);
    let mut plan = store.load_plan(plan_id)?;
    let executor = executor_for(config, &plan);
    let Some(request) = executor.pending_confirmation(&plan) else {
        bail!("plan {plan_id} is {} and not waiting for a confirmation", plan.status);
    };
    println!("Resuming plan {plan_id} at step {}", request.step_id);
    let approved = yes || ask(&request)?;
    let advance = executor.resume(&mut plan, Some(approved))?;
    drive(&executor, &store, &mut plan, advance, yes)
}

fn drive(
    executor: &PlanExecutor,
    store: &JsonFilePlanStore,
    plan: &mut Plan,
    mut advance: Advance,
    yes: bool,
) -> Result<()> {
    loop {
        print_events(&advance.events);
        match advance.state {
            ExecutionState::Finished(status) => {
                store.save_plan(plan)?;
                println!("Plan {} finished: {status}", plan.id);
                return Ok(());
            }
            ExecutionState::WaitingConfirmation(request) => {
                store.save_plan(plan)?;
                let approved = yes || ask(&request)?;
                advance = executor.resume(plan, Some(approved))?;
            }
        }
    }
}

pub fn snapshots(config: &Config) -> Result<()> {
    let store = JsonFilePlanStore::new(&config.state_dir);
    let ids = store.list()?;
    if ids.is_empty() {
        println!("No snapshots in {}", store.dir().display());
        return Ok(());
    }
    for id in ids {
        let plan = store.load_plan(&id)?;
        println!("{id}  {}  {}", plan.status, plan.goal);
    }
    Ok(())
}
