use super::broker::ConfirmationBroker;
use super::events::{EventKind, ExecutionEvent};
use super::runner::{Approval, Prepared, StepRunner};
use super::types::{Plan, PlanStatus};
use crate::config::ExecutorConfig;
use crate::error::PlanError;
use crate::feedback::FailureFeedbackAnalyzer;
use crate::observability::Observer;
use crate::security::{AutonomousDecisionMaker, GuardrailEngine};
use crate::tools::{ToolOutcome, ToolRegistry};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pause, resume and cancel controls for one streaming run.
///
/// Clones share the same run.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    paused: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
}

impl Default for ExecutionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionHandle {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            paused: Arc::new(paused),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop before the next step. A step already running finishes.
    pub fn pause(&self) {
        if !self.cancel.is_cancelled() {
            self.paused.send_replace(true);
        }
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Cancel at the next step boundary. Also opens the gate so a paused run
    /// notices.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn wait_until_open(&self) {
        let mut rx = self.paused.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// A plan running on its own task.
pub struct StreamingRun {
    pub handle: ExecutionHandle,
    pub events: mpsc::Receiver<ExecutionEvent>,
    /// Resolves to the plan in its final state.
    pub join: JoinHandle<Result<Plan, PlanError>>,
}

/// Async executor with pause, resume and cancel.
///
/// Tool calls run on the blocking pool, at most `worker_pool_size` at a time
/// across every run sharing the same semaphore.
#[derive(Clone)]
pub struct StreamingExecutor {
    registry: Arc<ToolRegistry>,
    runner: StepRunner,
    broker: Arc<dyn ConfirmationBroker>,
    workers: Arc<Semaphore>,
    event_buffer: usize,
}

impl StreamingExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        guardrails: Arc<GuardrailEngine>,
        broker: Arc<dyn ConfirmationBroker>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            runner: StepRunner::new(guardrails),
            broker,
            workers: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
            event_buffer: config.event_buffer.max(1),
        }
    }

    /// Share a worker pool with other executors.
    #[must_use]
    pub fn with_workers(mut self, workers: Arc<Semaphore>) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_feedback(mut self, feedback: Arc<FailureFeedbackAnalyzer>) -> Self {
        self.runner.set_feedback(feedback);
        self
    }

    #[must_use]
    pub fn with_autonomy(
        mut self,
        autonomy: Arc<AutonomousDecisionMaker>,
        context_confidence: f64,
    ) -> Self {
        self.runner.set_autonomy(autonomy, context_confidence);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.runner.set_observer(observer);
        self
    }

    pub fn workers(&self) -> Arc<Semaphore> {
        Arc::clone(&self.workers)
    }

    /// Run `plan` on a new task. Must be called inside a tokio runtime.
    pub fn spawn(&self, mut plan: Plan) -> StreamingRun {
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let handle = ExecutionHandle::new();
        let executor = self.clone();
        let run_handle = handle.clone();
        let join = tokio::spawn(async move {
            executor.execute(&mut plan, &run_handle, &tx).await?;
            Ok::<Plan, PlanError>(plan)
        });
        StreamingRun {
            handle,
            events: rx,
            join,
        }
    }

    /// Drive `plan` to a terminal state, sending events as they happen.
    ///
    /// Events are dropped silently once the receiver is gone; the run goes on.
    pub async fn execute(
        &self,
        plan: &mut Plan,
        handle: &ExecutionHandle,
        events: &mpsc::Sender<ExecutionEvent>,
    ) -> Result<PlanStatus, PlanError> {
        let mut batch = Vec::new();
        if let Err(e) = self.runner.begin(plan, &self.registry, &mut batch) {
            emit(
                events,
                vec![ExecutionEvent::plan(EventKind::PlanError, &plan.id, e.to_string())],
            )
            .await;
            return Err(e);
        }
        emit(events, batch).await;

        while plan.current_step < plan.steps.len() {
            if !self.wait_gate(plan, handle, events).await? {
                return self.cancel_run(plan, events).await;
            }

            let index = plan.current_step;
            let mut batch = Vec::new();
            let approval = match self.runner.prepare(plan, index, &mut batch)? {
                Prepared::Settled => None,
                Prepared::Run(approval) => Some(approval),
                Prepared::Confirm(request) => {
                    emit(events, std::mem::take(&mut batch)).await;
                    let decision = tokio::select! {
                        biased;
                        () = handle.cancelled() => None,
                        answer = self.broker.request_confirmation(&request) => Some(answer),
                    };
                    let approved = match decision {
                        None => {
                            self.runner.discard(
                                plan,
                                index,
                                "plan cancelled while awaiting confirmation",
                                &mut batch,
                            )?;
                            emit(events, batch).await;
                            return self.cancel_run(plan, events).await;
                        }
                        Some(Ok(approved)) => approved,
                        Some(Err(e)) => {
                            warn!(plan_id = %plan.id, step_id = %request.step_id, error = %e, "confirmation broker failed; treating as rejection");
                            false
                        }
                    };
                    self.runner
                        .resolve_confirmation(plan, index, approved, &mut batch)?
                }
            };
            emit(events, std::mem::take(&mut batch)).await;

            if let Some(approval) = approval
                && !self.run_step(plan, index, approval, handle, &mut batch).await?
            {
                emit(events, batch).await;
                return self.cancel_run(plan, events).await;
            }
            emit(events, batch).await;
            plan.current_step += 1;
        }

        let mut batch = Vec::new();
        let status = self.runner.finish(plan, &mut batch)?;
        emit(events, batch).await;
        Ok(status)
    }

    /// Run the tool for step `index`. Returns false when the run was cancelled
    /// before the result arrived; the step is then marked cancelled.
    async fn run_step(
        &self,
        plan: &mut Plan,
        index: usize,
        approval: Approval,
        handle: &ExecutionHandle,
        batch: &mut Vec<ExecutionEvent>,
    ) -> Result<bool, PlanError> {
        let step = &plan.steps[index];
        let call = self.invoke(step.action.clone(), step.parameters.clone());
        let result = tokio::select! {
            biased;
            () = handle.cancelled() => None,
            result = call => Some(result),
        };

        match result {
            Some(result) if !handle.is_cancelled() => {
                self.runner.settle(plan, index, result, approval, batch)?;
                Ok(true)
            }
            _ => {
                debug!(plan_id = %plan.id, step_id = %plan.steps[index].id, "discarding in-flight result");
                self.runner
                    .discard(plan, index, "plan cancelled while the step was running", batch)?;
                Ok(false)
            }
        }
    }

    async fn invoke(
        &self,
        action: String,
        params: crate::tools::ToolParams,
    ) -> anyhow::Result<ToolOutcome> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .context("worker pool closed")?;
        let registry = Arc::clone(&self.registry);
        let name = action.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            registry.invoke(&name, &params)
        })
        .await
        .with_context(|| format!("tool '{action}' did not finish"))?
    }

    /// Block while paused. Returns false when the run was cancelled.
    async fn wait_gate(
        &self,
        plan: &mut Plan,
        handle: &ExecutionHandle,
        events: &mpsc::Sender<ExecutionEvent>,
    ) -> Result<bool, PlanError> {
        if handle.is_cancelled() {
            return Ok(false);
        }
        if !handle.is_paused() {
            return Ok(true);
        }

        plan.transition(PlanStatus::Paused)?;
        emit(
            events,
            vec![
                ExecutionEvent::plan(EventKind::PlanPaused, &plan.id, "Plan paused")
                    .with_data("next_step", plan.current_step),
            ],
        )
        .await;

        handle.wait_until_open().await;
        if handle.is_cancelled() {
            return Ok(false);
        }

        plan.transition(PlanStatus::Executing)?;
        emit(
            events,
            vec![ExecutionEvent::plan(EventKind::PlanResumed, &plan.id, "Plan resumed")],
        )
        .await;
        Ok(true)
    }

    async fn cancel_run(
        &self,
        plan: &mut Plan,
        events: &mpsc::Sender<ExecutionEvent>,
    ) -> Result<PlanStatus, PlanError> {
        let mut batch = Vec::new();
        let status = self.runner.abort(plan, &mut batch)?;
        emit(events, batch).await;
        Ok(status)
    }
}

async fn emit(events: &mpsc::Sender<ExecutionEvent>, batch: Vec<ExecutionEvent>) {
    for event in batch {
        if events.send(event).await.is_err() {
            debug!("event receiver dropped");
            return;
        }
    }
}
