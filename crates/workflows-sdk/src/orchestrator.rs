//! Transaction orchestrator: runs a compiled workflow graph as a saga.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::TransactionId;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::channel::EventChannel;
use crate::composer::{StepNode, WorkflowDefinition};
use crate::config::OrchestratorConfig;
use crate::container::Container;
use crate::context::{ExecutionContext, StepInvocation, is_truthy};
use crate::erased::{ErasedStep, StepOutcome};
use crate::error::{ResolveError, StepError};
use crate::events::{EventEnvelope, SkipReason, WorkflowEvent};
use crate::record::ExecutionRecord;
use crate::result::{FailureKind, WorkflowFailure, WorkflowResult};
use crate::state::{StepStatus, TransactionState};
use crate::step::{RetryPolicy, StepContext};

/// Executes a workflow definition.
///
/// One orchestrator can run any number of executions, sequentially or
/// concurrently; each run gets its own [`ExecutionContext`] and record.
///
/// Ready steps run concurrently up to `max_concurrency`. A step starts only
/// once every step it depends on has succeeded (or was skipped). When a step
/// fails after exhausting its retries, no further steps are started, in-flight
/// steps are awaited, and every succeeded step is compensated in reverse
/// topological order.
#[derive(Debug, Clone)]
pub struct TransactionOrchestrator {
    definition: Arc<WorkflowDefinition>,
    config: OrchestratorConfig,
    channel: EventChannel,
    container: Container,
}

impl TransactionOrchestrator {
    /// Creates an orchestrator with default configuration and no subscribers.
    pub fn new(definition: Arc<WorkflowDefinition>) -> Self {
        Self {
            definition,
            config: OrchestratorConfig::default(),
            channel: EventChannel::new(),
            container: Container::new(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_channel(mut self, channel: EventChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs the workflow to a terminal state.
    ///
    /// Step failures never surface as `Err`; they are reported in the
    /// returned [`WorkflowResult`].
    pub async fn run(&self, input: Value) -> WorkflowResult {
        self.run_with_cancellation(input, CancellationToken::new())
            .await
    }

    /// Runs the workflow, stopping early if `cancellation` fires.
    ///
    /// Cancellation stops new steps from starting. Steps already in flight
    /// are allowed to finish, then the run compensates as if a step had
    /// failed, reporting a `CancellationRequested` error.
    pub async fn run_with_cancellation(
        &self,
        input: Value,
        cancellation: CancellationToken,
    ) -> WorkflowResult {
        self.execute(TransactionId::new(), input, cancellation)
            .await
    }

    #[tracing::instrument(
        skip_all,
        fields(workflow_id = %self.definition.id(), transaction_id = %transaction_id)
    )]
    async fn execute(
        &self,
        transaction_id: TransactionId,
        input: Value,
        cancellation: CancellationToken,
    ) -> WorkflowResult {
        metrics::counter!("workflow_executions_total").increment(1);
        let started = Instant::now();

        let mut execution = Execution::new(self, transaction_id, input.clone());
        debug_assert!(execution.record.state().can_run());
        execution
            .emit(WorkflowEvent::workflow_started(
                input,
                self.definition
                    .step_names()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            ))
            .await;
        tracing::info!(steps = self.definition.len(), "Workflow started");

        let mut failures = execution.run_forward(&cancellation).await;

        if failures.is_empty() && !execution.has_failed_steps() {
            match execution.context.resolve(&self.definition.output) {
                Ok(output) => {
                    execution
                        .emit(WorkflowEvent::workflow_completed(output))
                        .await;

                    let duration = started.elapsed().as_secs_f64();
                    metrics::histogram!("workflow_duration_seconds").record(duration);
                    metrics::counter!("workflow_completed").increment(1);
                    tracing::info!(duration, "Workflow completed");
                    return execution.finish();
                }
                Err(error) => {
                    failures.push(WorkflowFailure::workflow(
                        resolve_failure_kind(&error),
                        format!("Failed to resolve workflow output: {error}"),
                    ));
                }
            }
        }

        let state = execution.compensate(failures).await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("workflow_duration_seconds").record(duration);
        metrics::counter!("workflow_failed").increment(1);
        tracing::warn!(duration, %state, "Workflow failed");
        execution.finish()
    }
}

/// Result of driving one step's forward action through its retry policy.
struct Attempted {
    result: Result<StepOutcome, StepError>,
    attempts: u32,
}

/// How a ready node was prepared for scheduling.
enum Prepared {
    Run(Value),
    Skip,
}

/// Mutable state of a single run.
struct Execution<'o> {
    orchestrator: &'o TransactionOrchestrator,
    context: ExecutionContext,
    record: ExecutionRecord,
    sequence: u64,
}

impl<'o> Execution<'o> {
    fn new(
        orchestrator: &'o TransactionOrchestrator,
        transaction_id: TransactionId,
        input: Value,
    ) -> Self {
        Self {
            orchestrator,
            context: ExecutionContext::new(
                transaction_id,
                orchestrator.definition.id.clone(),
                input,
                orchestrator.container.clone(),
            ),
            record: ExecutionRecord::default(),
            sequence: 0,
        }
    }

    fn nodes(&self) -> &'o [StepNode] {
        let orchestrator: &'o TransactionOrchestrator = self.orchestrator;
        &orchestrator.definition.nodes
    }

    /// Folds an event into the record and publishes it.
    async fn emit(&mut self, event: WorkflowEvent) {
        self.sequence += 1;
        let envelope = EventEnvelope::new(
            self.context.transaction_id(),
            self.context.workflow_id().to_string(),
            self.sequence,
            event,
        );

        tracing::debug!(
            event_type = envelope.event_type(),
            step_id = envelope.step_id(),
            sequence = envelope.sequence,
            "Workflow event"
        );

        self.record.apply(&envelope);
        self.orchestrator.channel.publish(&envelope).await;
    }

    fn status(&self, name: &str) -> Option<StepStatus> {
        self.record.step_status(name)
    }

    fn has_failed_steps(&self) -> bool {
        self.record
            .steps()
            .iter()
            .any(|step| step.status == StepStatus::Failed)
    }

    fn is_ready(&self, node: &StepNode) -> bool {
        node.dependencies
            .iter()
            .all(|dep| self.status(dep).is_some_and(|s| s.satisfies_dependents()))
    }

    fn step_context(&self, node: &StepNode) -> StepContext {
        StepContext::new(
            self.context.transaction_id(),
            self.context.workflow_id().clone(),
            node.name.clone(),
            self.context.container().clone(),
        )
    }

    fn prepare(&mut self, node: &StepNode) -> Result<Prepared, ResolveError> {
        if let Some(condition) = &node.when
            && !is_truthy(&self.context.resolve(condition)?)
        {
            return Ok(Prepared::Skip);
        }
        Ok(Prepared::Run(self.context.resolve(&node.input)?))
    }

    /// Runs forward actions until every node has settled, a step fails, or
    /// cancellation fires. Returns the failures not tied to a step.
    async fn run_forward(&mut self, cancellation: &CancellationToken) -> Vec<WorkflowFailure> {
        let orchestrator = self.orchestrator;
        let nodes = self.nodes();
        let config = &orchestrator.config;
        let max_concurrency = config.max_concurrency.max(1);

        let mut scheduled = vec![false; nodes.len()];
        let mut in_flight: JoinSet<(usize, Attempted)> = JoinSet::new();
        let mut failures = Vec::new();
        let mut halted = false;

        loop {
            // Cancellation only stops steps from starting. Once every node
            // has been scheduled there is nothing left for it to stop.
            let pending = scheduled.iter().any(|started| !started);
            if !halted && pending && cancellation.is_cancelled() {
                tracing::info!("Cancellation requested; no further steps will start");
                failures.push(WorkflowFailure::workflow(
                    FailureKind::CancellationRequested,
                    "Execution was cancelled",
                ));
                halted = true;
            }

            // Skipped nodes settle immediately and can unblock others, so
            // rescan until a pass makes no such progress.
            let mut rescan = !halted;
            while rescan {
                rescan = false;
                for (index, node) in nodes.iter().enumerate() {
                    if halted || in_flight.len() >= max_concurrency {
                        break;
                    }
                    if scheduled[index] || !self.is_ready(node) {
                        continue;
                    }
                    scheduled[index] = true;

                    match self.prepare(node) {
                        Ok(Prepared::Run(input)) => {
                            self.emit(WorkflowEvent::step_started(&node.name)).await;
                            let policy = node
                                .retry_policy()
                                .unwrap_or(config.default_retry);
                            let timeout = node.timeout.or(config.default_step_timeout);
                            let task = invoke_with_retry(
                                node.step.clone(),
                                input,
                                self.step_context(node),
                                policy,
                                timeout,
                                cancellation.clone(),
                            );
                            in_flight.spawn(async move { (index, task.await) });
                        }
                        Ok(Prepared::Skip) => {
                            self.context.record(
                                &node.name,
                                StepInvocation {
                                    output: Value::Null,
                                    compensation_input: None,
                                },
                            );
                            self.emit(WorkflowEvent::step_skipped(&node.name)).await;
                            rescan = true;
                        }
                        Err(error) => {
                            self.emit(WorkflowEvent::step_started(&node.name)).await;
                            self.emit(WorkflowEvent::step_failed(
                                &node.name,
                                resolve_failure_kind(&error),
                                format!("Failed to resolve input: {error}"),
                                0,
                            ))
                            .await;
                            halted = true;
                        }
                    }
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((index, attempted)) => {
                    let node = &nodes[index];
                    match attempted.result {
                        Ok(outcome) => {
                            self.context.record(
                                &node.name,
                                StepInvocation {
                                    output: outcome.output.clone(),
                                    compensation_input: outcome.compensation_input.clone(),
                                },
                            );
                            self.emit(WorkflowEvent::step_succeeded(
                                &node.name,
                                outcome.output,
                                outcome.compensation_input,
                                attempted.attempts,
                            ))
                            .await;
                        }
                        Err(error) => {
                            tracing::warn!(
                                step_id = %node.name,
                                attempts = attempted.attempts,
                                error = %error,
                                "Step failed"
                            );
                            self.emit(WorkflowEvent::step_failed(
                                &node.name,
                                FailureKind::StepForward,
                                error.message(),
                                attempted.attempts,
                            ))
                            .await;
                            halted = true;
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Step task did not complete");
                    failures.push(WorkflowFailure::workflow(
                        FailureKind::StepForward,
                        format!("Step task did not complete: {error}"),
                    ));
                    halted = true;
                }
            }
        }

        failures
    }

    /// Compensates every succeeded step in reverse topological order and
    /// returns the terminal state.
    #[tracing::instrument(
        skip_all,
        fields(
            workflow_id = %self.context.workflow_id(),
            transaction_id = %self.context.transaction_id()
        )
    )]
    async fn compensate(&mut self, failures: Vec<WorkflowFailure>) -> TransactionState {
        debug_assert!(
            self.record.state().can_compensate(),
            "compensation entered from {}",
            self.record.state()
        );
        self.emit(WorkflowEvent::workflow_compensating(failures)).await;

        for node in self.nodes().iter().rev() {
            if self.status(&node.name) != Some(StepStatus::Succeeded) {
                continue;
            }

            if !node.step.has_compensation() {
                self.emit(WorkflowEvent::step_compensation_skipped(
                    &node.name,
                    SkipReason::NoCompensation,
                ))
                .await;
                continue;
            }

            let input = self
                .context
                .invocation(&node.name)
                .and_then(|invocation| invocation.compensation_input.clone());
            let withheld = input.is_none();

            self.emit(WorkflowEvent::step_compensating(&node.name)).await;
            metrics::counter!("workflow_compensations_total").increment(1);

            let ctx = self.step_context(node);
            let result = settle(
                AssertUnwindSafe(node.step.compensate_erased(input, &ctx))
                    .catch_unwind()
                    .await,
            );

            match result {
                Ok(()) if withheld => {
                    self.emit(WorkflowEvent::step_compensation_skipped(
                        &node.name,
                        SkipReason::InputWithheld,
                    ))
                    .await;
                }
                Ok(()) => {
                    self.emit(WorkflowEvent::step_compensated(&node.name)).await;
                }
                Err(error) => {
                    metrics::counter!("workflow_compensation_failures_total").increment(1);
                    tracing::warn!(step_id = %node.name, error = %error, "Compensation failed");
                    self.emit(WorkflowEvent::step_compensation_failed(
                        &node.name,
                        error.message(),
                    ))
                    .await;
                }
            }
        }

        let state = if self
            .record
            .steps()
            .iter()
            .any(|step| step.status == StepStatus::CompensationFailed)
        {
            TransactionState::CompensationFailed
        } else {
            TransactionState::Compensated
        };

        self.emit(WorkflowEvent::workflow_failed(state)).await;
        state
    }

    fn finish(self) -> WorkflowResult {
        let record = self.record;
        WorkflowResult {
            transaction_id: self.context.transaction_id(),
            workflow_id: record.workflow_id().to_string(),
            state: record.state(),
            result: record.output().cloned(),
            errors: record.errors().to_vec(),
            record,
        }
    }
}

/// Drives one forward action through its retry policy.
///
/// Each attempt is bounded by `timeout` and isolated from panics. Retries
/// stop early once `cancellation` fires.
async fn invoke_with_retry(
    step: Arc<dyn ErasedStep>,
    input: Value,
    ctx: StepContext,
    policy: RetryPolicy,
    timeout: Option<Duration>,
    cancellation: CancellationToken,
) -> Attempted {
    let max_attempts = policy.effective_attempts();
    let mut attempt = 1;

    loop {
        let attempt_ctx = ctx.for_attempt(attempt);
        let call = AssertUnwindSafe(step.invoke_erased(input.clone(), &attempt_ctx)).catch_unwind();

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => settle(result),
                Err(_) => Err(StepError::new(format!(
                    "Step '{}' timed out after {}ms",
                    ctx.step_id(),
                    limit.as_millis()
                ))),
            },
            None => settle(call.await),
        };

        match result {
            Ok(outcome) => {
                return Attempted {
                    result: Ok(outcome),
                    attempts: attempt,
                };
            }
            Err(error) if attempt < max_attempts && !cancellation.is_cancelled() => {
                metrics::counter!("workflow_step_retries_total").increment(1);
                tracing::warn!(
                    step_id = ctx.step_id(),
                    attempt,
                    max_attempts,
                    error = %error,
                    "Step attempt failed, retrying"
                );

                let delay = policy.delay_after(attempt);
                if !delay.is_zero() {
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancellation.cancelled() => {
                            return Attempted { result: Err(error), attempts: attempt };
                        }
                    }
                }
                attempt += 1;
            }
            Err(error) => {
                return Attempted {
                    result: Err(error),
                    attempts: attempt,
                };
            }
        }
    }
}

fn settle<T>(
    result: Result<Result<T, StepError>, Box<dyn Any + Send>>,
) -> Result<T, StepError> {
    result.unwrap_or_else(|payload| {
        Err(StepError::new(format!(
            "Step panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn resolve_failure_kind(error: &ResolveError) -> FailureKind {
    match error {
        ResolveError::UnresolvedDependency(_) => FailureKind::UnresolvedDependency,
        ResolveError::Transform(_) => FailureKind::Transform,
    }
}
