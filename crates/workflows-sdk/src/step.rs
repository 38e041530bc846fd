//! The step contract.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::TransactionId;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::container::Container;
use crate::error::StepError;

/// Per-step retry policy for forward actions.
///
/// Retries apply to the failing step only; the rest of the workflow is not
/// re-run. Compensation is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Factor applied to the delay after each retry.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Up to `max_attempts` attempts with no delay between them.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::none()
        }
    }

    /// Sets a fixed delay between attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self.max_backoff = self.max_backoff.max(backoff);
        self
    }

    /// Grows the delay geometrically, capped at `max_backoff`.
    pub fn with_exponential_backoff(
        mut self,
        initial: Duration,
        multiplier: f64,
        max_backoff: Duration,
    ) -> Self {
        self.initial_backoff = initial;
        self.backoff_multiplier = multiplier;
        self.max_backoff = max_backoff;
        self
    }

    /// Returns the effective number of attempts.
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns the delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let delay = Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX);
        delay.min(self.max_backoff.max(self.initial_backoff))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// What a forward action returns.
///
/// The output is what downstream steps see; the compensation input is what
/// the step's own compensation receives if the workflow later fails. A
/// withheld compensation input reaches compensation as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResponse<O, C = O> {
    output: O,
    compensation_input: Option<C>,
}

impl<O: Clone> StepResponse<O, O> {
    /// Uses the output as the compensation input too.
    pub fn new(output: O) -> Self {
        Self {
            compensation_input: Some(output.clone()),
            output,
        }
    }
}

impl<O, C> StepResponse<O, C> {
    /// Saves a compensation input distinct from the output.
    pub fn with_compensation(output: O, compensation_input: C) -> Self {
        Self {
            output,
            compensation_input: Some(compensation_input),
        }
    }

    /// Withholds the compensation input, signalling nothing to undo.
    pub fn without_compensation(output: O) -> Self {
        Self {
            output,
            compensation_input: None,
        }
    }

    /// Returns the output.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Returns the compensation input, if any.
    pub fn compensation_input(&self) -> Option<&C> {
        self.compensation_input.as_ref()
    }

    /// Splits the response into output and compensation input.
    pub fn into_parts(self) -> (O, Option<C>) {
        (self.output, self.compensation_input)
    }
}

/// What a step sees of the execution it runs in.
#[derive(Debug, Clone)]
pub struct StepContext {
    transaction_id: TransactionId,
    workflow_id: Arc<str>,
    step_id: String,
    attempt: u32,
    container: Container,
}

impl StepContext {
    pub(crate) fn new(
        transaction_id: TransactionId,
        workflow_id: Arc<str>,
        step_id: impl Into<String>,
        container: Container,
    ) -> Self {
        Self {
            transaction_id,
            workflow_id,
            step_id: step_id.into(),
            attempt: 1,
            container,
        }
    }

    pub(crate) fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            ..self.clone()
        }
    }

    /// Returns the execution id.
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Returns the workflow id.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Returns the step's node name within the workflow.
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Returns the current attempt, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the service container.
    pub fn container(&self) -> &Container {
        &self.container
    }
}

/// A unit of work with an optional undo.
///
/// `invoke` receives the fully resolved input for this step. `compensate`
/// receives exactly the compensation input saved by `invoke`, or `None` when
/// it was withheld; it must treat `None` (or an empty input) as nothing to
/// undo and return `Ok(())`.
#[async_trait]
pub trait Step: Send + Sync + 'static {
    /// Resolved input.
    type Input: DeserializeOwned + Send;

    /// Value exposed to downstream steps.
    type Output: Serialize + Send;

    /// Value saved for compensation.
    type CompensationInput: Serialize + DeserializeOwned + Send;

    /// Unique id within the step registry.
    fn id(&self) -> &str;

    /// Runs the forward action.
    async fn invoke(
        &self,
        input: Self::Input,
        ctx: &StepContext,
    ) -> Result<StepResponse<Self::Output, Self::CompensationInput>, StepError>;

    /// Returns true if this step overrides [`compensate`](Self::compensate).
    fn has_compensation(&self) -> bool {
        false
    }

    /// Undoes the forward action.
    async fn compensate(
        &self,
        input: Option<Self::CompensationInput>,
        ctx: &StepContext,
    ) -> Result<(), StepError> {
        let _ = (input, ctx);
        Ok(())
    }

    /// The step's own retry policy; `None` defers to the orchestrator default.
    fn retry_policy(&self) -> Option<RetryPolicy> {
        None
    }
}

type ForwardFn = Arc<
    dyn Fn(Value, StepContext) -> BoxFuture<'static, Result<StepResponse<Value>, StepError>>
        + Send
        + Sync,
>;

type CompensateFn = Arc<
    dyn Fn(Option<Value>, StepContext) -> BoxFuture<'static, Result<(), StepError>> + Send + Sync,
>;

/// A step defined from closures over JSON values.
///
/// ```
/// use workflows_sdk::{FnStep, StepResponse};
///
/// let step = FnStep::new("double", |input, _ctx| async move {
///     let n = input.as_i64().unwrap_or_default();
///     Ok(StepResponse::new(serde_json::json!(n * 2)))
/// });
/// ```
#[derive(Clone)]
pub struct FnStep {
    id: String,
    forward: ForwardFn,
    compensate: Option<CompensateFn>,
    retry: Option<RetryPolicy>,
}

impl FnStep {
    /// Defines a step from its forward action.
    pub fn new<F, Fut>(id: impl Into<String>, forward: F) -> Self
    where
        F: Fn(Value, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepResponse<Value>, StepError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            forward: Arc::new(move |input: Value, ctx: StepContext| forward(input, ctx).boxed()),
            compensate: None,
            retry: None,
        }
    }

    /// Adds a compensation action.
    pub fn with_compensation<F, Fut>(mut self, compensate: F) -> Self
    where
        F: Fn(Option<Value>, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        self.compensate = Some(Arc::new(move |input: Option<Value>, ctx: StepContext| {
            compensate(input, ctx).boxed()
        }));
        self
    }

    /// Sets the step's retry policy.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

impl std::fmt::Debug for FnStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep")
            .field("id", &self.id)
            .field("has_compensation", &self.compensate.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

#[async_trait]
impl Step for FnStep {
    type Input = Value;
    type Output = Value;
    type CompensationInput = Value;

    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        input: Value,
        ctx: &StepContext,
    ) -> Result<StepResponse<Value>, StepError> {
        (self.forward)(input, ctx.clone()).await
    }

    fn has_compensation(&self) -> bool {
        self.compensate.is_some()
    }

    async fn compensate(&self, input: Option<Value>, ctx: &StepContext) -> Result<(), StepError> {
        match &self.compensate {
            Some(compensate) => compensate(input, ctx.clone()).await,
            None => Ok(()),
        }
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry
    }
}
