//! Type-erased steps that speak JSON to the orchestrator.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StepError;
use crate::step::{RetryPolicy, Step, StepContext};

/// A forward result reduced to JSON.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StepOutcome {
    pub(crate) output: Value,
    pub(crate) compensation_input: Option<Value>,
}

/// A step with its typed input and outputs erased to JSON, so steps of
/// different types can live in one registry and one graph.
#[async_trait]
pub(crate) trait ErasedStep: Send + Sync {
    fn id(&self) -> &str;

    fn has_compensation(&self) -> bool;

    fn retry_policy(&self) -> Option<RetryPolicy>;

    async fn invoke_erased(&self, input: Value, ctx: &StepContext)
    -> Result<StepOutcome, StepError>;

    async fn compensate_erased(
        &self,
        input: Option<Value>,
        ctx: &StepContext,
    ) -> Result<(), StepError>;
}

pub(crate) struct StepWrapper<S> {
    step: S,
}

impl<S> StepWrapper<S> {
    pub(crate) fn new(step: S) -> Self {
        Self { step }
    }
}

#[async_trait]
impl<S> ErasedStep for StepWrapper<S>
where
    S: Step,
{
    fn id(&self) -> &str {
        self.step.id()
    }

    fn has_compensation(&self) -> bool {
        self.step.has_compensation()
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        self.step.retry_policy()
    }

    async fn invoke_erased(
        &self,
        input: Value,
        ctx: &StepContext,
    ) -> Result<StepOutcome, StepError> {
        let typed_input: S::Input = serde_json::from_value(input).map_err(|e| {
            StepError::new(format!("Invalid input for step '{}': {e}", self.step.id()))
        })?;

        let (output, compensation_input) = self.step.invoke(typed_input, ctx).await?.into_parts();

        Ok(StepOutcome {
            output: serde_json::to_value(output)?,
            compensation_input: compensation_input
                .map(serde_json::to_value)
                .transpose()?,
        })
    }

    async fn compensate_erased(
        &self,
        input: Option<Value>,
        ctx: &StepContext,
    ) -> Result<(), StepError> {
        let typed_input: Option<S::CompensationInput> = input
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                StepError::new(format!(
                    "Invalid compensation input for step '{}': {e}",
                    self.step.id()
                ))
            })?;

        self.step.compensate(typed_input, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::TransactionId;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::container::Container;
    use crate::step::StepResponse;

    #[derive(Debug, Deserialize)]
    struct DeleteInput {
        ids: Vec<String>,
    }

    #[derive(Debug, Serialize)]
    struct Deleted {
        count: usize,
    }

    struct DeleteStep;

    #[async_trait]
    impl Step for DeleteStep {
        type Input = DeleteInput;
        type Output = Deleted;
        type CompensationInput = Vec<String>;

        fn id(&self) -> &str {
            "delete"
        }

        async fn invoke(
            &self,
            input: DeleteInput,
            _ctx: &StepContext,
        ) -> Result<StepResponse<Deleted, Vec<String>>, StepError> {
            Ok(StepResponse::with_compensation(
                Deleted {
                    count: input.ids.len(),
                },
                input.ids,
            ))
        }

        fn has_compensation(&self) -> bool {
            true
        }

        async fn compensate(
            &self,
            input: Option<Vec<String>>,
            _ctx: &StepContext,
        ) -> Result<(), StepError> {
            match input {
                Some(ids) if ids.is_empty() => Err(StepError::new("empty")),
                _ => Ok(()),
            }
        }
    }

    fn ctx() -> StepContext {
        StepContext::new(TransactionId::new(), Arc::from("wf"), "delete", Container::new())
    }

    #[test]
    fn wrapper_delegates_metadata() {
        let wrapper = StepWrapper::new(DeleteStep);
        assert_eq!(wrapper.id(), "delete");
        assert!(wrapper.has_compensation());
        assert!(wrapper.retry_policy().is_none());
    }

    #[tokio::test]
    async fn wrapper_invokes_with_erased_types() {
        let wrapper = StepWrapper::new(DeleteStep);
        let outcome = wrapper
            .invoke_erased(json!({"ids": ["a", "b"]}), &ctx())
            .await
            .unwrap();

        assert_eq!(outcome.output, json!({"count": 2}));
        assert_eq!(outcome.compensation_input, Some(json!(["a", "b"])));
    }

    #[tokio::test]
    async fn wrapper_rejects_mistyped_input() {
        let wrapper = StepWrapper::new(DeleteStep);
        let error = wrapper
            .invoke_erased(json!({"ids": 5}), &ctx())
            .await
            .unwrap_err();

        assert!(error.message().starts_with("Invalid input for step 'delete'"));
    }

    #[tokio::test]
    async fn wrapper_compensates_with_erased_types() {
        let wrapper = StepWrapper::new(DeleteStep);

        assert!(wrapper.compensate_erased(Some(json!(["a"])), &ctx()).await.is_ok());
        assert!(wrapper.compensate_erased(None, &ctx()).await.is_ok());
        assert!(wrapper.compensate_erased(Some(json!([])), &ctx()).await.is_err());
        assert!(wrapper.compensate_erased(Some(json!("x")), &ctx()).await.is_err());
    }
}
