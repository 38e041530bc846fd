//! Engine error types.

use common::TransactionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced by a step's forward or compensation action.
///
/// Step errors are recorded in the execution record, so they carry a
/// rendered message rather than the original error value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StepError {
    message: String,
}

impl StepError {
    /// Creates a step error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a step error from any error, flattening its source chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { message }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for StepError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(format!("Serialization error: {error}"))
    }
}

impl From<ContainerError> for StepError {
    fn from(error: ContainerError) -> Self {
        Self::from_error(&error)
    }
}

/// Errors raised while populating a [`Registry`](crate::Registry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A step with this id is already registered.
    #[error("Step '{0}' is already registered")]
    DuplicateStepId(String),

    /// A workflow with this id is already defined.
    #[error("Workflow '{0}' is already defined")]
    DuplicateWorkflowId(String),

    /// No step with this id has been registered.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// No workflow with this id has been defined.
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    /// The workflow's composer rejected its own graph.
    #[error("Workflow '{workflow_id}' could not be defined: {source}")]
    Definition {
        workflow_id: String,
        #[source]
        source: DefinitionError,
    },
}

/// Errors raised while a composer builds a workflow graph.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The composer invoked a step that is not registered.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// Two invocations in one workflow share a node name.
    #[error("Step '{0}' is invoked more than once; give one invocation a distinct name")]
    DuplicateNodeName(String),

    /// A node consumes the output of a step that is not part of this graph
    /// (or has not been invoked yet).
    #[error("'{consumer}' depends on step '{producer}', which is not in this workflow graph")]
    UnresolvedDependency { consumer: String, producer: String },
}

/// A pure transform projector failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransformError(String);

impl TransformError {
    /// Creates a transform error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(error: serde_json::Error) -> Self {
        Self(error.to_string())
    }
}

/// Errors raised while resolving a lazy value against an execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The referenced step has not produced output in this execution.
    ///
    /// This indicates a defect in graph ordering, never a transient failure.
    #[error("Step '{0}' has not produced an output in this execution")]
    UnresolvedDependency(String),

    /// A transform projector failed.
    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),
}

/// Errors raised by the service container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// Nothing is registered under the key.
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// A service exists under the key but has a different type.
    #[error("Service '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// An event subscriber failed to handle an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SubscriberError(String);

impl SubscriberError {
    /// Creates a subscriber error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised by an [`ExecutionStore`](crate::ExecutionStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// An event arrived out of sequence for its transaction.
    #[error(
        "Sequence conflict for transaction {transaction_id}: expected {expected}, found {actual}"
    )]
    SequenceConflict {
        transaction_id: TransactionId,
        expected: u64,
        actual: u64,
    },
}

/// Top-level error for the workflow engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Registration failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Graph construction failed.
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Lazy value resolution failed.
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Service lookup failed.
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Execution store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn step_error_flattens_source_chain() {
        let error = StepError::from_error(&Outer(Inner));
        assert_eq!(error.message(), "outer: inner");
    }

    #[test]
    fn step_error_from_container_error() {
        let error: StepError = ContainerError::ServiceNotFound("store".into()).into();
        assert_eq!(error.message(), "Service not found: store");
    }

    #[test]
    fn top_level_error_wraps_module_errors() {
        let error: Error = RegistryError::DuplicateStepId("emit-event".into()).into();
        assert!(matches!(
            error,
            Error::Registry(RegistryError::DuplicateStepId(_))
        ));
        assert_eq!(
            error.to_string(),
            "Registry error: Step 'emit-event' is already registered"
        );

        let error: Error = ResolveError::UnresolvedDependency("a".into()).into();
        assert!(matches!(error, Error::Resolve(_)));
    }

    #[test]
    fn registry_error_display() {
        let error = RegistryError::DuplicateStepId("delete-stores".into());
        assert_eq!(error.to_string(), "Step 'delete-stores' is already registered");
    }

    #[test]
    fn step_error_serialization_roundtrip() {
        let error = StepError::new("boom");
        let json = serde_json::to_string(&error).unwrap();
        let back: StepError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, back);
    }
}
