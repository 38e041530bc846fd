//! Outcome of a workflow run.

use common::TransactionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::ExecutionRecord;
use crate::state::TransactionState;

/// Classifies an entry in a run's error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A step's forward action failed after exhausting its retries.
    StepForward,
    /// A step's compensation action failed. Never retried.
    StepCompensation,
    /// The run was cancelled from outside.
    CancellationRequested,
    /// A lazy reference pointed at a step that had not run. Indicates a
    /// defect in the workflow graph.
    UnresolvedDependency,
    /// A transform projector failed.
    Transform,
}

impl FailureKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::StepForward => "step_forward",
            FailureKind::StepCompensation => "step_compensation",
            FailureKind::CancellationRequested => "cancellation_requested",
            FailureKind::UnresolvedDependency => "unresolved_dependency",
            FailureKind::Transform => "transform",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One failure reported by a run.
///
/// `step_id` is absent for failures that do not belong to a step, such as
/// cancellation or a failed transform on the workflow output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub step_id: Option<String>,
    pub kind: FailureKind,
    pub cause: String,
}

impl WorkflowFailure {
    /// Creates a failure attributed to a step.
    pub fn step(step_id: impl Into<String>, kind: FailureKind, cause: impl Into<String>) -> Self {
        Self {
            step_id: Some(step_id.into()),
            kind,
            cause: cause.into(),
        }
    }

    /// Creates a failure not attributed to any step.
    pub fn workflow(kind: FailureKind, cause: impl Into<String>) -> Self {
        Self {
            step_id: None,
            kind,
            cause: cause.into(),
        }
    }

    /// Returns true if this is a compensation failure.
    pub fn is_compensation(&self) -> bool {
        self.kind == FailureKind::StepCompensation
    }
}

impl std::fmt::Display for WorkflowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.step_id {
            Some(step) => write!(f, "[{}] {}: {}", self.kind, step, self.cause),
            None => write!(f, "[{}] {}", self.kind, self.cause),
        }
    }
}

/// The result of one workflow execution.
///
/// A run never rejects on step failures: it resolves with the terminal state,
/// the output if it completed, and every forward and compensation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub transaction_id: TransactionId,
    pub workflow_id: String,
    pub state: TransactionState,
    pub result: Option<Value>,
    pub errors: Vec<WorkflowFailure>,
    pub record: ExecutionRecord,
}

impl WorkflowResult {
    /// Returns true if every step succeeded.
    pub fn is_success(&self) -> bool {
        self.state == TransactionState::Completed
    }

    /// Returns true if the run was cancelled from outside.
    pub fn was_cancelled(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.kind == FailureKind::CancellationRequested)
    }

    /// Returns the failures that stopped forward progress.
    pub fn forward_errors(&self) -> impl Iterator<Item = &WorkflowFailure> {
        self.errors.iter().filter(|e| !e.is_compensation())
    }

    /// Returns the compensation failures.
    pub fn compensation_errors(&self) -> impl Iterator<Item = &WorkflowFailure> {
        self.errors.iter().filter(|e| e.is_compensation())
    }
}
