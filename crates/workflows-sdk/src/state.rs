//! Transaction and step state machines.

use serde::{Deserialize, Serialize};

/// The state of a workflow execution in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Running ──┬──► Completed
///                       └──► Compensating ──┬──► Compensated
///                                           └──► CompensationFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// Execution has not started yet.
    #[default]
    Pending,

    /// Steps are being executed.
    Running,

    /// A step failed (or the run was cancelled) and compensation is in progress.
    Compensating,

    /// All steps succeeded (terminal state).
    Completed,

    /// Forward progress failed and every compensation succeeded (terminal state).
    Compensated,

    /// Forward progress failed and at least one compensation failed too (terminal state).
    CompensationFailed,
}

impl TransactionState {
    /// Returns true if the execution can begin running.
    pub fn can_run(&self) -> bool {
        matches!(self, TransactionState::Pending)
    }

    /// Returns true if the execution can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, TransactionState::Running)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Completed
                | TransactionState::Compensated
                | TransactionState::CompensationFailed
        )
    }

    /// Returns true if the execution ended without completing.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TransactionState::Compensated | TransactionState::CompensationFailed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Pending => "pending",
            TransactionState::Running => "running",
            TransactionState::Compensating => "compensating",
            TransactionState::Completed => "completed",
            TransactionState::Compensated => "compensated",
            TransactionState::CompensationFailed => "compensation_failed",
        }
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a single step within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started (and, on a failed run, never will be).
    #[default]
    Pending,
    /// Forward action in flight.
    Running,
    /// Forward action succeeded; output recorded.
    Succeeded,
    /// Forward action failed after exhausting its retries.
    Failed,
    /// The step's condition resolved falsy; it never ran.
    Skipped,
    /// Compensation in flight.
    Compensating,
    /// Compensation ran and succeeded.
    Compensated,
    /// Nothing to undo: no compensation logic, or the input was withheld.
    CompensationSkipped,
    /// Compensation ran and failed.
    CompensationFailed,
}

impl StepStatus {
    /// Returns true if the forward action completed successfully at some point,
    /// regardless of what compensation did afterwards.
    pub fn has_succeeded(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded
                | StepStatus::Compensating
                | StepStatus::Compensated
                | StepStatus::CompensationSkipped
                | StepStatus::CompensationFailed
        )
    }

    /// Returns true if downstream steps may consume this step's output.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Skipped)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
            StepStatus::Compensating => "compensating",
            StepStatus::Compensated => "compensated",
            StepStatus::CompensationSkipped => "compensation_skipped",
            StepStatus::CompensationFailed => "compensation_failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
