//! Workflow lifecycle events.

use chrono::{DateTime, Utc};
use common::TransactionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::{FailureKind, WorkflowFailure};
use crate::state::TransactionState;

/// Events emitted while a workflow executes.
///
/// Events for one step are always emitted in the order started, then
/// succeeded or failed, then compensating, then one of compensated,
/// compensation-skipped or compensation-failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    /// Execution started.
    #[serde(rename = "workflow:started")]
    WorkflowStarted(WorkflowStartedData),

    /// A step's forward action started.
    #[serde(rename = "step:started")]
    StepStarted(StepData),

    /// A step's forward action succeeded.
    #[serde(rename = "step:succeeded")]
    StepSucceeded(StepSucceededData),

    /// A step's forward action failed after exhausting its retries.
    #[serde(rename = "step:failed")]
    StepFailed(StepFailedData),

    /// A step's condition resolved falsy and the step never ran.
    #[serde(rename = "step:skipped")]
    StepSkipped(StepData),

    /// Forward progress stopped and compensation began.
    #[serde(rename = "workflow:compensating")]
    WorkflowCompensating(CompensatingData),

    /// A step's compensation started.
    #[serde(rename = "step:compensating")]
    StepCompensating(StepData),

    /// A step's compensation ran and succeeded.
    #[serde(rename = "step:compensated")]
    StepCompensated(StepData),

    /// A step had nothing to undo.
    #[serde(rename = "step:compensation-skipped")]
    StepCompensationSkipped(CompensationSkippedData),

    /// A step's compensation failed (recorded, compensation continues).
    #[serde(rename = "step:compensation-failed")]
    StepCompensationFailed(StepFailedData),

    /// Every step succeeded.
    #[serde(rename = "workflow:completed")]
    WorkflowCompleted(WorkflowCompletedData),

    /// Execution ended after compensation.
    #[serde(rename = "workflow:failed")]
    WorkflowFailed(WorkflowFailedData),
}

impl WorkflowEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowStarted(_) => "workflow:started",
            WorkflowEvent::StepStarted(_) => "step:started",
            WorkflowEvent::StepSucceeded(_) => "step:succeeded",
            WorkflowEvent::StepFailed(_) => "step:failed",
            WorkflowEvent::StepSkipped(_) => "step:skipped",
            WorkflowEvent::WorkflowCompensating(_) => "workflow:compensating",
            WorkflowEvent::StepCompensating(_) => "step:compensating",
            WorkflowEvent::StepCompensated(_) => "step:compensated",
            WorkflowEvent::StepCompensationSkipped(_) => "step:compensation-skipped",
            WorkflowEvent::StepCompensationFailed(_) => "step:compensation-failed",
            WorkflowEvent::WorkflowCompleted(_) => "workflow:completed",
            WorkflowEvent::WorkflowFailed(_) => "workflow:failed",
        }
    }

    /// Returns the step this event concerns, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            WorkflowEvent::StepStarted(data)
            | WorkflowEvent::StepSkipped(data)
            | WorkflowEvent::StepCompensating(data)
            | WorkflowEvent::StepCompensated(data) => Some(&data.step_id),
            WorkflowEvent::StepSucceeded(data) => Some(&data.step_id),
            WorkflowEvent::StepFailed(data) | WorkflowEvent::StepCompensationFailed(data) => {
                Some(&data.step_id)
            }
            WorkflowEvent::StepCompensationSkipped(data) => Some(&data.step_id),
            WorkflowEvent::WorkflowStarted(_)
            | WorkflowEvent::WorkflowCompensating(_)
            | WorkflowEvent::WorkflowCompleted(_)
            | WorkflowEvent::WorkflowFailed(_) => None,
        }
    }
}

/// Data for the workflow:started event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStartedData {
    /// The concrete run input.
    pub input: Value,
    /// Every step node in the graph, in dependency order.
    pub steps: Vec<String>,
}

/// Data for events that only name a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub step_id: String,
}

/// Data for the step:succeeded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSucceededData {
    pub step_id: String,
    /// The value exposed to downstream steps.
    pub output: Value,
    /// The value saved for compensation; absent when withheld.
    pub compensation_input: Option<Value>,
    /// Forward attempts made, including the successful one.
    pub attempts: u32,
}

/// Data for the step:failed and step:compensation-failed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_id: String,
    pub kind: FailureKind,
    pub error: String,
    pub attempts: u32,
}

/// Why a step's compensation was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The step declares no compensation logic.
    NoCompensation,
    /// The forward action withheld its compensation input.
    InputWithheld,
}

/// Data for the step:compensation-skipped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationSkippedData {
    pub step_id: String,
    pub reason: SkipReason,
}

/// Data for the workflow:compensating event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensatingData {
    /// Failures that stopped the run without belonging to a step.
    pub failures: Vec<WorkflowFailure>,
}

/// Data for the workflow:completed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCompletedData {
    pub output: Value,
}

/// Data for the workflow:failed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFailedData {
    /// Either `Compensated` or `CompensationFailed`.
    pub state: TransactionState,
}

// Convenience constructors
impl WorkflowEvent {
    /// Creates a workflow:started event.
    pub fn workflow_started(input: Value, steps: Vec<String>) -> Self {
        WorkflowEvent::WorkflowStarted(WorkflowStartedData { input, steps })
    }

    /// Creates a step:started event.
    pub fn step_started(step_id: impl Into<String>) -> Self {
        WorkflowEvent::StepStarted(StepData {
            step_id: step_id.into(),
        })
    }

    /// Creates a step:succeeded event.
    pub fn step_succeeded(
        step_id: impl Into<String>,
        output: Value,
        compensation_input: Option<Value>,
        attempts: u32,
    ) -> Self {
        WorkflowEvent::StepSucceeded(StepSucceededData {
            step_id: step_id.into(),
            output,
            compensation_input,
            attempts,
        })
    }

    /// Creates a step:failed event.
    pub fn step_failed(
        step_id: impl Into<String>,
        kind: FailureKind,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        WorkflowEvent::StepFailed(StepFailedData {
            step_id: step_id.into(),
            kind,
            error: error.into(),
            attempts,
        })
    }

    /// Creates a step:skipped event.
    pub fn step_skipped(step_id: impl Into<String>) -> Self {
        WorkflowEvent::StepSkipped(StepData {
            step_id: step_id.into(),
        })
    }

    /// Creates a workflow:compensating event.
    pub fn workflow_compensating(failures: Vec<WorkflowFailure>) -> Self {
        WorkflowEvent::WorkflowCompensating(CompensatingData { failures })
    }

    /// Creates a step:compensating event.
    pub fn step_compensating(step_id: impl Into<String>) -> Self {
        WorkflowEvent::StepCompensating(StepData {
            step_id: step_id.into(),
        })
    }

    /// Creates a step:compensated event.
    pub fn step_compensated(step_id: impl Into<String>) -> Self {
        WorkflowEvent::StepCompensated(StepData {
            step_id: step_id.into(),
        })
    }

    /// Creates a step:compensation-skipped event.
    pub fn step_compensation_skipped(step_id: impl Into<String>, reason: SkipReason) -> Self {
        WorkflowEvent::StepCompensationSkipped(CompensationSkippedData {
            step_id: step_id.into(),
            reason,
        })
    }

    /// Creates a step:compensation-failed event.
    pub fn step_compensation_failed(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        WorkflowEvent::StepCompensationFailed(StepFailedData {
            step_id: step_id.into(),
            kind: FailureKind::StepCompensation,
            error: error.into(),
            attempts: 1,
        })
    }

    /// Creates a workflow:completed event.
    pub fn workflow_completed(output: Value) -> Self {
        WorkflowEvent::WorkflowCompleted(WorkflowCompletedData { output })
    }

    /// Creates a workflow:failed event.
    pub fn workflow_failed(state: TransactionState) -> Self {
        WorkflowEvent::WorkflowFailed(WorkflowFailedData { state })
    }
}

/// An event together with the execution it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The execution that emitted the event.
    pub transaction_id: TransactionId,

    /// The workflow being executed.
    pub workflow_id: String,

    /// Position of the event within its execution, starting at 1.
    pub sequence: u64,

    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,

    /// The event itself.
    pub event: WorkflowEvent,
}

impl EventEnvelope {
    /// Wraps an event, stamping it with the current time.
    pub fn new(
        transaction_id: TransactionId,
        workflow_id: impl Into<String>,
        sequence: u64,
        event: WorkflowEvent,
    ) -> Self {
        Self {
            transaction_id,
            workflow_id: workflow_id.into(),
            sequence,
            timestamp: Utc::now(),
            event,
        }
    }

    /// Returns the wrapped event's type name.
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    /// Returns the step the wrapped event concerns, if any.
    pub fn step_id(&self) -> Option<&str> {
        self.event.step_id()
    }
}
