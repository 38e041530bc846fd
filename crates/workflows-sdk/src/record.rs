//! Execution record: the state of one run, folded from its events.

use chrono::{DateTime, Utc};
use common::TransactionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{EventEnvelope, WorkflowEvent};
use crate::result::WorkflowFailure;
use crate::state::{StepStatus, TransactionState};

/// Per-step entry in an execution record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub status: StepStatus,
    pub attempts: u32,
    pub output: Option<Value>,
    pub compensation_input: Option<Value>,
    pub error: Option<String>,
    pub compensation_error: Option<String>,
}

impl StepRecord {
    fn new(step_id: String) -> Self {
        Self {
            step_id,
            ..Self::default()
        }
    }
}

/// The state of one workflow execution.
///
/// The record is rebuilt purely by applying [`EventEnvelope`]s in sequence,
/// so a persisted event log is enough to recover it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    transaction_id: Option<TransactionId>,
    workflow_id: String,
    state: TransactionState,
    input: Value,
    /// Steps in dependency order.
    steps: Vec<StepRecord>,
    output: Option<Value>,
    errors: Vec<WorkflowFailure>,
    last_sequence: u64,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Rebuilds a record from an ordered event log.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a EventEnvelope>) -> Self {
        let mut record = Self::default();
        for envelope in events {
            record.apply(envelope);
        }
        record
    }

    /// Applies one event to the record.
    pub fn apply(&mut self, envelope: &EventEnvelope) {
        self.last_sequence = envelope.sequence;

        match &envelope.event {
            WorkflowEvent::WorkflowStarted(data) => {
                self.transaction_id = Some(envelope.transaction_id);
                self.workflow_id = envelope.workflow_id.clone();
                self.input = data.input.clone();
                self.steps = data.steps.iter().cloned().map(StepRecord::new).collect();
                self.state = TransactionState::Running;
                self.started_at = Some(envelope.timestamp);
            }
            WorkflowEvent::StepStarted(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::Running;
                }
            }
            WorkflowEvent::StepSucceeded(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::Succeeded;
                    step.attempts = data.attempts;
                    step.output = Some(data.output.clone());
                    step.compensation_input = data.compensation_input.clone();
                }
            }
            WorkflowEvent::StepFailed(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::Failed;
                    step.attempts = data.attempts;
                    step.error = Some(data.error.clone());
                }
                self.errors.push(WorkflowFailure::step(
                    data.step_id.clone(),
                    data.kind,
                    data.error.clone(),
                ));
            }
            WorkflowEvent::StepSkipped(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::Skipped;
                    step.output = Some(Value::Null);
                }
            }
            WorkflowEvent::WorkflowCompensating(data) => {
                self.state = TransactionState::Compensating;
                self.errors.extend(data.failures.iter().cloned());
            }
            WorkflowEvent::StepCompensating(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::Compensating;
                }
            }
            WorkflowEvent::StepCompensated(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::Compensated;
                }
            }
            WorkflowEvent::StepCompensationSkipped(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::CompensationSkipped;
                }
            }
            WorkflowEvent::StepCompensationFailed(data) => {
                if let Some(step) = self.step_mut(&data.step_id) {
                    step.status = StepStatus::CompensationFailed;
                    step.compensation_error = Some(data.error.clone());
                }
                self.errors.push(WorkflowFailure::step(
                    data.step_id.clone(),
                    data.kind,
                    data.error.clone(),
                ));
            }
            WorkflowEvent::WorkflowCompleted(data) => {
                self.state = TransactionState::Completed;
                self.output = Some(data.output.clone());
                self.finished_at = Some(envelope.timestamp);
            }
            WorkflowEvent::WorkflowFailed(data) => {
                self.state = data.state;
                self.finished_at = Some(envelope.timestamp);
            }
        }
    }

    fn step_mut(&mut self, step_id: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }
}

// Query methods
impl ExecutionRecord {
    /// Returns the execution id, once started.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    /// Returns the workflow id.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Returns the execution state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the run input.
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Returns every step, in dependency order.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Returns one step's entry.
    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Returns the status of one step.
    pub fn step_status(&self, step_id: &str) -> Option<StepStatus> {
        self.step(step_id).map(|s| s.status)
    }

    /// Returns the steps whose forward action succeeded, in dependency order.
    ///
    /// Compensation walks this list back to front.
    pub fn succeeded_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status.has_succeeded())
            .map(|s| s.step_id.as_str())
            .collect()
    }

    /// Returns the workflow output, once completed.
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Returns every failure recorded so far.
    pub fn errors(&self) -> &[WorkflowFailure] {
        &self.errors
    }

    /// Returns the sequence number of the last applied event.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Returns when the execution started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the execution reached a terminal state.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::events::SkipReason;
    use crate::result::FailureKind;

    struct Log {
        transaction_id: TransactionId,
        sequence: u64,
        record: ExecutionRecord,
    }

    impl Log {
        fn new() -> Self {
            Self {
                transaction_id: TransactionId::new(),
                sequence: 0,
                record: ExecutionRecord::default(),
            }
        }

        fn apply(&mut self, event: WorkflowEvent) -> &mut Self {
            self.sequence += 1;
            let envelope = EventEnvelope::new(self.transaction_id, "wf", self.sequence, event);
            self.record.apply(&envelope);
            self
        }
    }

    fn started() -> WorkflowEvent {
        WorkflowEvent::workflow_started(
            json!({"ids": [1]}),
            vec!["a".into(), "b".into(), "c".into()],
        )
    }

    #[test]
    fn test_default_record() {
        let record = ExecutionRecord::default();
        assert!(record.transaction_id().is_none());
        assert_eq!(record.state(), TransactionState::Pending);
        assert!(record.steps().is_empty());
    }

    #[test]
    fn test_apply_started() {
        let mut log = Log::new();
        log.apply(started());

        let record = &log.record;
        assert_eq!(record.transaction_id(), Some(log.transaction_id));
        assert_eq!(record.workflow_id(), "wf");
        assert_eq!(record.state(), TransactionState::Running);
        assert_eq!(record.input(), &json!({"ids": [1]}));
        assert_eq!(record.steps().len(), 3);
        assert_eq!(record.step_status("b"), Some(StepStatus::Pending));
    }

    #[test]
    fn test_apply_step_lifecycle() {
        let mut log = Log::new();
        log.apply(started())
            .apply(WorkflowEvent::step_started("a"))
            .apply(WorkflowEvent::step_succeeded(
                "a",
                json!({"id": 1}),
                Some(json!(1)),
                2,
            ))
            .apply(WorkflowEvent::step_started("b"))
            .apply(WorkflowEvent::step_succeeded("b", json!(null), None, 1))
            .apply(WorkflowEvent::step_skipped("c"))
            .apply(WorkflowEvent::workflow_completed(json!("done")));

        let record = &log.record;
        let a = record.step("a").unwrap();
        assert_eq!(a.status, StepStatus::Succeeded);
        assert_eq!(a.attempts, 2);
        assert_eq!(a.compensation_input, Some(json!(1)));
        assert_eq!(record.step_status("c"), Some(StepStatus::Skipped));
        assert_eq!(record.succeeded_steps(), vec!["a", "b"]);
        assert_eq!(record.state(), TransactionState::Completed);
        assert_eq!(record.output(), Some(&json!("done")));
        assert!(record.finished_at().is_some());
        assert_eq!(record.last_sequence(), 7);
    }

    #[test]
    fn test_apply_failure_and_compensation() {
        let mut log = Log::new();
        log.apply(started())
            .apply(WorkflowEvent::step_started("a"))
            .apply(WorkflowEvent::step_succeeded("a", json!(1), Some(json!(1)), 1))
            .apply(WorkflowEvent::step_started("b"))
            .apply(WorkflowEvent::step_succeeded("b", json!(2), None, 1))
            .apply(WorkflowEvent::step_started("c"))
            .apply(WorkflowEvent::step_failed(
                "c",
                FailureKind::StepForward,
                "boom",
                3,
            ))
            .apply(WorkflowEvent::workflow_compensating(vec![]));

        assert_eq!(log.record.state(), TransactionState::Compensating);

        log.apply(WorkflowEvent::step_compensating("b"))
            .apply(WorkflowEvent::step_compensation_skipped(
                "b",
                SkipReason::InputWithheld,
            ))
            .apply(WorkflowEvent::step_compensating("a"))
            .apply(WorkflowEvent::step_compensation_failed("a", "down"))
            .apply(WorkflowEvent::workflow_failed(
                TransactionState::CompensationFailed,
            ));

        let record = &log.record;
        assert_eq!(record.state(), TransactionState::CompensationFailed);
        assert_eq!(record.step_status("c"), Some(StepStatus::Failed));
        assert_eq!(
            record.step_status("b"),
            Some(StepStatus::CompensationSkipped)
        );
        assert_eq!(
            record.step("a").unwrap().compensation_error.as_deref(),
            Some("down")
        );
        assert_eq!(record.succeeded_steps(), vec!["a", "b"]);
        assert_eq!(
            record.errors(),
            &[
                WorkflowFailure::step("c", FailureKind::StepForward, "boom"),
                WorkflowFailure::step("a", FailureKind::StepCompensation, "down"),
            ]
        );
    }

    #[test]
    fn test_compensating_event_carries_workflow_failures() {
        let mut log = Log::new();
        log.apply(started())
            .apply(WorkflowEvent::workflow_compensating(vec![
                WorkflowFailure::workflow(FailureKind::CancellationRequested, "cancelled"),
            ]));

        assert_eq!(log.record.errors().len(), 1);
        assert_eq!(log.record.errors()[0].step_id, None);
    }

    #[test]
    fn test_replay_matches_incremental_apply() {
        let tx = TransactionId::new();
        let envelopes = vec![
            EventEnvelope::new(tx, "wf", 1, started()),
            EventEnvelope::new(tx, "wf", 2, WorkflowEvent::step_started("a")),
            EventEnvelope::new(
                tx,
                "wf",
                3,
                WorkflowEvent::step_succeeded("a", json!(1), None, 1),
            ),
        ];

        let replayed = ExecutionRecord::replay(&envelopes);
        let mut incremental = ExecutionRecord::default();
        for envelope in &envelopes {
            incremental.apply(envelope);
        }
        assert_eq!(replayed, incremental);
    }

    #[test]
    fn test_serialization() {
        let mut log = Log::new();
        log.apply(started())
            .apply(WorkflowEvent::step_started("a"))
            .apply(WorkflowEvent::step_succeeded("a", json!(1), Some(json!([1])), 1));

        let json = serde_json::to_string(&log.record).unwrap();
        let deserialized: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, log.record);
    }
}
