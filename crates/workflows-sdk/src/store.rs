//! Execution event log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::TransactionId;
use tokio::sync::RwLock;

use crate::channel::EventSubscriber;
use crate::error::{StoreError, SubscriberError};
use crate::events::EventEnvelope;
use crate::record::ExecutionRecord;

/// Persists workflow events per transaction.
///
/// Because an [`ExecutionRecord`] is a fold over its events, a store that
/// keeps the log can rebuild any execution's state.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Appends one event.
    ///
    /// Events for a transaction must arrive with consecutive sequence
    /// numbers starting at 1; anything else is a `SequenceConflict`.
    async fn append(&self, event: EventEnvelope) -> Result<(), StoreError>;

    /// Returns a transaction's events in sequence order.
    async fn events(&self, transaction_id: TransactionId) -> Vec<EventEnvelope>;

    /// Returns the ids of every stored transaction.
    async fn transaction_ids(&self) -> Vec<TransactionId>;

    /// Rebuilds a transaction's record from its events.
    ///
    /// Returns None if nothing is stored for the transaction.
    async fn load(&self, transaction_id: TransactionId) -> Option<ExecutionRecord> {
        let events = self.events(transaction_id).await;
        if events.is_empty() {
            return None;
        }
        Some(ExecutionRecord::replay(&events))
    }
}

/// In-memory execution store.
///
/// Subscribing it to an [`EventChannel`](crate::EventChannel) checkpoints
/// every execution that publishes there.
#[derive(Clone, Default)]
pub struct InMemoryExecutionStore {
    events: Arc<RwLock<HashMap<TransactionId, Vec<EventEnvelope>>>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.values().map(Vec::len).sum()
    }

    /// Drops the log of one execution, returning its events.
    ///
    /// Lets a long-lived subscriber release finished runs.
    pub async fn remove(&self, transaction_id: TransactionId) -> Vec<EventEnvelope> {
        self.events
            .write()
            .await
            .remove(&transaction_id)
            .unwrap_or_default()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn append(&self, event: EventEnvelope) -> Result<(), StoreError> {
        let mut store = self.events.write().await;
        let log = store.entry(event.transaction_id).or_default();

        let expected = log.last().map(|e| e.sequence).unwrap_or(0) + 1;
        if event.sequence != expected {
            return Err(StoreError::SequenceConflict {
                transaction_id: event.transaction_id,
                expected,
                actual: event.sequence,
            });
        }

        log.push(event);
        Ok(())
    }

    async fn events(&self, transaction_id: TransactionId) -> Vec<EventEnvelope> {
        self.events
            .read()
            .await
            .get(&transaction_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn transaction_ids(&self) -> Vec<TransactionId> {
        let mut ids: Vec<TransactionId> = self.events.read().await.keys().copied().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl EventSubscriber for InMemoryExecutionStore {
    fn name(&self) -> &str {
        "in-memory-execution-store"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), SubscriberError> {
        self.append(event.clone())
            .await
            .map_err(|e| SubscriberError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::events::WorkflowEvent;
    use crate::state::{StepStatus, TransactionState};

    fn envelope(tx: TransactionId, sequence: u64, event: WorkflowEvent) -> EventEnvelope {
        EventEnvelope::new(tx, "wf", sequence, event)
    }

    #[tokio::test]
    async fn append_and_load() {
        let store = InMemoryExecutionStore::new();
        let tx = TransactionId::new();

        store
            .append(envelope(
                tx,
                1,
                WorkflowEvent::workflow_started(json!({}), vec!["a".into()]),
            ))
            .await
            .unwrap();
        store
            .append(envelope(tx, 2, WorkflowEvent::step_started("a")))
            .await
            .unwrap();
        store
            .append(envelope(
                tx,
                3,
                WorkflowEvent::step_succeeded("a", json!(1), None, 1),
            ))
            .await
            .unwrap();
        store
            .append(envelope(tx, 4, WorkflowEvent::workflow_completed(json!(1))))
            .await
            .unwrap();

        let record = store.load(tx).await.unwrap();
        assert_eq!(record.state(), TransactionState::Completed);
        assert_eq!(record.step_status("a"), Some(StepStatus::Succeeded));
        assert_eq!(record.last_sequence(), 4);
        assert_eq!(store.event_count().await, 4);
        assert_eq!(store.transaction_ids().await, vec![tx]);
    }

    #[tokio::test]
    async fn rejects_out_of_sequence_events() {
        let store = InMemoryExecutionStore::new();
        let tx = TransactionId::new();

        let result = store
            .append(envelope(tx, 2, WorkflowEvent::step_started("a")))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::SequenceConflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn load_unknown_transaction() {
        let store = InMemoryExecutionStore::new();
        assert!(store.load(TransactionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = InMemoryExecutionStore::new();
        let tx = TransactionId::new();
        store
            .append(envelope(tx, 1, WorkflowEvent::step_started("a")))
            .await
            .unwrap();

        store.clear().await;
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn remove_drops_one_execution() {
        let store = InMemoryExecutionStore::new();
        let finished = TransactionId::new();
        let running = TransactionId::new();
        for tx in [finished, running] {
            store
                .append(envelope(tx, 1, WorkflowEvent::step_started("a")))
                .await
                .unwrap();
        }

        let removed = store.remove(finished).await;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].transaction_id, finished);
        assert!(store.load(finished).await.is_none());
        assert_eq!(store.transaction_ids().await, vec![running]);
        assert!(store.remove(finished).await.is_empty());

        store
            .append(envelope(finished, 1, WorkflowEvent::step_started("a")))
            .await
            .unwrap();
        assert_eq!(store.event_count().await, 2);
    }
}
