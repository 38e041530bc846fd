//! Shared fixtures for workflow integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use workflows_sdk::{
    EventEnvelope, EventSubscriber, FnStep, StepError, StepResponse, SubscriberError,
};

/// Ordered log of what steps did, shared between steps and the test.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }

    /// Ids of compensated steps, in the order compensation ran.
    pub fn compensations(&self) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|e| e.strip_suffix(":compensate").map(String::from))
            .collect()
    }
}

/// A step that records its calls, outputs `{"step": id, "input": input}` and
/// saves its id for compensation.
pub fn tracked_step(id: &str, journal: &Journal) -> FnStep {
    delayed_step(id, journal, Duration::ZERO)
}

/// Like [`tracked_step`], but sleeps for `delay` during the forward action.
pub fn delayed_step(id: &str, journal: &Journal, delay: Duration) -> FnStep {
    let forward_journal = journal.clone();
    let compensate_journal = journal.clone();
    let name = id.to_string();

    FnStep::new(id, move |input, _ctx| {
        let journal = forward_journal.clone();
        let name = name.clone();
        async move {
            journal.push(format!("{name}:start"));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            journal.push(format!("{name}:end"));
            Ok(StepResponse::with_compensation(
                json!({"step": name, "input": input}),
                json!(name),
            ))
        }
    })
    .with_compensation(move |input, _ctx| {
        let journal = compensate_journal.clone();
        async move {
            match input.as_ref().and_then(Value::as_str) {
                Some(name) => {
                    journal.push(format!("{name}:compensate"));
                    Ok(())
                }
                None => Err(StepError::new("missing compensation input")),
            }
        }
    })
}

/// A step whose forward action always fails.
pub fn failing_step(id: &str, journal: &Journal) -> FnStep {
    let forward_journal = journal.clone();
    let compensate_journal = journal.clone();
    let name = id.to_string();
    let compensate_name = id.to_string();

    FnStep::new(id, move |_input, _ctx| {
        let journal = forward_journal.clone();
        let name = name.clone();
        async move {
            journal.push(format!("{name}:start"));
            Err::<StepResponse<Value>, _>(StepError::new(format!("{name} exploded")))
        }
    })
    .with_compensation(move |_input, _ctx| {
        let journal = compensate_journal.clone();
        let name = compensate_name.clone();
        async move {
            journal.push(format!("{name}:compensate"));
            Ok(())
        }
    })
}

/// A step whose forward action succeeds and whose compensation fails.
pub fn unrecoverable_step(id: &str, journal: &Journal) -> FnStep {
    let forward_journal = journal.clone();
    let name = id.to_string();

    FnStep::new(id, move |_input, _ctx| {
        let journal = forward_journal.clone();
        let name = name.clone();
        async move {
            journal.push(format!("{name}:start"));
            Ok(StepResponse::new(json!(name)))
        }
    })
    .with_compensation(|_input, _ctx| async move {
        Err::<(), _>(StepError::new("cannot undo"))
    })
}

/// Subscriber that keeps every envelope it sees.
#[derive(Default)]
pub struct Collector {
    events: Mutex<Vec<EventEnvelope>>,
}

impl Collector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(EventEnvelope::event_type).collect()
    }

    /// Event types for one step, in emission order.
    pub fn step_event_types(&self, step_id: &str) -> Vec<&'static str> {
        self.events()
            .iter()
            .filter(|e| e.step_id() == Some(step_id))
            .map(EventEnvelope::event_type)
            .collect()
    }
}

#[async_trait]
impl EventSubscriber for Collector {
    fn name(&self) -> &str {
        "collector"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), SubscriberError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Subscriber that rejects every event.
pub struct Rejecting;

#[async_trait]
impl EventSubscriber for Rejecting {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn handle(&self, _event: &EventEnvelope) -> Result<(), SubscriberError> {
        Err(SubscriberError::new("downstream unavailable"))
    }
}
