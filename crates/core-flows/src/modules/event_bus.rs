//! Event bus service and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// A business event published by a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub name: String,
    pub data: Value,
    pub emitted_at: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
            emitted_at: Utc::now(),
        }
    }
}

/// Publishes business events.
#[async_trait]
pub trait EventBusService: Send + Sync {
    async fn emit(&self, messages: Vec<EventMessage>) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryEventBusState {
    messages: Vec<EventMessage>,
    fail_on_emit: bool,
}

/// Event bus that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<InMemoryEventBusState>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the bus to fail on emit.
    pub async fn set_fail_on_emit(&self, fail: bool) {
        self.state.write().await.fail_on_emit = fail;
    }

    /// Returns every message emitted so far.
    pub async fn messages(&self) -> Vec<EventMessage> {
        self.state.read().await.messages.clone()
    }

    /// Returns the messages emitted under a name.
    pub async fn messages_named(&self, name: &str) -> Vec<EventMessage> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|message| message.name == name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventBusService for InMemoryEventBus {
    async fn emit(&self, messages: Vec<EventMessage>) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_emit {
            return Err(ServiceError::unavailable("EventBus", "Emit rejected"));
        }
        state.messages.extend(messages);
        Ok(())
    }
}
