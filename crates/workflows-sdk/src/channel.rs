//! Lifecycle event delivery.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;

use crate::error::SubscriberError;
use crate::events::EventEnvelope;

/// An observer of workflow lifecycle events.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Returns the name of this subscriber, used in logs.
    fn name(&self) -> &str;

    /// Handles one event.
    async fn handle(&self, event: &EventEnvelope) -> Result<(), SubscriberError>;
}

/// Delivers events to subscribers in registration order.
///
/// Delivery is awaited before the orchestrator moves on, so every subscriber
/// sees a transaction's events in sequence. A subscriber that fails or panics
/// is logged and skipped; it never affects the execution.
#[derive(Clone, Default)]
pub struct EventChannel {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber.
    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Builder-style [`subscribe`](Self::subscribe).
    pub fn with_subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribe(subscriber);
        self
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers an event to every subscriber.
    pub async fn publish(&self, event: &EventEnvelope) {
        for subscriber in &self.subscribers {
            let delivery = AssertUnwindSafe(subscriber.handle(event)).catch_unwind().await;
            match delivery {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        event_type = event.event_type(),
                        transaction_id = %event.transaction_id,
                        error = %error,
                        "Event subscriber failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        event_type = event.event_type(),
                        transaction_id = %event.transaction_id,
                        "Event subscriber panicked"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subscribers.iter().map(|s| s.name()).collect();
        f.debug_struct("EventChannel")
            .field("subscribers", &names)
            .finish()
    }
}
