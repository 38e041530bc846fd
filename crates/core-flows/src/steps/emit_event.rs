//! Publishes a business event.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use workflows_sdk::{Step, StepContext, StepError, StepResponse};

use crate::modules::{EventBusService, EventMessage, keys};

pub const EMIT_EVENT_STEP_ID: &str = "emit-event";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitEventInput {
    pub event_name: String,
    /// One message per array item, otherwise a single message.
    #[serde(default)]
    pub data: Value,
}

/// Publishes one or more messages on the event bus. Emitted events are not
/// retracted, so the step has no compensation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitEventStep;

#[async_trait]
impl Step for EmitEventStep {
    type Input = EmitEventInput;
    type Output = usize;
    type CompensationInput = ();

    fn id(&self) -> &str {
        EMIT_EVENT_STEP_ID
    }

    async fn invoke(
        &self,
        input: EmitEventInput,
        ctx: &StepContext,
    ) -> Result<StepResponse<usize, ()>, StepError> {
        let bus: Arc<dyn EventBusService> = ctx.container().resolve(keys::EVENT_BUS)?;

        let messages: Vec<EventMessage> = match input.data {
            Value::Array(items) => items
                .into_iter()
                .map(|data| EventMessage::new(&input.event_name, data))
                .collect(),
            data => vec![EventMessage::new(&input.event_name, data)],
        };
        let count = messages.len();

        bus.emit(messages).await?;
        tracing::debug!(event = %input.event_name, count, "Emitted event");

        Ok(StepResponse::without_compensation(count))
    }
}
