//! Updates sales channels and announces the update.

use std::sync::Arc;

use workflows_sdk::{Registry, RegistryError, WorkflowData, WorkflowDefinition};

use super::id_payloads;
use crate::steps::{EMIT_EVENT_STEP_ID, UPDATE_SALES_CHANNELS_STEP_ID};

pub const UPDATE_SALES_CHANNELS_WORKFLOW_ID: &str = "update-sales-channels";
pub const SALES_CHANNEL_UPDATED_EVENT: &str = "sales-channel.updated";

/// Defines `update-sales-channels`.
///
/// Input: `{ "selector": {..}, "update": {..} }`. Output: the updated sales
/// channels. One `sales-channel.updated` event is emitted per channel.
pub fn define(registry: &mut Registry) -> Result<Arc<WorkflowDefinition>, RegistryError> {
    registry.define_workflow(UPDATE_SALES_CHANNELS_WORKFLOW_ID, |builder, input| {
        let updated = builder.step(UPDATE_SALES_CHANNELS_STEP_ID, &input)?;

        let events = updated.map(|channels| Ok(id_payloads(channels)));
        builder.step(
            EMIT_EVENT_STEP_ID,
            WorkflowData::object([
                (
                    "event_name",
                    WorkflowData::literal(SALES_CHANNEL_UPDATED_EVENT),
                ),
                ("data", events),
            ]),
        )?;

        Ok(updated)
    })
}
