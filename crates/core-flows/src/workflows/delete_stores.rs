//! Deletes stores and announces the deletion.

use std::sync::Arc;

use serde_json::Value;
use workflows_sdk::{Registry, RegistryError, WorkflowData, WorkflowDefinition, transform};

use super::id_payloads;
use crate::steps::{DELETE_STORES_STEP_ID, EMIT_EVENT_STEP_ID};

pub const DELETE_STORES_WORKFLOW_ID: &str = "delete-stores";
pub const STORE_DELETED_EVENT: &str = "store.deleted";

/// Defines `delete-stores`.
///
/// Input: `{ "ids": [..] }`. The stores are soft-deleted, then one
/// `store.deleted` event per id is emitted. If emitting fails the stores
/// are restored.
pub fn define(registry: &mut Registry) -> Result<Arc<WorkflowDefinition>, RegistryError> {
    registry.define_workflow(DELETE_STORES_WORKFLOW_ID, |builder, input| {
        let ids = input.get("ids");
        let deleted = builder.step(DELETE_STORES_STEP_ID, &ids)?;

        // Depends on the delete step so events only go out after it succeeded.
        let events = transform([&deleted, &ids], |values| Ok(id_payloads(&values[1])));
        builder.step(
            EMIT_EVENT_STEP_ID,
            WorkflowData::object([
                ("event_name", WorkflowData::literal(STORE_DELETED_EVENT)),
                ("data", events),
            ]),
        )?;

        Ok(WorkflowData::literal(Value::Null))
    })
}
