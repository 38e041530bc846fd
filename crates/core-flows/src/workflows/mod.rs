//! Workflows composed from the core steps.

pub mod delete_stores;
pub mod update_sales_channels;

use serde_json::{Value, json};

pub use delete_stores::{DELETE_STORES_WORKFLOW_ID, STORE_DELETED_EVENT};
pub use update_sales_channels::{SALES_CHANNEL_UPDATED_EVENT, UPDATE_SALES_CHANNELS_WORKFLOW_ID};

/// Maps entities (or bare ids) to `{ "id": .. }` event payloads.
pub(crate) fn id_payloads(value: &Value) -> Value {
    let payload = |item: &Value| match item {
        Value::String(id) => json!({ "id": id }),
        other => json!({ "id": other.get("id").cloned().unwrap_or(Value::Null) }),
    };

    match value {
        Value::Array(items) => Value::Array(items.iter().map(payload).collect()),
        Value::Null => Value::Array(Vec::new()),
        single => Value::Array(vec![payload(single)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_payloads() {
        assert_eq!(
            id_payloads(&json!(["a", {"id": "b", "name": "B"}])),
            json!([{"id": "a"}, {"id": "b"}])
        );
        assert_eq!(id_payloads(&json!({"id": "c"})), json!([{"id": "c"}]));
        assert_eq!(id_payloads(&Value::Null), json!([]));
    }
}
