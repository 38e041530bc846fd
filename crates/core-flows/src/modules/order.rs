//! Order module service and in-memory implementation.
//!
//! Only order changes are modelled here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// A pending change to an order (an edit, exchange or claim).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderChange {
    pub id: String,
    pub order_id: String,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl OrderChange {
    pub fn new(id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order_id: order_id.into(),
            deleted_at: None,
        }
    }
}

/// Order change operations.
#[async_trait]
pub trait OrderModuleService: Send + Sync {
    /// Soft-deletes order changes, returning the ids that were deleted by
    /// this call.
    async fn soft_delete_order_changes(&self, ids: &[String]) -> Result<Vec<String>>;

    /// Clears the deletion mark of the given order changes.
    async fn restore_order_changes(&self, ids: &[String]) -> Result<()>;

    /// Looks up an order change, deleted or not.
    async fn retrieve_order_change(&self, id: &str) -> Result<OrderChange>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    changes: HashMap<String, OrderChange>,
    fail_on_delete: bool,
}

/// In-memory order module.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderModule {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an order change.
    pub async fn insert(&self, change: OrderChange) {
        self.state
            .write()
            .await
            .changes
            .insert(change.id.clone(), change);
    }

    /// Configures the service to fail on soft delete.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }
}

#[async_trait]
impl OrderModuleService for InMemoryOrderModule {
    async fn soft_delete_order_changes(&self, ids: &[String]) -> Result<Vec<String>> {
        let mut state = self.state.write().await;

        if state.fail_on_delete {
            return Err(ServiceError::unavailable("Order", "Delete rejected"));
        }
        if let Some(missing) = ids.iter().find(|id| !state.changes.contains_key(*id)) {
            return Err(ServiceError::not_found("OrderChange", missing.as_str()));
        }

        let now = Utc::now();
        let mut deleted = Vec::new();
        for id in ids {
            if let Some(change) = state.changes.get_mut(id)
                && change.deleted_at.is_none()
            {
                change.deleted_at = Some(now);
                deleted.push(id.clone());
            }
        }
        Ok(deleted)
    }

    async fn restore_order_changes(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        for id in ids {
            if let Some(change) = state.changes.get_mut(id) {
                change.deleted_at = None;
            }
        }
        Ok(())
    }

    async fn retrieve_order_change(&self, id: &str) -> Result<OrderChange> {
        self.state
            .read()
            .await
            .changes
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("OrderChange", id))
    }
}
