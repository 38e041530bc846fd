//! Store module service and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// A store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Store {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Store management operations.
#[async_trait]
pub trait StoreModuleService: Send + Sync {
    /// Soft-deletes the given stores. Fails without changes if any id is
    /// unknown.
    async fn soft_delete_stores(&self, ids: &[String]) -> Result<()>;

    /// Clears the deletion mark of the given stores.
    async fn restore_stores(&self, ids: &[String]) -> Result<()>;

    /// Looks up a store, deleted or not.
    async fn retrieve_store(&self, id: &str) -> Result<Store>;
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    stores: HashMap<String, Store>,
    fail_on_delete: bool,
}

/// In-memory store module.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreModule {
    state: Arc<RwLock<InMemoryStoreState>>,
}

impl InMemoryStoreModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a store.
    pub async fn insert(&self, store: Store) {
        self.state
            .write()
            .await
            .stores
            .insert(store.id.clone(), store);
    }

    /// Configures the service to fail on soft delete.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }

    /// Returns the number of stores that are not deleted.
    pub async fn active_count(&self) -> usize {
        self.state
            .read()
            .await
            .stores
            .values()
            .filter(|store| !store.is_deleted())
            .count()
    }
}

#[async_trait]
impl StoreModuleService for InMemoryStoreModule {
    async fn soft_delete_stores(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_delete {
            return Err(ServiceError::unavailable("Store", "Delete rejected"));
        }
        if let Some(missing) = ids.iter().find(|id| !state.stores.contains_key(*id)) {
            return Err(ServiceError::not_found("Store", missing.as_str()));
        }

        let now = Utc::now();
        for id in ids {
            if let Some(store) = state.stores.get_mut(id) {
                store.deleted_at.get_or_insert(now);
            }
        }
        Ok(())
    }

    async fn restore_stores(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        for id in ids {
            if let Some(store) = state.stores.get_mut(id) {
                store.deleted_at = None;
            }
        }
        Ok(())
    }

    async fn retrieve_store(&self, id: &str) -> Result<Store> {
        self.state
            .read()
            .await
            .stores
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Store", id))
    }
}
