//! Sales channel module service and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// A sales channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
}

impl SalesChannel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            is_disabled: false,
        }
    }
}

/// One id or a list of ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdFilter {
    One(String),
    Many(Vec<String>),
}

impl IdFilter {
    fn matches(&self, id: &str) -> bool {
        match self {
            IdFilter::One(expected) => expected == id,
            IdFilter::Many(ids) => ids.iter().any(|expected| expected == id),
        }
    }
}

/// Filters selecting sales channels. Unset filters match everything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SalesChannelSelector {
    #[serde(default)]
    pub id: Option<IdFilter>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_disabled: Option<bool>,
}

impl SalesChannelSelector {
    pub fn matches(&self, channel: &SalesChannel) -> bool {
        self.id.as_ref().is_none_or(|filter| filter.matches(&channel.id))
            && self.name.as_ref().is_none_or(|name| name == &channel.name)
            && self
                .is_disabled
                .is_none_or(|disabled| disabled == channel.is_disabled)
    }
}

/// Fields to change on each selected sales channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateSalesChannel {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_disabled: Option<bool>,
}

impl UpdateSalesChannel {
    fn apply_to(&self, channel: &mut SalesChannel) {
        if let Some(name) = &self.name {
            channel.name = name.clone();
        }
        if let Some(description) = &self.description {
            channel.description = Some(description.clone());
        }
        if let Some(is_disabled) = self.is_disabled {
            channel.is_disabled = is_disabled;
        }
    }
}

/// Sales channel operations.
#[async_trait]
pub trait SalesChannelModuleService: Send + Sync {
    /// Lists the sales channels matching a selector, ordered by id.
    async fn list_sales_channels(
        &self,
        selector: &SalesChannelSelector,
    ) -> Result<Vec<SalesChannel>>;

    /// Applies an update to the given sales channels and returns them.
    async fn update_sales_channels(
        &self,
        ids: &[String],
        update: &UpdateSalesChannel,
    ) -> Result<Vec<SalesChannel>>;

    /// Overwrites sales channels with previously captured values.
    async fn replace_sales_channels(&self, channels: Vec<SalesChannel>) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemorySalesChannelState {
    channels: BTreeMap<String, SalesChannel>,
    fail_on_update: bool,
}

/// In-memory sales channel module.
#[derive(Debug, Clone, Default)]
pub struct InMemorySalesChannelModule {
    state: Arc<RwLock<InMemorySalesChannelState>>,
}

impl InMemorySalesChannelModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a sales channel.
    pub async fn insert(&self, channel: SalesChannel) {
        self.state
            .write()
            .await
            .channels
            .insert(channel.id.clone(), channel);
    }

    /// Configures the service to fail on update.
    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.fail_on_update = fail;
    }

    /// Returns a sales channel by id.
    pub async fn get(&self, id: &str) -> Option<SalesChannel> {
        self.state.read().await.channels.get(id).cloned()
    }
}

#[async_trait]
impl SalesChannelModuleService for InMemorySalesChannelModule {
    async fn list_sales_channels(
        &self,
        selector: &SalesChannelSelector,
    ) -> Result<Vec<SalesChannel>> {
        Ok(self
            .state
            .read()
            .await
            .channels
            .values()
            .filter(|channel| selector.matches(channel))
            .cloned()
            .collect())
    }

    async fn update_sales_channels(
        &self,
        ids: &[String],
        update: &UpdateSalesChannel,
    ) -> Result<Vec<SalesChannel>> {
        let mut state = self.state.write().await;

        if state.fail_on_update {
            return Err(ServiceError::unavailable("SalesChannel", "Update rejected"));
        }
        if let Some(missing) = ids.iter().find(|id| !state.channels.contains_key(*id)) {
            return Err(ServiceError::not_found("SalesChannel", missing.as_str()));
        }

        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(channel) = state.channels.get_mut(id) {
                update.apply_to(channel);
                updated.push(channel.clone());
            }
        }
        Ok(updated)
    }

    async fn replace_sales_channels(&self, channels: Vec<SalesChannel>) -> Result<()> {
        let mut state = self.state.write().await;
        for channel in channels {
            state.channels.insert(channel.id.clone(), channel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn seeded() -> InMemorySalesChannelModule {
        let module = InMemorySalesChannelModule::new();
        module.insert(SalesChannel::new("sc_1", "Webshop")).await;
        module.insert(SalesChannel::new("sc_2", "Retail")).await;
        module
    }

    #[tokio::test]
    async fn test_selector_by_single_or_many_ids() {
        let module = seeded().await;

        let one: SalesChannelSelector = serde_json::from_value(json!({"id": "sc_1"})).unwrap();
        let many: SalesChannelSelector =
            serde_json::from_value(json!({"id": ["sc_1", "sc_2"]})).unwrap();

        assert_eq!(module.list_sales_channels(&one).await.unwrap().len(), 1);
        assert_eq!(module.list_sales_channels(&many).await.unwrap().len(), 2);
        assert_eq!(
            module
                .list_sales_channels(&SalesChannelSelector::default())
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_update_then_replace_restores() {
        let module = seeded().await;
        let before = module.get("sc_1").await.unwrap();

        let update = UpdateSalesChannel {
            name: Some("Storefront".to_string()),
            is_disabled: Some(true),
            ..Default::default()
        };
        let updated = module
            .update_sales_channels(&["sc_1".to_string()], &update)
            .await
            .unwrap();
        assert_eq!(updated[0].name, "Storefront");
        assert!(updated[0].is_disabled);

        module.replace_sales_channels(vec![before.clone()]).await.unwrap();
        assert_eq!(module.get("sc_1").await.unwrap(), before);
    }
}
