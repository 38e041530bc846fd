//! Module services the core flows resolve from the step container, with
//! in-memory implementations.

pub mod event_bus;
pub mod order;
pub mod promotion;
pub mod sales_channel;
pub mod store;

use std::sync::Arc;

use serde::Deserialize;
use workflows_sdk::Container;

pub use event_bus::{EventBusService, EventMessage, InMemoryEventBus};
pub use order::{InMemoryOrderModule, OrderChange, OrderModuleService};
pub use promotion::{
    CreatePromotionRule, InMemoryPromotionModule, Promotion, PromotionModuleService,
    PromotionRule, RuleType,
};
pub use sales_channel::{
    IdFilter, InMemorySalesChannelModule, SalesChannel, SalesChannelModuleService,
    SalesChannelSelector, UpdateSalesChannel,
};
pub use store::{InMemoryStoreModule, Store, StoreModuleService};

/// Container keys under which module services are registered.
pub mod keys {
    pub const STORE: &str = "store";
    pub const ORDER: &str = "order";
    pub const PROMOTION: &str = "promotion";
    pub const SALES_CHANNEL: &str = "sales_channel";
    pub const EVENT_BUS: &str = "event_bus";
}

/// Initial module data, typically read from a JSON fixtures file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub stores: Vec<Store>,
    pub order_changes: Vec<OrderChange>,
    pub promotions: Vec<Promotion>,
    pub sales_channels: Vec<SalesChannel>,
}

/// The full set of in-memory module services.
#[derive(Debug, Clone, Default)]
pub struct InMemoryModules {
    pub store: InMemoryStoreModule,
    pub order: InMemoryOrderModule,
    pub promotion: InMemoryPromotionModule,
    pub sales_channel: InMemorySalesChannelModule,
    pub event_bus: InMemoryEventBus,
}

impl InMemoryModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads fixtures into the services.
    pub async fn seed(&self, fixtures: Fixtures) {
        for store in fixtures.stores {
            self.store.insert(store).await;
        }
        for change in fixtures.order_changes {
            self.order.insert(change).await;
        }
        for promotion in fixtures.promotions {
            self.promotion.insert(promotion).await;
        }
        for channel in fixtures.sales_channels {
            self.sales_channel.insert(channel).await;
        }
    }

    /// Builds a step container exposing each service behind its trait.
    pub fn container(&self) -> Container {
        Container::new()
            .with::<Arc<dyn StoreModuleService>>(keys::STORE, Arc::new(self.store.clone()))
            .with::<Arc<dyn OrderModuleService>>(keys::ORDER, Arc::new(self.order.clone()))
            .with::<Arc<dyn PromotionModuleService>>(
                keys::PROMOTION,
                Arc::new(self.promotion.clone()),
            )
            .with::<Arc<dyn SalesChannelModuleService>>(
                keys::SALES_CHANNEL,
                Arc::new(self.sales_channel.clone()),
            )
            .with::<Arc<dyn EventBusService>>(keys::EVENT_BUS, Arc::new(self.event_bus.clone()))
    }
}
