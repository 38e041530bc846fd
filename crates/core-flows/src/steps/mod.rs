//! Leaf steps.

pub mod add_rules_to_promotions;
pub mod delete_order_changes;
pub mod delete_stores;
pub mod emit_event;
pub mod update_sales_channels;

pub use add_rules_to_promotions::{
    ADD_RULES_TO_PROMOTIONS_STEP_ID, AddPromotionRulesInput, AddRulesToPromotionsStep,
    CreatedPromotionRules, PromotionRulesData,
};
pub use delete_order_changes::{
    DELETE_ORDER_CHANGES_STEP_ID, DeleteOrderChangesInput, DeleteOrderChangesStep,
};
pub use delete_stores::{DELETE_STORES_STEP_ID, DeleteStoresStep};
pub use emit_event::{EMIT_EVENT_STEP_ID, EmitEventInput, EmitEventStep};
pub use update_sales_channels::{
    UPDATE_SALES_CHANNELS_STEP_ID, UpdateSalesChannelsInput, UpdateSalesChannelsStep,
};
