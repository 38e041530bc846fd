//! Promotion module service and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

/// Which rule list of a promotion a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Eligibility rules.
    Rules,
    /// Rules on the items a customer must buy.
    BuyRules,
    /// Rules on the items the promotion applies to.
    TargetRules,
}

/// A rule to add to a promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePromotionRule {
    pub attribute: String,
    pub operator: String,
    pub values: Value,
}

/// A stored promotion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRule {
    pub id: String,
    pub attribute: String,
    pub operator: String,
    pub values: Value,
}

/// A promotion and its rule lists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub rules: Vec<PromotionRule>,
    #[serde(default)]
    pub buy_rules: Vec<PromotionRule>,
    #[serde(default)]
    pub target_rules: Vec<PromotionRule>,
}

impl Promotion {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            ..Default::default()
        }
    }

    /// Returns the rule list for a rule type.
    pub fn rules_of(&self, rule_type: RuleType) -> &[PromotionRule] {
        match rule_type {
            RuleType::Rules => &self.rules,
            RuleType::BuyRules => &self.buy_rules,
            RuleType::TargetRules => &self.target_rules,
        }
    }

    fn rules_of_mut(&mut self, rule_type: RuleType) -> &mut Vec<PromotionRule> {
        match rule_type {
            RuleType::Rules => &mut self.rules,
            RuleType::BuyRules => &mut self.buy_rules,
            RuleType::TargetRules => &mut self.target_rules,
        }
    }
}

/// Promotion rule operations.
#[async_trait]
pub trait PromotionModuleService: Send + Sync {
    /// Adds rules to one of a promotion's rule lists.
    async fn add_promotion_rules(
        &self,
        promotion_id: &str,
        rule_type: RuleType,
        rules: Vec<CreatePromotionRule>,
    ) -> Result<Vec<PromotionRule>>;

    /// Removes rules from one of a promotion's rule lists. Unknown rule ids
    /// are ignored.
    async fn remove_promotion_rules(
        &self,
        promotion_id: &str,
        rule_type: RuleType,
        rule_ids: &[String],
    ) -> Result<()>;

    /// Looks up a promotion.
    async fn retrieve_promotion(&self, id: &str) -> Result<Promotion>;
}

#[derive(Debug, Default)]
struct InMemoryPromotionState {
    promotions: HashMap<String, Promotion>,
    next_rule_id: u32,
    fail_on_add: bool,
}

/// In-memory promotion module.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromotionModule {
    state: Arc<RwLock<InMemoryPromotionState>>,
}

impl InMemoryPromotionModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a promotion.
    pub async fn insert(&self, promotion: Promotion) {
        self.state
            .write()
            .await
            .promotions
            .insert(promotion.id.clone(), promotion);
    }

    /// Configures the service to fail when adding rules.
    pub async fn set_fail_on_add(&self, fail: bool) {
        self.state.write().await.fail_on_add = fail;
    }
}

#[async_trait]
impl PromotionModuleService for InMemoryPromotionModule {
    async fn add_promotion_rules(
        &self,
        promotion_id: &str,
        rule_type: RuleType,
        rules: Vec<CreatePromotionRule>,
    ) -> Result<Vec<PromotionRule>> {
        let mut state = self.state.write().await;

        if state.fail_on_add {
            return Err(ServiceError::unavailable("Promotion", "Rule creation rejected"));
        }
        if !state.promotions.contains_key(promotion_id) {
            return Err(ServiceError::not_found("Promotion", promotion_id));
        }

        let mut created = Vec::with_capacity(rules.len());
        for rule in rules {
            state.next_rule_id += 1;
            created.push(PromotionRule {
                id: format!("prorul_{:04}", state.next_rule_id),
                attribute: rule.attribute,
                operator: rule.operator,
                values: rule.values,
            });
        }

        if let Some(promotion) = state.promotions.get_mut(promotion_id) {
            promotion
                .rules_of_mut(rule_type)
                .extend(created.iter().cloned());
        }
        Ok(created)
    }

    async fn remove_promotion_rules(
        &self,
        promotion_id: &str,
        rule_type: RuleType,
        rule_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let promotion = state
            .promotions
            .get_mut(promotion_id)
            .ok_or_else(|| ServiceError::not_found("Promotion", promotion_id))?;

        promotion
            .rules_of_mut(rule_type)
            .retain(|rule| !rule_ids.contains(&rule.id));
        Ok(())
    }

    async fn retrieve_promotion(&self, id: &str) -> Result<Promotion> {
        self.state
            .read()
            .await
            .promotions
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("Promotion", id))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rule(attribute: &str) -> CreatePromotionRule {
        CreatePromotionRule {
            attribute: attribute.to_string(),
            operator: "eq".to_string(),
            values: json!(["a"]),
        }
    }

    #[tokio::test]
    async fn test_rules_land_in_their_list() {
        let module = InMemoryPromotionModule::new();
        module.insert(Promotion::new("promo_1", "SUMMER")).await;

        let created = module
            .add_promotion_rules("promo_1", RuleType::BuyRules, vec![rule("product_id")])
            .await
            .unwrap();

        let promotion = module.retrieve_promotion("promo_1").await.unwrap();
        assert_eq!(created[0].id, "prorul_0001");
        assert!(promotion.rules.is_empty());
        assert_eq!(promotion.buy_rules, created);
    }

    #[tokio::test]
    async fn test_remove_only_touches_given_ids() {
        let module = InMemoryPromotionModule::new();
        module.insert(Promotion::new("promo_1", "SUMMER")).await;
        let created = module
            .add_promotion_rules(
                "promo_1",
                RuleType::Rules,
                vec![rule("customer_group"), rule("currency_code")],
            )
            .await
            .unwrap();

        module
            .remove_promotion_rules("promo_1", RuleType::Rules, &[created[0].id.clone()])
            .await
            .unwrap();

        let promotion = module.retrieve_promotion("promo_1").await.unwrap();
        assert_eq!(promotion.rules, vec![created[1].clone()]);
    }

    #[tokio::test]
    async fn test_unknown_promotion() {
        let module = InMemoryPromotionModule::new();
        let result = module
            .add_promotion_rules("promo_x", RuleType::Rules, vec![rule("x")])
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[test]
    fn test_rule_type_wire_names() {
        assert_eq!(serde_json::to_value(RuleType::TargetRules).unwrap(), json!("target_rules"));
    }
}
