//! Adds rules to a promotion.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use workflows_sdk::{Step, StepContext, StepError, StepResponse};

use crate::modules::{CreatePromotionRule, PromotionModuleService, PromotionRule, RuleType, keys};

pub const ADD_RULES_TO_PROMOTIONS_STEP_ID: &str = "add-rules-to-promotions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPromotionRulesInput {
    pub rule_type: RuleType,
    pub data: PromotionRulesData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRulesData {
    /// Promotion id.
    pub id: String,
    pub rules: Vec<CreatePromotionRule>,
}

/// The rules created by one invocation, for removal on compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedPromotionRules {
    pub promotion_id: String,
    pub rule_type: RuleType,
    #[serde(default)]
    pub rule_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddRulesToPromotionsStep;

#[async_trait]
impl Step for AddRulesToPromotionsStep {
    type Input = AddPromotionRulesInput;
    type Output = Vec<PromotionRule>;
    type CompensationInput = CreatedPromotionRules;

    fn id(&self) -> &str {
        ADD_RULES_TO_PROMOTIONS_STEP_ID
    }

    async fn invoke(
        &self,
        input: AddPromotionRulesInput,
        ctx: &StepContext,
    ) -> Result<StepResponse<Vec<PromotionRule>, CreatedPromotionRules>, StepError> {
        let promotions: Arc<dyn PromotionModuleService> =
            ctx.container().resolve(keys::PROMOTION)?;

        let created = promotions
            .add_promotion_rules(&input.data.id, input.rule_type, input.data.rules)
            .await?;

        let compensation = CreatedPromotionRules {
            promotion_id: input.data.id,
            rule_type: input.rule_type,
            rule_ids: created.iter().map(|rule| rule.id.clone()).collect(),
        };
        Ok(StepResponse::with_compensation(created, compensation))
    }

    fn has_compensation(&self) -> bool {
        true
    }

    async fn compensate(
        &self,
        created: Option<CreatedPromotionRules>,
        ctx: &StepContext,
    ) -> Result<(), StepError> {
        let Some(created) = created.filter(|created| !created.rule_ids.is_empty()) else {
            return Ok(());
        };

        let promotions: Arc<dyn PromotionModuleService> =
            ctx.container().resolve(keys::PROMOTION)?;
        promotions
            .remove_promotion_rules(&created.promotion_id, created.rule_type, &created.rule_ids)
            .await?;
        Ok(())
    }
}
