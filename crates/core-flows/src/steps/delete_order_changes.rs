//! Soft-deletes order changes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use workflows_sdk::{Step, StepContext, StepError, StepResponse};

use crate::modules::{OrderModuleService, keys};

pub const DELETE_ORDER_CHANGES_STEP_ID: &str = "delete-order-change";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOrderChangesInput {
    pub ids: Vec<String>,
}

/// Soft-deletes order changes. Compensation restores the ids requested for
/// deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOrderChangesStep;

#[async_trait]
impl Step for DeleteOrderChangesStep {
    type Input = DeleteOrderChangesInput;
    type Output = Vec<String>;
    type CompensationInput = Vec<String>;

    fn id(&self) -> &str {
        DELETE_ORDER_CHANGES_STEP_ID
    }

    async fn invoke(
        &self,
        input: DeleteOrderChangesInput,
        ctx: &StepContext,
    ) -> Result<StepResponse<Vec<String>, Vec<String>>, StepError> {
        let orders: Arc<dyn OrderModuleService> = ctx.container().resolve(keys::ORDER)?;

        let deleted = orders.soft_delete_order_changes(&input.ids).await?;

        Ok(StepResponse::with_compensation(deleted, input.ids))
    }

    fn has_compensation(&self) -> bool {
        true
    }

    async fn compensate(
        &self,
        ids: Option<Vec<String>>,
        ctx: &StepContext,
    ) -> Result<(), StepError> {
        let Some(ids) = ids.filter(|ids| !ids.is_empty()) else {
            return Ok(());
        };

        let orders: Arc<dyn OrderModuleService> = ctx.container().resolve(keys::ORDER)?;
        orders.restore_order_changes(&ids).await?;
        Ok(())
    }
}
