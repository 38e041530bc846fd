//! Soft-deletes stores.

use std::sync::Arc;

use async_trait::async_trait;
use workflows_sdk::{Step, StepContext, StepError, StepResponse};

use crate::modules::{StoreModuleService, keys};

pub const DELETE_STORES_STEP_ID: &str = "delete-stores";

/// Soft-deletes the stores with the given ids and restores them on
/// compensation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteStoresStep;

#[async_trait]
impl Step for DeleteStoresStep {
    type Input = Vec<String>;
    type Output = ();
    type CompensationInput = Vec<String>;

    fn id(&self) -> &str {
        DELETE_STORES_STEP_ID
    }

    async fn invoke(
        &self,
        ids: Vec<String>,
        ctx: &StepContext,
    ) -> Result<StepResponse<(), Vec<String>>, StepError> {
        let stores: Arc<dyn StoreModuleService> = ctx.container().resolve(keys::STORE)?;

        tracing::debug!(count = ids.len(), "Soft-deleting stores");
        stores.soft_delete_stores(&ids).await?;

        Ok(StepResponse::with_compensation((), ids))
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

        let stores: Arc<dyn StoreModuleService> = ctx.container().resolve(keys::STORE)?;
        stores.restore_stores(&ids).await?;
        Ok(())
    }
}
