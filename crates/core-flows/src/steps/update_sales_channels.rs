//! Updates the sales channels matching a selector.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use workflows_sdk::{Step, StepContext, StepError, StepResponse};

use crate::modules::{
    SalesChannel, SalesChannelModuleService, SalesChannelSelector, UpdateSalesChannel, keys,
};

pub const UPDATE_SALES_CHANNELS_STEP_ID: &str = "update-sales-channels";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSalesChannelsInput {
    #[serde(default)]
    pub selector: SalesChannelSelector,
    pub update: UpdateSalesChannel,
}

/// Updates every matching sales channel. The values they had before the
/// update are saved for compensation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateSalesChannelsStep;

#[async_trait]
impl Step for UpdateSalesChannelsStep {
    type Input = UpdateSalesChannelsInput;
    type Output = Vec<SalesChannel>;
    type CompensationInput = Vec<SalesChannel>;

    fn id(&self) -> &str {
        UPDATE_SALES_CHANNELS_STEP_ID
    }

    async fn invoke(
        &self,
        input: UpdateSalesChannelsInput,
        ctx: &StepContext,
    ) -> Result<StepResponse<Vec<SalesChannel>, Vec<SalesChannel>>, StepError> {
        let channels: Arc<dyn SalesChannelModuleService> =
            ctx.container().resolve(keys::SALES_CHANNEL)?;

        let previous = channels.list_sales_channels(&input.selector).await?;
        let ids: Vec<String> = previous.iter().map(|channel| channel.id.clone()).collect();
        let updated = channels.update_sales_channels(&ids, &input.update).await?;

        tracing::debug!(count = updated.len(), "Updated sales channels");
        Ok(StepResponse::with_compensation(updated, previous))
    }

    fn has_compensation(&self) -> bool {
        true
    }

    async fn compensate(
        &self,
        previous: Option<Vec<SalesChannel>>,
        ctx: &StepContext,
    ) -> Result<(), StepError> {
        let Some(previous) = previous.filter(|previous| !previous.is_empty()) else {
            return Ok(());
        };

        let channels: Arc<dyn SalesChannelModuleService> =
            ctx.container().resolve(keys::SALES_CHANNEL)?;
        channels.replace_sales_channels(previous).await?;
        Ok(())
    }
}
