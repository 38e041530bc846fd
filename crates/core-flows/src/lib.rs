//! Business steps and workflows for the commerce modules.
//!
//! Steps resolve their module services from the step container under the
//! keys in [`modules::keys`]. [`InMemoryModules`] provides a container backed
//! by in-memory services.

pub mod error;
pub mod modules;
pub mod steps;
pub mod workflows;

use workflows_sdk::Registry;

pub use error::ServiceError;
pub use modules::{Fixtures, InMemoryModules};

/// Registers every core step and defines every core workflow.
pub fn register_all(registry: &mut Registry) -> workflows_sdk::Result<()> {
    registry.register_step(steps::DeleteStoresStep)?;
    registry.register_step(steps::DeleteOrderChangesStep)?;
    registry.register_step(steps::AddRulesToPromotionsStep)?;
    registry.register_step(steps::UpdateSalesChannelsStep)?;
    registry.register_step(steps::EmitEventStep)?;

    workflows::delete_stores::define(registry)?;
    workflows::update_sales_channels::define(registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use workflows_sdk::{Error, RegistryError};

    use super::*;

    #[test]
    fn test_register_all() {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();

        assert_eq!(
            registry.workflow_ids(),
            vec!["delete-stores", "update-sales-channels"]
        );
        assert_eq!(registry.step_ids().len(), 5);
        assert!(registry.step_info("delete-stores").unwrap().has_compensation);
        assert!(!registry.step_info("emit-event").unwrap().has_compensation);
    }

    #[test]
    fn test_register_all_twice_is_rejected() {
        let mut registry = Registry::new();
        register_all(&mut registry).unwrap();

        assert!(matches!(
            register_all(&mut registry),
            Err(Error::Registry(RegistryError::DuplicateStepId(_)))
        ));
    }
}
