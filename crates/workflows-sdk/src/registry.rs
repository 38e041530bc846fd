//! Step and workflow registries.

use std::collections::HashMap;
use std::sync::Arc;

use crate::composer::{WorkflowBuilder, WorkflowDefinition};
use crate::data::WorkflowData;
use crate::erased::{ErasedStep, StepWrapper};
use crate::error::{DefinitionError, RegistryError};
use crate::step::{RetryPolicy, Step};

/// Summary of a registered step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub id: String,
    pub has_compensation: bool,
    pub retry: Option<RetryPolicy>,
}

/// Registered steps and compiled workflows.
///
/// A registry is populated at startup and only read afterwards. Compiled
/// definitions are handed out as `Arc`s, so executions never hold a borrow
/// of the registry itself. Tests build an isolated registry each.
#[derive(Default)]
pub struct Registry {
    steps: HashMap<String, Arc<dyn ErasedStep>>,
    workflows: HashMap<String, Arc<WorkflowDefinition>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step under its id.
    pub fn register_step<S: Step>(&mut self, step: S) -> Result<(), RegistryError> {
        let id = step.id().to_string();
        if self.steps.contains_key(&id) {
            return Err(RegistryError::DuplicateStepId(id));
        }

        tracing::debug!(step_id = %id, "Registered step");
        self.steps.insert(id, Arc::new(StepWrapper::new(step)));
        Ok(())
    }

    /// Compiles a workflow by running its composer once.
    ///
    /// The composer receives a builder and a placeholder for the eventual
    /// input, and returns the lazy workflow output. It must only wire steps
    /// and transforms; it never runs again for this id.
    pub fn define_workflow<F>(
        &mut self,
        id: &str,
        composer: F,
    ) -> Result<Arc<WorkflowDefinition>, RegistryError>
    where
        F: FnOnce(&mut WorkflowBuilder<'_>, WorkflowData) -> Result<WorkflowData, DefinitionError>,
    {
        if self.workflows.contains_key(id) {
            return Err(RegistryError::DuplicateWorkflowId(id.to_string()));
        }

        let definition = self.compile(id, composer).map_err(|source| {
            RegistryError::Definition {
                workflow_id: id.to_string(),
                source,
            }
        })?;

        let definition = Arc::new(definition);
        tracing::debug!(workflow_id = %id, steps = definition.len(), "Defined workflow");
        self.workflows.insert(id.to_string(), definition.clone());
        Ok(definition)
    }

    fn compile<F>(&self, id: &str, composer: F) -> Result<WorkflowDefinition, DefinitionError>
    where
        F: FnOnce(&mut WorkflowBuilder<'_>, WorkflowData) -> Result<WorkflowData, DefinitionError>,
    {
        let mut builder = WorkflowBuilder::new(self);
        let output = composer(&mut builder, WorkflowData::input())?;
        builder.finish(id, output)
    }

    /// Returns a compiled workflow.
    pub fn workflow(&self, id: &str) -> Result<Arc<WorkflowDefinition>, RegistryError> {
        self.workflows
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownWorkflow(id.to_string()))
    }

    /// Describes a registered step.
    pub fn step_info(&self, id: &str) -> Result<StepInfo, RegistryError> {
        let step = self
            .steps
            .get(id)
            .ok_or_else(|| RegistryError::UnknownStep(id.to_string()))?;

        Ok(StepInfo {
            id: id.to_string(),
            has_compensation: step.has_compensation(),
            retry: step.retry_policy(),
        })
    }

    pub fn has_step(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }

    pub fn has_workflow(&self, id: &str) -> bool {
        self.workflows.contains_key(id)
    }

    /// Registered step ids, sorted.
    pub fn step_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Defined workflow ids, sorted.
    pub fn workflow_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.workflows.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn step(&self, id: &str) -> Option<Arc<dyn ErasedStep>> {
        self.steps.get(id).cloned()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("steps", &self.step_ids())
            .field("workflows", &self.workflow_ids())
            .finish()
    }
}
