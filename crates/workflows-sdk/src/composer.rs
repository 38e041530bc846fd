//! Build-time workflow graph.
//!
//! A composer receives a [`WorkflowBuilder`] and a placeholder for the
//! eventual input. Each [`WorkflowBuilder::step`] call records a node and
//! returns a lazy reference to that node's eventual output; nothing runs.
//! Because a node can only reference nodes recorded before it, declaration
//! order is always a valid topological order and the graph cannot contain a
//! cycle.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::data::WorkflowData;
use crate::erased::ErasedStep;
use crate::error::DefinitionError;
use crate::registry::Registry;
use crate::step::RetryPolicy;

/// Per-invocation overrides for one step in one workflow.
#[derive(Debug, Clone, Default)]
pub struct StepConfig {
    name: Option<String>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
    when: Option<WorkflowData>,
}

impl StepConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node name for this invocation, so one step can appear twice.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the step's own retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Deadline for each forward attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs the step only when the condition resolves truthy; otherwise the
    /// step is skipped and its output is `null`.
    pub fn when(mut self, condition: impl Into<WorkflowData>) -> Self {
        self.when = Some(condition.into());
        self
    }
}

/// One step invocation in a workflow graph.
pub struct StepNode {
    pub(crate) name: String,
    pub(crate) step: Arc<dyn ErasedStep>,
    pub(crate) input: WorkflowData,
    pub(crate) when: Option<WorkflowData>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) dependencies: BTreeSet<String>,
}

impl StepNode {
    /// Node name, unique within the workflow.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered id of the step this node invokes.
    pub fn step_id(&self) -> &str {
        self.step.id()
    }

    /// Nodes whose outputs this node consumes, through its input or its
    /// condition.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    pub fn has_compensation(&self) -> bool {
        self.step.has_compensation()
    }

    pub fn is_conditional(&self) -> bool {
        self.when.is_some()
    }

    /// Retry policy set on this invocation, falling back to the step's own.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry.or_else(|| self.step.retry_policy())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for StepNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepNode")
            .field("name", &self.name)
            .field("step_id", &self.step_id())
            .field("input", &self.input)
            .field("when", &self.when)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Records step invocations while a composer runs.
pub struct WorkflowBuilder<'r> {
    registry: &'r Registry,
    nodes: Vec<StepNode>,
    names: HashSet<String>,
}

impl<'r> WorkflowBuilder<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Invokes a registered step with a (possibly lazy) input.
    pub fn step(
        &mut self,
        step_id: &str,
        input: impl Into<WorkflowData>,
    ) -> Result<WorkflowData, DefinitionError> {
        self.step_with(step_id, input, StepConfig::default())
    }

    /// Invokes a registered step with per-invocation overrides.
    pub fn step_with(
        &mut self,
        step_id: &str,
        input: impl Into<WorkflowData>,
        config: StepConfig,
    ) -> Result<WorkflowData, DefinitionError> {
        let step = self
            .registry
            .step(step_id)
            .ok_or_else(|| DefinitionError::UnknownStep(step_id.to_string()))?;

        let name = config.name.unwrap_or_else(|| step_id.to_string());
        if self.names.contains(&name) {
            return Err(DefinitionError::DuplicateNodeName(name));
        }

        let input = input.into();
        let mut dependencies = input.dependencies();
        if let Some(when) = &config.when {
            dependencies.extend(when.dependencies());
        }
        self.check_dependencies(&name, &dependencies)?;

        self.names.insert(name.clone());
        self.nodes.push(StepNode {
            name: name.clone(),
            step,
            input,
            when: config.when,
            retry: config.retry,
            timeout: config.timeout,
            dependencies,
        });

        Ok(WorkflowData::step_output(name))
    }

    /// Returns true if a node with this name has been recorded.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn check_dependencies(
        &self,
        consumer: &str,
        dependencies: &BTreeSet<String>,
    ) -> Result<(), DefinitionError> {
        match dependencies.iter().find(|dep| !self.names.contains(*dep)) {
            Some(producer) => Err(DefinitionError::UnresolvedDependency {
                consumer: consumer.to_string(),
                producer: producer.clone(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn finish(
        self,
        id: &str,
        output: WorkflowData,
    ) -> Result<WorkflowDefinition, DefinitionError> {
        self.check_dependencies("workflow output", &output.dependencies())?;

        Ok(WorkflowDefinition {
            id: Arc::from(id),
            nodes: self.nodes,
            output,
        })
    }
}

/// A compiled workflow graph, built once and shared by every execution.
pub struct WorkflowDefinition {
    pub(crate) id: Arc<str>,
    pub(crate) nodes: Vec<StepNode>,
    pub(crate) output: WorkflowData,
}

impl WorkflowDefinition {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Nodes in topological order.
    pub fn steps(&self) -> &[StepNode] {
        &self.nodes
    }

    pub fn step(&self, name: &str) -> Option<&StepNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Node names in topological order.
    pub fn step_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.name.as_str()).collect()
    }

    /// The lazy workflow output.
    pub fn output(&self) -> &WorkflowData {
        &self.output
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("id", &self.id)
            .field("steps", &self.nodes)
            .field("output", &self.output)
            .finish()
    }
}
