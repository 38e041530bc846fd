//! Per-execution state.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use common::TransactionId;
use serde_json::{Map, Value};

use crate::container::Container;
use crate::data::{NodeId, NodeKind, WorkflowData, lookup_path};
use crate::error::{ResolveError, TransformError};
use crate::orchestrator::panic_message;

/// What one step produced in this execution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StepInvocation {
    pub(crate) output: Value,
    pub(crate) compensation_input: Option<Value>,
}

/// Runtime state of one workflow execution.
///
/// Created fresh for every run and owned exclusively by it: the `invoke` map
/// holds each finished step's output and compensation input, and transform
/// results are memoized by node so a projector runs at most once per run.
#[derive(Debug)]
pub(crate) struct ExecutionContext {
    transaction_id: TransactionId,
    workflow_id: Arc<str>,
    input: Value,
    invoke: HashMap<String, StepInvocation>,
    memo: HashMap<NodeId, Value>,
    container: Container,
}

impl ExecutionContext {
    pub(crate) fn new(
        transaction_id: TransactionId,
        workflow_id: Arc<str>,
        input: Value,
        container: Container,
    ) -> Self {
        Self {
            transaction_id,
            workflow_id,
            input,
            invoke: HashMap::new(),
            memo: HashMap::new(),
            container,
        }
    }

    pub(crate) fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub(crate) fn workflow_id(&self) -> &Arc<str> {
        &self.workflow_id
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    pub(crate) fn record(&mut self, step_id: &str, invocation: StepInvocation) {
        self.invoke.insert(step_id.to_string(), invocation);
    }

    pub(crate) fn invocation(&self, step_id: &str) -> Option<&StepInvocation> {
        self.invoke.get(step_id)
    }

    /// Resolves a lazy value against what this execution has produced.
    pub(crate) fn resolve(&mut self, data: &WorkflowData) -> Result<Value, ResolveError> {
        match data.kind() {
            NodeKind::Input => Ok(self.input.clone()),
            NodeKind::Literal(value) => Ok(value.clone()),
            NodeKind::StepOutput(step_id) => self
                .invoke
                .get(step_id)
                .map(|invocation| invocation.output.clone())
                .ok_or_else(|| ResolveError::UnresolvedDependency(step_id.clone())),
            NodeKind::Project { source, path } => {
                let value = self.resolve(source)?;
                Ok(lookup_path(&value, path))
            }
            NodeKind::Transform { deps, projector } => {
                if let Some(value) = self.memo.get(&data.id()) {
                    return Ok(value.clone());
                }
                let resolved = deps
                    .iter()
                    .map(|dep| self.resolve(dep))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = std::panic::catch_unwind(AssertUnwindSafe(|| projector(&resolved)))
                    .unwrap_or_else(|payload| {
                        Err(TransformError::new(format!(
                            "Transform panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    })?;
                self.memo.insert(data.id(), value.clone());
                Ok(value)
            }
            NodeKind::Object(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    map.insert(key.clone(), self.resolve(field)?);
                }
                Ok(Value::Object(map))
            }
            NodeKind::Array(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

/// JavaScript-style truthiness, used for `when` conditions.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
