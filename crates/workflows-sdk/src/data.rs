//! Lazy workflow values.
//!
//! A [`WorkflowData`] is a node in the value graph built while a workflow is
//! composed. It stands for a value that only exists once an execution runs:
//! the workflow input, a step's output, a projection of another node, or a
//! pure transform over other nodes. Nodes are immutable; resolving one twice
//! within an execution yields the same value.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::TransformError;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a value-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One segment of a projection path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl PathSegment {
    fn parse(segment: &str) -> Self {
        match segment.parse::<usize>() {
            Ok(index) => PathSegment::Index(index),
            Err(_) => PathSegment::Field(segment.to_string()),
        }
    }

    fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        match (self, value) {
            (PathSegment::Field(field), Value::Object(map)) => map.get(field),
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
            (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Field(field) => write!(f, "{field}"),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

pub(crate) type Projector = Arc<dyn Fn(&[Value]) -> Result<Value, TransformError> + Send + Sync>;

pub(crate) enum NodeKind {
    /// The eventual workflow input.
    Input,
    /// A constant.
    Literal(Value),
    /// The output of the named step node.
    StepOutput(String),
    /// A path lookup on another node; a missing path yields `null`.
    Project {
        source: WorkflowData,
        path: Vec<PathSegment>,
    },
    /// A pure function of other nodes.
    Transform {
        deps: Vec<WorkflowData>,
        projector: Projector,
    },
    /// An object whose fields are nodes.
    Object(Vec<(String, WorkflowData)>),
    /// An array whose items are nodes.
    Array(Vec<WorkflowData>),
}

struct Node {
    id: NodeId,
    kind: NodeKind,
}

/// A lazy reference to a value produced during execution.
#[derive(Clone)]
pub struct WorkflowData {
    node: Arc<Node>,
}

impl WorkflowData {
    fn from_kind(kind: NodeKind) -> Self {
        Self {
            node: Arc::new(Node {
                id: NodeId::next(),
                kind,
            }),
        }
    }

    pub(crate) fn input() -> Self {
        Self::from_kind(NodeKind::Input)
    }

    pub(crate) fn step_output(node_name: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::StepOutput(node_name.into()))
    }

    /// A constant value.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::from_kind(NodeKind::Literal(value.into()))
    }

    /// An object whose fields may be lazy.
    pub fn object<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<WorkflowData>,
    {
        Self::from_kind(NodeKind::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// An array whose items may be lazy.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<WorkflowData>,
    {
        Self::from_kind(NodeKind::Array(items.into_iter().map(Into::into).collect()))
    }

    /// Deferred field access: the `field` of this node's eventual value.
    pub fn get(&self, field: impl Into<String>) -> Self {
        self.project_segments(vec![PathSegment::Field(field.into())])
    }

    /// Deferred index access: the `index`th item of this node's eventual value.
    pub fn at(&self, index: usize) -> Self {
        self.project_segments(vec![PathSegment::Index(index)])
    }

    /// Deferred path access, using `.`-separated segments; numeric segments
    /// index arrays. `"items.0.id"` reads `value.items[0].id`.
    pub fn project(&self, path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(PathSegment::parse)
            .collect();
        self.project_segments(segments)
    }

    fn project_segments(&self, path: Vec<PathSegment>) -> Self {
        Self::from_kind(NodeKind::Project {
            source: self.clone(),
            path,
        })
    }

    /// A pure function of this node's eventual value.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        transform([self], move |values| f(&values[0]))
    }

    /// Returns the node's identity.
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.node.kind
    }

    /// Returns the step whose execution materializes this value directly,
    /// looking through projections. Absent for inputs, literals and
    /// transforms.
    pub fn producer_step_id(&self) -> Option<&str> {
        match self.kind() {
            NodeKind::StepOutput(step) => Some(step),
            NodeKind::Project { source, .. } => source.producer_step_id(),
            _ => None,
        }
    }

    /// Returns every step this value transitively depends on.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        self.collect_dependencies(&mut deps);
        deps
    }

    fn collect_dependencies(&self, deps: &mut BTreeSet<String>) {
        match self.kind() {
            NodeKind::Input | NodeKind::Literal(_) => {}
            NodeKind::StepOutput(step) => {
                deps.insert(step.clone());
            }
            NodeKind::Project { source, .. } => source.collect_dependencies(deps),
            NodeKind::Transform { deps: inputs, .. } | NodeKind::Array(inputs) => {
                for input in inputs {
                    input.collect_dependencies(deps);
                }
            }
            NodeKind::Object(fields) => {
                for (_, field) in fields {
                    field.collect_dependencies(deps);
                }
            }
        }
    }

    /// Returns true if the value can only be known at execution time.
    pub fn is_lazy(&self) -> bool {
        match self.kind() {
            NodeKind::Literal(_) => false,
            NodeKind::Object(fields) => fields.iter().any(|(_, f)| f.is_lazy()),
            NodeKind::Array(items) => items.iter().any(WorkflowData::is_lazy),
            _ => true,
        }
    }
}

pub(crate) fn lookup_path(value: &Value, path: &[PathSegment]) -> Value {
    path.iter()
        .try_fold(value, |current, segment| segment.lookup(current))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Derives a new lazy value from `deps` with a pure projector.
///
/// The projector receives the resolved dependencies in order. It must be
/// deterministic and free of side effects.
///
/// ```
/// use serde_json::json;
/// use workflows_sdk::{WorkflowData, transform};
///
/// let a = WorkflowData::literal(2);
/// let b = WorkflowData::literal(3);
/// let sum = transform([&a, &b], |values| {
///     Ok(json!(values[0].as_i64().unwrap_or(0) + values[1].as_i64().unwrap_or(0)))
/// });
/// assert!(sum.is_lazy());
/// ```
pub fn transform<I, F>(deps: I, projector: F) -> WorkflowData
where
    I: IntoIterator,
    I::Item: Into<WorkflowData>,
    F: Fn(&[Value]) -> Result<Value, TransformError> + Send + Sync + 'static,
{
    WorkflowData::from_kind(NodeKind::Transform {
        deps: deps.into_iter().map(Into::into).collect(),
        projector: Arc::new(projector),
    })
}

impl From<&WorkflowData> for WorkflowData {
    fn from(data: &WorkflowData) -> Self {
        data.clone()
    }
}

impl From<Value> for WorkflowData {
    fn from(value: Value) -> Self {
        WorkflowData::literal(value)
    }
}

impl std::fmt::Debug for WorkflowData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            NodeKind::Input => write!(f, "Input"),
            NodeKind::Literal(value) => write!(f, "Literal({value})"),
            NodeKind::StepOutput(step) => write!(f, "StepOutput({step})"),
            NodeKind::Project { source, path } => {
                let path: Vec<String> = path.iter().map(ToString::to_string).collect();
                write!(f, "Project({source:?}, {})", path.join("."))
            }
            NodeKind::Transform { deps, .. } => f.debug_tuple("Transform").field(deps).finish(),
            NodeKind::Object(fields) => {
                let mut map = f.debug_map();
                for (k, v) in fields {
                    map.entry(k, v);
                }
                map.finish()
            }
            NodeKind::Array(items) => f.debug_list().entries(items).finish(),
        }
    }
}
