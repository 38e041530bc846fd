//! Saga-style workflow orchestration.
//!
//! Business operations are declared as graphs of steps, each with a forward
//! action and an optional compensation. A workflow is composed once into a
//! [`WorkflowDefinition`] and run many times by a [`TransactionOrchestrator`]:
//!
//! 1. Steps are registered in a [`Registry`].
//! 2. `Registry::define_workflow` runs a composer against placeholder
//!    [`WorkflowData`] values and records the dependency graph.
//! 3. Each run resolves lazy values against that run's step outputs, runs
//!    independent steps concurrently and, if anything fails, compensates the
//!    succeeded steps in reverse topological order.
//!
//! Every transition is published as an [`EventEnvelope`]; the
//! [`ExecutionRecord`] returned with each run is a fold over those events.

pub mod channel;
pub mod composer;
pub mod config;
pub mod container;
mod context;
pub mod data;
mod erased;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod record;
pub mod registry;
pub mod result;
pub mod state;
pub mod step;
pub mod store;

pub use channel::{EventChannel, EventSubscriber};
pub use common::TransactionId;
pub use composer::{StepConfig, StepNode, WorkflowBuilder, WorkflowDefinition};
pub use config::OrchestratorConfig;
pub use container::Container;
pub use data::{NodeId, PathSegment, WorkflowData, transform};
pub use error::{
    ContainerError, DefinitionError, Error, RegistryError, ResolveError, Result, StepError,
    StoreError, SubscriberError, TransformError,
};
pub use events::{EventEnvelope, SkipReason, WorkflowEvent};
pub use orchestrator::TransactionOrchestrator;
pub use record::{ExecutionRecord, StepRecord};
pub use registry::{Registry, StepInfo};
pub use result::{FailureKind, WorkflowFailure, WorkflowResult};
pub use state::{StepStatus, TransactionState};
pub use step::{FnStep, RetryPolicy, Step, StepContext, StepResponse};
pub use store::{ExecutionStore, InMemoryExecutionStore};
pub use tokio_util::sync::CancellationToken;
