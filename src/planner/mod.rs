//! Plans, their state machine, and the two executors that drive them.

mod broker;
mod events;
mod executor;
mod fallback;
mod generator;
mod parser;
mod runner;
mod snapshot;
mod streaming;
mod types;

pub use broker::{AutoDenyBroker, ChannelConfirmationBroker, ConfirmationBroker, PendingConfirmation};
pub use events::{EventKind, ExecutionEvent};
pub use executor::{Advance, ExecutionState, PlanExecutor};
pub use fallback::{FallbackPlanner, PLANNER_KEY};
pub use generator::{PlanDrafter, PlanGenerator};
pub use parser::PlanParser;
pub use runner::{CONTEXT_CONFIDENCE_KEY, ConfirmationRequest};
pub use snapshot::{
    InMemoryPlanStore, JsonFilePlanStore, PlanSnapshot, PlanStore, SNAPSHOT_VERSION,
};
pub use streaming::{ExecutionHandle, StreamingExecutor, StreamingRun};
pub use types::{Plan, PlanStatus, PlanStep, StepStatus};
