//! Live run model and the collaborator seams this subsystem consumes.
//!
//! The execution engine itself lives outside this crate; what lives here is
//! the data it operates on (steps, matrices, actions) and the traits through
//! which a run is reconstructed (action/step/executor factories).

mod action;
mod execution;
mod matrix;
mod step;

pub use action::{
    Action, ActionData, ActionFactory, ActionRegistry, GenericAction, Preparable, RunResult,
};
pub use execution::{
    ActionRef, ContextSettings, DefaultExecutorFactory, Execution, ExecutionContext,
    ExecutorFactory, HistoryHandler, NullHistoryHandler, Scheduler,
};
pub use matrix::Matrix;
pub use step::{DefaultStepFactory, Step, StepFactory, StepSettings};
