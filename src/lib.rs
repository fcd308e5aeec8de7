//! # Run-State Store
//!
//! Checkpoint and recovery for long-running, multi-step, multi-matrix test
//! runs: snapshot a live run into durable storage, keep the snapshot
//! current as actions and steps complete, and rebuild a fully-linked,
//! resumable run from storage after a process restart.
//!
//! ## Core Concepts
//!
//! - **Snapshots**: flat, durable copies of a run, its steps, matrices,
//!   actions and results
//! - **Storage operators**: pluggable persistence; the file operator pages
//!   large action lists across numbered files
//! - **State manager**: save/load orchestration and live-run reconstruction
//! - **State updater**: per-action and per-step incremental persistence
//!
//! ## Example
//!
//! ```ignore
//! use runstate::{
//!     default_action_converter, default_step_converter, ActionRegistry,
//!     FileStateOperator, StateManager,
//! };
//!
//! let mut registry = ActionRegistry::new();
//! registry.register_generic("SendMessage");
//!
//! let operator = FileStateOperator::new("./saved_state")?;
//! let mut manager = StateManager::new(operator, Box::new(registry));
//!
//! // While the run executes:
//! let mut updater = manager.save_before_updates(
//!     &execution, &step_factory, &reports,
//!     default_step_converter(), default_action_converter(),
//! )?;
//! updater.on_action_completed(action, step)?;
//!
//! // After a restart:
//! let snapshot = manager.load()?;
//! let execution = manager.rebuild(&snapshot, &scheduler, &executor_factory,
//!     business_day, base_time, Some("admin".into()))?;
//! ```

pub mod error;
pub mod manager;
pub mod run;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod updater;

// Re-exports
pub use error::{Result, StateError};
pub use manager::StateManager;
pub use run::{
    Action, ActionData, ActionFactory, ActionRef, ActionRegistry, ContextSettings,
    DefaultExecutorFactory, DefaultStepFactory, Execution, ExecutionContext, ExecutorFactory,
    GenericAction, HistoryHandler, Matrix, NullHistoryHandler, Preparable, RunResult, Scheduler,
    Step, StepFactory, StepSettings,
};
pub use snapshot::{
    ActionSnapshot, MatrixSnapshot, ResultSnapshot, RunInfo, RunObjects, RunSnapshot, StepSnapshot,
};
pub use storage::{
    FileHandle, FileStateOperator, MemoryHandle, MemoryStateOperator, StateOperator,
    DEFAULT_PAGE_SIZE,
};
pub use types::*;
pub use updater::{
    default_action_converter, default_step_converter, ActionConverter, StateUpdater, StepConverter,
};
