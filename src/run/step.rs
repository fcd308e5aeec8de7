//! Live steps and the factory that creates them.

use crate::run::execution::ActionRef;
use crate::snapshot::StepSnapshot;
use crate::types::{ExecutionProgress, StartKind, StepContext, Timestamp};
use std::collections::BTreeMap;

/// A named phase of a run with its own scheduling rules, containing actions
/// from possibly many matrices.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub name: String,
    pub kind: String,
    /// Raw scheduled-start specification, interpreted per `start_at_type`.
    pub start_at: String,
    pub start_at_type: StartKind,
    pub wait_next_day: bool,
    pub parameter: Option<String>,
    pub ask_for_continue: bool,
    pub ask_if_failed: bool,
    pub execute: bool,
    pub comment: String,

    pub started: Option<Timestamp>,
    pub finished: Option<Timestamp>,
    pub execution_progress: ExecutionProgress,
    pub successful: bool,
    pub status_comment: Option<String>,
    /// Message of the error that interrupted the step, if any.
    pub error: Option<String>,

    /// Step-scoped data kept per matrix, keyed by logical matrix name.
    pub step_contexts: BTreeMap<String, StepContext>,
    /// Actions scheduled into this step, in execution order.
    pub actions: Vec<ActionRef>,
}

/// Everything needed to create a fresh step, before any execution state.
#[derive(Clone, Debug, Default)]
pub struct StepSettings {
    pub name: String,
    pub kind: String,
    pub start_at: String,
    pub start_at_type: StartKind,
    pub wait_next_day: bool,
    pub parameter: Option<String>,
    pub ask_for_continue: bool,
    pub ask_if_failed: bool,
    pub execute: bool,
    pub comment: String,
}

/// Creates live steps and snapshots them back.
pub trait StepFactory {
    fn create_step(&self, settings: StepSettings) -> Step;

    fn snapshot_of(&self, step: &Step) -> StepSnapshot;
}

/// Step factory producing plain [`Step`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultStepFactory;

impl StepFactory for DefaultStepFactory {
    fn create_step(&self, settings: StepSettings) -> Step {
        Step {
            name: settings.name,
            kind: settings.kind,
            start_at: settings.start_at,
            start_at_type: settings.start_at_type,
            wait_next_day: settings.wait_next_day,
            parameter: settings.parameter,
            ask_for_continue: settings.ask_for_continue,
            ask_if_failed: settings.ask_if_failed,
            execute: settings.execute,
            comment: settings.comment,
            started: None,
            finished: None,
            execution_progress: ExecutionProgress::default(),
            successful: true,
            status_comment: None,
            error: None,
            step_contexts: BTreeMap::new(),
            actions: Vec::new(),
        }
    }

    fn snapshot_of(&self, step: &Step) -> StepSnapshot {
        StepSnapshot::of(step)
    }
}
