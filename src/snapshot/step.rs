//! Snapshots of steps.

use crate::run::{Step, StepFactory, StepSettings};
use crate::types::{ExecutionProgress, StartKind, StepContext, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable form of one step: scheduling settings plus execution state.
///
/// Per-matrix step contexts are stored keyed by logical matrix name; they
/// are re-linked to the reconstructed matrices during rebuild.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
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

    pub started: Option<Timestamp>,
    pub finished: Option<Timestamp>,
    pub execution_progress: ExecutionProgress,
    pub successful: bool,
    pub status_comment: Option<String>,
    pub error: Option<String>,

    pub step_contexts: BTreeMap<String, StepContext>,
}

impl StepSnapshot {
    pub fn of(step: &Step) -> Self {
        Self {
            name: step.name.clone(),
            kind: step.kind.clone(),
            start_at: step.start_at.clone(),
            start_at_type: step.start_at_type,
            wait_next_day: step.wait_next_day,
            parameter: step.parameter.clone(),
            ask_for_continue: step.ask_for_continue,
            ask_if_failed: step.ask_if_failed,
            execute: step.execute,
            comment: step.comment.clone(),
            started: step.started,
            finished: step.finished,
            execution_progress: step.execution_progress,
            successful: step.successful,
            status_comment: step.status_comment.clone(),
            error: step.error.clone(),
            step_contexts: step.step_contexts.clone(),
        }
    }

    /// Rebuild the live step through the given factory and restore its
    /// execution state. Step contexts and scheduled actions are attached
    /// separately, once matrices exist to link to.
    pub fn to_live(&self, factory: &dyn StepFactory) -> Step {
        let mut step = factory.create_step(StepSettings {
            name: self.name.clone(),
            kind: self.kind.clone(),
            start_at: self.start_at.clone(),
            start_at_type: self.start_at_type,
            wait_next_day: self.wait_next_day,
            parameter: self.parameter.clone(),
            ask_for_continue: self.ask_for_continue,
            ask_if_failed: self.ask_if_failed,
            execute: self.execute,
            comment: self.comment.clone(),
        });

        step.started = self.started;
        step.finished = self.finished;
        step.execution_progress = self.execution_progress;
        step.successful = self.successful;
        step.status_comment = self.status_comment.clone();
        step.error = self.error.clone();

        step
    }
}
