//! The resumable run object and the factories that assemble it.

use crate::run::action::Action;
use crate::run::matrix::Matrix;
use crate::run::step::{Step, StepFactory};
use crate::types::{ReportsInfo, Timestamp};
use std::collections::BTreeMap;

/// Position of an action within a run: indices into the run's matrix list
/// and that matrix's action list. Steps and the preparables index reference
/// actions this way instead of holding pointers back into the matrices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionRef {
    pub matrix: usize,
    pub action: usize,
}

/// Sink for execution-history events produced while a run is active.
pub trait HistoryHandler: Send {
    /// An action finished executing and its outcome is final.
    fn action_finished(&mut self, _matrix: &str, _action_id: &str) {}

    /// A step finished executing.
    fn step_finished(&mut self, _step: &str) {}
}

/// History handler that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHistoryHandler;

impl HistoryHandler for NullHistoryHandler {}

/// Calendar and identity parameters a fresh execution context is built from.
#[derive(Clone, Debug, Default)]
pub struct ContextSettings {
    pub business_day: Option<Timestamp>,
    pub base_time: Option<Timestamp>,
    pub weekend_holiday: bool,
    pub holidays: BTreeMap<String, bool>,
    pub started_by_user: Option<String>,
}

/// Run-wide context the execution engine threads through every action.
pub struct ExecutionContext {
    pub business_day: Option<Timestamp>,
    pub base_time: Option<Timestamp>,
    pub weekend_holiday: bool,
    pub holidays: BTreeMap<String, bool>,
    pub started_by_user: Option<String>,
    pub history: Box<dyn HistoryHandler>,
}

/// The scheduler owning the run lifecycle. Consumed, never implemented here.
pub trait Scheduler {
    fn name(&self) -> &str;

    fn step_factory(&self) -> &dyn StepFactory;
}

/// Assembles execution contexts and executable runs.
pub trait ExecutorFactory {
    fn create_execution_context(
        &self,
        settings: ContextSettings,
        history: Box<dyn HistoryHandler>,
    ) -> ExecutionContext;

    fn create_executor(
        &self,
        scheduler: &dyn Scheduler,
        steps: Vec<Step>,
        matrices: Vec<Matrix>,
        context: ExecutionContext,
        preparables: BTreeMap<String, ActionRef>,
        reports: ReportsInfo,
    ) -> Execution;
}

/// Executor factory producing plain [`Execution`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultExecutorFactory;

impl ExecutorFactory for DefaultExecutorFactory {
    fn create_execution_context(
        &self,
        settings: ContextSettings,
        history: Box<dyn HistoryHandler>,
    ) -> ExecutionContext {
        ExecutionContext {
            business_day: settings.business_day,
            base_time: settings.base_time,
            weekend_holiday: settings.weekend_holiday,
            holidays: settings.holidays,
            started_by_user: settings.started_by_user,
            history,
        }
    }

    fn create_executor(
        &self,
        scheduler: &dyn Scheduler,
        steps: Vec<Step>,
        matrices: Vec<Matrix>,
        context: ExecutionContext,
        preparables: BTreeMap<String, ActionRef>,
        reports: ReportsInfo,
    ) -> Execution {
        Execution {
            scheduler_name: scheduler.name().to_string(),
            steps,
            matrices,
            context,
            preparables,
            reports,
            fixed_ids: BTreeMap::new(),
            started: None,
            ended: None,
        }
    }
}

/// A live, resumable run: the full object graph the execution loop drives
/// and the checkpoint subsystem snapshots.
pub struct Execution {
    pub scheduler_name: String,
    pub steps: Vec<Step>,
    pub matrices: Vec<Matrix>,
    pub context: ExecutionContext,
    /// Actions needing a preparation pass, keyed by action name. First
    /// registration wins; one distinct preparation per name per restart.
    pub preparables: BTreeMap<String, ActionRef>,
    pub reports: ReportsInfo,
    /// Deterministic id seeds reused across restarts.
    pub fixed_ids: BTreeMap<String, String>,
    pub started: Option<Timestamp>,
    pub ended: Option<Timestamp>,
}

impl Execution {
    pub fn action(&self, at: ActionRef) -> &dyn Action {
        self.matrices[at.matrix].actions[at.action].as_ref()
    }

    pub fn action_mut(&mut self, at: ActionRef) -> &mut dyn Action {
        self.matrices[at.matrix].actions[at.action].as_mut()
    }

    /// Where execution resumes: the first executable, not-yet-done action of
    /// the first step still scheduled to run, in step then action order.
    pub fn first_pending_action(&self) -> Option<ActionRef> {
        for step in &self.steps {
            if !step.execute {
                continue;
            }
            for at in &step.actions {
                let data = self.action(*at).data();
                if data.executable && !data.done {
                    return Some(*at);
                }
            }
        }
        None
    }
}
