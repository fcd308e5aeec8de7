//! Orchestration between the live run, the state model and a storage
//! operator: snapshot a run, persist it, load it back and rebuild a live,
//! resumable run from it.

use crate::error::{Result, StateError};
use crate::run::{
    Action, ActionFactory, ActionRef, ContextSettings, Execution, ExecutorFactory, HistoryHandler,
    NullHistoryHandler, Scheduler, Step, StepFactory,
};
use crate::snapshot::{MatrixSnapshot, RunInfo, RunObjects, RunSnapshot};
use crate::storage::StateOperator;
use crate::types::{ReportsInfo, Timestamp};
use crate::updater::{
    default_action_converter, default_step_converter, ActionConverter, StateUpdater, StepConverter,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

type HistoryFactory = Box<dyn Fn(&str) -> Box<dyn HistoryHandler>>;

/// Builds snapshots from live runs, rebuilds live runs from snapshots, and
/// delegates persistence to the storage operator it owns.
///
/// Factories are injected here rather than looked up from ambient state:
/// the action factory at construction, the step and executor factories per
/// call (they belong to the scheduler driving the run).
pub struct StateManager<O: StateOperator> {
    operator: O,
    action_factory: Box<dyn ActionFactory>,
    history_factory: HistoryFactory,
    info: Option<RunInfo>,
    handle: Option<O::Handle>,
}

impl<O: StateOperator> StateManager<O> {
    pub fn new(operator: O, action_factory: Box<dyn ActionFactory>) -> Self {
        Self {
            operator,
            action_factory,
            history_factory: Box::new(|_| Box::new(NullHistoryHandler)),
            info: None,
            handle: None,
        }
    }

    /// Replace the factory used to build the fresh execution-history
    /// handler on rebuild. Defaults to a handler that records nothing.
    pub fn with_history_factory(
        mut self,
        factory: impl Fn(&str) -> Box<dyn HistoryHandler> + 'static,
    ) -> Self {
        self.history_factory = Box::new(factory);
        self
    }

    /// Run-level state of the last save or load, if any.
    pub fn run_info(&self) -> Option<&RunInfo> {
        self.info.as_ref()
    }

    /// Build a snapshot of a live run. Pure conversion; persists nothing.
    pub fn snapshot_of_run(
        &self,
        execution: &Execution,
        step_factory: &dyn StepFactory,
        reports: &ReportsInfo,
    ) -> RunSnapshot {
        let mut info = RunInfo::new();
        info.set_steps(
            execution
                .steps
                .iter()
                .map(|step| step_factory.snapshot_of(step))
                .collect(),
        );
        info.matrices = execution
            .matrices
            .iter()
            .map(|matrix| matrix.short_file_name())
            .collect();
        info.weekend_holiday = execution.context.weekend_holiday;
        info.holidays = execution.context.holidays.clone();
        info.business_day = execution.context.business_day;
        info.started_by_user = execution.context.started_by_user.clone();
        info.started = execution.started;
        info.ended = execution.ended;
        info.reports = reports.clone();

        let objects = RunObjects {
            matrices: execution.matrices.iter().map(MatrixSnapshot::of).collect(),
            fixed_ids: execution.fixed_ids.clone(),
        };

        RunSnapshot { info, objects }
    }

    /// Snapshot the live run and write it as a brand-new, complete save.
    pub fn save(
        &mut self,
        execution: &Execution,
        step_factory: &dyn StepFactory,
        reports: &ReportsInfo,
    ) -> Result<()> {
        info!(run = %execution.scheduler_name, "saving run state");

        let snapshot = self.snapshot_of_run(execution, step_factory, reports);
        let handle = self.operator.save(&snapshot.info, &snapshot.objects)?;
        self.info = Some(snapshot.info);
        self.handle = Some(handle);
        Ok(())
    }

    /// Save the run, then hand out the updater the execution loop feeds
    /// with completed actions and steps.
    pub fn save_before_updates<'a>(
        &'a mut self,
        execution: &Execution,
        step_factory: &dyn StepFactory,
        reports: &ReportsInfo,
        to_step: StepConverter<'a>,
        to_action: ActionConverter<'a>,
    ) -> Result<StateUpdater<'a, O>> {
        self.save(execution, step_factory, reports)?;
        self.state_updater(to_step, to_action)
    }

    /// Updater over the current run state. Fails with
    /// [`StateError::NoStateInfo`] unless a run was saved or loaded first.
    pub fn state_updater<'a>(
        &'a mut self,
        to_step: StepConverter<'a>,
        to_action: ActionConverter<'a>,
    ) -> Result<StateUpdater<'a, O>> {
        match (self.info.as_mut(), self.handle.as_mut()) {
            (Some(info), Some(handle)) => Ok(StateUpdater::new(
                info,
                handle,
                &mut self.operator,
                to_step,
                to_action,
            )),
            _ => Err(StateError::NoStateInfo),
        }
    }

    /// Load the full snapshot from storage.
    pub fn load(&mut self) -> Result<RunSnapshot> {
        info!("loading run state");

        let (loaded_info, mut handle) = self.operator.load_info()?;
        let objects = self.operator.load_objects(&mut handle)?;
        validate_matrix_lists(&loaded_info, &objects)?;

        self.info = Some(loaded_info.clone());
        self.handle = Some(handle);
        Ok(RunSnapshot {
            info: loaded_info,
            objects,
        })
    }

    /// Rebuild a live, fully-linked, resumable run from a snapshot.
    ///
    /// Each reconstructed action attaches to the first step whose name
    /// matches its step name; an action whose step is missing stays
    /// unattached and will never execute. Attached, executable actions with
    /// the preparation capability are collected into the preparables index,
    /// first registration per action name wins. Per-matrix step contexts
    /// re-link by logical matrix name.
    pub fn rebuild(
        &self,
        snapshot: &RunSnapshot,
        scheduler: &dyn Scheduler,
        executor_factory: &dyn ExecutorFactory,
        business_day: Option<Timestamp>,
        base_time: Option<Timestamp>,
        started_by_user: Option<String>,
    ) -> Result<Execution> {
        let run_info = &snapshot.info;
        let step_factory = scheduler.step_factory();

        let mut steps: Vec<_> = run_info
            .steps()
            .iter()
            .map(|step_snapshot| step_snapshot.to_live(step_factory))
            .collect();

        let mut matrices = Vec::with_capacity(snapshot.objects.matrices.len());
        let mut preparables: BTreeMap<String, ActionRef> = BTreeMap::new();
        for (matrix_index, matrix_snapshot) in snapshot.objects.matrices.iter().enumerate() {
            let matrix = matrix_snapshot.to_live(self.action_factory.as_ref())?;

            for (action_index, action) in matrix.actions.iter().enumerate() {
                let data = action.data();
                let at = ActionRef {
                    matrix: matrix_index,
                    action: action_index,
                };
                if let Some(step) = steps.iter_mut().find(|step| step.name == data.step_name) {
                    step.actions.push(at);
                    if data.executable && action.as_preparable().is_some() {
                        preparables.entry(data.name.clone()).or_insert(at);
                    }
                } else {
                    debug!(
                        action = %data.id_in_matrix,
                        step = %data.step_name,
                        "action references no known step; leaving it unscheduled"
                    );
                }
            }

            matrices.push(matrix);
        }

        for (step, step_snapshot) in steps.iter_mut().zip(run_info.steps()) {
            for matrix in &matrices {
                if let Some(context) = step_snapshot.step_contexts.get(&matrix.name) {
                    step.step_contexts
                        .insert(matrix.name.clone(), context.clone());
                }
            }
        }

        let history = (self.history_factory)(scheduler.name());
        let context = executor_factory.create_execution_context(
            ContextSettings {
                business_day,
                base_time,
                weekend_holiday: run_info.weekend_holiday,
                holidays: run_info.holidays.clone(),
                started_by_user,
            },
            history,
        );

        let mut execution = executor_factory.create_executor(
            scheduler,
            steps,
            matrices,
            context,
            preparables,
            run_info.reports.clone(),
        );
        execution.fixed_ids = snapshot.objects.fixed_ids.clone();
        execution.started = run_info.started;
        execution.ended = run_info.ended;

        Ok(execution)
    }

    /// Persist one completed action using the default snapshot conversions.
    /// Thin delegation to the storage operator; an execution loop driving a
    /// whole run should hold a [`StateUpdater`] instead.
    pub fn update_after_action(&mut self, action: &dyn Action, step: &Step) -> Result<()> {
        let mut updater =
            self.state_updater(default_step_converter(), default_action_converter())?;
        updater.on_action_completed(action, step)
    }

    /// Persist the current step states. Fails with
    /// [`StateError::NoStateInfo`] unless a run was saved or loaded first.
    pub fn update_steps(&mut self) -> Result<()> {
        info!("updating state of steps");

        match (self.info.as_ref(), self.handle.as_mut()) {
            (Some(run_info), Some(handle)) => self.operator.update_steps(run_info, handle),
            _ => Err(StateError::NoStateInfo),
        }
    }

    /// Release the storage operator's resources.
    pub fn close(&mut self) -> Result<()> {
        self.operator.close()
    }
}

/// The matrix short names recorded in the run info must correspond one to
/// one, in order, with the matrices actually stored. A mismatch means the
/// snapshot's parts are out of sync.
fn validate_matrix_lists(run_info: &RunInfo, objects: &RunObjects) -> Result<()> {
    if run_info.matrices.len() != objects.matrices.len() {
        return Err(StateError::Reconstruction(format!(
            "run info lists {} matrices but {} are stored",
            run_info.matrices.len(),
            objects.matrices.len()
        )));
    }
    for (expected, matrix) in run_info.matrices.iter().zip(&objects.matrices) {
        let stored = matrix.short_file_name();
        if *expected != stored {
            return Err(StateError::Reconstruction(format!(
                "matrix list mismatch: run info has '{expected}' where '{stored}' is stored"
            )));
        }
    }
    Ok(())
}
