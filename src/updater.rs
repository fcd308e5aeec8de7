//! Incremental state updates driven by the execution loop.

use crate::error::Result;
use crate::run::{Action, Step};
use crate::snapshot::{ActionSnapshot, RunInfo, StepSnapshot};
use crate::storage::StateOperator;
use tracing::debug;

/// Converts a live step into its snapshot.
pub type StepConverter<'a> = Box<dyn Fn(&Step) -> StepSnapshot + 'a>;

/// Converts a live action into its snapshot.
pub type ActionConverter<'a> = Box<dyn Fn(&dyn Action) -> ActionSnapshot + 'a>;

/// The step converter most callers want: the plain snapshot constructor.
pub fn default_step_converter<'a>() -> StepConverter<'a> {
    Box::new(StepSnapshot::of)
}

/// The action converter most callers want: the plain snapshot constructor.
pub fn default_action_converter<'a>() -> ActionConverter<'a> {
    Box::new(ActionSnapshot::of)
}

/// Handed to the execution loop; on every completed action or step it
/// produces the minimal state delta, refreshes the run info's step entry in
/// place, and asks the storage operator to persist the change.
///
/// Conversion from the live step/action types is supplied by the caller as
/// closures, keeping this type decoupled from how snapshots are customized.
/// Single-writer: exactly one thread may drive an updater.
pub struct StateUpdater<'a, O: StateOperator> {
    info: &'a mut RunInfo,
    handle: &'a mut O::Handle,
    operator: &'a mut O,
    to_step: StepConverter<'a>,
    to_action: ActionConverter<'a>,
}

impl<O: StateOperator> std::fmt::Debug for StateUpdater<'_, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateUpdater")
            .field("steps", &self.info.steps().len())
            .finish_non_exhaustive()
    }
}

impl<'a, O: StateOperator> StateUpdater<'a, O> {
    pub(crate) fn new(
        info: &'a mut RunInfo,
        handle: &'a mut O::Handle,
        operator: &'a mut O,
        to_step: StepConverter<'a>,
        to_action: ActionConverter<'a>,
    ) -> Self {
        Self {
            info,
            handle,
            operator,
            to_step,
            to_action,
        }
    }

    pub fn run_info(&self) -> &RunInfo {
        self.info
    }

    /// Persist the effect of one completed action: refresh its owning
    /// step's entry in the run info, then hand the action snapshot to the
    /// storage operator.
    pub fn on_action_completed(&mut self, action: &dyn Action, step: &Step) -> Result<()> {
        let data = action.data();
        debug!(
            action = %data.id_in_matrix,
            matrix = %data.matrix_name,
            "updating state after action"
        );

        let step_snapshot = (self.to_step)(step);
        self.update_step_in_place(step, step_snapshot)?;

        let action_snapshot = (self.to_action)(action);
        self.operator
            .update_after_action(self.info, self.handle, action, &action_snapshot)
    }

    /// Persist the effect of one completed step.
    pub fn on_step_completed(&mut self, step: &Step) -> Result<()> {
        debug!(step = %step.name, "updating state after step");

        let step_snapshot = (self.to_step)(step);
        self.update_step_in_place(step, step_snapshot.clone())?;

        self.operator
            .update_after_step(self.info, self.handle, step, &step_snapshot)
    }

    /// Record the now-known action-reports path and persist the run info.
    pub fn on_reports_path_known(&mut self, path: &str) -> Result<()> {
        self.info.reports.action_reports_path = Some(path.to_string());
        self.operator.update_run_info(self.info, self.handle)
    }

    /// Replace the run info's snapshot of `step` with `updated`, keeping
    /// its list position and refreshing the name index.
    pub fn update_step_in_place(&mut self, step: &Step, updated: StepSnapshot) -> Result<()> {
        self.info.replace_step(&step.name, updated)
    }
}
