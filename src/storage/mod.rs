//! Durable-storage abstraction for run snapshots.
//!
//! A [`StateOperator`] persists a complete snapshot, loads it back in two
//! stages (run-level info first, bulky per-matrix objects second), and
//! applies incremental updates as actions and steps complete. Exactly one
//! thread — the run's execution loop — may call the update methods; this
//! layer provides no internal locking. All I/O is synchronous and blocking,
//! with no retry, timeout or cancellation; callers needing any of those
//! wrap the calls themselves.

mod file;
mod memory;

pub use file::{FileHandle, FileStateOperator, DEFAULT_PAGE_SIZE};
pub use memory::{MemoryHandle, MemoryStateOperator};

use crate::error::Result;
use crate::run::{Action, Step};
use crate::snapshot::{ActionSnapshot, RunInfo, RunObjects, StepSnapshot};
use tracing::warn;

/// Persists and restores run snapshots.
///
/// `Handle` is an opaque token returned by [`save`](Self::save) and
/// [`load_info`](Self::load_info), carrying whatever the implementation
/// needs to apply later calls against that save.
///
/// No operation may mutate the caller's in-memory `RunInfo`/`RunObjects`
/// beyond what it was explicitly asked to persist.
pub trait StateOperator {
    type Handle;

    /// Write a brand-new, complete snapshot, replacing any previous one.
    fn save(&mut self, info: &RunInfo, objects: &RunObjects) -> Result<Self::Handle>;

    /// Load run-level metadata plus a handle for loading the rest.
    fn load_info(&mut self) -> Result<(RunInfo, Self::Handle)>;

    /// Load the (potentially large) per-matrix and per-action data.
    fn load_objects(&mut self, handle: &mut Self::Handle) -> Result<RunObjects>;

    /// Persist the effect of one completed action.
    ///
    /// Cost contract: implementations are free to rewrite the entire
    /// snapshot — the provided file operator does — so a single call may be
    /// O(total run size), not O(one action).
    fn update_after_action(
        &mut self,
        info: &RunInfo,
        handle: &mut Self::Handle,
        last_action: &dyn Action,
        snapshot: &ActionSnapshot,
    ) -> Result<()>;

    /// Persist the effect of one completed step. Same cost contract as
    /// [`update_after_action`](Self::update_after_action).
    fn update_after_step(
        &mut self,
        info: &RunInfo,
        handle: &mut Self::Handle,
        last_step: &Step,
        snapshot: &StepSnapshot,
    ) -> Result<()>;

    /// Persist run-level step changes not tied to one completed action.
    fn update_steps(&mut self, info: &RunInfo, handle: &mut Self::Handle) -> Result<()>;

    /// Persist run-level metadata changes (e.g. a report path becoming
    /// known).
    fn update_run_info(&mut self, info: &RunInfo, handle: &mut Self::Handle) -> Result<()>;

    /// Release held resources. Must be safe to call even if no writes
    /// occurred.
    fn close(&mut self) -> Result<()>;
}

/// Fold one completed action into a cached snapshot: replace the matching
/// action snapshot in its matrix, keeping list position, and recompute the
/// matrix's done counter so it agrees with the flags just persisted.
/// Remaining matrix-level mirrors refresh on the next full save.
pub(crate) fn patch_completed_action(
    objects: &mut RunObjects,
    matrix_name: &str,
    snapshot: &ActionSnapshot,
) {
    let Some(matrix) = objects.matrices.iter_mut().find(|m| m.name == matrix_name) else {
        warn!(
            matrix = matrix_name,
            "completed action belongs to a matrix absent from the saved snapshot"
        );
        return;
    };

    match matrix
        .actions
        .iter_mut()
        .find(|a| a.id_in_matrix == snapshot.id_in_matrix)
    {
        Some(slot) => *slot = snapshot.clone(),
        None => warn!(
            matrix = matrix_name,
            action = %snapshot.id_in_matrix,
            "completed action absent from the saved snapshot"
        ),
    }

    matrix.actions_done = matrix.actions.iter().filter(|a| a.done).count();
}
