//! File-backed storage operator.
//!
//! A snapshot is a directory of JSON files:
//!
//! ```text
//! <storageDir>/
//!   stateinfo.json          # one RunInfo
//!   stateobjects.json       # one RunObjects, action lists omitted
//!   <matrix>_actions_1.json # pages of ordered ActionSnapshots
//!   <matrix>_actions_2.json
//!   ...
//!   <matrix>_vars.json      # scripting variables of that matrix
//! ```
//!
//! Action lists are split into pages of at most [`DEFAULT_PAGE_SIZE`]
//! snapshots so that peak memory during (de)serialization is bounded no
//! matter how many actions a matrix holds. Saving replaces the whole
//! directory; a failure between the delete and the full rewrite loses both
//! the previous and the new snapshot. That risk is accepted — this operator
//! does not attempt crash-atomic saves.

use crate::error::{Result, StateError};
use crate::run::{Action, Step};
use crate::snapshot::{ActionSnapshot, RunInfo, RunObjects, StepSnapshot};
use crate::storage::{patch_completed_action, StateOperator};
use crate::types::VariableSet;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

const STATE_INFO_FILE: &str = "stateinfo.json";
const STATE_OBJECTS_FILE: &str = "stateobjects.json";

/// Actions per page file.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Token tying incremental updates to a prior save or load.
///
/// Holds the last snapshot of the run objects so that an update — which by
/// contract receives only the run info and the one changed action/step —
/// has a complete snapshot to rewrite.
#[derive(Debug, Default)]
pub struct FileHandle {
    objects: Option<RunObjects>,
}

/// Storage operator writing snapshots as a directory of structured files.
///
/// Holds an exclusive advisory lock on a sibling `<dir>.lock` file for its
/// whole lifetime, so a second operator on the same directory fails with
/// [`StateError::Locked`] instead of corrupting the snapshot.
#[derive(Debug)]
pub struct FileStateOperator {
    storage_dir: PathBuf,
    page_size: usize,
    lock: Option<File>,
}

impl FileStateOperator {
    /// Create an operator for the given directory with the default page
    /// size, acquiring the directory lock.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_page_size(storage_dir, DEFAULT_PAGE_SIZE)
    }

    /// Same as [`new`](Self::new) with a custom action-page size.
    pub fn with_page_size(storage_dir: impl Into<PathBuf>, page_size: usize) -> Result<Self> {
        let storage_dir = storage_dir.into();
        let lock = Self::acquire_lock(&storage_dir)?;

        Ok(Self {
            storage_dir,
            page_size: page_size.max(1),
            lock: Some(lock),
        })
    }

    fn acquire_lock(storage_dir: &Path) -> Result<File> {
        let lock_path = lock_path(storage_dir);
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)?;
        file.try_lock_exclusive().map_err(|_| StateError::Locked)?;
        Ok(file)
    }

    fn actions_file_name(matrix_short_name: &str, file_index: usize) -> String {
        format!("{matrix_short_name}_actions_{file_index}.json")
    }

    fn vars_file_name(matrix_short_name: &str) -> String {
        format!("{matrix_short_name}_vars.json")
    }

    fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<()> {
        let path = self.storage_dir.join(file_name);
        debug!(file = %path.display(), "writing snapshot file");

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        let file = writer
            .into_inner()
            .map_err(|e| StateError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            if e.is_io() {
                StateError::Io(e.into())
            } else {
                StateError::Deserialization(format!("{}: {e}", path.display()))
            }
        })
    }

    /// Write a complete snapshot, replacing the directory contents.
    fn write_snapshot(&self, info: &RunInfo, objects: &RunObjects) -> Result<()> {
        if self.storage_dir.exists() {
            fs::remove_dir_all(&self.storage_dir)?;
        }
        fs::create_dir_all(&self.storage_dir)?;

        for matrix in &objects.matrices {
            let short_name = matrix.short_file_name();

            for (page, actions) in matrix.actions.chunks(self.page_size).enumerate() {
                self.write_json(&Self::actions_file_name(&short_name, page + 1), &actions)?;
            }

            self.write_json(&Self::vars_file_name(&short_name), &matrix.variables)?;
        }

        self.write_json(STATE_INFO_FILE, info)?;
        self.write_json(STATE_OBJECTS_FILE, objects)?;
        Ok(())
    }

    /// Read every action page of one matrix, in page order, stopping at the
    /// first missing index.
    fn read_actions(&self, matrix_short_name: &str) -> Result<Vec<ActionSnapshot>> {
        let mut actions = Vec::new();
        let mut file_index = 1;
        loop {
            let path = self
                .storage_dir
                .join(Self::actions_file_name(matrix_short_name, file_index));
            if !path.is_file() {
                break;
            }
            let page: Vec<ActionSnapshot> = Self::read_json(&path)?;
            actions.extend(page);
            file_index += 1;
        }
        Ok(actions)
    }
}

impl StateOperator for FileStateOperator {
    type Handle = FileHandle;

    fn save(&mut self, info: &RunInfo, objects: &RunObjects) -> Result<Self::Handle> {
        self.write_snapshot(info, objects)?;
        Ok(FileHandle {
            objects: Some(objects.clone()),
        })
    }

    fn load_info(&mut self) -> Result<(RunInfo, Self::Handle)> {
        let mut info: RunInfo = Self::read_json(&self.storage_dir.join(STATE_INFO_FILE))?;
        info.rebuild_step_index();
        Ok((info, FileHandle::default()))
    }

    fn load_objects(&mut self, handle: &mut Self::Handle) -> Result<RunObjects> {
        let mut objects: RunObjects = Self::read_json(&self.storage_dir.join(STATE_OBJECTS_FILE))?;

        for matrix in &mut objects.matrices {
            let short_name = matrix.short_file_name();
            matrix.actions = self.read_actions(&short_name)?;

            let vars_path = self.storage_dir.join(Self::vars_file_name(&short_name));
            matrix.variables = if vars_path.is_file() {
                Self::read_json(&vars_path)?
            } else {
                // matrix added after the last variable write
                VariableSet::new()
            };
        }

        handle.objects = Some(objects.clone());
        Ok(objects)
    }

    fn update_after_action(
        &mut self,
        info: &RunInfo,
        handle: &mut Self::Handle,
        last_action: &dyn Action,
        snapshot: &ActionSnapshot,
    ) -> Result<()> {
        let objects = handle.objects.as_mut().ok_or(StateError::NoStateObjects)?;
        patch_completed_action(objects, &last_action.data().matrix_name, snapshot);
        self.write_snapshot(info, objects)
    }

    fn update_after_step(
        &mut self,
        info: &RunInfo,
        handle: &mut Self::Handle,
        _last_step: &Step,
        _snapshot: &StepSnapshot,
    ) -> Result<()> {
        // step state lives in the run info, already refreshed by the caller
        let objects = handle.objects.as_ref().ok_or(StateError::NoStateObjects)?;
        self.write_snapshot(info, objects)
    }

    fn update_steps(&mut self, info: &RunInfo, _handle: &mut Self::Handle) -> Result<()> {
        fs::create_dir_all(&self.storage_dir)?;
        self.write_json(STATE_INFO_FILE, info)
    }

    fn update_run_info(&mut self, info: &RunInfo, _handle: &mut Self::Handle) -> Result<()> {
        fs::create_dir_all(&self.storage_dir)?;
        self.write_json(STATE_INFO_FILE, info)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(lock) = self.lock.take() {
            lock.unlock()?;
        }
        Ok(())
    }
}

impl Drop for FileStateOperator {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let _ = lock.unlock();
        }
    }
}

fn lock_path(storage_dir: &Path) -> PathBuf {
    let mut name = storage_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    name.push_str(".lock");
    match storage_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_page_file_names() {
        assert_eq!(
            FileStateOperator::actions_file_name("m1.csv", 3),
            "m1.csv_actions_3.json"
        );
        assert_eq!(FileStateOperator::vars_file_name("m1.csv"), "m1.csv_vars.json");
    }

    #[test]
    fn test_lock_path_is_sibling_of_dir() {
        assert_eq!(
            lock_path(Path::new("/tmp/runs/state")),
            Path::new("/tmp/runs/state.lock")
        );
        assert_eq!(lock_path(Path::new("state")), Path::new("state.lock"));
    }

    #[test]
    fn test_second_operator_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("state");

        let first = FileStateOperator::new(&state_dir).unwrap();
        let second = FileStateOperator::new(&state_dir);
        assert!(matches!(second.unwrap_err(), StateError::Locked));

        drop(first);
        FileStateOperator::new(&state_dir).unwrap();
    }

    #[test]
    fn test_close_without_writes_is_safe() {
        let dir = TempDir::new().unwrap();
        let mut operator = FileStateOperator::new(dir.path().join("state")).unwrap();
        operator.close().unwrap();
        operator.close().unwrap();
    }

    #[test]
    fn test_save_writes_expected_layout() {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("state");
        let mut operator = FileStateOperator::with_page_size(&state_dir, 2).unwrap();

        let mut matrix = crate::snapshot::MatrixSnapshot {
            file_name: "m1.csv".into(),
            name: "m1".into(),
            ..Default::default()
        };
        for id in ["a1", "a2", "a3"] {
            matrix.actions.push(ActionSnapshot {
                id_in_matrix: id.into(),
                ..Default::default()
            });
        }
        let objects = RunObjects {
            matrices: vec![matrix],
            ..Default::default()
        };
        let mut info = RunInfo::new();
        info.matrices = vec!["m1.csv".into()];

        operator.save(&info, &objects).unwrap();

        assert!(state_dir.join("stateinfo.json").is_file());
        assert!(state_dir.join("stateobjects.json").is_file());
        assert!(state_dir.join("m1.csv_actions_1.json").is_file());
        assert!(state_dir.join("m1.csv_actions_2.json").is_file());
        assert!(!state_dir.join("m1.csv_actions_3.json").exists());
        assert!(state_dir.join("m1.csv_vars.json").is_file());
    }
}
