//! In-memory storage operator.
//!
//! Keeps the snapshot in process memory instead of on disk. Useful as a
//! test double and as the minimal second implementation proving the
//! [`StateOperator`] seam is storage-agnostic; it survives nothing, least
//! of all a restart.

use crate::error::{Result, StateError};
use crate::run::{Action, Step};
use crate::snapshot::{ActionSnapshot, RunInfo, RunObjects, StepSnapshot};
use crate::storage::{patch_completed_action, StateOperator};

/// Token for updates against an in-memory save. Carries nothing; the
/// operator itself holds the snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryHandle;

/// Storage operator holding the latest snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStateOperator {
    info: Option<RunInfo>,
    objects: Option<RunObjects>,
}

impl MemoryStateOperator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateOperator for MemoryStateOperator {
    type Handle = MemoryHandle;

    fn save(&mut self, info: &RunInfo, objects: &RunObjects) -> Result<Self::Handle> {
        self.info = Some(info.clone());
        self.objects = Some(objects.clone());
        Ok(MemoryHandle)
    }

    fn load_info(&mut self) -> Result<(RunInfo, Self::Handle)> {
        let info = self.info.clone().ok_or_else(|| {
            StateError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no snapshot saved",
            ))
        })?;
        Ok((info, MemoryHandle))
    }

    fn load_objects(&mut self, _handle: &mut Self::Handle) -> Result<RunObjects> {
        self.objects.clone().ok_or_else(|| {
            StateError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no snapshot saved",
            ))
        })
    }

    fn update_after_action(
        &mut self,
        info: &RunInfo,
        _handle: &mut Self::Handle,
        last_action: &dyn Action,
        snapshot: &ActionSnapshot,
    ) -> Result<()> {
        let objects = self.objects.as_mut().ok_or(StateError::NoStateObjects)?;
        patch_completed_action(objects, &last_action.data().matrix_name, snapshot);
        self.info = Some(info.clone());
        Ok(())
    }

    fn update_after_step(
        &mut self,
        info: &RunInfo,
        _handle: &mut Self::Handle,
        _last_step: &Step,
        _snapshot: &StepSnapshot,
    ) -> Result<()> {
        if self.objects.is_none() {
            return Err(StateError::NoStateObjects);
        }
        self.info = Some(info.clone());
        Ok(())
    }

    fn update_steps(&mut self, info: &RunInfo, _handle: &mut Self::Handle) -> Result<()> {
        self.info = Some(info.clone());
        Ok(())
    }

    fn update_run_info(&mut self, info: &RunInfo, _handle: &mut Self::Handle) -> Result<()> {
        self.info = Some(info.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_before_save_fails() {
        let mut operator = MemoryStateOperator::new();
        assert!(operator.load_info().is_err());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let mut operator = MemoryStateOperator::new();
        let mut info = RunInfo::new();
        info.matrices = vec!["m1.csv".into()];
        let objects = RunObjects::default();

        operator.save(&info, &objects).unwrap();

        let (loaded_info, mut handle) = operator.load_info().unwrap();
        assert_eq!(loaded_info, info);
        assert_eq!(operator.load_objects(&mut handle).unwrap(), objects);
    }
}
