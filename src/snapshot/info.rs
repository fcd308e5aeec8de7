//! Run-level snapshot parts: `RunInfo`, `RunObjects` and the root
//! `RunSnapshot`.

use crate::error::{Result, StateError};
use crate::snapshot::{MatrixSnapshot, StepSnapshot};
use crate::types::{ReportsInfo, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Run-level metadata: the step list, matrix short names, calendar context
/// and run identity. Small enough to rewrite on every update.
///
/// Keeps a derived name → position index over the steps for O(1) lookup.
/// The index is not serialized; it is rebuilt whenever the step list is
/// replaced wholesale and patched when a single step is updated in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunInfo {
    steps: Vec<StepSnapshot>,
    /// Matrix short file names, in the same order as `RunObjects::matrices`.
    pub matrices: Vec<String>,

    pub weekend_holiday: bool,
    pub holidays: BTreeMap<String, bool>,
    pub business_day: Option<Timestamp>,

    pub started_by_user: Option<String>,
    pub started: Option<Timestamp>,
    pub ended: Option<Timestamp>,

    pub reports: ReportsInfo,

    #[serde(skip)]
    step_index: HashMap<String, usize>,
}

impl Default for RunInfo {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            matrices: Vec::new(),
            weekend_holiday: true,
            holidays: BTreeMap::new(),
            business_day: None,
            started_by_user: None,
            started: None,
            ended: None,
            reports: ReportsInfo::default(),
            step_index: HashMap::new(),
        }
    }
}

impl PartialEq for RunInfo {
    fn eq(&self, other: &Self) -> bool {
        // the index is derived from the steps; only persisted fields count
        self.steps == other.steps
            && self.matrices == other.matrices
            && self.weekend_holiday == other.weekend_holiday
            && self.holidays == other.holidays
            && self.business_day == other.business_day
            && self.started_by_user == other.started_by_user
            && self.started == other.started
            && self.ended == other.ended
            && self.reports == other.reports
    }
}

impl RunInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[StepSnapshot] {
        &self.steps
    }

    /// Replace the whole step list, rebuilding the name index.
    pub fn set_steps(&mut self, steps: Vec<StepSnapshot>) {
        self.steps = steps;
        self.rebuild_step_index();
    }

    pub fn step(&self, name: &str) -> Option<&StepSnapshot> {
        self.step_index.get(name).map(|&at| &self.steps[at])
    }

    /// Replace the snapshot of the named step with `updated`, keeping its
    /// position in the list, and refresh the index entry. The step list is
    /// built at run start and must contain every step that can later
    /// complete; a missing name is a usage error.
    pub fn replace_step(&mut self, name: &str, updated: StepSnapshot) -> Result<()> {
        let at = *self
            .step_index
            .get(name)
            .ok_or_else(|| StateError::StepNotFound(name.to_string()))?;
        if updated.name != name {
            self.step_index.remove(name);
            self.step_index.insert(updated.name.clone(), at);
        }
        self.steps[at] = updated;
        Ok(())
    }

    /// Rebuild the derived index; required after deserializing.
    pub(crate) fn rebuild_step_index(&mut self) {
        self.step_index = self
            .steps
            .iter()
            .enumerate()
            .map(|(at, step)| (step.name.clone(), at))
            .collect();
    }
}

/// The bulky side of a snapshot: per-matrix data (with the potentially very
/// large action lists) and the fixed id seeds reused across restarts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunObjects {
    pub matrices: Vec<MatrixSnapshot>,
    pub fixed_ids: BTreeMap<String, String>,
}

/// Root unit of persistence: one whole run, snapshotted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSnapshot {
    pub info: RunInfo,
    pub objects: RunObjects,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{DefaultStepFactory, StepFactory, StepSettings};

    fn info_with_steps(names: &[&str]) -> RunInfo {
        let factory = DefaultStepFactory;
        let mut info = RunInfo::new();
        info.set_steps(
            names
                .iter()
                .map(|name| {
                    StepSnapshot::of(&factory.create_step(StepSettings {
                        name: (*name).into(),
                        execute: true,
                        ..Default::default()
                    }))
                })
                .collect(),
        );
        info
    }

    #[test]
    fn test_step_lookup_after_set_steps() {
        let info = info_with_steps(&["Init", "Trade", "Settle"]);
        assert_eq!(info.step("Trade").unwrap().name, "Trade");
        assert!(info.step("Missing").is_none());
    }

    #[test]
    fn test_replace_step_keeps_position_and_index() {
        for name in ["Init", "Trade", "Settle"] {
            let mut info = info_with_steps(&["Init", "Trade", "Settle"]);
            let position = info
                .steps()
                .iter()
                .position(|step| step.name == name)
                .unwrap();

            let mut updated = info.step(name).unwrap().clone();
            updated.successful = false;
            updated.status_comment = Some("failed".into());
            info.replace_step(name, updated.clone()).unwrap();

            assert_eq!(info.steps()[position], updated);
            assert_eq!(info.step(name).unwrap(), &updated);
        }
    }

    #[test]
    fn test_replace_step_missing_name_fails() {
        let mut info = info_with_steps(&["Init"]);
        let snapshot = info.step("Init").unwrap().clone();
        let err = info.replace_step("Missing", snapshot).unwrap_err();
        assert!(matches!(err, StateError::StepNotFound(_)));
    }

    #[test]
    fn test_index_rebuilt_after_deserialize() {
        let info = info_with_steps(&["Init", "Trade"]);
        let json = serde_json::to_string(&info).unwrap();
        let mut parsed: RunInfo = serde_json::from_str(&json).unwrap();
        parsed.rebuild_step_index();

        assert_eq!(parsed, info);
        assert_eq!(parsed.step("Trade").unwrap().name, "Trade");
    }
}
