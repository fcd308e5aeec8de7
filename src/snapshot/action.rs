//! Snapshots of actions and their results.

use crate::error::Result;
use crate::run::{Action, ActionData, ActionFactory, RunResult};
use crate::types::{FailReason, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Durable form of a [`RunResult`].
///
/// Result details (comparison rows, sub-results) are ephemeral reporting
/// data and are dropped here; a reloaded result carries the verdict only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    /// Type descriptor of the result implementation that produced this.
    pub kind: String,
    pub success: bool,
    pub crashed: bool,
    pub error: Option<String>,
    pub message: Option<String>,
    pub comment: Option<String>,
    pub fail_reason: FailReason,
}

impl ResultSnapshot {
    pub fn of(result: &RunResult) -> Self {
        Self {
            kind: result.kind.clone(),
            success: result.success,
            crashed: result.crashed,
            error: result.error.clone(),
            message: result.message.clone(),
            comment: result.comment.clone(),
            fail_reason: result.fail_reason,
        }
    }

    pub fn to_live(&self) -> RunResult {
        RunResult {
            kind: self.kind.clone(),
            success: self.success,
            crashed: self.crashed,
            error: self.error.clone(),
            message: self.message.clone(),
            comment: self.comment.clone(),
            fail_reason: self.fail_reason,
            details: Vec::new(),
        }
    }
}

/// Durable form of one action: its type descriptor plus everything needed
/// to rebuild the live action, including execution state. Whether a rebuilt
/// action re-runs is the engine's decision, not encoded here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    /// Resolves to a registered action implementation on reconstruction.
    pub kind: String,

    pub id_in_matrix: String,
    pub name: String,
    pub step_name: String,
    pub comment: String,
    pub id_in_template: Option<String>,

    pub formula_comment: Option<String>,
    pub formula_executable: Option<String>,
    pub formula_inverted: Option<String>,
    pub formula_timeout: Option<String>,
    pub formula_id_in_template: Option<String>,

    pub executable: bool,
    pub inverted: bool,
    pub done: bool,
    pub passed: bool,
    pub suspend_if_failed: bool,
    pub timeout_ms: u64,

    pub matrix_input_params: BTreeSet<String>,
    pub input_params: BTreeMap<String, String>,
    pub special_params: BTreeMap<String, String>,
    pub sub_action_params: BTreeMap<String, BTreeMap<String, String>>,

    pub result: Option<ResultSnapshot>,
    pub started: Option<Timestamp>,
    pub finished: Option<Timestamp>,
}

impl Default for ActionSnapshot {
    fn default() -> Self {
        Self::from_data("", &ActionData::default())
    }
}

impl ActionSnapshot {
    pub fn of(action: &dyn Action) -> Self {
        Self::from_data(action.kind(), action.data())
    }

    fn from_data(kind: &str, data: &ActionData) -> Self {
        Self {
            kind: kind.to_string(),
            id_in_matrix: data.id_in_matrix.clone(),
            name: data.name.clone(),
            step_name: data.step_name.clone(),
            comment: data.comment.clone(),
            id_in_template: data.id_in_template.clone(),
            formula_comment: data.formula_comment.clone(),
            formula_executable: data.formula_executable.clone(),
            formula_inverted: data.formula_inverted.clone(),
            formula_timeout: data.formula_timeout.clone(),
            formula_id_in_template: data.formula_id_in_template.clone(),
            executable: data.executable,
            inverted: data.inverted,
            done: data.done,
            passed: data.passed,
            suspend_if_failed: data.suspend_if_failed,
            timeout_ms: data.timeout_ms,
            matrix_input_params: data.matrix_input_params.clone(),
            input_params: data.input_params.clone(),
            special_params: data.special_params.clone(),
            sub_action_params: data.sub_action_params.clone(),
            result: data.result.as_ref().map(ResultSnapshot::of),
            started: data.started,
            finished: data.finished,
        }
    }

    /// Rebuild the live action this snapshot was taken from, owned by the
    /// matrix named `matrix_name`. Fails if the type descriptor is not
    /// registered with the factory.
    pub fn to_live(
        &self,
        matrix_name: &str,
        factory: &dyn ActionFactory,
    ) -> Result<Box<dyn Action>> {
        let data = ActionData {
            id_in_matrix: self.id_in_matrix.clone(),
            name: self.name.clone(),
            step_name: self.step_name.clone(),
            matrix_name: matrix_name.to_string(),
            comment: self.comment.clone(),
            id_in_template: self.id_in_template.clone(),
            formula_comment: self.formula_comment.clone(),
            formula_executable: self.formula_executable.clone(),
            formula_inverted: self.formula_inverted.clone(),
            formula_timeout: self.formula_timeout.clone(),
            formula_id_in_template: self.formula_id_in_template.clone(),
            executable: self.executable,
            inverted: self.inverted,
            done: self.done,
            passed: self.passed,
            suspend_if_failed: self.suspend_if_failed,
            timeout_ms: self.timeout_ms,
            matrix_input_params: self.matrix_input_params.clone(),
            input_params: self.input_params.clone(),
            special_params: self.special_params.clone(),
            sub_action_params: self.sub_action_params.clone(),
            result: self.result.as_ref().map(ResultSnapshot::to_live),
            started: self.started,
            finished: self.finished,
        };
        factory.create_action(&self.kind, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::ActionRegistry;

    fn sample_data() -> ActionData {
        ActionData {
            id_in_matrix: "id3".into(),
            name: "SendMessage".into(),
            step_name: "Step1".into(),
            matrix_name: "m1".into(),
            comment: "send the order".into(),
            formula_timeout: Some("@{timeout * 2}".into()),
            done: true,
            passed: false,
            timeout_ms: 5000,
            result: Some(RunResult {
                kind: "DefaultResult".into(),
                success: false,
                fail_reason: FailReason::Comparison,
                details: vec![serde_json::json!({"expected": "A", "actual": "B"})],
                ..Default::default()
            }),
            started: Some(Timestamp(100)),
            finished: Some(Timestamp(250)),
            ..Default::default()
        }
    }

    #[test]
    fn test_roundtrip_restores_execution_state() {
        let mut registry = ActionRegistry::new();
        registry.register_generic("SendMessage");

        let snap = ActionSnapshot::from_data("SendMessage", &sample_data());
        let live = snap.to_live("m1", &registry).unwrap();

        let data = live.data();
        assert!(data.done);
        assert!(!data.passed);
        assert_eq!(data.matrix_name, "m1");
        assert_eq!(data.formula_timeout.as_deref(), Some("@{timeout * 2}"));
        assert_eq!(data.started, Some(Timestamp(100)));
        let result = data.result.as_ref().unwrap();
        assert_eq!(result.fail_reason, FailReason::Comparison);
    }

    #[test]
    fn test_result_details_are_dropped() {
        let snap = ActionSnapshot::from_data("SendMessage", &sample_data());
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("expected"));

        let restored = ResultSnapshot::of(sample_data().result.as_ref().unwrap()).to_live();
        assert!(restored.details.is_empty());
    }

    #[test]
    fn test_unknown_kind_fails_reconstruction() {
        let registry = ActionRegistry::new();
        let snap = ActionSnapshot::from_data("NotRegistered", &sample_data());
        assert!(snap.to_live("m1", &registry).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let snap = ActionSnapshot::from_data("SendMessage", &sample_data());
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: ActionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, parsed);
    }
}
