//! Snapshots of matrices.

use crate::error::Result;
use crate::run::{ActionFactory, Matrix};
use crate::snapshot::ActionSnapshot;
use crate::types::{short_file_name, MatrixContext, MatrixData, Timestamp, VariableSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Durable form of one matrix.
///
/// The action list and variable bindings are excluded from this struct's
/// own serialization: action lists can be arbitrarily large and are paged
/// into separate files by the storage layer, which also stores variables
/// in their own file. Both fields are repopulated on load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixSnapshot {
    pub file_name: String,
    pub name: String,
    pub description: String,

    #[serde(skip)]
    pub actions: Vec<ActionSnapshot>,
    #[serde(skip)]
    pub variables: VariableSet,

    pub step_success: BTreeMap<String, bool>,
    pub step_status_comments: BTreeMap<String, Vec<String>>,
    pub constants: BTreeMap<String, String>,

    pub started: Option<Timestamp>,
    pub actions_done: usize,
    pub successful: bool,

    pub context: MatrixContext,
    pub matrix_data: MatrixData,
}

impl MatrixSnapshot {
    pub fn of(matrix: &Matrix) -> Self {
        Self {
            file_name: matrix.file_name.clone(),
            name: matrix.name.clone(),
            description: matrix.description.clone(),
            actions: matrix
                .actions
                .iter()
                .map(|a| ActionSnapshot::of(a.as_ref()))
                .collect(),
            variables: matrix.variables.clone(),
            step_success: matrix.step_success.clone(),
            step_status_comments: matrix.step_status_comments.clone(),
            constants: matrix.constants.clone(),
            started: matrix.started,
            actions_done: matrix.actions_done,
            successful: matrix.successful,
            context: matrix.context.clone(),
            matrix_data: matrix.matrix_data.clone(),
        }
    }

    /// Rebuild the live matrix with every action reconstructed in its
    /// original order. Any unresolvable action kind fails the whole matrix;
    /// no partial action list is produced.
    pub fn to_live(&self, action_factory: &dyn ActionFactory) -> Result<Matrix> {
        let mut actions = Vec::with_capacity(self.actions.len());
        for snapshot in &self.actions {
            actions.push(snapshot.to_live(&self.name, action_factory)?);
        }

        Ok(Matrix {
            file_name: self.file_name.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            actions,
            variables: self.variables.clone(),
            step_success: self.step_success.clone(),
            step_status_comments: self.step_status_comments.clone(),
            constants: self.constants.clone(),
            started: self.started,
            actions_done: self.actions_done,
            successful: self.successful,
            context: self.context.clone(),
            matrix_data: self.matrix_data.clone(),
        })
    }

    /// File name component of the source path, used to derive the names of
    /// this matrix's storage files.
    pub fn short_file_name(&self) -> String {
        short_file_name(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{ActionData, ActionRegistry, GenericAction};

    fn matrix_with_ids(ids: &[&str]) -> Matrix {
        let mut matrix = Matrix::new("m1.csv", "m1");
        for id in ids {
            matrix.actions.push(Box::new(GenericAction::new(
                "Compare",
                ActionData {
                    id_in_matrix: (*id).into(),
                    matrix_name: "m1".into(),
                    ..Default::default()
                },
            )));
        }
        matrix
    }

    #[test]
    fn test_action_order_preserved() {
        let mut registry = ActionRegistry::new();
        registry.register_generic("Compare");

        let snap = MatrixSnapshot::of(&matrix_with_ids(&["a1", "a2", "a3", "a4"]));
        let live = snap.to_live(&registry).unwrap();

        let ids: Vec<&str> = live
            .actions
            .iter()
            .map(|a| a.data().id_in_matrix.as_str())
            .collect();
        assert_eq!(ids, ["a1", "a2", "a3", "a4"]);
    }

    #[test]
    fn test_actions_not_serialized_with_matrix() {
        let snap = MatrixSnapshot::of(&matrix_with_ids(&["a1"]));
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("a1"));

        let parsed: MatrixSnapshot = serde_json::from_str(&json).unwrap();
        assert!(parsed.actions.is_empty());
        assert_eq!(parsed.name, "m1");
    }

    #[test]
    fn test_unknown_kind_leaves_no_partial_matrix() {
        let registry = ActionRegistry::new();
        let snap = MatrixSnapshot::of(&matrix_with_ids(&["a1", "a2"]));
        assert!(snap.to_live(&registry).is_err());
    }
}
