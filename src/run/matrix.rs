//! Live matrices: ordered test scripts holding actions and their variables.

use crate::run::action::Action;
use crate::types::{short_file_name, MatrixContext, MatrixData, Timestamp, VariableSet};
use std::collections::BTreeMap;

/// An ordered test script: a sequence of actions plus scripting variables,
/// constants and accumulated context.
pub struct Matrix {
    /// Source file the matrix was parsed from.
    pub file_name: String,
    /// Logical name, used for cross-references from steps.
    pub name: String,
    pub description: String,

    /// Execution order; must be preserved exactly across save and reload.
    pub actions: Vec<Box<dyn Action>>,
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

impl Matrix {
    pub fn new(file_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            name: name.into(),
            description: String::new(),
            actions: Vec::new(),
            variables: VariableSet::new(),
            step_success: BTreeMap::new(),
            step_status_comments: BTreeMap::new(),
            constants: BTreeMap::new(),
            started: None,
            actions_done: 0,
            successful: true,
            context: MatrixContext::default(),
            matrix_data: MatrixData::default(),
        }
    }

    /// File name component of the source path, used to derive the names of
    /// this matrix's storage files.
    pub fn short_file_name(&self) -> String {
        short_file_name(&self.file_name)
    }
}
