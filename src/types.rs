//! Core types shared by the live run model and its snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// How a step's scheduled start specification is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartKind {
    /// Relative to the end of the previous step.
    Default,
    /// Relative to the end of the current step.
    EndStep,
    /// Relative to the start of the current step.
    StartStep,
    /// Relative to the scheduler's start time.
    StartScheduler,
    /// Relative to the start of the whole execution.
    StartExecution,
}

impl Default for StartKind {
    fn default() -> Self {
        StartKind::Default
    }
}

/// Why an action is considered failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailReason {
    /// Not failed.
    No,
    Failed,
    Comparison,
    Calculation,
    NotExecuted,
    Exception,
}

impl Default for FailReason {
    fn default() -> Self {
        FailReason::No
    }
}

/// Per-step counters of executed actions. Opaque to this subsystem: captured
/// from the live step and restored verbatim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionProgress {
    pub done: usize,
    pub successful: usize,
}

/// Scripting-variable bindings of one matrix. Round-tripped through storage,
/// never interpreted here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableSet(BTreeMap<String, serde_json::Value>);

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Free-form context a matrix accumulates while its actions run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixContext(BTreeMap<String, serde_json::Value>);

impl MatrixContext {
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Metadata attached to a matrix by the scheduler.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixData(BTreeMap<String, serde_json::Value>);

impl MatrixData {
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

/// Step-scoped data one matrix kept for one step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepContext(BTreeMap<String, serde_json::Value>);

impl StepContext {
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Descriptor of where a run's reports live. Mostly passed through unchanged;
/// `action_reports_path` is patched once the path becomes known during a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportsInfo {
    pub reports_path: Option<String>,
    pub action_reports_path: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// File name component of a matrix source path, used to derive storage file
/// names. Falls back to the full string for paths without a final component.
pub(crate) fn short_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}
