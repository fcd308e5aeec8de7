//! Live actions and the registry they are reconstructed through.

use crate::error::{Result, StateError};
use crate::types::{FailReason, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of one executed action.
///
/// `details` holds comparison rows and sub-results produced while the action
/// ran; they are reporting data, regenerated only during a live run, and are
/// never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunResult {
    /// Type descriptor of the result implementation that produced this.
    pub kind: String,
    pub success: bool,
    /// Distinguishes an unexpected exception from an expected failure.
    pub crashed: bool,
    pub error: Option<String>,
    pub message: Option<String>,
    pub comment: Option<String>,
    pub fail_reason: FailReason,
    pub details: Vec<serde_json::Value>,
}

/// State every action carries, independent of what the action does when run.
///
/// Fields prefixed `formula_` hold the unevaluated expression that produced
/// the matching plain field. The formula is the source of truth for future
/// re-evaluation; the plain field is the cached, possibly stale value.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionData {
    pub id_in_matrix: String,
    pub name: String,
    pub step_name: String,
    /// Logical name of the owning matrix.
    pub matrix_name: String,
    pub comment: String,
    /// Linkage id into the template or generator the matrix came from.
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

    /// Names of input parameters that came from the matrix rather than
    /// from defaults.
    pub matrix_input_params: BTreeSet<String>,
    pub input_params: BTreeMap<String, String>,
    /// Engine-reserved parameters, kept apart from user input.
    pub special_params: BTreeMap<String, String>,
    /// Parameter groups referencing rows produced by other actions,
    /// keyed by sub-action id.
    pub sub_action_params: BTreeMap<String, BTreeMap<String, String>>,

    pub result: Option<RunResult>,
    pub started: Option<Timestamp>,
    pub finished: Option<Timestamp>,
}

impl Default for ActionData {
    fn default() -> Self {
        Self {
            id_in_matrix: String::new(),
            name: String::new(),
            step_name: String::new(),
            matrix_name: String::new(),
            comment: String::new(),
            id_in_template: None,
            formula_comment: None,
            formula_executable: None,
            formula_inverted: None,
            formula_timeout: None,
            formula_id_in_template: None,
            executable: true,
            inverted: false,
            done: false,
            passed: true,
            suspend_if_failed: false,
            timeout_ms: 0,
            matrix_input_params: BTreeSet::new(),
            input_params: BTreeMap::new(),
            special_params: BTreeMap::new(),
            sub_action_params: BTreeMap::new(),
            result: None,
            started: None,
            finished: None,
        }
    }
}

/// One executable unit within a matrix.
///
/// Behavior (what running the action does) belongs to the execution engine;
/// this subsystem only needs the type descriptor for reconstruction, access
/// to the common state, and the optional preparation capability.
pub trait Action {
    /// Stable type descriptor resolving to a registered implementation.
    fn kind(&self) -> &str;

    fn data(&self) -> &ActionData;

    fn data_mut(&mut self) -> &mut ActionData;

    /// Actions needing a pre-run preparation pass return themselves here.
    fn as_preparable(&self) -> Option<&dyn Preparable> {
        None
    }
}

/// Capability for a preparation pass before the step containing the action
/// executes.
pub trait Preparable {
    fn prepare(&self) -> Result<()>;
}

/// Creates live actions during reconstruction.
pub trait ActionFactory {
    /// Build the implementation registered under `kind`, populated with
    /// `data`. Unknown kinds fail with [`StateError::Reconstruction`].
    fn create_action(&self, kind: &str, data: ActionData) -> Result<Box<dyn Action>>;
}

type ActionConstructor = Box<dyn Fn(ActionData) -> Box<dyn Action> + Send + Sync>;

/// Registry of action implementations keyed by their type descriptor.
#[derive(Default)]
pub struct ActionRegistry {
    constructors: BTreeMap<String, ActionConstructor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a type descriptor. A later registration
    /// under the same descriptor replaces the earlier one.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(ActionData) -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Box::new(constructor));
    }

    /// Register [`GenericAction`] under the given descriptor, for action
    /// kinds with no dedicated implementation in this process.
    pub fn register_generic(&mut self, kind: impl Into<String>) {
        let kind = kind.into();
        let stored = kind.clone();
        self.register(kind, move |data| {
            Box::new(GenericAction::new(stored.clone(), data))
        });
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }
}

impl ActionFactory for ActionRegistry {
    fn create_action(&self, kind: &str, data: ActionData) -> Result<Box<dyn Action>> {
        match self.constructors.get(kind) {
            Some(constructor) => Ok(constructor(data)),
            None => Err(StateError::Reconstruction(format!(
                "unknown action kind '{kind}'"
            ))),
        }
    }
}

/// Plain data-only action with no behavior of its own.
#[derive(Clone, Debug)]
pub struct GenericAction {
    kind: String,
    data: ActionData,
}

impl GenericAction {
    pub fn new(kind: impl Into<String>, data: ActionData) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

impl Action for GenericAction {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn data(&self) -> &ActionData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut ActionData {
        &mut self.data
    }
}
